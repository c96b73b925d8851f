use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_smithy_types::timeout::TimeoutConfig;
use common::{CatalogRecord, Delivery, PersistenceSink, SinkError};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const ATTR_ID: &str = "Id";
const ATTR_TITLE: &str = "Title";
const ATTR_ISBN: &str = "ISBN";
const ATTR_AUTHORS: &str = "Authors";
const ATTR_COVER_PAGE: &str = "CoverPage";

const OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Record sink backed by a DynamoDB table.
///
/// Each write is an unconditional full-item put keyed on the record id, so
/// redelivering the same message overwrites the row with identical content.
pub struct DynamoRecordSink {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoRecordSink {
    /// Build from the shared SDK config, inheriting its credentials, region
    /// and HTTP client. `endpoint` overrides the service endpoint for local
    /// stacks.
    pub fn new(
        sdk_config: &aws_config::SdkConfig,
        endpoint: Option<&str>,
        table_name: impl Into<String>,
    ) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        builder = builder.timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(OPERATION_TIMEOUT)
                .build(),
        );

        Self {
            client: aws_sdk_dynamodb::Client::from_conf(builder.build()),
            table_name: table_name.into(),
        }
    }

    pub fn from_client(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl PersistenceSink for DynamoRecordSink {
    fn destination(&self) -> String {
        format!("dynamodb://{}", self.table_name)
    }

    async fn persist(&self, delivery: &Delivery) -> Result<(), SinkError> {
        debug!(
            table_name = %self.table_name,
            record_id = %delivery.record.id,
            "upserting catalog record"
        );

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(record_items(&delivery.record)))
            .send()
            .await
            .map_err(classify_put_error)?;

        Ok(())
    }
}

/// Map a record onto its DynamoDB attribute set. Absent optional fields are
/// omitted rather than written as NULL.
fn record_items(record: &CatalogRecord) -> HashMap<String, AttributeValue> {
    let mut items = HashMap::new();
    items.insert(ATTR_ID.to_string(), AttributeValue::S(record.id.clone()));
    items.insert(
        ATTR_TITLE.to_string(),
        AttributeValue::S(record.title.clone()),
    );

    if let Some(isbn) = &record.isbn {
        items.insert(ATTR_ISBN.to_string(), AttributeValue::S(isbn.clone()));
    }

    if !record.authors.is_empty() {
        items.insert(
            ATTR_AUTHORS.to_string(),
            AttributeValue::L(
                record
                    .authors
                    .iter()
                    .map(|author| AttributeValue::S(author.clone()))
                    .collect(),
            ),
        );
    }

    if let Some(cover_page) = &record.cover_page {
        items.insert(
            ATTR_COVER_PAGE.to_string(),
            AttributeValue::S(cover_page.clone()),
        );
    }

    items
}

/// Split PutItem failures into retry-by-redelivery and drop cases. Capacity
/// and server-side errors clear up on their own; everything else (missing
/// table, item too large, validation) never will.
fn classify_put_error(err: SdkError<PutItemError>) -> SinkError {
    let transient = match &err {
        SdkError::ServiceError(service_err) => matches!(
            service_err.err(),
            PutItemError::ProvisionedThroughputExceededException(_)
                | PutItemError::RequestLimitExceeded(_)
                | PutItemError::InternalServerError(_)
        ),
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        _ => false,
    };

    if transient {
        SinkError::Transient(err.into())
    } else {
        SinkError::Permanent(err.into())
    }
}
