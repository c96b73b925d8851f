use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_smithy_types::timeout::TimeoutConfig;
use common::SinkError;
use std::time::Duration;
use tracing::debug;

const OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Keyed JSON document storage. Seam over the S3 client so archive logic
/// can be tested without a bucket.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human-readable target for logs.
    fn location(&self) -> String;

    async fn put(&self, key: &str, body: String) -> Result<(), SinkError>;
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket_name: String,
}

impl S3ObjectStore {
    /// Build from the shared SDK config. `endpoint` overrides the service
    /// endpoint for local stacks, which also forces path-style addressing.
    pub fn new(
        sdk_config: &aws_config::SdkConfig,
        endpoint: Option<&str>,
        bucket_name: impl Into<String>,
    ) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config);

        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        builder = builder.timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(OPERATION_TIMEOUT)
                .build(),
        );

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket_name: bucket_name.into(),
        }
    }

    pub fn from_client(client: aws_sdk_s3::Client, bucket_name: impl Into<String>) -> Self {
        Self {
            client,
            bucket_name: bucket_name.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn location(&self) -> String {
        format!("s3://{}", self.bucket_name)
    }

    async fn put(&self, key: &str, body: String) -> Result<(), SinkError> {
        debug!(bucket_name = %self.bucket_name, key, "writing archive object");

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(body.into_bytes()))
            .send()
            .await
            .map_err(classify_put_error)?;

        Ok(())
    }
}

/// Server-side trouble and throttling clear up on redelivery; client-side
/// rejections (missing bucket, denied access) never do.
fn classify_put_error(err: SdkError<PutObjectError>) -> SinkError {
    let transient = match &err {
        SdkError::ServiceError(service_err) => {
            let status = service_err.raw().status();
            status.is_server_error() || status.as_u16() == 429 || status.as_u16() == 408
        }
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
