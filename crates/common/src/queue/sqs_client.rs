use crate::queue::{QueueClient, QueueError, RawMessage, ReceiveOptions};
use async_trait::async_trait;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use tracing::debug;

/// `QueueClient` backed by SQS.
///
/// Requests all system and message attributes on receive so the propagated
/// trace header and delivery metadata reach the pipeline.
pub struct SqsQueueClient {
    client: aws_sdk_sqs::Client,
}

impl SqsQueueClient {
    /// Build from the shared SDK config, optionally overriding the endpoint
    /// (local stacks).
    pub fn new(sdk_config: &aws_config::SdkConfig, endpoint: Option<&str>) -> Self {
        let mut builder = aws_sdk_sqs::config::Builder::from(sdk_config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Self {
            client: aws_sdk_sqs::Client::from_conf(builder.build()),
        }
    }

    /// Create from a pre-built client (for testing against local stacks).
    pub fn from_client(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn receive_messages(
        &self,
        queue_url: &str,
        opts: ReceiveOptions,
    ) -> Result<Vec<RawMessage>, QueueError> {
        let response = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(opts.max_messages)
            .wait_time_seconds(opts.wait_seconds)
            .visibility_timeout(opts.visibility_timeout_seconds)
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| QueueError::Receive(e.into()))?;

        let messages: Vec<RawMessage> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|msg| RawMessage {
                message_id: msg.message_id().unwrap_or_default().to_string(),
                body: msg.body().unwrap_or_default().to_string(),
                receipt_handle: msg.receipt_handle().unwrap_or_default().to_string(),
                attributes: msg
                    .attributes()
                    .map(|attrs| {
                        attrs
                            .iter()
                            .map(|(name, value)| (name.as_str().to_string(), value.clone()))
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect();

        debug!(
            queue_url = %queue_url,
            message_count = messages.len(),
            "received message batch"
        );

        Ok(messages)
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(e.into()))?;

        debug!(queue_url = %queue_url, "deleted message");
        Ok(())
    }
}
