use crate::queue::{QueueClient, QueueError, RawMessage, ReceiveOptions};
use std::sync::Arc;
use tracing::debug;

/// SQS caps for one receive call.
const MAX_BATCH_SIZE: i32 = 10;
const MAX_WAIT_SECONDS: i32 = 20;

/// Binds a [`QueueClient`] to one queue URL with validated receive tuning.
///
/// `receive` is the only long-blocking call in the pipeline; everything
/// downstream of it is expected to finish quickly. Acknowledgement failures
/// are surfaced for logging only — after the visibility timeout the message
/// becomes redeliverable, which is the sole retry mechanism. There is
/// deliberately no application-level retry on top of it.
pub struct QueuePoller {
    client: Arc<dyn QueueClient>,
    queue_url: String,
    opts: ReceiveOptions,
}

impl QueuePoller {
    pub fn new(
        client: Arc<dyn QueueClient>,
        queue_url: impl Into<String>,
        opts: ReceiveOptions,
    ) -> Self {
        let opts = ReceiveOptions {
            max_messages: opts.max_messages.clamp(1, MAX_BATCH_SIZE),
            wait_seconds: opts.wait_seconds.clamp(0, MAX_WAIT_SECONDS),
            visibility_timeout_seconds: opts.visibility_timeout_seconds.max(0),
        };

        Self {
            client,
            queue_url: queue_url.into(),
            opts,
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Long-poll the queue. An empty batch means the wait timed out, not
    /// that something failed.
    pub async fn receive(&self) -> Result<Vec<RawMessage>, QueueError> {
        debug!(
            queue_url = %self.queue_url,
            max_messages = self.opts.max_messages,
            wait_seconds = self.opts.wait_seconds,
            "polling queue"
        );

        self.client
            .receive_messages(&self.queue_url, self.opts)
            .await
    }

    /// Delete one fully processed message. Must only be called after the
    /// whole pipeline succeeded for that message.
    pub async fn acknowledge(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message(&self.queue_url, receipt_handle)
            .await
    }
}
