use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Message attribute carrying the trace header propagated from the upstream
/// publisher through the notification topic.
pub const TRACE_HEADER_ATTRIBUTE: &str = "AWSTraceHeader";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue receive failed: {0}")]
    Receive(#[source] anyhow::Error),

    #[error("queue delete failed: {0}")]
    Delete(#[source] anyhow::Error),
}

/// One received-but-unacknowledged queue message.
///
/// Created by the queue service on receive, consumed exactly once by the
/// pipeline, and deleted only after the full pipeline succeeds. Until then
/// the visibility timeout governs redelivery.
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    pub message_id: String,
    pub body: String,
    pub receipt_handle: String,
    /// System attributes: the propagated trace header, receive count,
    /// sent timestamp.
    pub attributes: HashMap<String, String>,
}

impl RawMessage {
    pub fn trace_header(&self) -> Option<&str> {
        self.attributes.get(TRACE_HEADER_ATTRIBUTE).map(String::as_str)
    }
}

/// Receive tuning for one long-poll call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    pub max_messages: i32,
    pub wait_seconds: i32,
    pub visibility_timeout_seconds: i32,
}

/// Trait for queue service operations: long-poll receive with a visibility
/// timeout, delete by receipt handle.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Long-poll receive: blocks up to `opts.wait_seconds` waiting for at
    /// least one message and returns an empty batch on timeout.
    async fn receive_messages(
        &self,
        queue_url: &str,
        opts: ReceiveOptions,
    ) -> Result<Vec<RawMessage>, QueueError>;

    /// Remove a message so it is not redelivered. Deleting an already
    /// deleted message is a no-op on the service side.
    async fn delete_message(&self, queue_url: &str, receipt_handle: &str)
        -> Result<(), QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_header_reads_the_propagated_attribute() {
        let mut message = RawMessage::default();
        assert!(message.trace_header().is_none());

        message.attributes.insert(
            TRACE_HEADER_ATTRIBUTE.to_string(),
            "Root=1-abc;Sampled=1".to_string(),
        );
        assert_eq!(message.trace_header(), Some("Root=1-abc;Sampled=1"));
    }
}
