use crate::domain::{CatalogRecord, NotificationEnvelope};
use async_trait::async_trait;
use thiserror::Error;

/// One decoded unit of work handed to a persistence sink.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub envelope: NotificationEnvelope,
    pub record: CatalogRecord,
    /// The raw queue message body, kept for audit archiving.
    pub raw_body: String,
}

#[derive(Debug, Error)]
pub enum SinkError {
    /// The backend failed in a way that should resolve on redelivery. The
    /// message is left unacknowledged so the visibility timeout redelivers
    /// it.
    #[error("transient write failure: {0}")]
    Transient(#[source] anyhow::Error),

    /// The write was rejected and will be rejected again on every retry.
    /// Handled like malformed input.
    #[error("permanent write failure: {0}")]
    Permanent(#[source] anyhow::Error),
}

impl SinkError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SinkError::Transient(_))
    }
}

/// One idempotent write per delivery.
///
/// Implementations must converge when the same delivery is replayed:
/// overwrite by record id or by blob key, never insert a duplicate. That
/// idempotence is what lets duplicate deliveries from the at-least-once
/// queue stay harmless without any cross-message locking.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Human-readable destination identifier, used in logs.
    fn destination(&self) -> String;

    async fn persist(&self, delivery: &Delivery) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_permanent_classify() {
        assert!(SinkError::Transient(anyhow::anyhow!("throttled")).is_transient());
        assert!(!SinkError::Permanent(anyhow::anyhow!("rejected")).is_transient());
    }
}
