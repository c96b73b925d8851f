use crate::s3::ObjectStore;
use async_trait::async_trait;
use common::{Delivery, PersistenceSink, SinkError};
use std::sync::Arc;
use tracing::debug;

const ENTITY_PREFIX: &str = "entities";
const ENVELOPE_PREFIX: &str = "envelopes";

/// Archive sink writing two documents per delivery: the inner record
/// payload keyed by record id, and the full envelope keyed by the
/// notification's message id for auditing.
///
/// Keys are pure functions of the delivery, so a redelivered message
/// overwrites both objects with identical content instead of accumulating
/// duplicates.
pub struct S3ArchiveSink {
    store: Arc<dyn ObjectStore>,
}

impl S3ArchiveSink {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn entity_key(delivery: &Delivery) -> String {
        format!("{ENTITY_PREFIX}/{}.json", delivery.record.id)
    }

    fn envelope_key(delivery: &Delivery) -> String {
        format!("{ENVELOPE_PREFIX}/{}.json", delivery.envelope.message_id)
    }
}

#[async_trait]
impl PersistenceSink for S3ArchiveSink {
    fn destination(&self) -> String {
        self.store.location()
    }

    async fn persist(&self, delivery: &Delivery) -> Result<(), SinkError> {
        let entity_key = Self::entity_key(delivery);
        let envelope_key = Self::envelope_key(delivery);

        debug!(
            entity_key = %entity_key,
            envelope_key = %envelope_key,
            "archiving delivery"
        );

        // The envelope write is skipped when the entity write fails; the
        // redelivery repeats both.
        self.store
            .put(&entity_key, delivery.envelope.message.clone())
            .await?;
        self.store.put(&envelope_key, delivery.raw_body.clone()).await?;

        Ok(())
    }
}
