use crate::domain::{self, CodecError};
use crate::metrics::{MetricRecord, MetricUnit, MetricsBackend};
use crate::queue::{QueuePoller, RawMessage};
use crate::sink::{Delivery, PersistenceSink};
use crate::trace::{ScopedSegment, SegmentEmitter, SegmentOutcome};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Resolution for messages that can never succeed: undecodable bodies and
/// writes the backend rejects permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedMessagePolicy {
    /// Delete the message. Drops the input, but keeps a poison message from
    /// being redelivered forever.
    #[default]
    Acknowledge,
    /// Leave the message for redelivery; an external dead-letter redrive is
    /// expected to catch it after enough receives.
    Leave,
}

#[derive(Debug, Clone)]
pub struct WorkerLoopConfig {
    /// Service name used for segment naming and the worker identity.
    pub service_name: String,
    /// Fixed delay between polling iterations.
    pub idle_delay: Duration,
    /// Bound on the metrics drain during shutdown.
    pub drain_timeout: Duration,
    pub malformed_policy: MalformedMessagePolicy,
}

#[derive(Debug, Error)]
enum DispatchError {
    #[error(transparent)]
    Decode(#[from] CodecError),

    #[error(transparent)]
    Write(#[from] crate::sink::SinkError),
}

/// The consumption pipeline shared by every worker service, generic over
/// the persistence sink.
///
/// Each iteration long-polls the queue, then dispatches every received
/// message independently: decode, begin a scoped trace segment, persist,
/// acknowledge, flush metrics, end the segment. One message's failure never
/// reaches its batch siblings or the loop itself.
pub struct WorkerLoop<S> {
    worker_id: String,
    poller: QueuePoller,
    sink: Arc<S>,
    segments: Arc<dyn SegmentEmitter>,
    metrics: Arc<dyn MetricsBackend>,
    config: WorkerLoopConfig,
}

impl<S: PersistenceSink> WorkerLoop<S> {
    pub fn new(
        poller: QueuePoller,
        sink: Arc<S>,
        segments: Arc<dyn SegmentEmitter>,
        metrics: Arc<dyn MetricsBackend>,
        config: WorkerLoopConfig,
    ) -> Self {
        let worker_id = format!("{}/{}", config.service_name, Uuid::new_v4());
        Self {
            worker_id,
            poller,
            sink,
            segments,
            metrics,
            config,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Consume until cancelled.
    ///
    /// Cancellation is cooperative and observed between receive calls, never
    /// mid-message: a batch that has already been pulled is always finished,
    /// then the metrics backend is drained before the loop stops. No receive
    /// call is issued after cancellation is observed.
    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        info!(
            worker_id = %self.worker_id,
            queue_url = %self.poller.queue_url(),
            destination = %self.sink.destination(),
            "starting worker loop"
        );

        loop {
            if ctx.is_cancelled() {
                break;
            }

            // Biased: a batch that arrives together with cancellation is
            // still handed over and finished, never dropped on the floor.
            let batch = tokio::select! {
                biased;
                result = self.poller.receive() => match result {
                    Ok(batch) => batch,
                    Err(e) => {
                        error!(worker_id = %self.worker_id, error = %e, "error receiving from queue");
                        Vec::new()
                    }
                },
                _ = ctx.cancelled() => break,
            };

            for message in batch {
                self.dispatch(message).await;
            }

            // Fixed idle delay before the next poll; also where a
            // cancellation that arrived mid-batch is picked up.
            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = tokio::time::sleep(self.config.idle_delay) => {}
            }
        }

        info!(worker_id = %self.worker_id, "worker loop cancelled, draining metrics");
        if let Err(e) = self.metrics.drain(self.config.drain_timeout).await {
            warn!(worker_id = %self.worker_id, error = %e, "metrics drain incomplete");
        }

        info!(worker_id = %self.worker_id, "worker loop stopped");
        Ok(())
    }

    /// Handle one message end to end. Every error is absorbed here, at the
    /// message boundary.
    async fn dispatch(&self, message: RawMessage) {
        let segment = ScopedSegment::begin(
            &self.config.service_name,
            message.trace_header(),
            Arc::clone(&self.segments),
        );
        let trace_id = segment.trace_id().to_string();

        let mut metrics = MetricRecord::new();
        metrics.set_dimension("WorkerId", self.worker_id.as_str());
        metrics.put_property("TraceId", trace_id.as_str());

        let outcome = self.process(&message).await;

        metrics.put_counter(
            "ProcessingTime",
            segment.elapsed().as_secs_f64() * 1000.0,
            MetricUnit::Milliseconds,
        );

        match &outcome {
            Ok(()) => {
                metrics.put_counter("ProcessedMessageCount", 1.0, MetricUnit::Count);
                info!(
                    worker_id = %self.worker_id,
                    message_id = %message.message_id,
                    trace_id = %trace_id,
                    "message processed"
                );
            }
            Err(e) => {
                metrics.put_counter("FailedMessageCount", 1.0, MetricUnit::Count);
                if matches!(e, DispatchError::Decode(_)) {
                    metrics.put_counter("MalformedMessageCount", 1.0, MetricUnit::Count);
                }
                error!(
                    worker_id = %self.worker_id,
                    message_id = %message.message_id,
                    trace_id = %trace_id,
                    error = %e,
                    "message processing failed"
                );
            }
        }

        // Flush is unconditional so failed work stays observable.
        if let Err(e) = self.metrics.flush(metrics) {
            warn!(worker_id = %self.worker_id, error = %e, "failed to flush metric record");
        }

        segment.end(match outcome {
            Ok(()) => SegmentOutcome::Success,
            Err(_) => SegmentOutcome::Fault,
        });
    }

    async fn process(&self, message: &RawMessage) -> Result<(), DispatchError> {
        let (envelope, record) = match domain::decode(&message.body) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.resolve_unprocessable(message).await;
                return Err(e.into());
            }
        };

        debug!(
            record_id = %record.id,
            envelope_message_id = %envelope.message_id,
            "decoded catalog record"
        );

        let delivery = Delivery {
            envelope,
            record,
            raw_body: message.body.clone(),
        };

        if let Err(e) = self.sink.persist(&delivery).await {
            if !e.is_transient() {
                self.resolve_unprocessable(message).await;
            }
            // Transient: leave the message unacknowledged; the visibility
            // timeout redelivers it.
            return Err(e.into());
        }

        self.acknowledge(message).await;
        Ok(())
    }

    async fn acknowledge(&self, message: &RawMessage) {
        if let Err(e) = self.poller.acknowledge(&message.receipt_handle).await {
            // The write already happened; the worst case is one duplicate
            // delivery that the idempotent sink absorbs.
            warn!(
                worker_id = %self.worker_id,
                message_id = %message.message_id,
                error = %e,
                "failed to delete processed message"
            );
        }
    }

    async fn resolve_unprocessable(&self, message: &RawMessage) {
        match self.config.malformed_policy {
            MalformedMessagePolicy::Acknowledge => {
                warn!(
                    worker_id = %self.worker_id,
                    message_id = %message.message_id,
                    "dropping unprocessable message"
                );
                self.acknowledge(message).await;
            }
            MalformedMessagePolicy::Leave => {
                warn!(
                    worker_id = %self.worker_id,
                    message_id = %message.message_id,
                    "leaving unprocessable message for redelivery"
                );
            }
        }
    }
}
