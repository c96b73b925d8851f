use crate::dynamo::DynamoRecordSink;
use common::{
    MetricsBackend, QueueClient, QueuePoller, ReceiveOptions, SegmentEmitter, WorkerLoop,
    WorkerLoopConfig,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const SERVICE_NAME: &str = "record-worker";

pub struct RecordWorkerConfig {
    pub queue_url: String,
    pub receive: ReceiveOptions,
    pub loop_config: WorkerLoopConfig,
}

/// Consumes catalog record notifications and upserts them into the record
/// table.
pub struct RecordWorker {
    queue_client: Arc<dyn QueueClient>,
    sink: Arc<DynamoRecordSink>,
    segments: Arc<dyn SegmentEmitter>,
    metrics: Arc<dyn MetricsBackend>,
    config: RecordWorkerConfig,
}

impl RecordWorker {
    pub fn new(
        queue_client: Arc<dyn QueueClient>,
        sink: Arc<DynamoRecordSink>,
        segments: Arc<dyn SegmentEmitter>,
        metrics: Arc<dyn MetricsBackend>,
        config: RecordWorkerConfig,
    ) -> Self {
        debug!("initializing record worker module");
        Self {
            queue_client,
            sink,
            segments,
            metrics,
            config,
        }
    }

    #[allow(clippy::type_complexity)]
    pub fn into_runner_process(
        self,
    ) -> Box<
        dyn FnOnce(
                CancellationToken,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
            > + Send,
    > {
        Box::new({
            let poller = QueuePoller::new(self.queue_client, self.config.queue_url, self.config.receive);
            let worker_loop = WorkerLoop::new(
                poller,
                self.sink,
                self.segments,
                self.metrics,
                self.config.loop_config,
            );
            move |ctx| Box::pin(async move { worker_loop.run(ctx).await })
        })
    }
}
