use crate::s3::{ObjectStore, S3ArchiveSink};
use common::{
    MetricsBackend, QueueClient, QueuePoller, ReceiveOptions, SegmentEmitter, WorkerLoop,
    WorkerLoopConfig,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const SERVICE_NAME: &str = "archive-worker";

pub struct ArchiveWorkerConfig {
    pub queue_url: String,
    pub receive: ReceiveOptions,
    pub loop_config: WorkerLoopConfig,
}

/// Consumes catalog record notifications and archives each delivery as a
/// pair of JSON documents in the object store.
pub struct ArchiveWorker {
    queue_client: Arc<dyn QueueClient>,
    store: Arc<dyn ObjectStore>,
    segments: Arc<dyn SegmentEmitter>,
    metrics: Arc<dyn MetricsBackend>,
    config: ArchiveWorkerConfig,
}

impl ArchiveWorker {
    pub fn new(
        queue_client: Arc<dyn QueueClient>,
        store: Arc<dyn ObjectStore>,
        segments: Arc<dyn SegmentEmitter>,
        metrics: Arc<dyn MetricsBackend>,
        config: ArchiveWorkerConfig,
    ) -> Self {
        debug!("initializing archive worker module");
        Self {
            queue_client,
            store,
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
            let sink = Arc::new(S3ArchiveSink::new(self.store));
            let worker_loop = WorkerLoop::new(
                poller,
                sink,
                self.segments,
                self.metrics,
                self.config.loop_config,
            );
            move |ctx| Box::pin(async move { worker_loop.run(ctx).await })
        })
    }
}
