mod config;

use archive_worker::{ArchiveWorker, ArchiveWorkerConfig, S3ObjectStore};
use catalog_runner::Runner;
use common::{
    init_telemetry, EmfMetricsSink, MetricsBackend, QueueClient, SegmentEmitter, SqsQueueClient,
    UdpSegmentEmitter,
};
use config::ServiceConfig;
use record_worker::{DynamoRecordSink, RecordWorker, RecordWorkerConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&config.log_level) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!(
        record_queue_url = %config.record_queue_url,
        archive_queue_url = %config.archive_queue_url,
        "starting catalog workers"
    );
    debug!("Configuration: {:?}", config);

    if let Err(e) = run(config).await {
        error!(error = format!("{e:#}"), "catalog workers exited with error");
        std::process::exit(1);
    }

    info!("catalog workers exited normally");
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let endpoint = config.aws_endpoint_url.as_deref();

    let queue_client: Arc<dyn QueueClient> = Arc::new(SqsQueueClient::new(&sdk_config, endpoint));
    let segments: Arc<dyn SegmentEmitter> =
        Arc::new(UdpSegmentEmitter::new(&config.trace_daemon_addr)?);
    let metrics: Arc<dyn MetricsBackend> = Arc::new(EmfMetricsSink::new(&config.metrics_namespace));

    let record_sink = Arc::new(DynamoRecordSink::new(
        &sdk_config,
        endpoint,
        config.catalog_table_name.clone(),
    ));
    let record_worker = RecordWorker::new(
        Arc::clone(&queue_client),
        record_sink,
        Arc::clone(&segments),
        Arc::clone(&metrics),
        RecordWorkerConfig {
            queue_url: config.record_queue_url.clone(),
            receive: config.receive_options(),
            loop_config: config.loop_config(record_worker::SERVICE_NAME)?,
        },
    );

    let object_store = Arc::new(S3ObjectStore::new(
        &sdk_config,
        endpoint,
        config.archive_bucket_name.clone(),
    ));
    let archive_worker = ArchiveWorker::new(
        Arc::clone(&queue_client),
        object_store,
        Arc::clone(&segments),
        Arc::clone(&metrics),
        ArchiveWorkerConfig {
            queue_url: config.archive_queue_url.clone(),
            receive: config.receive_options(),
            loop_config: config.loop_config(archive_worker::SERVICE_NAME)?,
        },
    );

    let drain_timeout = Duration::from_secs(config.drain_timeout_secs);
    let metrics_for_close = Arc::clone(&metrics);

    Runner::new()
        .with_named_process("record_worker", record_worker.into_runner_process())
        .with_named_process("archive_worker", archive_worker.into_runner_process())
        .with_closer(move || async move {
            info!("flushing remaining metrics");
            metrics_for_close.drain(drain_timeout).await?;
            Ok(())
        })
        .with_closer_timeout(drain_timeout + Duration::from_secs(5))
        .run()
        .await
}
