use crate::metrics::MetricRecord;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum FlushError {
    #[error("metrics channel closed")]
    ChannelClosed,

    #[error("metrics drain timed out after {0:?}")]
    DrainTimeout(Duration),
}

/// Trait for the metrics backend: one flush per unit of work.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Hand off one finished record. Fire-and-forget from the caller's view;
    /// losing a record never fails the message that produced it.
    fn flush(&self, record: MetricRecord) -> Result<(), FlushError>;

    /// Block until every record handed off so far has been written, bounded
    /// by `timeout`. Called on shutdown before the process exits.
    async fn drain(&self, timeout: Duration) -> Result<(), FlushError>;
}

enum Command {
    Record(MetricRecord),
    Sync(oneshot::Sender<()>),
}

/// Metrics backend writing embedded-metric-format JSON documents, one line
/// per unit of work, on a background task.
///
/// The metrics agent scrapes these documents from the log stream, so the
/// default writer is stdout.
pub struct EmfMetricsSink {
    tx: mpsc::UnboundedSender<Command>,
}

impl EmfMetricsSink {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self::with_writer(namespace, tokio::io::stdout())
    }

    /// Write documents to an arbitrary sink instead of stdout (tests).
    pub fn with_writer<W>(namespace: impl Into<String>, mut writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let namespace = namespace.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Record(record) => {
                        let mut line = emf_document(&namespace, &record).to_string();
                        line.push('\n');
                        if let Err(e) = writer.write_all(line.as_bytes()).await {
                            error!(error = %e, "failed to write metric record");
                        }
                    }
                    Command::Sync(done) => {
                        if let Err(e) = writer.flush().await {
                            error!(error = %e, "failed to flush metric writer");
                        }
                        // The drain caller may have timed out already.
                        let _ = done.send(());
                    }
                }
            }
        });

        Self { tx }
    }
}

#[async_trait]
impl MetricsBackend for EmfMetricsSink {
    fn flush(&self, record: MetricRecord) -> Result<(), FlushError> {
        self.tx
            .send(Command::Record(record))
            .map_err(|_| FlushError::ChannelClosed)
    }

    async fn drain(&self, timeout: Duration) -> Result<(), FlushError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Command::Sync(done_tx))
            .map_err(|_| FlushError::ChannelClosed)?;

        match tokio::time::timeout(timeout, done_rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(FlushError::ChannelClosed),
            Err(_) => {
                warn!(?timeout, "metrics drain timed out");
                Err(FlushError::DrainTimeout(timeout))
            }
        }
    }
}

/// Serialize one record as an embedded-metric-format document: metric
/// definitions under `_aws`, dimension/counter/property values at the root.
fn emf_document(namespace: &str, record: &MetricRecord) -> Value {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let dimension_names: Vec<&String> = record.dimensions().keys().collect();
    let metrics: Vec<Value> = record
        .counters()
        .iter()
        .map(|(name, _, unit)| json!({ "Name": name, "Unit": unit.as_str() }))
        .collect();

    let mut root = serde_json::Map::new();
    root.insert(
        "_aws".to_string(),
        json!({
            "Timestamp": timestamp,
            "CloudWatchMetrics": [{
                "Namespace": namespace,
                "Dimensions": [dimension_names],
                "Metrics": metrics,
            }],
        }),
    );
    for (name, value) in record.dimensions() {
        root.insert(name.clone(), json!(value));
    }
    for (name, value, _) in record.counters() {
        root.insert(name.clone(), json!(value));
    }
    for (name, value) in record.properties() {
        root.insert(name.clone(), json!(value));
    }

    Value::Object(root)
}
