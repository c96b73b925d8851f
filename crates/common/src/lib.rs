mod domain;
mod metrics;
mod queue;
mod sink;
mod telemetry;
mod trace;
mod worker;

pub use domain::*;
pub use metrics::*;
pub use queue::*;
pub use sink::*;
pub use telemetry::*;
pub use trace::*;
pub use worker::*;

// Re-export mocks when the testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use metrics::MockMetricsBackend;
#[cfg(any(test, feature = "testing"))]
pub use queue::MockQueueClient;
#[cfg(any(test, feature = "testing"))]
pub use sink::MockPersistenceSink;
#[cfg(any(test, feature = "testing"))]
pub use trace::MockSegmentEmitter;
