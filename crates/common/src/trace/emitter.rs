use crate::trace::TraceSegment;
use anyhow::Context;
use tracing::{debug, warn};

/// Submit one closed segment to the tracing backend.
///
/// Submission is fire-and-forget: the pipeline never fails a message over
/// telemetry loss, so implementations log instead of returning errors.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait SegmentEmitter: Send + Sync {
    fn emit(&self, segment: &TraceSegment);
}

/// Header line the trace daemon expects in front of every segment document.
const DAEMON_HEADER: &str = r#"{"format": "json", "version": 1}"#;

/// Emits segment documents to the local trace daemon over UDP, one datagram
/// per segment.
pub struct UdpSegmentEmitter {
    socket: std::net::UdpSocket,
    daemon_addr: String,
}

impl UdpSegmentEmitter {
    /// `daemon_addr` is the sidecar's UDP endpoint, e.g. `127.0.0.1:2000`.
    pub fn new(daemon_addr: impl Into<String>) -> anyhow::Result<Self> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0")
            .context("failed to bind trace emitter socket")?;
        socket
            .set_nonblocking(true)
            .context("failed to configure trace emitter socket")?;

        Ok(Self {
            socket,
            daemon_addr: daemon_addr.into(),
        })
    }
}

impl SegmentEmitter for UdpSegmentEmitter {
    fn emit(&self, segment: &TraceSegment) {
        let document = match serde_json::to_string(segment) {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "failed to serialize trace segment");
                return;
            }
        };

        let datagram = format!("{DAEMON_HEADER}\n{document}");
        match self
            .socket
            .send_to(datagram.as_bytes(), self.daemon_addr.as_str())
        {
            Ok(_) => debug!(trace_id = %segment.trace_id, "trace segment sent"),
            Err(e) => {
                warn!(error = %e, daemon = %self.daemon_addr, "failed to send trace segment");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{ScopedSegment, SegmentOutcome};
    use std::sync::Arc;

    #[tokio::test]
    async fn sends_one_datagram_per_segment() {
        let receiver = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        let daemon_addr = receiver.local_addr().unwrap().to_string();

        let emitter = Arc::new(UdpSegmentEmitter::new(daemon_addr).unwrap());
        let segment = ScopedSegment::begin("test-service", None, emitter);
        segment.end(SegmentOutcome::Success);

        let mut buf = [0u8; 8192];
        let len = receiver.recv(&mut buf).unwrap();
        let datagram = std::str::from_utf8(&buf[..len]).unwrap();

        let (header, document) = datagram.split_once('\n').unwrap();
        assert_eq!(header, DAEMON_HEADER);

        let parsed: serde_json::Value = serde_json::from_str(document).unwrap();
        assert_eq!(parsed["name"], "test-service");
        assert!(parsed["trace_id"].as_str().unwrap().starts_with("1-"));
    }

    #[test]
    fn survives_an_unreachable_daemon() {
        // Port 9 is discard; nothing listens on it in the test environment.
        // Emit must not panic or error out.
        let emitter = UdpSegmentEmitter::new("127.0.0.1:9").unwrap();
        let segment = TraceSegment::fresh("test-service");
        emitter.emit(&segment);
    }
}
