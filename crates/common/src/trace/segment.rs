use crate::trace::{SegmentEmitter, TraceHeader};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;
use uuid::Uuid;

/// Outcome recorded on a segment when its unit of work closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    Success,
    Fault,
}

/// One span of trace work covering the handling of exactly one message,
/// excluding the poll wait.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceSegment {
    pub name: String,
    pub id: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub sampled: bool,
    pub start_time: f64,
    pub end_time: f64,
    pub fault: bool,
}

impl TraceSegment {
    /// A fresh unparented segment rooting a new trace.
    pub fn fresh(service_name: &str) -> Self {
        Self::open(service_name, new_trace_id(), None, true)
    }

    /// A segment adopting the trace identity propagated by the publisher.
    pub fn propagated(service_name: &str, header: TraceHeader) -> Self {
        Self::open(
            service_name,
            header.root_trace_id,
            header.parent_id,
            header.sampled,
        )
    }

    fn open(service_name: &str, trace_id: String, parent_id: Option<String>, sampled: bool) -> Self {
        Self {
            name: service_name.to_string(),
            id: new_segment_id(),
            trace_id,
            parent_id,
            sampled,
            start_time: epoch_seconds(),
            end_time: 0.0,
            fault: false,
        }
    }
}

/// Scoped acquisition of a trace segment.
///
/// Begun when message handling starts; closed and submitted exactly once on
/// every exit path. Dropping the guard without an explicit
/// [`end`](Self::end) — a panic or an early return in the unit of work —
/// submits it with a fault outcome, so no open segment is ever leaked.
pub struct ScopedSegment {
    segment: Option<TraceSegment>,
    started: Instant,
    emitter: Arc<dyn SegmentEmitter>,
}

impl ScopedSegment {
    /// Start a segment, adopting the propagated trace identity from
    /// `header_value` when it parses. Never fails: a missing or malformed
    /// header yields a fresh unparented trace.
    pub fn begin(
        service_name: &str,
        header_value: Option<&str>,
        emitter: Arc<dyn SegmentEmitter>,
    ) -> Self {
        let header = header_value.and_then(TraceHeader::parse);
        if header_value.is_some() && header.is_none() {
            debug!(
                service = service_name,
                "unparseable trace header, starting a fresh trace"
            );
        }

        let segment = match header {
            Some(header) => TraceSegment::propagated(service_name, header),
            None => TraceSegment::fresh(service_name),
        };

        Self {
            segment: Some(segment),
            started: Instant::now(),
            emitter,
        }
    }

    pub fn trace_id(&self) -> &str {
        self.segment
            .as_ref()
            .map(|segment| segment.trace_id.as_str())
            .unwrap_or_default()
    }

    /// Wall-clock duration of the handling so far.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Close the segment and submit it.
    pub fn end(mut self, outcome: SegmentOutcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: SegmentOutcome) {
        if let Some(mut segment) = self.segment.take() {
            segment.end_time = epoch_seconds();
            segment.fault = outcome == SegmentOutcome::Fault;
            self.emitter.emit(&segment);
        }
    }
}

impl Drop for ScopedSegment {
    fn drop(&mut self) {
        // Reaching drop with the segment still open means the unit of work
        // unwound without closing it.
        self.finish(SegmentOutcome::Fault);
    }
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn new_segment_id() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_string()
}

fn new_trace_id() -> String {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let entropy = Uuid::new_v4().simple().to_string();
    format!("1-{epoch:08x}-{}", &entropy[..24])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::MockSegmentEmitter;

    const HEADER: &str = "Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1";

    #[test]
    fn adopts_propagated_trace_identity() {
        let mut emitter = MockSegmentEmitter::new();
        emitter
            .expect_emit()
            .withf(|segment: &TraceSegment| {
                segment.trace_id == "1-5759e988-bd862e3fe1be46a994272793"
                    && segment.parent_id.as_deref() == Some("53995c3f42cd8ad8")
                    && segment.sampled
                    && !segment.fault
                    && segment.end_time >= segment.start_time
            })
            .times(1)
            .return_const(());

        let segment = ScopedSegment::begin("worker", Some(HEADER), Arc::new(emitter));
        assert_eq!(segment.trace_id(), "1-5759e988-bd862e3fe1be46a994272793");
        segment.end(SegmentOutcome::Success);
    }

    #[test]
    fn malformed_header_degrades_to_fresh_trace() {
        let mut emitter = MockSegmentEmitter::new();
        emitter
            .expect_emit()
            .withf(|segment: &TraceSegment| {
                segment.trace_id.starts_with("1-") && segment.parent_id.is_none()
            })
            .times(1)
            .return_const(());

        // Begin never raises, whatever the header looks like.
        let segment = ScopedSegment::begin("worker", Some("!!not a header!!"), Arc::new(emitter));
        segment.end(SegmentOutcome::Success);
    }

    #[test]
    fn missing_header_starts_fresh_trace() {
        let mut emitter = MockSegmentEmitter::new();
        emitter
            .expect_emit()
            .withf(|segment: &TraceSegment| segment.parent_id.is_none() && segment.sampled)
            .times(1)
            .return_const(());

        ScopedSegment::begin("worker", None, Arc::new(emitter)).end(SegmentOutcome::Success);
    }

    #[test]
    fn fault_outcome_marks_the_segment() {
        let mut emitter = MockSegmentEmitter::new();
        emitter
            .expect_emit()
            .withf(|segment: &TraceSegment| segment.fault)
            .times(1)
            .return_const(());

        ScopedSegment::begin("worker", Some(HEADER), Arc::new(emitter))
            .end(SegmentOutcome::Fault);
    }

    #[test]
    fn dropping_without_end_submits_a_fault() {
        let mut emitter = MockSegmentEmitter::new();
        emitter
            .expect_emit()
            .withf(|segment: &TraceSegment| segment.fault)
            .times(1)
            .return_const(());

        let segment = ScopedSegment::begin("worker", None, Arc::new(emitter));
        drop(segment);
    }

    #[test]
    fn end_submits_exactly_once() {
        let mut emitter = MockSegmentEmitter::new();
        emitter.expect_emit().times(1).return_const(());

        // end consumes the guard, so drop afterwards must not re-emit.
        ScopedSegment::begin("worker", None, Arc::new(emitter)).end(SegmentOutcome::Success);
    }

    #[test]
    fn unsampled_headers_are_still_submitted() {
        let mut emitter = MockSegmentEmitter::new();
        emitter
            .expect_emit()
            .withf(|segment: &TraceSegment| !segment.sampled)
            .times(1)
            .return_const(());

        ScopedSegment::begin("worker", Some("Root=1-abc-def;Sampled=0"), Arc::new(emitter))
            .end(SegmentOutcome::Success);
    }

    #[test]
    fn fresh_ids_have_the_expected_shape() {
        let segment = TraceSegment::fresh("worker");
        assert_eq!(segment.id.len(), 16);
        let parts: Vec<&str> = segment.trace_id.splitn(3, '-').collect();
        assert_eq!(parts[0], "1");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 24);
    }
}
