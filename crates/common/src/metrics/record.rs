use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Count,
    Milliseconds,
}

impl MetricUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricUnit::Count => "Count",
            MetricUnit::Milliseconds => "Milliseconds",
        }
    }
}

/// Dimensioned measurements for one unit of work.
///
/// One record exists per processed message and is flushed exactly once when
/// that message's handling finishes, success or not, so failed work stays
/// observable. Never shared across messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricRecord {
    dimensions: BTreeMap<String, String>,
    counters: Vec<(String, f64, MetricUnit)>,
    properties: BTreeMap<String, String>,
}

impl MetricRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_dimension(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.dimensions.insert(name.into(), value.into());
    }

    pub fn put_counter(&mut self, name: impl Into<String>, value: f64, unit: MetricUnit) {
        self.counters.push((name.into(), value, unit));
    }

    pub fn put_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn dimensions(&self) -> &BTreeMap<String, String> {
        &self.dimensions
    }

    pub fn counters(&self) -> &[(String, f64, MetricUnit)] {
        &self.counters
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Value of the first counter with the given name, if any.
    pub fn counter(&self, name: &str) -> Option<f64> {
        self.counters
            .iter()
            .find(|(counter_name, _, _)| counter_name == name)
            .map(|(_, value, _)| *value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_dimensions_counters_and_properties() {
        let mut record = MetricRecord::new();
        record.set_dimension("WorkerId", "record-worker/1");
        record.put_counter("ProcessedMessageCount", 1.0, MetricUnit::Count);
        record.put_counter("ProcessingTime", 12.5, MetricUnit::Milliseconds);
        record.put_property("TraceId", "1-abc-def");

        assert_eq!(
            record.dimensions().get("WorkerId").map(String::as_str),
            Some("record-worker/1")
        );
        assert_eq!(record.counter("ProcessedMessageCount"), Some(1.0));
        assert_eq!(record.counter("ProcessingTime"), Some(12.5));
        assert_eq!(record.counter("NoSuchCounter"), None);
        assert_eq!(
            record.properties().get("TraceId").map(String::as_str),
            Some("1-abc-def")
        );
    }

    #[test]
    fn later_dimension_values_overwrite_earlier_ones() {
        let mut record = MetricRecord::new();
        record.set_dimension("WorkerId", "a");
        record.set_dimension("WorkerId", "b");
        assert_eq!(record.dimensions().len(), 1);
        assert_eq!(record.dimensions().get("WorkerId").map(String::as_str), Some("b"));
    }
}
