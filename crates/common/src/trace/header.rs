/// Propagated trace header as stamped on the queue message by the upstream
/// publisher: `Root=<trace id>;Parent=<segment id>;Sampled=<0|1>`.
///
/// Parsing is deliberately soft. Tracing is observability, not correctness:
/// a missing or mangled header degrades to a fresh unparented trace instead
/// of failing the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceHeader {
    pub root_trace_id: String,
    pub parent_id: Option<String>,
    pub sampled: bool,
}

impl TraceHeader {
    pub fn parse(value: &str) -> Option<Self> {
        let mut root = None;
        let mut parent = None;
        let mut sampled = true;

        for part in value.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, val) = part.split_once('=')?;
            match key.trim() {
                "Root" => root = Some(val.trim().to_string()),
                "Parent" => parent = Some(val.trim().to_string()),
                "Sampled" => sampled = val.trim() != "0",
                // Unknown fields are carried by newer publishers; ignore.
                _ => {}
            }
        }

        let root = root.filter(|r| !r.is_empty())?;
        Some(Self {
            root_trace_id: root,
            parent_id: parent.filter(|p| !p.is_empty()),
            sampled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_header() {
        let header = TraceHeader::parse(
            "Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1",
        )
        .unwrap();

        assert_eq!(header.root_trace_id, "1-5759e988-bd862e3fe1be46a994272793");
        assert_eq!(header.parent_id.as_deref(), Some("53995c3f42cd8ad8"));
        assert!(header.sampled);
    }

    #[test]
    fn parses_unsampled_root_only_header() {
        let header = TraceHeader::parse("Root=1-abc-def;Sampled=0").unwrap();
        assert_eq!(header.root_trace_id, "1-abc-def");
        assert!(header.parent_id.is_none());
        assert!(!header.sampled);
    }

    #[test]
    fn ignores_unknown_fields() {
        let header = TraceHeader::parse("Root=1-abc-def;Lineage=1:abc:0").unwrap();
        assert_eq!(header.root_trace_id, "1-abc-def");
    }

    #[test]
    fn rejects_headers_without_a_root() {
        assert!(TraceHeader::parse("Parent=53995c3f42cd8ad8;Sampled=1").is_none());
        assert!(TraceHeader::parse("Root=;Sampled=1").is_none());
    }

    #[test]
    fn rejects_garbage() {
        assert!(TraceHeader::parse("no separators here").is_none());
        assert!(TraceHeader::parse("").is_none());
    }
}
