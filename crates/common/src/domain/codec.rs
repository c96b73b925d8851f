use crate::domain::{CatalogRecord, NotificationEnvelope};
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CodecError {
    /// The outer notification envelope could not be parsed.
    #[error("malformed notification envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// The envelope parsed, but its inner payload is not a catalog record.
    #[error("malformed record payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),
}

/// Decode a raw queue message body into its envelope and inner record.
///
/// Pure function, no I/O. The body is expected to carry the two-layer
/// encoding produced by the publish side (see [`encode`]).
pub fn decode(raw_body: &str) -> Result<(NotificationEnvelope, CatalogRecord), CodecError> {
    let envelope: NotificationEnvelope =
        serde_json::from_str(raw_body).map_err(CodecError::MalformedEnvelope)?;
    let record: CatalogRecord =
        serde_json::from_str(&envelope.message).map_err(CodecError::MalformedPayload)?;
    Ok((envelope, record))
}

/// Publisher-side encoding of a record into a notification body.
///
/// The workers never publish; this pins down the paired contract the
/// upstream encoder follows, so `decode(encode(r)?)?.1 == r` for any
/// well-formed record.
pub fn encode(record: &CatalogRecord, topic_arn: &str) -> serde_json::Result<String> {
    let envelope = NotificationEnvelope {
        kind: "Notification".to_string(),
        message_id: Uuid::new_v4().to_string(),
        topic_arn: topic_arn.to_string(),
        message: serde_json::to_string(record)?,
        timestamp: Utc::now(),
        signature_version: None,
        signature: None,
        signing_cert_url: None,
        unsubscribe_url: None,
    };
    serde_json::to_string(&envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> CatalogRecord {
        CatalogRecord {
            id: "b1".to_string(),
            title: "Foo".to_string(),
            isbn: Some("978-0000000000".to_string()),
            authors: vec!["A".to_string(), "B".to_string()],
            cover_page: None,
        }
    }

    #[test]
    fn round_trips_encoded_records() {
        let record = sample_record();
        let body = encode(&record, "arn:aws:sns:us-east-1:123456789012:catalog").unwrap();

        let (envelope, decoded) = decode(&body).unwrap();
        assert_eq!(envelope.kind, "Notification");
        assert_eq!(decoded, record);
    }

    #[test]
    fn round_trips_the_full_envelope() {
        let record = sample_record();
        let body = encode(&record, "arn:aws:sns:us-east-1:123456789012:catalog").unwrap();

        let (envelope, _) = decode(&body).unwrap();
        let reencoded = serde_json::to_string(&envelope).unwrap();
        let (envelope_again, record_again) = decode(&reencoded).unwrap();
        assert_eq!(envelope_again, envelope);
        assert_eq!(record_again, record);
    }

    #[test]
    fn rejects_unparseable_bodies_as_malformed_envelope() {
        let err = decode("this is not json").unwrap_err();
        assert!(matches!(err, CodecError::MalformedEnvelope(_)));
    }

    #[test]
    fn rejects_non_record_payloads_as_malformed_payload() {
        let body = serde_json::json!({
            "Type": "Notification",
            "MessageId": "mid-1",
            "TopicArn": "arn:aws:sns:us-east-1:123456789012:catalog",
            "Message": "not a record",
            "Timestamp": "2024-05-01T12:00:00Z"
        })
        .to_string();

        let err = decode(&body).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPayload(_)));
    }

    #[test]
    fn decode_has_no_side_effects_on_failure() {
        // Same input, same error, twice — decode is pure.
        assert!(decode("{").is_err());
        assert!(decode("{").is_err());
    }
}
