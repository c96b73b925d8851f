use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport-level wrapper around a domain payload, as delivered by the
/// notification topic that fans out to the worker queues.
///
/// `message` is itself a serialized [`CatalogRecord`](crate::CatalogRecord);
/// the envelope is never persisted verbatim except as the archive worker's
/// audit copy. Signature metadata is carried through unvalidated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationEnvelope {
    #[serde(rename = "Type")]
    pub kind: String,
    pub message_id: String,
    pub topic_arn: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(rename = "SigningCertURL", default, skip_serializing_if = "Option::is_none")]
    pub signing_cert_url: Option<String>,
    #[serde(rename = "UnsubscribeURL", default, skip_serializing_if = "Option::is_none")]
    pub unsubscribe_url: Option<String>,
}
