use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single catalog record as published by the upstream catalog API.
///
/// The `id` is the idempotency key for every durable write: replaying the
/// same message overwrites the same logical record instead of inserting a
/// duplicate. When the publisher omits it, one is generated during decode.
///
/// Field names follow the publisher's PascalCase JSON schema, versioned
/// informally by field presence: everything except `Title` is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogRecord {
    #[serde(default = "generated_record_id")]
    pub id: String,
    pub title: String,
    #[serde(rename = "ISBN", default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(rename = "Authors", default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_page: Option<String>,
}

fn generated_record_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_full_record() {
        let json = r#"{
            "Id": "b1",
            "Title": "Foo",
            "ISBN": "978-0000000000",
            "Authors": ["A", "B"],
            "CoverPage": "covers/b1.png"
        }"#;

        let record: CatalogRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "b1");
        assert_eq!(record.title, "Foo");
        assert_eq!(record.isbn.as_deref(), Some("978-0000000000"));
        assert_eq!(record.authors, vec!["A", "B"]);
        assert_eq!(record.cover_page.as_deref(), Some("covers/b1.png"));
    }

    #[test]
    fn generates_id_when_absent() {
        let record: CatalogRecord = serde_json::from_str(r#"{"Title": "No Id"}"#).unwrap();
        assert!(!record.id.is_empty());
        assert!(Uuid::parse_str(&record.id).is_ok());
    }

    #[test]
    fn serializes_pascal_case_field_names() {
        let record = CatalogRecord {
            id: "b1".to_string(),
            title: "Foo".to_string(),
            isbn: Some("isbn-1".to_string()),
            authors: vec!["A".to_string()],
            cover_page: None,
        };

        let value: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["Id"], "b1");
        assert_eq!(value["Title"], "Foo");
        assert_eq!(value["ISBN"], "isbn-1");
        assert_eq!(value["Authors"][0], "A");
        assert!(value.get("CoverPage").is_none());
    }
}
