//! Core data models for the RNC dataset.
//!
//! [`RawRecord`] is what the parser reads out of one dataset row.
//! [`IndexedRecord`] is the servable shape returned by lookups, both on the
//! CLI and over HTTP.

use serde::{Deserialize, Serialize};

/// Literal fields of one dataset row, trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub rnc: String,
    pub legal_name: String,
    pub commercial_name: String,
    pub status: String,
}

/// Normalized record held by a [`Snapshot`](crate::index::Snapshot).
///
/// The JSON field names are fixed for existing consumers:
///
/// ```json
/// { "rnc": "132138279", "socialName": "ACME SRL", "comercialName": "ACME SRL", "status": "ACTIVO" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedRecord {
    pub rnc: String,
    pub social_name: String,
    pub comercial_name: String,
    pub status: String,
}

impl From<RawRecord> for IndexedRecord {
    /// The dataset's commercial name column is not tracked distinctly;
    /// `comercialName` always carries the legal name.
    fn from(raw: RawRecord) -> Self {
        Self {
            comercial_name: raw.legal_name.clone(),
            social_name: raw.legal_name,
            rnc: raw.rnc,
            status: raw.status,
        }
    }
}

/// JSON error envelope: `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawRecord {
        RawRecord {
            rnc: "132138279".to_string(),
            legal_name: "ACME SRL".to_string(),
            commercial_name: "ACME TIENDA".to_string(),
            status: "ACTIVO".to_string(),
        }
    }

    #[test]
    fn comercial_name_mirrors_legal_name() {
        let rec = IndexedRecord::from(raw());
        assert_eq!(rec.comercial_name, rec.social_name);
        assert_eq!(rec.comercial_name, "ACME SRL");
    }

    #[test]
    fn serializes_with_served_field_names() {
        let rec = IndexedRecord::from(raw());
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "rnc": "132138279",
                "socialName": "ACME SRL",
                "comercialName": "ACME SRL",
                "status": "ACTIVO"
            })
        );
    }

    #[test]
    fn error_body_shape() {
        let json = serde_json::to_string(&ErrorBody::new("This RNC does not exist")).unwrap();
        assert_eq!(json, r#"{"error":"This RNC does not exist"}"#);
    }
}
