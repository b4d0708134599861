//! Airtable record shapes shared by the client, the store seam and the API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Field name to value mapping, in the order Airtable (or the caller) sent it
pub type Fields = Map<String, JsonValue>;

/// A row as returned by Airtable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(rename = "createdTime", default)]
    pub created_time: String,
    #[serde(default)]
    pub fields: Fields,
}

/// Payload for create/update/upsert; `id` targets an existing record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub fields: Fields,
}

impl WriteRecord {
    pub fn new(fields: Fields) -> Self {
        Self { id: None, fields }
    }

    pub fn with_id(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: Some(id.into()),
            fields,
        }
    }
}

/// Result of a delete call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedRecord {
    pub id: String,
    pub deleted: bool,
}

/// Parameters for listing records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// filterByFormula; `None` lists the whole table
    pub formula: Option<String>,
    /// Stop after this many records
    pub max_records: Option<usize>,
}

impl ListQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filtered(formula: Option<String>) -> Self {
        Self {
            formula,
            max_records: None,
        }
    }

    pub fn max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }
}
