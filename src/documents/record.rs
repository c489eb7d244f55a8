use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{internal_error, SharePointResult};
use crate::identity::PrincipalIdentity;
use crate::lists::ListItem;

/// Column holding the principal key.
pub const TITLE_FIELD: &str = "Title";
/// Multi-line text column holding the serialized payload.
pub const JSON_FIELD: &str = "JSON";

/// The row backing one principal's document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentRecord {
    pub id: u64,
    pub principal: PrincipalIdentity,
    /// Payload exactly as stored in the `JSON` column.
    pub json: String,
}

impl DocumentRecord {
    pub(crate) fn from_item(item: &ListItem, principal: &PrincipalIdentity) -> SharePointResult<Self> {
        let id = item
            .id()
            .ok_or_else(|| internal_error("Document row has no identifier"))?;
        let json = match item.get(JSON_FIELD) {
            Some(JsonValue::String(json)) => json.clone(),
            None | Some(JsonValue::Null) => String::new(),
            Some(other) => {
                return Err(internal_error(format!(
                    "Document row {id} has a non-text {JSON_FIELD} column: {other}"
                )))
            }
        };
        Ok(Self {
            id,
            principal: principal.clone(),
            json,
        })
    }

    /// Parses the stored payload. An empty column reads as `null`.
    pub fn parse(&self) -> SharePointResult<JsonValue> {
        if self.json.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        serde_json::from_str(&self.json).map_err(|err| {
            internal_error(format!(
                "Document row {} does not hold valid JSON: {err}",
                self.id
            ))
        })
    }
}

/// A principal's document as returned by a read.
#[derive(Clone, Debug, PartialEq)]
pub struct JsonDocument {
    pub id: u64,
    pub principal: PrincipalIdentity,
    pub value: JsonValue,
}

impl JsonDocument {
    pub fn deserialize<T: DeserializeOwned>(&self) -> SharePointResult<T> {
        serde_json::from_value(self.value.clone())
            .map_err(|err| internal_error(format!("Failed to decode document {}: {err}", self.id)))
    }
}

impl TryFrom<DocumentRecord> for JsonDocument {
    type Error = crate::error::SharePointError;

    fn try_from(record: DocumentRecord) -> SharePointResult<Self> {
        let value = record.parse()?;
        Ok(Self {
            id: record.id,
            principal: record.principal,
            value,
        })
    }
}
