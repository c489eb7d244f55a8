use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::error::{internal_error, SharePointResult};

/// One row of a list as returned by the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct ListItem {
    fields: Map<String, JsonValue>,
}

impl ListItem {
    pub fn from_value(value: JsonValue) -> SharePointResult<Self> {
        match value {
            JsonValue::Object(fields) => Ok(Self { fields }),
            other => Err(internal_error(format!("List item is not a JSON object: {other}"))),
        }
    }

    /// Item identifier, read from `Id` or its alias `ID`.
    pub fn id(&self) -> Option<u64> {
        self.fields
            .get("Id")
            .or_else(|| self.fields.get("ID"))
            .and_then(JsonValue::as_u64)
    }

    pub fn title(&self) -> Option<&str> {
        self.get_str("Title")
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(JsonValue::as_str)
    }

    pub fn etag(&self) -> Option<&str> {
        self.metadata("etag")
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.metadata("type")
    }

    fn metadata(&self, key: &str) -> Option<&str> {
        self.fields
            .get("__metadata")
            .and_then(|metadata| metadata.get(key))
            .and_then(JsonValue::as_str)
    }

    pub fn fields(&self) -> &Map<String, JsonValue> {
        &self.fields
    }

    pub fn into_value(self) -> JsonValue {
        JsonValue::Object(self.fields)
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> SharePointResult<T> {
        serde_json::from_value(JsonValue::Object(self.fields.clone()))
            .map_err(|err| internal_error(format!("Failed to decode list item: {err}")))
    }
}
