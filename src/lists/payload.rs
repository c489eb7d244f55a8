use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};

use crate::error::{internal_error, invalid_argument, SharePointResult};

/// OData type discriminators understood by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityType {
    ListItem,
    List,
    Field,
    Folder,
    EmailProperties,
    /// Any other type name, e.g. a list specific `SP.Data.TasksListItem`.
    Custom(String),
}

impl EntityType {
    pub fn as_str(&self) -> &str {
        match self {
            EntityType::ListItem => "SP.ListItem",
            EntityType::List => "SP.List",
            EntityType::Field => "SP.Field",
            EntityType::Folder => "SP.Folder",
            EntityType::EmailProperties => "SP.Utilities.EmailProperties",
            EntityType::Custom(name) => name.as_str(),
        }
    }
}

/// Body of a write request: a set of fields plus the discriminator that is
/// attached as `__metadata.type` unless the fields already carry
/// `__metadata`.
///
/// Building the body never mutates the payload; [`EntityPayload::to_body`]
/// can be called any number of times.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityPayload {
    entity_type: EntityType,
    fields: Map<String, JsonValue>,
}

impl EntityPayload {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            fields: Map::new(),
        }
    }

    pub fn list_item() -> Self {
        Self::new(EntityType::ListItem)
    }

    /// Wraps a JSON object. Anything other than an object is rejected.
    pub fn from_value(entity_type: EntityType, value: JsonValue) -> SharePointResult<Self> {
        match value {
            JsonValue::Object(fields) => Ok(Self {
                entity_type,
                fields,
            }),
            other => Err(invalid_argument(format!(
                "Entity payload must be a JSON object, got {other}"
            ))),
        }
    }

    /// Serializes `value` (a struct or map) into the payload fields.
    pub fn from_serializable<T: Serialize>(
        entity_type: EntityType,
        value: &T,
    ) -> SharePointResult<Self> {
        let value = serde_json::to_value(value)
            .map_err(|err| internal_error(format!("Failed to serialize entity payload: {err}")))?;
        Self::from_value(entity_type, value)
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn fields(&self) -> &Map<String, JsonValue> {
        &self.fields
    }

    pub fn to_body(&self) -> JsonValue {
        let mut body = self.fields.clone();
        if !body.contains_key("__metadata") {
            body.insert(
                "__metadata".to_string(),
                json!({ "type": self.entity_type.as_str() }),
            );
        }
        JsonValue::Object(body)
    }
}
