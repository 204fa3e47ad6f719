use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Read,
    Update,
    Delete,
}

/// One engine operation as the transport hands it over.
///
/// `fields` carries the record payload for create/update and the equality filters for read.
/// Blob values are encoded as `{"$blob": "<base64>"}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OperationRequest {
    pub op: OperationKind,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl OperationRequest {
    pub fn new(op: OperationKind, resource: impl Into<String>) -> Self {
        Self {
            op,
            resource: resource.into(),
            id: None,
            fields: Map::new(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}
