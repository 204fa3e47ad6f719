use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CreateResponse {
    pub id: i64,
    /// DDL statements executed before the insert, in execution order.
    pub ddl: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ReadResponse {
    pub records: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UpdateResponse {
    pub id: i64,
    pub ddl: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeleteResponse {
    pub id: i64,
}

/// Result of a generic `/v1/ops` call, tagged with the operation that produced it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperationResponse {
    Create(CreateResponse),
    Read(ReadResponse),
    Update(UpdateResponse),
    Delete(DeleteResponse),
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct SchemaDump {
    pub tables: Vec<TableDump>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TableDump {
    pub name: String,
    /// The `CREATE TABLE` statement as stored in the catalog.
    pub sql: String,
    pub columns: Vec<ColumnDump>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ColumnDump {
    pub name: String,
    pub storage_class: String,
    #[serde(default)]
    pub primary_key: bool,
}
