use crate::engine::{CreateOutcome, Record, TableDescription, UpdateOutcome};
use crate::error::SchemaGenError;
use crate::schema::value::{fields_from_json, fields_to_json};
use crate::schema::{FieldMap, FieldValue, KEY_COLUMN};
use crate::server::router::SchemaGenState;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use schemagen_schema::{
    ColumnDump, CreateResponse, DeleteResponse, OperationKind, OperationRequest,
    OperationResponse, ReadResponse, SchemaDump, TableDump, UpdateResponse,
};
use serde_json::{Map, Value};
use tracing::debug;

impl From<CreateOutcome> for CreateResponse {
    fn from(out: CreateOutcome) -> Self {
        Self {
            id: out.id,
            ddl: out.ddl,
        }
    }
}

impl From<UpdateOutcome> for UpdateResponse {
    fn from(out: UpdateOutcome) -> Self {
        Self {
            id: out.id,
            ddl: out.ddl,
        }
    }
}

fn read_response(records: Vec<Record>) -> ReadResponse {
    ReadResponse {
        records: records.iter().map(fields_to_json).collect(),
    }
}

fn table_dump(table: TableDescription) -> TableDump {
    let columns = table
        .schema
        .columns()
        .iter()
        .map(|c| ColumnDump {
            name: c.name.clone(),
            storage_class: c.class.to_string(),
            primary_key: c.primary_key,
        })
        .collect();
    TableDump {
        name: table.name,
        sql: table.sql,
        columns,
    }
}

fn require_id(op: &str, id: Option<i64>) -> Result<i64, SchemaGenError> {
    id.ok_or_else(|| SchemaGenError::UnsupportedValue {
        field: KEY_COLUMN.to_string(),
        reason: format!("{op} requires a record id"),
    })
}

pub(super) async fn ping() -> &'static str {
    "Pong!"
}

pub(super) async fn run_operation(
    State(state): State<SchemaGenState>,
    Json(req): Json<OperationRequest>,
) -> Result<Json<OperationResponse>, SchemaGenError> {
    debug!(op = ?req.op, resource = %req.resource, id = ?req.id, "Incoming operation");

    let mut fields = fields_from_json(&req.fields)?;
    let resp = match req.op {
        OperationKind::Create => {
            OperationResponse::Create(state.engine.create(req.resource, fields).await?.into())
        }
        OperationKind::Read => {
            if let Some(id) = req.id {
                fields.insert(KEY_COLUMN.to_string(), FieldValue::Integer(id));
            }
            OperationResponse::Read(read_response(
                state.engine.read(req.resource, fields).await?,
            ))
        }
        OperationKind::Update => {
            let id = require_id("update", req.id)?;
            OperationResponse::Update(state.engine.update(req.resource, id, fields).await?.into())
        }
        OperationKind::Delete => {
            let id = require_id("delete", req.id)?;
            let id = state.engine.delete(req.resource, id).await?;
            OperationResponse::Delete(DeleteResponse { id })
        }
    };
    Ok(Json(resp))
}

pub(super) async fn create_record(
    State(state): State<SchemaGenState>,
    Path(resource): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<CreateResponse>), SchemaGenError> {
    let fields = fields_from_json(&body)?;
    let out = state.engine.create(resource, fields).await?;
    Ok((StatusCode::CREATED, Json(out.into())))
}

/// Query parameters become equality filters; values arrive as text and the column's
/// affinity converts them for comparison.
pub(super) async fn list_records(
    State(state): State<SchemaGenState>,
    Path(resource): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<ReadResponse>, SchemaGenError> {
    let filters: FieldMap = params
        .into_iter()
        .map(|(name, value)| (name, FieldValue::Text(value)))
        .collect();
    let records = state.engine.read(resource, filters).await?;
    Ok(Json(read_response(records)))
}

pub(super) async fn get_record(
    State(state): State<SchemaGenState>,
    Path((resource, id)): Path<(String, i64)>,
) -> Result<Json<Map<String, Value>>, SchemaGenError> {
    let mut filters = FieldMap::new();
    filters.insert(KEY_COLUMN.to_string(), FieldValue::Integer(id));

    let record = state
        .engine
        .read(resource.as_str(), filters)
        .await?
        .into_iter()
        .next()
        .ok_or(SchemaGenError::RecordNotFound { resource, id })?;
    Ok(Json(fields_to_json(&record)))
}

pub(super) async fn update_record(
    State(state): State<SchemaGenState>,
    Path((resource, id)): Path<(String, i64)>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<UpdateResponse>, SchemaGenError> {
    let fields = fields_from_json(&body)?;
    let out = state.engine.update(resource, id, fields).await?;
    Ok(Json(out.into()))
}

pub(super) async fn delete_record(
    State(state): State<SchemaGenState>,
    Path((resource, id)): Path<(String, i64)>,
) -> Result<Json<DeleteResponse>, SchemaGenError> {
    let id = state.engine.delete(resource, id).await?;
    Ok(Json(DeleteResponse { id }))
}

pub(super) async fn describe_schema(
    State(state): State<SchemaGenState>,
) -> Result<Json<SchemaDump>, SchemaGenError> {
    let tables = state.engine.describe().await?;
    Ok(Json(SchemaDump {
        tables: tables.into_iter().map(table_dump).collect(),
    }))
}
