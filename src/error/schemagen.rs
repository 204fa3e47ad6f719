use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error as ThisError;

use super::IsRetryable;

/// SQLite primary result codes that mean the store itself cannot serve the request.
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;
const SQLITE_READONLY: i64 = 8;
const SQLITE_IOERR: i64 = 10;
const SQLITE_CORRUPT: i64 = 11;
const SQLITE_FULL: i64 = 13;
const SQLITE_CANTOPEN: i64 = 14;
const SQLITE_NOTADB: i64 = 26;

#[derive(Debug, ThisError)]
pub enum SchemaGenError {
    #[error("Invalid identifier {name:?}: {reason}")]
    InvalidIdentifier { name: String, reason: &'static str },

    #[error("Unsupported value for field {field:?}: {reason}")]
    UnsupportedValue { field: String, reason: String },

    #[error("Record {id} not found in {resource}")]
    RecordNotFound { resource: String, id: i64 },

    /// A concurrent writer created the same table or column first.
    #[error("Schema conflict: {0}")]
    SchemaConflict(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

enum SqlxErrorKind {
    DuplicateObject,
    Unavailable,
    Other,
}

fn classify(err: &sqlx::Error) -> SqlxErrorKind {
    match err {
        sqlx::Error::Database(db) => {
            let message = db.message();
            if message.contains("already exists") || message.contains("duplicate column name") {
                return SqlxErrorKind::DuplicateObject;
            }
            let primary = db
                .code()
                .and_then(|code| code.parse::<i64>().ok())
                .map(|code| code & 0xff);
            match primary {
                Some(
                    SQLITE_BUSY | SQLITE_LOCKED | SQLITE_READONLY | SQLITE_IOERR | SQLITE_CORRUPT
                    | SQLITE_FULL | SQLITE_CANTOPEN | SQLITE_NOTADB,
                ) => SqlxErrorKind::Unavailable,
                _ => SqlxErrorKind::Other,
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => SqlxErrorKind::Unavailable,
        _ => SqlxErrorKind::Other,
    }
}

impl From<sqlx::Error> for SchemaGenError {
    fn from(err: sqlx::Error) -> Self {
        match classify(&err) {
            SqlxErrorKind::DuplicateObject => SchemaGenError::SchemaConflict(err.to_string()),
            SqlxErrorKind::Unavailable => SchemaGenError::StoreUnavailable(err.to_string()),
            SqlxErrorKind::Other => SchemaGenError::DatabaseError(err),
        }
    }
}

impl IntoResponse for SchemaGenError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            SchemaGenError::InvalidIdentifier { name, reason } => (
                StatusCode::BAD_REQUEST,
                ApiErrorObject {
                    code: "INVALID_IDENTIFIER".to_string(),
                    message: format!("Identifier {name:?} is not allowed: {reason}."),
                    details: Some(json!({ "name": name })),
                },
            ),

            SchemaGenError::UnsupportedValue { field, reason } => (
                StatusCode::BAD_REQUEST,
                ApiErrorObject {
                    code: "UNSUPPORTED_VALUE".to_string(),
                    message: format!("Field {field:?} has an unsupported value: {reason}."),
                    details: Some(json!({ "field": field })),
                },
            ),

            SchemaGenError::RecordNotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                ApiErrorObject {
                    code: "RECORD_NOT_FOUND".to_string(),
                    message: format!("No record {id} in {resource}."),
                    details: Some(json!({ "resource": resource, "id": id })),
                },
            ),

            SchemaGenError::SchemaConflict(_) => (
                StatusCode::CONFLICT,
                ApiErrorObject {
                    code: "SCHEMA_CONFLICT".to_string(),
                    message: "Concurrent schema change; retry the request.".to_string(),
                    details: None,
                },
            ),

            SchemaGenError::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiErrorObject {
                    code: "STORE_UNAVAILABLE".to_string(),
                    message: "The store is not available.".to_string(),
                    details: None,
                },
            ),

            SchemaGenError::DatabaseError(_)
            | SchemaGenError::RactorError(_)
            | SchemaGenError::UnexpectedError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorObject {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                    details: None,
                },
            ),
        };
        (status, Json(ApiErrorBody { inner: error_body })).into_response()
    }
}

/// Standardized API error response payload.
#[derive(Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}

impl IsRetryable for SchemaGenError {
    fn is_retryable(&self) -> bool {
        matches!(self, SchemaGenError::SchemaConflict(_))
    }
}
