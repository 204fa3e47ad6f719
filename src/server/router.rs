use crate::engine::EngineHandle;
use crate::server::routes;

use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use rand::Rng;
use std::time::Instant;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{error, info, warn};

const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const RESOURCES_PREFIX: &str = "/v1/resources/";

/// 64 random bits as 16 lowercase hex digits.
fn generate_request_id() -> String {
    format!("{:016x}", rand::rng().random::<u64>())
}

/// Resource named by a `/v1/resources/{resource}[/{id}]` path.
fn resource_of(path: &str) -> Option<&str> {
    path.strip_prefix(RESOURCES_PREFIX)?
        .split('/')
        .next()
        .filter(|name| !name.is_empty())
}

#[derive(Clone)]
pub struct SchemaGenState {
    pub engine: EngineHandle,
}

impl SchemaGenState {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let version = req.version();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let start = Instant::now();
    let mut resp = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status().as_u16();
    let latency_ms = start.elapsed().as_millis() as u64;
    let resource = resource_of(&path).unwrap_or("-");

    macro_rules! request_event {
        ($level:ident) => {
            $level!(
                status,
                request_id = %request_id,
                method = %method,
                ?version,
                path = %path,
                resource,
                latency_ms,
                "request handled"
            )
        };
    }
    if resp.status().is_server_error() {
        request_event!(error);
    } else if resp.status().is_client_error() {
        request_event!(warn);
    } else {
        request_event!(info);
    }

    resp
}

pub fn schemagen_router(state: SchemaGenState) -> Router {
    let resources = Router::new()
        .route(
            "/v1/resources/{resource}",
            post(routes::create_record).get(routes::list_records),
        )
        .route(
            "/v1/resources/{resource}/{id}",
            get(routes::get_record)
                .patch(routes::update_record)
                .delete(routes::delete_record),
        );

    Router::new()
        .route("/ping", get(routes::ping))
        .route("/v1/ops", post(routes::run_operation))
        .route("/v1/schema", get(routes::describe_schema))
        .merge(resources)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(RequestDecompressionLayer::new())
        .layer(middleware::from_fn(access_log))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_is_taken_from_resource_paths_only() {
        assert_eq!(resource_of("/v1/resources/users"), Some("users"));
        assert_eq!(resource_of("/v1/resources/users/42"), Some("users"));
        assert_eq!(resource_of("/v1/resources/"), None);
        assert_eq!(resource_of("/v1/ops"), None);
        assert_eq!(resource_of("/ping"), None);
    }

    #[test]
    fn generated_request_ids_are_hex() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()), "{id}");
    }
}
