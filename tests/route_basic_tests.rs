use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use schemagen::config::EngineConfig;
use schemagen::server::{SchemaGenState, schemagen_router};
use serde_json::{Value, json};
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

fn unique_sqlite_path(prefix: &str) -> std::path::PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();

    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "schemagen-{prefix}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    temp_path
}

async fn build_app(prefix: &str) -> (axum::Router, std::path::PathBuf) {
    let temp_path = unique_sqlite_path(prefix);
    let database_url = format!("sqlite:{}", temp_path.display());
    let engine = schemagen::engine::spawn(&database_url, &EngineConfig::default())
        .await
        .expect("engine should start");
    (schemagen_router(SchemaGenState::new(engine)), temp_path)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request")
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.expect("request failed");
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&body).into_owned())
        })
    };
    (status, value)
}

fn cleanup(path: &std::path::Path) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

#[tokio::test]
async fn ping_and_unknown_routes() {
    let (app, temp_path) = build_app("route-ping").await;

    let resp = app
        .clone()
        .oneshot(empty_request("GET", "/ping"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let generated = resp
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .expect("generated request id");
    assert_eq!(generated.len(), 16);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"Pong!");

    // Client-supplied request id is echoed back.
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/ping")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        resp.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-123")
    );

    let (status, _) = send(&app, empty_request("GET", "/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    cleanup(&temp_path);
}

#[tokio::test]
async fn resource_routes_cover_crud() {
    let (app, temp_path) = build_app("route-crud").await;

    // 1) Read before the resource exists -> empty list
    let (status, body) = send(&app, empty_request("GET", "/v1/resources/users")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "records": [] }));

    // 2) Create -> 201 with the DDL that ran
    let (status, body) = send(
        &app,
        json_request("POST", "/v1/resources/users", json!({ "name": "Ada", "age": 30 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], json!(1));
    assert_eq!(body["ddl"].as_array().map(Vec::len), Some(1));

    let (status, body) = send(
        &app,
        json_request("POST", "/v1/resources/users", json!({ "name": "Lin", "age": 30.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], json!(2));

    // 3) Filtered list; query values are text
    let (status, body) = send(&app, empty_request("GET", "/v1/resources/users?name=Lin")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "records": [{ "id": 2, "name": "Lin", "age": 30.5 }] })
    );

    // 4) Get by id
    let (status, body) = send(&app, empty_request("GET", "/v1/resources/users/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": 1, "name": "Ada", "age": 30.0 }));

    let (status, body) = send(&app, empty_request("GET", "/v1/resources/users/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("RECORD_NOT_FOUND"));

    // 5) Patch adds a column
    let (status, body) = send(
        &app,
        json_request("PATCH", "/v1/resources/users/1", json!({ "email": "ada@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "id": 1, "ddl": [r#"ALTER TABLE "users" ADD COLUMN "email" TEXT"#] })
    );

    let (status, body) = send(
        &app,
        json_request("PATCH", "/v1/resources/users/999", json!({ "email": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["details"], json!({ "resource": "users", "id": 999 }));

    // 6) Delete
    let (status, body) = send(&app, empty_request("DELETE", "/v1/resources/users/2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": 2 }));

    let (status, _) = send(&app, empty_request("DELETE", "/v1/resources/users/2")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // 7) Schema dump
    let (status, body) = send(&app, empty_request("GET", "/v1/schema")).await;
    assert_eq!(status, StatusCode::OK);
    let tables = body["tables"].as_array().expect("tables array");
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0]["name"], json!("users"));
    assert_eq!(
        tables[0]["columns"],
        json!([
            { "name": "id", "storage_class": "integer", "primary_key": true },
            { "name": "name", "storage_class": "text", "primary_key": false },
            { "name": "age", "storage_class": "real", "primary_key": false },
            { "name": "email", "storage_class": "text", "primary_key": false },
        ])
    );

    cleanup(&temp_path);
}

#[tokio::test]
async fn ops_endpoint_dispatches_by_op() {
    let (app, temp_path) = build_app("route-ops").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/v1/ops",
            json!({ "op": "create", "resource": "orders", "fields": { "total": 9.5 } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["op"], json!("create"));
    assert_eq!(body["id"], json!(1));

    let (status, body) = send(
        &app,
        json_request("POST", "/v1/ops", json!({ "op": "read", "resource": "orders", "id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "op": "read", "records": [{ "id": 1, "total": 9.5 }] })
    );

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/v1/ops",
            json!({ "op": "update", "resource": "orders", "id": 999, "fields": { "total": 1 } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("RECORD_NOT_FOUND"));

    let (status, body) = send(
        &app,
        json_request("POST", "/v1/ops", json!({ "op": "delete", "resource": "orders" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("UNSUPPORTED_VALUE"));

    let (status, body) = send(
        &app,
        json_request("POST", "/v1/ops", json!({ "op": "delete", "resource": "orders", "id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "op": "delete", "id": 1 }));

    cleanup(&temp_path);
}

#[tokio::test]
async fn bad_input_maps_to_client_errors() {
    let (app, temp_path) = build_app("route-bad").await;

    let (status, body) = send(
        &app,
        json_request("POST", "/v1/resources/select", json!({ "name": "Ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("INVALID_IDENTIFIER"));

    let (status, body) = send(
        &app,
        json_request("POST", "/v1/resources/users", json!({ "tags": ["a", "b"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("UNSUPPORTED_VALUE"));
    assert_eq!(body["error"]["details"], json!({ "field": "tags" }));

    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/v1/resources/users")
            .header("content-type", "application/json")
            .body(Body::from("not-json"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, empty_request("GET", "/v1/resources/users/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing above touched the store.
    let (_, body) = send(&app, empty_request("GET", "/v1/schema")).await;
    assert_eq!(body, json!({ "tables": [] }));

    cleanup(&temp_path);
}
