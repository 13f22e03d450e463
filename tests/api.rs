use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use smartgallery::api::{create_app, ApiOptions};
use smartgallery::db::Database;
use smartgallery::service::GalleryService;
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "gallery-test-boundary";

async fn app(api_token: Option<&str>) -> (TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::in_memory().await.unwrap();
    let service = Arc::new(GalleryService::new(db, dir.path().join("uploads")));
    let app = create_app(
        service,
        ApiOptions {
            api_token: api_token.map(str::to_string),
            ..ApiOptions::default()
        },
    );
    (dir, app)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn upload_request(file_name: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/gallery/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (_dir, app) = app(None).await;
    let (status, body) = call(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_upload_then_list() {
    let (_dir, app) = app(None).await;

    let (status, body) = call(&app, upload_request("beach.png", "image/png", &png(64, 32))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["original_name"], "beach.png");
    assert_eq!(body["data"]["width"], 64);
    assert_eq!(body["data"]["faces"], json!([]));

    let (status, body) = call(&app, get("/gallery/photos")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["photos"][0]["original_name"], "beach.png");
}

#[tokio::test]
async fn test_upload_rejects_non_images() {
    let (_dir, app) = app(None).await;

    let (status, body) = call(&app, upload_request("notes.txt", "text/plain", b"hello")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("image"));
}

#[tokio::test]
async fn test_assign_requires_exactly_one_choice() {
    let (_dir, app) = app(None).await;

    let both = json!({ "person_id": "someone", "new_person_name": "Bob" });
    let (status, _) = call(&app, json_request(Method::POST, "/gallery/faces/any/assign", both)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let neither = json!({ "new_person_name": "   " });
    let (status, _) = call(&app, json_request(Method::POST, "/gallery/faces/any/assign", neither)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_assign_unknown_face_is_not_found() {
    let (_dir, app) = app(None).await;

    let request = json_request(
        Method::POST,
        "/gallery/faces/missing/assign",
        json!({ "new_person_name": "Bob" }),
    );
    let (status, body) = call(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "face missing");

    let (_, body) = call(&app, get("/gallery/persons")).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_delete_and_rename_unknown_entities() {
    let (_dir, app) = app(None).await;

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/gallery/photos/missing")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let request = json_request(Method::PUT, "/gallery/persons/missing", json!({ "name": "Zed" }));
    let (status, _) = call(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_token_gate() {
    let (_dir, app) = app(Some("secret")).await;

    let (status, body) = call(&app, get("/gallery/photos")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let request = Request::builder()
        .uri("/gallery/photos")
        .header(header::AUTHORIZATION, "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (_dir, app) = app(None).await;
    call(&app, get("/gallery/persons")).await;

    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
    assert!(text.contains("http_requests_total"));
}
