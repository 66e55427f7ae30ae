use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use vanish::domain::config::AppConfig;
use vanish_server::Server;

const CONTEXT_HEADER: &str = "x-api-context";
const BOUNDARY: &str = "vanish-test-boundary";

async fn server(tmp: &TempDir, default_context: Option<&str>) -> Server {
    let mut cfg = AppConfig::default();
    cfg.storage.root = tmp.path().join("uploads");
    cfg.storage.index = tmp.path().join("index.redb");
    cfg.server.url = "http://files.test".into();
    cfg.server.default_context = default_context.map(str::to_owned);
    cfg.lifecycle.sweep_interval_secs = 0;
    Server::builder().config(cfg).build().await.unwrap()
}

async fn send(server: &Server, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let res = server.router().oneshot(req).await.unwrap();
    let status = res.status();
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(server: &Server, req: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(server, req).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn request(method: Method, uri: &str, ctx: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match ctx {
        Some(ctx) => builder.header(CONTEXT_HEADER, ctx),
        None => builder,
    }
}

fn multipart(files: &[(&str, &str)], fields: &[(&str, &str)]) -> Body {
    let mut body = String::new();
    for (name, content) in files {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"upload[]\"; filename=\"{name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{content}\r\n"
        ));
    }
    for (name, value) in fields {
        body.push_str(&format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    Body::from(body)
}

async fn upload(server: &Server, ctx: &str, files: &[(&str, &str)], expire: &str) -> (StatusCode, Value) {
    let req = request(Method::POST, "/api/v1/uploads", Some(ctx))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(multipart(files, &[("expire", expire)]))
        .unwrap();
    let res = send_json(server, req).await;
    server.state().store.drain().await;
    res
}

fn id_of(body: &Value, key: &str) -> String {
    body[key][0]["id"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn health_is_up() {
    let tmp = TempDir::new().unwrap();
    let server = server(&tmp, None).await;

    let (status, body) = send_json(&server, request(Method::GET, "/health", None).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
}

#[tokio::test]
async fn missing_context_is_unauthorized() {
    let tmp = TempDir::new().unwrap();
    let server = server(&tmp, None).await;

    let req = request(Method::GET, "/api/v1/uploads", None).body(Body::empty()).unwrap();
    let (status, body) = send_json(&server, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 401);
}

#[tokio::test]
async fn default_context_applies_without_header() {
    let tmp = TempDir::new().unwrap();
    let server = server(&tmp, Some("public")).await;

    let (status, created) = upload(&server, "public", &[("a.txt", "x")], "1h").await;
    assert_eq!(status, StatusCode::OK);
    let id = id_of(&created, "uploads");

    let req = request(Method::GET, &format!("/api/v1/uploads/{id}"), None).body(Body::empty()).unwrap();
    let (status, body) = send_json(&server, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uploads"][0]["context"], "public");
}

#[tokio::test]
async fn asap_upload_downloads_once() {
    let tmp = TempDir::new().unwrap();
    let server = server(&tmp, None).await;

    let (status, created) = upload(&server, "team", &[("hello.txt", "hello world")], "asap").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["success"], true);
    assert_eq!(created["code"], 200);
    let id = id_of(&created, "uploads");
    let url = created["uploads"][0]["url"].as_str().unwrap();
    assert!(url.starts_with(&format!("http://files.test/download/{id}/")));
    assert!(url.ends_with("-hello.txt"));

    let path = url.trim_start_matches("http://files.test");
    let res = server
        .router()
        .oneshot(request(Method::GET, path, Some("team")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let disposition = res.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_owned();
    assert!(disposition.contains("hello.txt"));
    assert_eq!(res.headers()[header::CONTENT_LENGTH], "11");
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"hello world");

    server.state().store.drain().await;
    let req = request(Method::GET, path, Some("team")).body(Body::empty()).unwrap();
    let (status, body) = send_json(&server, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No upload with that id could be found!");
}

#[tokio::test]
async fn operator_fetch_keeps_asap_upload() {
    let tmp = TempDir::new().unwrap();
    let server = server(&tmp, None).await;

    let (_, created) = upload(&server, "team", &[("hello.txt", "hello world")], "asap").await;
    let id = id_of(&created, "uploads");

    let req = request(Method::GET, &format!("/api/v1/uploads/{id}/file"), Some("team")).body(Body::empty()).unwrap();
    let (status, body) = send(&server, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"hello world");
    server.state().store.drain().await;

    let url = created["uploads"][0]["url"].as_str().unwrap();
    let path = url.trim_start_matches("http://files.test");
    let (status, body) = send(&server, request(Method::GET, path, Some("team")).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"hello world");
}

#[tokio::test]
async fn invalid_expire_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let server = server(&tmp, None).await;

    let (status, body) = upload(&server, "team", &[("a", "x")], "soon").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn foreign_context_gets_not_found() {
    let tmp = TempDir::new().unwrap();
    let server = server(&tmp, None).await;

    let (_, created) = upload(&server, "team-a", &[("a", "x")], "1h").await;
    let id = id_of(&created, "uploads");

    for (method, uri) in [
        (Method::GET, format!("/api/v1/uploads/{id}")),
        (Method::GET, format!("/api/v1/uploads/{id}/file")),
        (Method::DELETE, format!("/api/v1/uploads/{id}")),
    ] {
        let req = request(method, &uri, Some("team-b")).body(Body::empty()).unwrap();
        let (status, _) = send(&server, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn modify_list_and_delete_uploads() {
    let tmp = TempDir::new().unwrap();
    let server = server(&tmp, None).await;

    let (_, created) = upload(&server, "team", &[("a.txt", "1"), ("b.txt", "2")], "1d").await;
    let id = id_of(&created, "uploads");
    assert!(created["uploads"][0]["file"].as_str().unwrap().ends_with("data.zip"));
    assert_eq!(created["uploads"][0]["members"].as_array().unwrap().len(), 2);

    let req = request(Method::PUT, &format!("/api/v1/uploads/{id}"), Some("team"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "description": "quarterly", "expire": "2d" }).to_string()))
        .unwrap();
    let (status, body) = send_json(&server, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uploads"][0]["description"], "quarterly");
    assert_eq!(body["uploads"][0]["expire"], "2d");

    let req = request(Method::GET, "/api/v1/uploads?apicontext=team&query=quarter", Some("team"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_json(&server, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uploads"].as_array().unwrap().len(), 1);

    let delete = || request(Method::DELETE, &format!("/api/v1/uploads/{id}"), Some("team")).body(Body::empty()).unwrap();
    let (status, body) = send_json(&server, delete()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let (status, _) = send_json(&server, delete()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn forms_round_trip() {
    let tmp = TempDir::new().unwrap();
    let server = server(&tmp, None).await;

    let req = request(Method::POST, "/api/v1/forms", Some("team"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "expire": "1d", "description": "send logs" }).to_string()))
        .unwrap();
    let (status, created) = send_json(&server, req).await;
    assert_eq!(status, StatusCode::OK);
    let id = id_of(&created, "forms");
    assert_eq!(created["forms"][0]["url"], format!("http://files.test/form/{id}"));
    assert_eq!(created["forms"][0]["type"], "form");
    server.state().store.drain().await;

    let req = request(Method::GET, &format!("/form/{id}"), Some("team")).body(Body::empty()).unwrap();
    let (status, body) = send_json(&server, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["forms"][0]["description"], "send logs");

    let req = request(Method::GET, "/api/v1/forms?apicontext=team", Some("team")).body(Body::empty()).unwrap();
    let (_, body) = send_json(&server, req).await;
    assert_eq!(body["forms"].as_array().unwrap().len(), 1);

    let req = request(Method::DELETE, &format!("/api/v1/forms/{id}"), Some("team")).body(Body::empty()).unwrap();
    assert_eq!(send(&server, req).await.0, StatusCode::OK);

    let req = request(Method::GET, &format!("/api/v1/forms/{id}"), Some("team")).body(Body::empty()).unwrap();
    assert_eq!(send(&server, req).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_notify_address_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let server = server(&tmp, None).await;

    let req = request(Method::POST, "/api/v1/forms", Some("team"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "notify": "me at home" }).to_string()))
        .unwrap();
    let (status, body) = send_json(&server, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("disallowed character"));
}
