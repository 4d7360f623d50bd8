use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use chainvault::config::{AuthConfig, Config, NodeConfig, RemoteConfig};
use chainvault::remote::{ByteStream, LocalStore, RemoteError, RemoteStore};
use chainvault::storage::Database;
use chainvault::{api, auth, AppState};

const TEST_SECRET: &str = "test-secret";

fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let remote =
        LocalStore::new(temp_dir.path().join("files")).expect("Failed to create test remote store");
    test_state_with_remote(temp_dir, Arc::new(remote))
}

fn test_state_with_remote(
    temp_dir: &tempfile::TempDir,
    remote: Arc<dyn RemoteStore>,
) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");

    let config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
        },
        auth: AuthConfig {
            jwt_secret: TEST_SECRET.to_string(),
            token_ttl_hours: 24,
        },
        remote: RemoteConfig::default(),
        test_mode: true,
        max_upload_size: 1024 * 1024,
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");

    Arc::new(AppState { config, db, remote })
}

/// Remote store double that fails selected operations, delegating the rest
/// to a working `LocalStore`.
struct FailingStore {
    inner: LocalStore,
    fail_upload: Option<fn() -> RemoteError>,
    fail_delete: Option<fn() -> RemoteError>,
}

#[async_trait]
impl RemoteStore for FailingStore {
    async fn upload(
        &self,
        spool_path: &Path,
        filename: &str,
        mime_type: &str,
    ) -> Result<String, RemoteError> {
        match self.fail_upload {
            Some(err) => Err(err()),
            None => self.inner.upload(spool_path, filename, mime_type).await,
        }
    }

    async fn download(&self, hash: &str) -> Result<ByteStream, RemoteError> {
        self.inner.download(hash).await
    }

    async fn delete(&self, hash: &str) -> Result<(), RemoteError> {
        match self.fail_delete {
            Some(err) => Err(err()),
            None => self.inner.delete(hash).await,
        }
    }
}

fn failing_state(
    temp_dir: &tempfile::TempDir,
    fail_upload: Option<fn() -> RemoteError>,
    fail_delete: Option<fn() -> RemoteError>,
) -> Arc<AppState> {
    let inner =
        LocalStore::new(temp_dir.path().join("files")).expect("Failed to create test remote store");
    let remote = FailingStore {
        inner,
        fail_upload,
        fail_delete,
    };
    test_state_with_remote(temp_dir, Arc::new(remote))
}

fn gateway_rejection() -> RemoteError {
    RemoteError::Gateway {
        status: 400,
        message: "Invalid territory signature".to_string(),
    }
}

fn network_down() -> RemoteError {
    RemoteError::Transport("connection refused".to_string())
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

async fn register(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send_json(
        app,
        "POST",
        "/auth/register",
        None,
        Some(serde_json::json!({
            "username": username,
            "password": password,
            "wallet": "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["token"].as_str().unwrap().to_string()
}

const BOUNDARY: &str = "----chainvault-test-boundary";

fn multipart_upload_request(token: &str, filename: &str, contents: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/plain\r\n\r\n");
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/file/upload")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn upload(app: &Router, token: &str, filename: &str, contents: &[u8]) -> String {
    let response = app
        .clone()
        .oneshot(multipart_upload_request(token, filename, contents))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    json["data"]["fid"].as_str().unwrap().to_string()
}

fn spool_is_empty(state: &AppState) -> bool {
    match std::fs::read_dir(state.spool_dir()) {
        Ok(entries) => entries.count() == 0,
        Err(_) => true,
    }
}

// ============================================================================
// Registration and login
// ============================================================================

#[tokio::test]
async fn test_register_issues_token() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let app = api::create_router(Arc::clone(&state));

    let token = register(&app, "alice", "hunter2").await;
    let claims = auth::verify_token(&token, TEST_SECRET).unwrap();
    assert!(state.db.get_user(&claims.sub).unwrap().is_some());
}

#[tokio::test]
async fn test_register_duplicate_username_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let app = api::create_router(test_state(&dir));

    register(&app, "alice", "hunter2").await;

    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(serde_json::json!({"username": "alice", "password": "other"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_rejects_empty_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let app = api::create_router(test_state(&dir));

    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(serde_json::json!({"username": "  ", "password": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(serde_json::json!({"username": "bob", "password": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_flow() {
    let dir = tempfile::tempdir().unwrap();
    let app = api::create_router(test_state(&dir));

    register(&app, "alice", "hunter2").await;

    // Unknown username
    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(serde_json::json!({"username": "nobody", "password": "hunter2"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Wrong password
    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(serde_json::json!({"username": "alice", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Correct credentials: the issued token works against a protected route
    let (status, body) = send_json(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(serde_json::json!({"username": "alice", "password": "hunter2"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, _) = send_json(&app, "GET", "/file/", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Bearer authentication
// ============================================================================

#[tokio::test]
async fn test_protected_route_requires_token() {
    let dir = tempfile::tempdir().unwrap();
    let app = api::create_router(test_state(&dir));

    let (status, _) = send_json(&app, "GET", "/file/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_token_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = api::create_router(test_state(&dir));

    let (status, _) = send_json(&app, "GET", "/file/", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Non-Bearer scheme
    let request = Request::builder()
        .method("GET")
        .uri("/file/")
        .header(header::AUTHORIZATION, "Basic abc123")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = api::create_router(test_state(&dir));

    let expired = auth::issue_token("some-user", TEST_SECRET, -1).unwrap();
    let (status, _) = send_json(&app, "GET", "/file/", Some(expired.as_str()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_records_metadata_and_cleans_spool() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let app = api::create_router(Arc::clone(&state));

    let token = register(&app, "alice", "hunter2").await;
    let fid = upload(&app, &token, "hello.txt", b"hello world").await;

    let file = state.db.get_file(&fid).unwrap().expect("metadata row");
    assert_eq!(file.filename, "hello.txt");
    assert_eq!(file.byte_size, 11);

    assert!(spool_is_empty(&state));
}

#[tokio::test]
async fn test_upload_without_file_field_fails_and_cleans_spool() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let app = api::create_router(Arc::clone(&state));

    let token = register(&app, "alice", "hunter2").await;

    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nno file here\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/file/upload")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(state.db.get_all_files().unwrap().is_empty());
    assert!(spool_is_empty(&state));
}

#[tokio::test]
async fn test_upload_over_size_limit_fails_and_cleans_spool() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let app = api::create_router(Arc::clone(&state));

    let token = register(&app, "alice", "hunter2").await;

    let oversized = vec![0u8; (state.config.max_upload_size + 1) as usize];
    let response = app
        .clone()
        .oneshot(multipart_upload_request(&token, "big.bin", &oversized))
        .await
        .unwrap();
    // Either our explicit check (413) or axum's body limit fires first
    assert!(response.status().is_client_error());

    assert!(state.db.get_all_files().unwrap().is_empty());
    assert!(spool_is_empty(&state));
}

// ============================================================================
// Remote store failures
// ============================================================================

#[tokio::test]
async fn test_upload_gateway_rejection_propagates_status() {
    let dir = tempfile::tempdir().unwrap();
    let state = failing_state(&dir, Some(gateway_rejection), None);
    let app = api::create_router(Arc::clone(&state));

    let token = register(&app, "alice", "hunter2").await;
    let response = app
        .clone()
        .oneshot(multipart_upload_request(&token, "hello.txt", b"hello world"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body.to_string().contains("Invalid territory signature"));

    // No metadata row without remote confirmation, and no spool artifact
    assert!(state.db.get_all_files().unwrap().is_empty());
    assert!(spool_is_empty(&state));
}

#[tokio::test]
async fn test_upload_transport_failure_maps_to_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let state = failing_state(&dir, Some(network_down), None);
    let app = api::create_router(Arc::clone(&state));

    let token = register(&app, "alice", "hunter2").await;
    let response = app
        .clone()
        .oneshot(multipart_upload_request(&token, "hello.txt", b"hello world"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(state.db.get_all_files().unwrap().is_empty());
    assert!(spool_is_empty(&state));
}

#[tokio::test]
async fn test_delete_remote_failure_keeps_record() {
    let dir = tempfile::tempdir().unwrap();
    let state = failing_state(&dir, None, Some(network_down));
    let app = api::create_router(Arc::clone(&state));

    let token = register(&app, "alice", "hunter2").await;
    let fid = upload(&app, &token, "hello.txt", b"hello world").await;

    let (status, _) = send_json(
        &app,
        "DELETE",
        &format!("/file/delete/{fid}"),
        Some(token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // Local row is only removed after a successful remote delete
    assert!(state.db.get_file(&fid).unwrap().is_some());
    let (status, _) = send_json(
        &app,
        "GET",
        &format!("/file/download/{fid}"),
        Some(token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Download
// ============================================================================

#[tokio::test]
async fn test_download_streams_with_headers() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let app = api::create_router(Arc::clone(&state));

    let token = register(&app, "alice", "hunter2").await;
    let fid = upload(&app, &token, "hello.txt", b"hello world").await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/file/download/{fid}"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_LENGTH).unwrap(),
        "11"
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(disposition, "attachment; filename=\"hello.txt\"");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"hello world");
}

#[tokio::test]
async fn test_download_disposition_set_for_awkward_filenames() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let app = api::create_router(Arc::clone(&state));

    let token = register(&app, "alice", "hunter2").await;
    let fid = upload(&app, &token, "résumé.pdf", b"%PDF-1.7").await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/file/download/{fid}"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .expect("disposition header is always set")
        .to_str()
        .unwrap();
    assert_eq!(disposition, "attachment; filename=\"r_sum_.pdf\"");
}

#[tokio::test]
async fn test_download_unknown_hash_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = api::create_router(test_state(&dir));

    let token = register(&app, "alice", "hunter2").await;
    let (status, _) = send_json(
        &app,
        "GET",
        "/file/download/no-such-hash",
        Some(token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Delete and ownership
// ============================================================================

#[tokio::test]
async fn test_delete_own_file() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let app = api::create_router(Arc::clone(&state));

    let token = register(&app, "alice", "hunter2").await;
    let fid = upload(&app, &token, "hello.txt", b"hello world").await;

    let (status, _) = send_json(
        &app,
        "DELETE",
        &format!("/file/delete/{fid}"),
        Some(token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert!(state.db.get_file(&fid).unwrap().is_none());

    let (status, _) = send_json(
        &app,
        "GET",
        &format!("/file/download/{fid}"),
        Some(token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_foreign_file_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let app = api::create_router(Arc::clone(&state));

    let alice = register(&app, "alice", "hunter2").await;
    let mallory = register(&app, "mallory", "secret").await;
    let fid = upload(&app, &alice, "hello.txt", b"hello world").await;

    let (status, _) = send_json(
        &app,
        "DELETE",
        &format!("/file/delete/{fid}"),
        Some(mallory.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Record and remote object are untouched
    assert!(state.db.get_file(&fid).unwrap().is_some());
    let (status, _) = send_json(
        &app,
        "GET",
        &format!("/file/download/{fid}"),
        Some(alice.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_returns_only_own_files() {
    let dir = tempfile::tempdir().unwrap();
    let app = api::create_router(test_state(&dir));

    let alice = register(&app, "alice", "hunter2").await;
    let bob = register(&app, "bob", "hunter3").await;

    upload(&app, &alice, "a1.txt", b"one").await;
    upload(&app, &alice, "a2.txt", b"two").await;
    upload(&app, &bob, "b1.txt", b"three").await;

    let (status, body) = send_json(&app, "GET", "/file/", Some(alice.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(body["data"]["pagination"]["total"], 2);

    let (_, body) = send_json(&app, "GET", "/file/", Some(bob.as_str()), None).await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["filename"], "b1.txt");
}

#[tokio::test]
async fn test_list_pagination() {
    let dir = tempfile::tempdir().unwrap();
    let app = api::create_router(test_state(&dir));

    let token = register(&app, "alice", "hunter2").await;
    for i in 0..3 {
        upload(&app, &token, &format!("f{i}.txt"), b"data").await;
    }

    let (status, body) = send_json(&app, "GET", "/file/?limit=2", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["pagination"]["total"], 3);

    let (status, _) = send_json(&app, "GET", "/file/?limit=0", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let app = api::create_router(test_state(&dir));

    let (status, body) = send_json(&app, "GET", "/_internal/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_admin_purge() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let app = api::create_router(Arc::clone(&state));

    let token = register(&app, "alice", "hunter2").await;
    upload(&app, &token, "f.txt", b"data").await;

    let (status, body) = send_json(&app, "DELETE", "/admin/purge", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["files_deleted"], 1);
    assert_eq!(body["data"]["users_deleted"], 1);

    assert!(state.db.get_all_files().unwrap().is_empty());
}
