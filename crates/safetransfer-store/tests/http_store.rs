//! HttpBlobStore against an in-process axum file API.
//!
//! The mock backend checks the session cookie, records multipart uploads
//! and serves them back through the list and download-info endpoints.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use safetransfer_core::config::BlobStoreConfig;
use safetransfer_core::types::{ContentDigest, DownloadInfo, FileId, FileInfo, UploadForm};
use safetransfer_core::SafeTransferError;
use safetransfer_crypto::LocalWallet;
use safetransfer_store::{BlobStore, Credential, HttpBlobStore};
use secrecy::SecretString;
use serde_json::{json, Value};

const SESSION: &str = "session=test-session-token";
const NONCE: &str = "n0nceF0rTests";

#[derive(Default)]
struct Backend {
    files: Mutex<Vec<(FileInfo, DownloadInfo)>>,
    /// Multipart fields of the last upload, by name
    last_fields: Mutex<HashMap<String, Vec<u8>>>,
    last_filename: Mutex<Option<String>>,
    siwe_messages: Mutex<Vec<String>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(SESSION))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Not authenticated"})),
    )
        .into_response()
}

async fn upload(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }

    let mut fields = HashMap::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "encrypted_file" {
            *backend.last_filename.lock().unwrap() = field.file_name().map(str::to_string);
        }
        let data = field.bytes().await.unwrap().to_vec();
        fields.insert(name, data);
    }

    let text = |name: &str| String::from_utf8(fields[name].clone()).unwrap();
    let info = FileInfo {
        file_id: FileId(format!("file-{}", backend.files.lock().unwrap().len() + 1)),
        ipfs_cid: Some("bafy-test".into()),
        original_file_hash: text("original_file_hash"),
        file_name: backend.last_filename.lock().unwrap().clone(),
        file_type: Some(text("file_type")),
    };
    let download = DownloadInfo {
        encrypted_file_data: STANDARD.encode(&fields["encrypted_file"]),
        encrypted_aes_key: text("encrypted_aes_key"),
        iv: text("iv"),
    };
    backend.files.lock().unwrap().push((info.clone(), download));
    *backend.last_fields.lock().unwrap() = fields;

    Json(info).into_response()
}

async fn list(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let files: Vec<FileInfo> = backend
        .files
        .lock()
        .unwrap()
        .iter()
        .map(|(info, _)| info.clone())
        .collect();
    Json(files).into_response()
}

async fn download_info(
    State(backend): State<Arc<Backend>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let files = backend.files.lock().unwrap();
    match files.iter().find(|(info, _)| info.file_id.0 == file_id) {
        Some((_, download)) => Json(download.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "File not found"})),
        )
            .into_response(),
    }
}

async fn nonce() -> Json<Value> {
    Json(json!({ "nonce": NONCE }))
}

async fn verify_siwe(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    let message = body["message"].as_str().unwrap_or_default().to_string();
    let signature = body["signature"].as_str().unwrap_or_default();
    if !message.contains(&format!("Nonce: {NONCE}")) || !signature.starts_with("0x") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Invalid SIWE message"})),
        )
            .into_response();
    }
    backend.siwe_messages.lock().unwrap().push(message);
    (
        [(header::SET_COOKIE, format!("{SESSION}; HttpOnly; Path=/; SameSite=Lax"))],
        Json(json!({"ok": true})),
    )
        .into_response()
}

async fn me(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"id": "user-1", "email": null, "address": "0xabc"})).into_response()
}

async fn spawn_backend() -> (String, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/api/v1/files/upload", post(upload))
        .route("/api/v1/files/my", get(list))
        .route("/api/v1/files/{file_id}/download-info", get(download_info))
        .route("/api/v1/auth/nonce", get(nonce))
        .route("/api/v1/auth/verify-siwe", post(verify_siwe))
        .route("/api/v1/users/me", get(me))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api/v1"), backend)
}

fn store_for(endpoint: &str) -> HttpBlobStore {
    HttpBlobStore::from_config(&BlobStoreConfig {
        endpoint: endpoint.to_string(),
        request_timeout_secs: 5,
        ..Default::default()
    })
    .unwrap()
}

fn sample_form() -> UploadForm {
    UploadForm::new(
        vec![0xde, 0xad, 0xbe, 0xef],
        "report.pdf",
        "application/pdf",
        &[7u8; 12],
        &ContentDigest::from_bytes([0x42; 32]),
        &[0x02; 61],
    )
}

#[tokio::test]
async fn upload_sends_all_multipart_fields() {
    let (endpoint, backend) = spawn_backend().await;
    let store = store_for(&endpoint)
        .with_credential(Credential::Cookie(SecretString::from(SESSION.to_string())));

    let form = sample_form();
    let info = store.upload(form.clone()).await.unwrap();
    assert_eq!(info.file_id, FileId("file-1".into()));
    assert_eq!(info.original_file_hash, "42".repeat(32));

    let fields = backend.last_fields.lock().unwrap().clone();
    assert_eq!(fields["encrypted_file"], vec![0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(fields["file_type"], b"application/pdf");
    assert_eq!(fields["iv"], STANDARD.encode([7u8; 12]).into_bytes());
    assert_eq!(fields["original_file_hash"], "42".repeat(32).into_bytes());
    assert_eq!(fields["encrypted_aes_key"], form.encrypted_aes_key.clone().into_bytes());
    assert_eq!(
        backend.last_filename.lock().unwrap().as_deref(),
        Some("report.pdf")
    );
}

#[tokio::test]
async fn list_and_download_info_roundtrip() {
    let (endpoint, _backend) = spawn_backend().await;
    let store = store_for(&endpoint)
        .with_credential(Credential::Cookie(SecretString::from(SESSION.to_string())));

    let form = sample_form();
    let info = store.upload(form.clone()).await.unwrap();

    let listed = store.list_mine().await.unwrap();
    assert_eq!(listed, vec![info.clone()]);

    let download = store.download_info(&info.file_id).await.unwrap();
    assert_eq!(download, form.to_download_info());
    let payload = download.decode().unwrap();
    assert_eq!(payload.file_nonce, vec![7u8; 12]);
    assert_eq!(payload.wrapped_key, vec![0x02; 61]);
}

#[tokio::test]
async fn backend_detail_is_surfaced() {
    let (endpoint, _backend) = spawn_backend().await;

    // no session
    let err = store_for(&endpoint).list_mine().await.unwrap_err();
    match err {
        SafeTransferError::Transport(msg) => {
            assert!(msg.contains("401"), "{msg}");
            assert!(msg.contains("Not authenticated"), "{msg}");
        }
        other => panic!("expected Transport, got {other:?}"),
    }

    let store = store_for(&endpoint)
        .with_credential(Credential::Cookie(SecretString::from(SESSION.to_string())));
    let err = store
        .download_info(&FileId("missing".into()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("File not found"), "{err}");
}

#[tokio::test]
async fn unreachable_backend_is_transport_error() {
    // bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = store_for(&format!("http://{addr}/api/v1"))
        .list_mine()
        .await
        .unwrap_err();
    assert!(err.is_retryable(), "{err:?}");
}

#[tokio::test]
async fn sign_in_with_ethereum_establishes_session() {
    let (endpoint, backend) = spawn_backend().await;
    let store = store_for(&endpoint);
    let wallet = LocalWallet::from_seed([11u8; 32]).unwrap();

    let user = store.sign_in(&wallet, wallet.address()).await.unwrap();
    assert_eq!(user.id, "user-1");
    assert!(store.has_credential());
    assert_eq!(wallet.prompt_count(), 1);

    let messages = backend.siwe_messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("localhost:3000 wants you to sign in"));
    assert!(messages[0].contains(wallet.address().as_str()));
    assert!(messages[0].contains("Chain ID: 1\n"));

    // the session cookie now authorizes file calls
    assert!(store.list_mine().await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_sign_in_keeps_store_anonymous() {
    let (endpoint, backend) = spawn_backend().await;
    let store = store_for(&endpoint);
    let wallet = LocalWallet::generate().unwrap();
    wallet.reject_prompts(true);

    let err = store.sign_in(&wallet, wallet.address()).await.unwrap_err();
    assert!(matches!(err, SafeTransferError::UserRejected));
    assert!(!store.has_credential());
    assert!(backend.siwe_messages.lock().unwrap().is_empty());
}
