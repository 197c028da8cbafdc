//! HTTP client for the file API
//!
//! Endpoints, relative to the configured base URL:
//! - `POST /files/upload` (multipart) → `FileInfo`
//! - `GET /files/my` → `[FileInfo]`
//! - `GET /files/{fileId}/download-info` → `DownloadInfo`
//! - `GET /auth/nonce`, `POST /auth/verify-siwe`, `GET /users/me` for the
//!   Sign-In with Ethereum session
//!
//! Error bodies of the form `{"detail": ...}` are surfaced in the
//! `Transport` error text.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use safetransfer_core::config::BlobStoreConfig;
use safetransfer_core::types::{Address, DownloadInfo, FileId, FileInfo, UploadForm};
use safetransfer_core::{SafeTransferError, SafeTransferResult, WalletProvider};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::siwe::{parse_chain_id, SiweMessage};
use crate::store::BlobStore;

/// Session credential attached to every request.
pub enum Credential {
    /// Raw `Cookie` header value, e.g. `session=...`
    Cookie(SecretString),
    Bearer(SecretString),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cookie(_) => f.write_str("Credential::Cookie([REDACTED])"),
            Self::Bearer(_) => f.write_str("Credential::Bearer([REDACTED])"),
        }
    }
}

/// `GET /users/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub address: String,
}

#[derive(Deserialize)]
struct NonceResponse {
    nonce: String,
}

#[derive(Serialize)]
struct VerifySiweRequest<'a> {
    message: &'a str,
    signature: &'a str,
}

#[derive(Debug, Clone)]
struct SiweSettings {
    domain: String,
    uri: String,
    statement: String,
}

pub struct HttpBlobStore {
    client: Client,
    base_url: String,
    siwe: SiweSettings,
    credential: RwLock<Option<Credential>>,
}

impl HttpBlobStore {
    /// Build a client from config.
    ///
    /// If `enforce_tls` is true and the endpoint uses HTTP, this returns an
    /// error. Otherwise, a warning is logged for non-HTTPS endpoints.
    pub fn from_config(config: &BlobStoreConfig) -> SafeTransferResult<Self> {
        if config.endpoint.starts_with("http://") {
            if config.enforce_tls {
                return Err(SafeTransferError::Config(format!(
                    "blob store endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                     Use an HTTPS endpoint or set blob_store.enforce_tls = false for local development.",
                    config.endpoint
                )));
            }
            warn!(
                endpoint = %config.endpoint,
                "blob store endpoint uses plaintext HTTP: session cookies are transmitted unencrypted. \
                 Set blob_store.enforce_tls = true and use HTTPS in production."
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SafeTransferError::Config(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            siwe: SiweSettings {
                domain: config.siwe_domain.clone(),
                uri: config.siwe_uri.clone(),
                statement: config.siwe_statement.clone(),
            },
            credential: RwLock::new(None),
        })
    }

    pub fn with_credential(self, credential: Credential) -> Self {
        self.set_credential(credential);
        self
    }

    pub fn set_credential(&self, credential: Credential) {
        *self.credential.write().unwrap_or_else(|e| e.into_inner()) = Some(credential);
    }

    pub fn has_credential(&self) -> bool {
        self.credential
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let guard = self.credential.read().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(Credential::Cookie(cookie)) => request.header(COOKIE, cookie.expose_secret()),
            Some(Credential::Bearer(token)) => {
                request.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
            }
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> SafeTransferResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| SafeTransferError::Transport(format!("{what}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SafeTransferError::Transport(format!(
                "{what} failed ({status}): {}",
                backend_detail(&body)
            )));
        }
        Ok(response)
    }

    /// Sign in with the wallet and keep the session the backend issues.
    ///
    /// Prompts the wallet once for the SIWE signature.
    pub async fn sign_in(
        &self,
        wallet: &dyn WalletProvider,
        address: &Address,
    ) -> SafeTransferResult<User> {
        let nonce: NonceResponse = read_json(
            self.send(self.client.get(self.url("/auth/nonce")), "fetch nonce")
                .await?,
            "fetch nonce",
        )
        .await?;

        let chain_id = parse_chain_id(&wallet.chain_id().await?)?;
        let message = SiweMessage {
            domain: self.siwe.domain.clone(),
            address: address.clone(),
            statement: self.siwe.statement.clone(),
            uri: self.siwe.uri.clone(),
            chain_id,
            nonce: nonce.nonce,
            issued_at: chrono::Utc::now(),
        }
        .prepare();
        debug!(%address, chain_id, "requesting SIWE signature");
        let signature = wallet.sign_message(&message, address).await?;

        let response = self
            .send(
                self.client
                    .post(self.url("/auth/verify-siwe"))
                    .json(&VerifySiweRequest {
                        message: &message,
                        signature: &signature,
                    }),
                "verify SIWE",
            )
            .await?;

        let cookies = session_cookies(&response);
        let body = response.text().await.unwrap_or_default();
        if let Some(cookie) = cookies {
            self.set_credential(Credential::Cookie(SecretString::from(cookie)));
        } else if let Some(token) = access_token(&body) {
            self.set_credential(Credential::Bearer(SecretString::from(token)));
        } else {
            warn!("SIWE verification returned neither a session cookie nor a token");
        }

        let user = self.me().await?;
        info!(user = %user.id, %address, "signed in");
        Ok(user)
    }

    /// `GET /users/me`
    pub async fn me(&self) -> SafeTransferResult<User> {
        read_json(
            self.send(self.client.get(self.url("/users/me")), "fetch user")
                .await?,
            "fetch user",
        )
        .await
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(&self, form: UploadForm) -> SafeTransferResult<FileInfo> {
        let size = form.encrypted_file.len();
        let mime = if form.file_type.is_empty() {
            "application/octet-stream"
        } else {
            form.file_type.as_str()
        };
        let file_part = Part::bytes(form.encrypted_file)
            .file_name(form.filename.clone())
            .mime_str(mime)
            .map_err(|e| {
                SafeTransferError::Malformed(format!("invalid content type {mime:?}: {e}"))
            })?;

        let multipart = Form::new()
            .part("encrypted_file", file_part)
            .text("file_type", form.file_type)
            .text("iv", form.iv)
            .text("original_file_hash", form.original_file_hash)
            .text("encrypted_aes_key", form.encrypted_aes_key);

        let response = self
            .send(
                self.client.post(self.url("/files/upload")).multipart(multipart),
                "upload",
            )
            .await?;
        let info: FileInfo = read_json(response, "upload").await?;
        info!(file_id = %info.file_id, size, "uploaded encrypted file");
        Ok(info)
    }

    async fn list_mine(&self) -> SafeTransferResult<Vec<FileInfo>> {
        let response = self
            .send(self.client.get(self.url("/files/my")), "list files")
            .await?;
        read_json(response, "list files").await
    }

    async fn download_info(&self, file_id: &FileId) -> SafeTransferResult<DownloadInfo> {
        let response = self
            .send(
                self.client
                    .get(self.url(&format!("/files/{file_id}/download-info"))),
                "download info",
            )
            .await?;
        read_json(response, "download info").await
    }
}

impl std::fmt::Debug for HttpBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBlobStore")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.has_credential())
            .finish()
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> SafeTransferResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| SafeTransferError::Transport(format!("{what}: reading body: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| SafeTransferError::Malformed(format!("{what}: unexpected response: {e}")))
}

/// The backend's `detail` field if the body has one, else the raw body.
fn backend_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("detail").map(|d| match d {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// `name=value` pairs of every `Set-Cookie` header, joined for a `Cookie` header.
fn session_cookies(response: &Response) -> Option<String> {
    let pairs: Vec<&str> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect();
    (!pairs.is_empty()).then(|| pairs.join("; "))
}

fn access_token(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("access_token")?
        .as_str()
        .map(str::to_string)
}
