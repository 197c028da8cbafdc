use std::sync::{Arc, Mutex, MutexGuard};

use safetransfer_chain::{ensure_network, RegistryAnchor, WalletRegistry};
use safetransfer_core::config::SafeTransferConfig;
use safetransfer_core::types::{Address, ContentDigest, FileId, FileInfo, TxHash};
use safetransfer_core::{ChainAnchor, SafeTransferError, SafeTransferResult, WalletProvider};
use safetransfer_crypto::{EnvelopeBuilder, EnvelopeOpener, KeyWrapper, WalletKeyDeriver};
use safetransfer_store::BlobStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::retry::RetryPolicy;
use crate::session::Session;

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Record the blob store returned; `file.file_id` identifies the upload.
    pub file: FileInfo,
    /// Identifier registered on chain next to the digest
    pub content_id: String,
    pub digest: ContentDigest,
    pub tx_hash: TxHash,
    pub block_number: u64,
}

#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub file_id: FileId,
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct SafeTransferClient {
    config: SafeTransferConfig,
    anchor: Arc<dyn ChainAnchor>,
    store: Arc<dyn BlobStore>,
    builder: EnvelopeBuilder,
    opener: EnvelopeOpener,
    retry: RetryPolicy,
    session: Mutex<Session>,
}

impl SafeTransferClient {
    /// Connect the wallet: request its accounts and move it to the
    /// registry's network. The first account becomes the session owner.
    pub async fn connect(
        config: SafeTransferConfig,
        wallet: Arc<dyn WalletProvider>,
        anchor: Arc<dyn ChainAnchor>,
        store: Arc<dyn BlobStore>,
    ) -> SafeTransferResult<Self> {
        let owner = wallet
            .request_accounts()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SafeTransferError::WalletUnavailable("wallet exposed no accounts".into()))?;

        ensure_network(wallet.as_ref(), &config.chain.params()).await?;

        let deriver = WalletKeyDeriver::new(
            wallet,
            owner.clone(),
            config.crypto.derivation_message.clone(),
        );
        let wrapper = Arc::new(KeyWrapper::new(Arc::new(deriver)));
        let builder = EnvelopeBuilder::new(wrapper.clone(), config.crypto.wrap_strategy);
        let opener = EnvelopeOpener::new(wrapper, anchor.clone())
            .accept_untagged(config.crypto.accept_untagged_blobs);

        info!(
            %owner,
            chain = %config.chain.chain_id,
            strategy = %config.crypto.wrap_strategy,
            "wallet connected"
        );

        Ok(Self {
            retry: RetryPolicy::from_config(&config.blob_store),
            config,
            anchor,
            store,
            builder,
            opener,
            session: Mutex::new(Session::new(owner)),
        })
    }

    /// `connect` with the registry at `config.chain.contract_address`,
    /// reached through the same wallet.
    pub async fn connect_on_chain(
        config: SafeTransferConfig,
        wallet: Arc<dyn WalletProvider>,
        store: Arc<dyn BlobStore>,
    ) -> SafeTransferResult<Self> {
        let registry = WalletRegistry::from_config(wallet.clone(), &config.chain)?;
        let anchor = Arc::new(RegistryAnchor::new(Arc::new(registry)));
        Self::connect(config, wallet, anchor, store).await
    }

    pub fn owner(&self) -> Address {
        self.session().owner().clone()
    }

    /// Snapshot of the session's created-here registry.
    pub fn session_snapshot(&self) -> Session {
        self.session().clone()
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Encrypt, anchor, then persist.
    ///
    /// Nothing reaches the blob store unless the registration was mined
    /// successfully. Cancelling `cancel` while waiting for the receipt
    /// ends the upload with `Cancelled`; the file key is already gone by
    /// then, only the wrapped form remains.
    pub async fn upload(
        &self,
        plaintext: &[u8],
        filename: &str,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> SafeTransferResult<UploadOutcome> {
        if cancel.is_cancelled() {
            return Err(SafeTransferError::Cancelled);
        }

        let draft = self.builder.build(plaintext, filename, content_type).await?;
        let owner = self.owner();
        let content_id = Uuid::new_v4().to_string();

        let tx_hash = self.anchor.register(&owner, &content_id, &draft.digest).await?;
        let receipt = self
            .anchor
            .await_confirmation(&tx_hash, &self.config.chain.confirmation_policy(), cancel)
            .await?;

        if cancel.is_cancelled() {
            warn!(%tx_hash, "upload cancelled after confirmation; digest is anchored but no file was stored");
            return Err(SafeTransferError::Cancelled);
        }

        let file = self.store.upload(draft.upload_form()).await?;
        self.session()
            .record_upload(file.file_id.clone(), draft.digest);

        info!(
            file_id = %file.file_id,
            %content_id,
            %tx_hash,
            block = receipt.block_number,
            "upload complete"
        );

        Ok(UploadOutcome {
            file,
            content_id,
            digest: draft.digest,
            tx_hash,
            block_number: receipt.block_number,
        })
    }

    /// `GET /files/my`, retried on transport errors.
    pub async fn list_files(&self) -> SafeTransferResult<Vec<FileInfo>> {
        self.retry
            .run("list files", || self.store.list_mine())
            .await
    }

    /// Fetch and open a file.
    ///
    /// Files uploaded in this session are checked against the digest we
    /// anchored; anything else is verified on chain before any wallet
    /// prompt or decryption.
    pub async fn download(&self, file: &FileInfo) -> SafeTransferResult<DownloadedFile> {
        let (provenance, expected) = {
            let session = self.session();
            let provenance = session.provenance_of(&file.file_id);
            let expected = match session.anchored_digest(&file.file_id) {
                Some(digest) => digest,
                None => file.digest()?,
            };
            (provenance, expected)
        };

        let info = self
            .retry
            .run("download info", || self.store.download_info(&file.file_id))
            .await?;
        let payload = info.decode()?;

        let bytes = self.opener.open(&payload, &expected, provenance).await?;
        info!(file_id = %file.file_id, size = bytes.len(), ?provenance, "download complete");

        Ok(DownloadedFile {
            file_id: file.file_id.clone(),
            filename: file.display_name().to_string(),
            content_type: file.file_type.clone(),
            bytes,
        })
    }
}

impl std::fmt::Debug for SafeTransferClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeTransferClient")
            .field("owner", &self.owner())
            .field("strategy", &self.builder.strategy())
            .finish_non_exhaustive()
    }
}
