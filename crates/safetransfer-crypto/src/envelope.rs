//! Upload and download orchestration over the crypto primitives
//!
//! `EnvelopeBuilder` performs no network I/O: it returns a draft that the
//! caller anchors on chain and persists to the blob store. `EnvelopeOpener`
//! is the inverse and is the only place a file's plaintext is recovered,
//! always checked against the anchored digest before it is returned.

use std::sync::Arc;

use safetransfer_core::types::{
    ContentDigest, EncryptedPayload, FileEnvelope, FileId, UploadForm, WrapStrategy,
};
use safetransfer_core::{ChainAnchor, SafeTransferError, SafeTransferResult};
use tracing::{debug, info, warn};

use crate::cipher::{AesGcmCipher, SymmetricCipher};
use crate::digest::digest;
use crate::keys::{generate_file_key, Nonce};
use crate::wrap::{KeyWrapper, WrappedKeyBlob};

/// Encrypted file ready to be anchored and uploaded.
#[derive(Debug, Clone)]
pub struct EnvelopeDraft {
    pub encrypted_file: Vec<u8>,
    pub file_nonce: Nonce,
    pub wrapped_key: WrappedKeyBlob,
    /// SHA-256 of the original plaintext
    pub digest: ContentDigest,
    pub original_filename: String,
    pub content_type: String,
}

impl EnvelopeDraft {
    /// Multipart fields for `POST /files/upload`.
    pub fn upload_form(&self) -> UploadForm {
        UploadForm::new(
            self.encrypted_file.clone(),
            &self.original_filename,
            &self.content_type,
            self.file_nonce.as_bytes(),
            &self.digest,
            &self.wrapped_key.to_bytes(),
        )
    }

    /// The stored envelope, once the blob store has assigned an id.
    pub fn into_envelope(self, file_id: FileId) -> FileEnvelope {
        let wrapped_key = self.wrapped_key.to_bytes();
        FileEnvelope {
            file_id,
            encrypted_file: self.encrypted_file,
            file_nonce: *self.file_nonce.as_bytes(),
            wrapped_key,
            content_digest: self.digest,
            original_filename: self.original_filename,
            content_type: self.content_type,
        }
    }
}

pub struct EnvelopeBuilder {
    wrapper: Arc<KeyWrapper>,
    cipher: Arc<dyn SymmetricCipher>,
    strategy: WrapStrategy,
}

impl EnvelopeBuilder {
    pub fn new(wrapper: Arc<KeyWrapper>, strategy: WrapStrategy) -> Self {
        Self {
            wrapper,
            cipher: Arc::new(AesGcmCipher),
            strategy,
        }
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn SymmetricCipher>) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn strategy(&self) -> WrapStrategy {
        self.strategy
    }

    /// Encrypt `plaintext` under a fresh file key and wrap that key for the
    /// connected wallet.
    ///
    /// May prompt the wallet. A rejection aborts with `UserRejected` and
    /// nothing is returned for the caller to persist.
    pub async fn build(
        &self,
        plaintext: &[u8],
        filename: &str,
        content_type: &str,
    ) -> SafeTransferResult<EnvelopeDraft> {
        let file_key = generate_file_key();
        let file_nonce = Nonce::generate();

        let encrypted_file = self
            .cipher
            .encrypt(file_key.as_bytes(), &file_nonce, plaintext)?;
        let digest = digest(plaintext);

        let wrapped_key = self.wrapper.wrap(&file_key, self.strategy).await?;
        drop(file_key);

        info!(
            file = %filename,
            size = plaintext.len(),
            encrypted = encrypted_file.len(),
            %digest,
            strategy = %self.strategy,
            "envelope built"
        );

        Ok(EnvelopeDraft {
            encrypted_file,
            file_nonce,
            wrapped_key,
            digest,
            original_filename: filename.to_string(),
            content_type: content_type.to_string(),
        })
    }
}

/// Where the envelope being opened came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Uploaded earlier in this session; its digest was anchored by us.
    CurrentSession,
    /// Fetched from storage; must be checked against the chain first.
    Stored,
}

pub struct EnvelopeOpener {
    wrapper: Arc<KeyWrapper>,
    anchor: Arc<dyn ChainAnchor>,
    cipher: Arc<dyn SymmetricCipher>,
    accept_untagged: bool,
}

impl EnvelopeOpener {
    pub fn new(wrapper: Arc<KeyWrapper>, anchor: Arc<dyn ChainAnchor>) -> Self {
        Self {
            wrapper,
            anchor,
            cipher: Arc::new(AesGcmCipher),
            accept_untagged: true,
        }
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn SymmetricCipher>) -> Self {
        self.cipher = cipher;
        self
    }

    /// Whether wrapped keys written without a strategy tag are readable.
    pub fn accept_untagged(mut self, accept: bool) -> Self {
        self.accept_untagged = accept;
        self
    }

    /// Recover the plaintext of a downloaded payload.
    ///
    /// Order matters: the chain check runs before any wallet prompt or
    /// decryption, and the recomputed digest must equal `expected` even
    /// after AEAD has authenticated the ciphertext.
    pub async fn open(
        &self,
        payload: &EncryptedPayload,
        expected: &ContentDigest,
        provenance: Provenance,
    ) -> SafeTransferResult<Vec<u8>> {
        let owner = self.wrapper.deriver().address();

        if provenance == Provenance::Stored {
            debug!(%owner, digest = %expected, "verifying digest against chain registry");
            if !self.anchor.verify(owner, expected).await? {
                warn!(%owner, digest = %expected, "digest not anchored for owner");
                return Err(SafeTransferError::IntegrityViolation(format!(
                    "digest {expected} is not registered on chain for {owner}"
                )));
            }
        }

        let blob = WrappedKeyBlob::from_bytes(&payload.wrapped_key, self.accept_untagged)?;
        let file_nonce = Nonce::from_slice(&payload.file_nonce)?;

        let file_key = self.wrapper.unwrap(&blob).await?;
        let plaintext = self
            .cipher
            .decrypt(file_key.as_bytes(), &file_nonce, &payload.encrypted_file)?;
        drop(file_key);

        let actual = digest(&plaintext);
        if &actual != expected {
            warn!(expected = %expected, %actual, "decrypted content does not match digest");
            return Err(SafeTransferError::IntegrityViolation(format!(
                "decrypted content hashes to {actual}, expected {expected}"
            )));
        }

        info!(size = plaintext.len(), digest = %actual, ?provenance, "envelope opened");
        Ok(plaintext)
    }

    /// Open a stored envelope against its own recorded digest.
    pub async fn open_envelope(
        &self,
        envelope: &FileEnvelope,
        provenance: Provenance,
    ) -> SafeTransferResult<Vec<u8>> {
        let payload = EncryptedPayload {
            encrypted_file: envelope.encrypted_file.clone(),
            wrapped_key: envelope.wrapped_key.clone(),
            file_nonce: envelope.file_nonce.to_vec(),
        };
        self.open(&payload, &envelope.content_digest, provenance).await
    }
}
