//! File-key wrapping under a wallet-held secret
//!
//! Wire format of a wrapped key:
//! ```text
//! [1 byte: strategy tag][payload]
//!   0x01 asymmetric:        payload = sealed-box JSON (see `sealed`)
//!   0x02 signature-derived: payload = [12 bytes: keyNonce][48 bytes: AES-GCM(FileKey)]
//! ```
//!
//! Blobs written before tagging carry the bare payload. When untagged blobs
//! are accepted, the strategy is inferred: a signature-derived payload is
//! exactly 60 bytes, anything else starting with `{` is sealed-box JSON.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use safetransfer_core::error::RPC_INTERNAL_ERROR;
use safetransfer_core::types::WrapStrategy;
use safetransfer_core::{SafeTransferError, SafeTransferResult};
use tracing::debug;
use zeroize::Zeroizing;

use crate::cipher::{AesGcmCipher, SymmetricCipher};
use crate::deriver::WalletKeyDeriver;
use crate::keys::{FileKey, Nonce};
use crate::sealed::{seal, EthEncryptedData};
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Length of an untagged signature-derived payload.
pub const SIGNATURE_DERIVED_PAYLOAD_LEN: usize = NONCE_SIZE + KEY_SIZE + TAG_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKeyBlob {
    pub strategy: WrapStrategy,
    pub payload: Vec<u8>,
}

impl WrappedKeyBlob {
    /// Serialize with the leading strategy tag.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.payload.len());
        out.push(self.strategy.tag());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn from_bytes(bytes: &[u8], accept_untagged: bool) -> SafeTransferResult<Self> {
        let Some((&tag, rest)) = bytes.split_first() else {
            return Err(SafeTransferError::Malformed("wrapped key is empty".into()));
        };

        // Lengths and the JSON brace keep tagged and untagged forms apart:
        // a random keyNonce may begin with a tag byte, but then the blob is
        // 60 bytes, not 61.
        match WrapStrategy::from_tag(tag) {
            Some(WrapStrategy::Asymmetric)
                if rest.first() == Some(&b'{') && bytes.len() != SIGNATURE_DERIVED_PAYLOAD_LEN =>
            {
                return Ok(Self {
                    strategy: WrapStrategy::Asymmetric,
                    payload: rest.to_vec(),
                });
            }
            Some(WrapStrategy::SignatureDerived) if rest.len() == SIGNATURE_DERIVED_PAYLOAD_LEN => {
                return Ok(Self {
                    strategy: WrapStrategy::SignatureDerived,
                    payload: rest.to_vec(),
                });
            }
            _ => {}
        }

        if !accept_untagged {
            return Err(SafeTransferError::Malformed(format!(
                "wrapped key has no valid strategy tag (first byte {tag:#04x}, {} bytes)",
                bytes.len()
            )));
        }

        // length first: a keyNonce may start with `{`, a sealed-box JSON is
        // never 60 bytes long
        let strategy = if bytes.len() == SIGNATURE_DERIVED_PAYLOAD_LEN {
            WrapStrategy::SignatureDerived
        } else if tag == b'{' {
            WrapStrategy::Asymmetric
        } else {
            return Err(SafeTransferError::Malformed(format!(
                "cannot infer wrap strategy of untagged {}-byte key blob",
                bytes.len()
            )));
        };
        debug!(%strategy, "inferred strategy of untagged wrapped key");
        Ok(Self {
            strategy,
            payload: bytes.to_vec(),
        })
    }
}

/// Wraps and unwraps file keys with the secret the wallet provides.
pub struct KeyWrapper {
    deriver: Arc<WalletKeyDeriver>,
    cipher: AesGcmCipher,
}

impl KeyWrapper {
    pub fn new(deriver: Arc<WalletKeyDeriver>) -> Self {
        Self {
            deriver,
            cipher: AesGcmCipher,
        }
    }

    pub fn deriver(&self) -> &Arc<WalletKeyDeriver> {
        &self.deriver
    }

    pub async fn wrap(
        &self,
        file_key: &FileKey,
        strategy: WrapStrategy,
    ) -> SafeTransferResult<WrappedKeyBlob> {
        let payload = match strategy {
            WrapStrategy::Asymmetric => {
                let public_key = self.deriver.encryption_public_key().await?;
                let encoded = Zeroizing::new(STANDARD.encode(file_key.as_bytes()));
                seal(&public_key, encoded.as_bytes())?
                    .to_json()?
                    .into_bytes()
            }
            WrapStrategy::SignatureDerived => {
                let wrapping_key = self.deriver.derive_key().await?;
                let key_nonce = Nonce::generate();
                let ct = self
                    .cipher
                    .encrypt(wrapping_key.as_bytes(), &key_nonce, file_key.as_bytes())?;
                let mut payload = Vec::with_capacity(SIGNATURE_DERIVED_PAYLOAD_LEN);
                payload.extend_from_slice(key_nonce.as_bytes());
                payload.extend_from_slice(&ct);
                payload
            }
        };
        debug!(%strategy, len = payload.len(), "wrapped file key");
        Ok(WrappedKeyBlob { strategy, payload })
    }

    pub async fn unwrap(&self, blob: &WrappedKeyBlob) -> SafeTransferResult<FileKey> {
        match blob.strategy {
            WrapStrategy::Asymmetric => self.unwrap_asymmetric(&blob.payload).await,
            WrapStrategy::SignatureDerived => self.unwrap_signature_derived(&blob.payload).await,
        }
    }

    async fn unwrap_asymmetric(&self, payload: &[u8]) -> SafeTransferResult<FileKey> {
        // validate locally before spending a wallet prompt on it
        let sealed = EthEncryptedData::from_json(payload)?;
        let json = sealed.to_json()?;

        let decrypted = match self.deriver.wallet_decrypt(&json).await {
            Ok(plaintext) => Zeroizing::new(plaintext),
            Err(SafeTransferError::Wallet { code: RPC_INTERNAL_ERROR, message }) => {
                return Err(SafeTransferError::Integrity(format!(
                    "wallet could not open wrapped key: {message}"
                )))
            }
            // rejection, a missing wallet and account errors pass through
            Err(e) => return Err(e),
        };

        let raw = Zeroizing::new(STANDARD.decode(decrypted.trim()).map_err(|_| {
            SafeTransferError::Integrity("unwrapped key is not valid base64".into())
        })?);
        FileKey::from_slice(&raw)
    }

    async fn unwrap_signature_derived(&self, payload: &[u8]) -> SafeTransferResult<FileKey> {
        if payload.len() != SIGNATURE_DERIVED_PAYLOAD_LEN {
            return Err(SafeTransferError::Integrity(format!(
                "signature-derived wrapped key has wrong size: {} bytes (expected {SIGNATURE_DERIVED_PAYLOAD_LEN})",
                payload.len()
            )));
        }
        let (nonce_bytes, ct) = payload.split_at(NONCE_SIZE);
        let key_nonce = Nonce::from_slice(nonce_bytes)?;

        let wrapping_key = self.deriver.derive_key().await?;
        let raw = Zeroizing::new(self.cipher.decrypt(wrapping_key.as_bytes(), &key_nonce, ct)?);
        FileKey::from_slice(&raw)
    }
}

impl std::fmt::Debug for KeyWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyWrapper")
            .field("deriver", &self.deriver)
            .finish()
    }
}
