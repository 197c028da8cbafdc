//! Wallet-side secrets for key wrapping
//!
//! Two capabilities, one per wrap strategy:
//! - asymmetric: the wallet discloses its X25519 encryption public key and
//!   later opens sealed payloads itself; no private material leaves it
//! - signature-derived: the wallet signs a fixed message and the signature is
//!   run through HKDF into a wrapping key
//!
//! Every wallet request goes through one async gate, so an operation never
//! has two prompts open at the same time.

use std::sync::Arc;

use crypto_box::PublicKey;
use safetransfer_core::types::Address;
use safetransfer_core::{SafeTransferResult, WalletProvider};
use tokio::sync::Mutex;
use tracing::debug;

use crate::kdf::{derive_wrapping_key, parse_signature};
use crate::keys::WrappingKey;
use crate::sealed::parse_public_key;

pub struct WalletKeyDeriver {
    wallet: Arc<dyn WalletProvider>,
    address: Address,
    message: String,
    prompt_gate: Mutex<()>,
}

impl WalletKeyDeriver {
    /// `message` must stay fixed for the lifetime of the stored files:
    /// a different message derives a different key.
    pub fn new(wallet: Arc<dyn WalletProvider>, address: Address, message: impl Into<String>) -> Self {
        Self {
            wallet,
            address,
            message: message.into(),
            prompt_gate: Mutex::new(()),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn wallet(&self) -> &Arc<dyn WalletProvider> {
        &self.wallet
    }

    /// Ask the wallet for its encryption public key.
    pub async fn encryption_public_key(&self) -> SafeTransferResult<PublicKey> {
        let _gate = self.prompt_gate.lock().await;
        debug!(address = %self.address, "requesting encryption public key");
        let b64 = self.wallet.get_encryption_public_key(&self.address).await?;
        parse_public_key(&b64)
    }

    /// Have the wallet sign the fixed message and derive the wrapping key.
    pub async fn derive_key(&self) -> SafeTransferResult<WrappingKey> {
        let signature = {
            let _gate = self.prompt_gate.lock().await;
            debug!(address = %self.address, "requesting key-derivation signature");
            self.wallet.sign_message(&self.message, &self.address).await?
        };
        let mut raw = parse_signature(&signature)?;
        let key = derive_wrapping_key(&raw);
        zeroize::Zeroize::zeroize(&mut raw);
        key
    }

    /// Hand a sealed payload back to the wallet to open.
    pub async fn wallet_decrypt(&self, ciphertext_json: &str) -> SafeTransferResult<String> {
        let _gate = self.prompt_gate.lock().await;
        debug!(address = %self.address, "requesting wallet decryption");
        self.wallet.decrypt(ciphertext_json, &self.address).await
    }
}

impl std::fmt::Debug for WalletKeyDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKeyDeriver")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
