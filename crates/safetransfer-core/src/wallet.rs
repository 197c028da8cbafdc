//! Wallet provider capability (the EIP-1193 surface the protocol needs)
//!
//! Passed explicitly into the envelope builder/opener so nothing reaches for
//! an ambient browser global and tests can substitute an in-process wallet.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SafeTransferResult;
use crate::types::{Address, ChainParams};

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// `eth_requestAccounts`. The first entry is the active account.
    async fn request_accounts(&self) -> SafeTransferResult<Vec<Address>>;

    /// `eth_getEncryptionPublicKey`: base64 X25519 public key.
    async fn get_encryption_public_key(&self, address: &Address) -> SafeTransferResult<String>;

    /// `eth_decrypt`: the wallet opens a sealed JSON payload with its
    /// private key and returns the UTF-8 plaintext.
    async fn decrypt(&self, ciphertext_json: &str, address: &Address) -> SafeTransferResult<String>;

    /// `personal_sign`: `0x`-prefixed hex signature over `message`.
    async fn sign_message(&self, message: &str, address: &Address) -> SafeTransferResult<String>;

    /// `eth_chainId`: `0x`-prefixed hex chain id.
    async fn chain_id(&self) -> SafeTransferResult<String>;

    /// `wallet_switchEthereumChain`. Unknown chains fail with provider code 4902.
    async fn switch_chain(&self, chain_id: &str) -> SafeTransferResult<()>;

    /// `wallet_addEthereumChain`.
    async fn add_chain(&self, params: &ChainParams) -> SafeTransferResult<()>;

    /// Raw `request({ method, params })` for calls without a typed wrapper,
    /// such as `eth_sendTransaction`, `eth_call` and
    /// `eth_getTransactionReceipt`. Provider errors arrive mapped through
    /// `SafeTransferError::from_rpc`.
    async fn request(&self, method: &str, params: Value) -> SafeTransferResult<Value>;
}
