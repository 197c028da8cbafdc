//! In-process wallet holding its own secrets
//!
//! Implements the same provider surface as a browser wallet: an Ed25519 key
//! for deterministic `personal_sign`-style signatures and an X25519 key for
//! `eth_getEncryptionPublicKey`/`eth_decrypt`. Used by headless callers and
//! by the test suites, which also drive its availability and rejection
//! switches and read its prompt counters.
//!
//! There is no node behind it: raw JSON-RPC calls (`eth_sendTransaction`,
//! `eth_call`, receipts) are answered from scripted responses, and every
//! call is recorded so tests can inspect the exact payloads sent.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use safetransfer_core::error::{
    RPC_INTERNAL_ERROR, RPC_UNAUTHORIZED, RPC_UNRECOGNIZED_CHAIN, RPC_UNSUPPORTED_METHOD,
    RPC_USER_REJECTED,
};
use safetransfer_core::types::{Address, ChainParams};
use safetransfer_core::{SafeTransferError, SafeTransferResult, WalletProvider};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::sealed::{open, EthEncryptedData};

const MAINNET_CHAIN_ID: &str = "0x1";

struct ChainState {
    current: String,
    known: HashSet<String>,
}

type ScriptedReply = Result<Value, (i64, String)>;

#[derive(Default)]
struct RpcScript {
    replies: HashMap<String, VecDeque<ScriptedReply>>,
    log: Vec<(String, Value)>,
}

pub struct LocalWallet {
    signing_key: SigningKey,
    encryption_secret: crypto_box::SecretKey,
    address: Address,
    available: AtomicBool,
    rejecting: AtomicBool,
    prompts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    chain: Mutex<ChainState>,
    rpc: Mutex<RpcScript>,
}

impl LocalWallet {
    /// Deterministically derive both wallet keys from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> SafeTransferResult<Self> {
        let hkdf = Hkdf::<Sha256>::new(None, &seed);
        let mut signing = [0u8; 32];
        let mut encryption = [0u8; 32];
        hkdf.expand(b"safetransfer-local-wallet/signing", &mut signing)
            .map_err(|e| anyhow::anyhow!("HKDF expand for signing key: {e}"))?;
        hkdf.expand(b"safetransfer-local-wallet/encryption", &mut encryption)
            .map_err(|e| anyhow::anyhow!("HKDF expand for encryption key: {e}"))?;

        let signing_key = SigningKey::from_bytes(&signing);
        let encryption_secret = crypto_box::SecretKey::from(encryption);
        signing.zeroize();
        encryption.zeroize();

        // Ethereum-style: last 20 bytes of a hash of the public key
        let pk_hash: [u8; 32] = Sha256::digest(signing_key.verifying_key().as_bytes()).into();
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&pk_hash[12..]);

        let mut known = HashSet::new();
        known.insert(MAINNET_CHAIN_ID.to_string());

        Ok(Self {
            signing_key,
            encryption_secret,
            address: Address::from_bytes(addr),
            available: AtomicBool::new(true),
            rejecting: AtomicBool::new(false),
            prompts: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            chain: Mutex::new(ChainState {
                current: MAINNET_CHAIN_ID.to_string(),
                known,
            }),
            rpc: Mutex::new(RpcScript::default()),
        })
    }

    pub fn generate() -> SafeTransferResult<Self> {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let wallet = Self::from_seed(seed);
        seed.zeroize();
        wallet
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Simulate the provider disappearing (extension disabled, no injection).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make every subsequent prompt fail as if the user clicked "Reject".
    pub fn reject_prompts(&self, reject: bool) {
        self.rejecting.store(reject, Ordering::SeqCst);
    }

    /// Number of prompts shown so far, rejected ones included.
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    /// Highest number of prompts that were open at the same time.
    pub fn max_concurrent_prompts(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Queue the result of the next `method` call. Replies queue per method
    /// and are consumed in order.
    pub fn script_response(&self, method: &str, result: Value) {
        self.rpc_script()
            .replies
            .entry(method.to_string())
            .or_default()
            .push_back(Ok(result));
    }

    /// Queue a provider error for the next `method` call.
    pub fn script_error(&self, method: &str, code: i64, message: &str) {
        self.rpc_script()
            .replies
            .entry(method.to_string())
            .or_default()
            .push_back(Err((code, message.to_string())));
    }

    /// Every raw `request` seen so far, as `(method, params)`.
    pub fn rpc_log(&self) -> Vec<(String, Value)> {
        self.rpc_script().log.clone()
    }

    /// Raw calls of one method, params only.
    pub fn rpc_calls(&self, method: &str) -> Vec<Value> {
        self.rpc_script()
            .log
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    fn next_reply(&self, method: &str) -> SafeTransferResult<Value> {
        let reply = self
            .rpc_script()
            .replies
            .get_mut(method)
            .and_then(VecDeque::pop_front);
        match reply {
            Some(Ok(value)) => Ok(value),
            Some(Err((code, message))) => Err(SafeTransferError::from_rpc(code, message)),
            None => Err(SafeTransferError::from_rpc(
                RPC_UNSUPPORTED_METHOD,
                format!("The requested method \"{method}\" is not supported"),
            )),
        }
    }

    async fn prompt(&self) -> SafeTransferResult<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(SafeTransferError::WalletUnavailable(
                "no wallet provider connected".into(),
            ));
        }

        let open_now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(open_now, Ordering::SeqCst);
        self.prompts.fetch_add(1, Ordering::SeqCst);
        // the user takes a moment to answer
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.rejecting.load(Ordering::SeqCst) {
            return Err(SafeTransferError::from_rpc(
                RPC_USER_REJECTED,
                "User denied the request",
            ));
        }
        Ok(())
    }

    fn check_account(&self, address: &Address) -> SafeTransferResult<()> {
        if address != &self.address {
            return Err(SafeTransferError::from_rpc(
                RPC_UNAUTHORIZED,
                format!("account {address} is not connected"),
            ));
        }
        Ok(())
    }

    fn chain_state(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.chain.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn rpc_script(&self) -> std::sync::MutexGuard<'_, RpcScript> {
        self.rpc.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl WalletProvider for LocalWallet {
    async fn request_accounts(&self) -> SafeTransferResult<Vec<Address>> {
        self.prompt().await?;
        Ok(vec![self.address.clone()])
    }

    async fn get_encryption_public_key(&self, address: &Address) -> SafeTransferResult<String> {
        self.prompt().await?;
        self.check_account(address)?;
        Ok(STANDARD.encode(self.encryption_secret.public_key().as_bytes()))
    }

    async fn decrypt(&self, ciphertext_json: &str, address: &Address) -> SafeTransferResult<String> {
        self.prompt().await?;
        self.check_account(address)?;

        let failed = |reason: String| SafeTransferError::from_rpc(RPC_INTERNAL_ERROR, reason);
        let data = EthEncryptedData::from_json(ciphertext_json.as_bytes())
            .map_err(|e| failed(format!("Decryption failed: {e}")))?;
        let plaintext = open(&self.encryption_secret, &data)
            .map_err(|e| failed(format!("Decryption failed: {e}")))?;
        String::from_utf8(plaintext)
            .map_err(|_| failed("Decryption failed: plaintext is not UTF-8".into()))
    }

    async fn sign_message(&self, message: &str, address: &Address) -> SafeTransferResult<String> {
        self.prompt().await?;
        self.check_account(address)?;

        // personal_sign prefixing, so signatures can't double as transactions
        let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
        let signature = self.signing_key.sign(prefixed.as_bytes());
        Ok(format!("0x{}", hex::encode(signature.to_bytes())))
    }

    async fn chain_id(&self) -> SafeTransferResult<String> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(SafeTransferError::WalletUnavailable(
                "no wallet provider connected".into(),
            ));
        }
        Ok(self.chain_state().current.clone())
    }

    async fn switch_chain(&self, chain_id: &str) -> SafeTransferResult<()> {
        self.prompt().await?;
        let mut state = self.chain_state();
        if !state.known.contains(chain_id) {
            return Err(SafeTransferError::from_rpc(
                RPC_UNRECOGNIZED_CHAIN,
                format!("Unrecognized chain ID \"{chain_id}\""),
            ));
        }
        state.current = chain_id.to_string();
        Ok(())
    }

    async fn add_chain(&self, params: &ChainParams) -> SafeTransferResult<()> {
        self.prompt().await?;
        let mut state = self.chain_state();
        state.known.insert(params.chain_id.clone());
        state.current = params.chain_id.clone();
        Ok(())
    }

    async fn request(&self, method: &str, params: Value) -> SafeTransferResult<Value> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(SafeTransferError::WalletUnavailable(
                "no wallet provider connected".into(),
            ));
        }
        self.rpc_script()
            .log
            .push((method.to_string(), params.clone()));

        match method {
            "eth_chainId" => Ok(Value::String(self.chain_state().current.clone())),
            "eth_accounts" => Ok(json!([self.address.as_str()])),
            "eth_requestAccounts" => {
                self.prompt().await?;
                Ok(json!([self.address.as_str()]))
            }
            "eth_sendTransaction" => {
                self.prompt().await?;
                let from = params
                    .get(0)
                    .and_then(|tx| tx.get("from"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        SafeTransferError::from_rpc(-32602, "transaction is missing `from`")
                    })?;
                self.check_account(&Address::parse(from)?)?;
                self.next_reply(method)
            }
            _ => self.next_reply(method),
        }
    }
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}
