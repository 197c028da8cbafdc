use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{SafeTransferError, SafeTransferResult};
use crate::types::{ChainParams, ConfirmationPolicy, NativeCurrency, WrapStrategy};

/// Message signed to derive the signature-based wrapping key.
///
/// Changing it makes every key wrapped under the old message unrecoverable.
pub const DEFAULT_DERIVATION_MESSAGE: &str = "SafeTransfer key derivation v1\n\n\
Sign this message to unlock your encrypted files.\n\
This request will not trigger a blockchain transaction or cost any gas.";

/// Top-level configuration (loaded from safetransfer.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeTransferConfig {
    pub blob_store: BlobStoreConfig,
    pub chain: ChainConfig,
    pub crypto: CryptoConfig,
    pub logging: LoggingConfig,
}

impl SafeTransferConfig {
    pub fn from_toml_str(s: &str) -> SafeTransferResult<Self> {
        toml::from_str(s).map_err(|e| SafeTransferError::Config(format!("parsing config: {e}")))
    }

    /// Load from a TOML file, falling back to defaults if it does not exist.
    pub async fn load(path: &Path) -> SafeTransferResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            SafeTransferError::Config(format!("reading config {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            SafeTransferError::Config(format!("parsing config {}: {e}", path.display()))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobStoreConfig {
    /// Base URL of the file API (default: http://localhost:8000/api/v1)
    pub endpoint: String,
    /// Refuse plaintext HTTP endpoints instead of warning
    pub enforce_tls: bool,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Extra attempts for idempotent reads on transport failure
    pub transport_retries: u32,
    /// Linear backoff step between retries, in milliseconds
    pub retry_backoff_ms: u64,
    /// `domain` line of the Sign-In with Ethereum message
    pub siwe_domain: String,
    /// `URI` line of the Sign-In with Ethereum message
    pub siwe_uri: String,
    pub siwe_statement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Hex chain id (default: 0xaa36a7, Sepolia)
    pub chain_id: String,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
    pub currency_name: String,
    pub currency_symbol: String,
    pub currency_decimals: u8,
    /// Address of the file registry contract
    pub contract_address: String,
    /// Receipt polling interval in milliseconds (default: 3000)
    pub poll_interval_ms: u64,
    /// Give up after this many polls (default: unbounded)
    pub max_poll_attempts: Option<u32>,
}

impl ChainConfig {
    pub fn params(&self) -> ChainParams {
        ChainParams {
            chain_id: self.chain_id.clone(),
            chain_name: self.chain_name.clone(),
            native_currency: NativeCurrency {
                name: self.currency_name.clone(),
                symbol: self.currency_symbol.clone(),
                decimals: self.currency_decimals,
            },
            rpc_urls: self.rpc_urls.clone(),
            block_explorer_urls: self.block_explorer_urls.clone(),
        }
    }

    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_poll_attempts,
        }
    }
}

/// Envelope encryption configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Strategy used to wrap keys of new uploads
    pub wrap_strategy: WrapStrategy,
    /// Fixed message signed for signature-derived wrapping keys
    pub derivation_message: String,
    /// Open wrapped keys that predate the strategy tag
    pub accept_untagged_blobs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/api/v1".into(),
            enforce_tls: false,
            request_timeout_secs: 60,
            transport_retries: 2,
            retry_backoff_ms: 500,
            siwe_domain: "localhost:3000".into(),
            siwe_uri: "http://localhost:3000".into(),
            siwe_statement: "Sign in with Ethereum to the app.".into(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: "0xaa36a7".into(),
            chain_name: "Sepolia Test Network".into(),
            rpc_urls: vec!["https://rpc.sepolia.org".into()],
            block_explorer_urls: vec!["https://sepolia.etherscan.io".into()],
            currency_name: "SepoliaETH".into(),
            currency_symbol: "ETH".into(),
            currency_decimals: 18,
            contract_address: "0x55EE4E217290854c3285a6725C97748c04Ee3246".into(),
            poll_interval_ms: 3000,
            max_poll_attempts: None,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            wrap_strategy: WrapStrategy::SignatureDerived,
            derivation_message: DEFAULT_DERIVATION_MESSAGE.into(),
            accept_untagged_blobs: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
