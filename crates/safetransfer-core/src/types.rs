use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{SafeTransferError, SafeTransferResult};

/// Length of a content digest (SHA-256, stored on-chain as `bytes32`).
pub const DIGEST_SIZE: usize = 32;

/// An Ethereum account address, normalised to lowercase `0x` + 40 hex chars.
///
/// Wallets hand out EIP-55 checksummed (mixed-case) addresses; registry
/// lookups must not depend on the casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn parse(s: &str) -> SafeTransferResult<Self> {
        let hex_part = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| SafeTransferError::Malformed(format!("address missing 0x prefix: {s}")))?;
        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SafeTransferError::Malformed(format!(
                "address must be 20 hex-encoded bytes: {s}"
            )));
        }
        Ok(Self(format!("0x{}", hex_part.to_ascii_lowercase())))
    }

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = SafeTransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// SHA-256 digest of a file's original plaintext.
///
/// Hex without prefix towards the blob store, `0x`-prefixed towards the chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; DIGEST_SIZE]);

impl ContentDigest {
    pub fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Lowercase hex, 64 chars, no prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// `0x`-prefixed hex, the `bytes32` form used in contract calls.
    pub fn to_bytes32_hex(&self) -> String {
        format!("0x{}", self.to_hex())
    }

    /// Parse 64 hex chars, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> SafeTransferResult<Self> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; DIGEST_SIZE];
        hex::decode_to_slice(trimmed, &mut bytes)
            .map_err(|e| SafeTransferError::Malformed(format!("invalid digest hex '{s}': {e}")))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Blob-store identifier for an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash of a submitted transaction (`0x`-prefixed hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the per-file key was wrapped. Persisted as a tag next to the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WrapStrategy {
    /// Sealed to the wallet's disclosed X25519 encryption public key;
    /// unwrapping is delegated to the wallet.
    Asymmetric,
    /// AES-256-GCM under a key derived from the wallet's signature over a
    /// fixed message.
    SignatureDerived,
}

impl WrapStrategy {
    pub const ASYMMETRIC_TAG: u8 = 0x01;
    pub const SIGNATURE_DERIVED_TAG: u8 = 0x02;

    pub fn tag(self) -> u8 {
        match self {
            Self::Asymmetric => Self::ASYMMETRIC_TAG,
            Self::SignatureDerived => Self::SIGNATURE_DERIVED_TAG,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            Self::ASYMMETRIC_TAG => Some(Self::Asymmetric),
            Self::SIGNATURE_DERIVED_TAG => Some(Self::SignatureDerived),
            _ => None,
        }
    }
}

impl fmt::Display for WrapStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asymmetric => f.write_str("asymmetric"),
            Self::SignatureDerived => f.write_str("signature-derived"),
        }
    }
}

/// The unit persisted by the blob store. Immutable once uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEnvelope {
    pub file_id: FileId,
    pub encrypted_file: Vec<u8>,
    pub file_nonce: [u8; 12],
    /// Tagged wrapped-key blob (`tag || payload`)
    pub wrapped_key: Vec<u8>,
    pub content_digest: ContentDigest,
    pub original_filename: String,
    pub content_type: String,
}

/// One entry of the on-chain registry. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRecord {
    pub owner: Address,
    pub content_id: String,
    pub digest: ContentDigest,
    /// Block timestamp, seconds since the Unix epoch
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// A mined transaction's receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub status: ReceiptStatus,
}

/// Polling policy for `ChainAnchor::await_confirmation`.
#[derive(Debug, Clone)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    /// `None` polls until a receipt appears or the caller cancels.
    pub max_attempts: Option<u32>,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3000),
            max_attempts: None,
        }
    }
}

/// Parameters for `wallet_addEthereumChain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainParams {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// File record returned by the blob store's upload and list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub file_id: FileId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipfs_cid: Option<String>,
    /// Hex digest of the original plaintext as recorded at upload time
    pub original_file_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

impl FileInfo {
    pub fn digest(&self) -> SafeTransferResult<ContentDigest> {
        ContentDigest::from_hex(&self.original_file_hash)
    }

    /// Name to save the decrypted file under.
    pub fn display_name(&self) -> &str {
        self.file_name
            .as_deref()
            .or(self.ipfs_cid.as_deref())
            .unwrap_or(&self.file_id.0)
    }
}

/// Body of `GET /files/{fileId}/download-info` (all fields base64).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInfo {
    pub encrypted_file_data: String,
    pub encrypted_aes_key: String,
    pub iv: String,
}

impl DownloadInfo {
    /// Decode the base64 fields. Nonce length is checked by the cipher,
    /// not here, so a wrong-length IV surfaces as an integrity failure.
    pub fn decode(&self) -> SafeTransferResult<EncryptedPayload> {
        Ok(EncryptedPayload {
            encrypted_file: base64_decode("encryptedFileData", &self.encrypted_file_data)?,
            wrapped_key: base64_decode("encryptedAesKey", &self.encrypted_aes_key)?,
            file_nonce: base64_decode("iv", &self.iv)?,
        })
    }
}

/// Decoded download payload handed to the envelope opener.
#[derive(Debug, Clone)]
pub struct EncryptedPayload {
    pub encrypted_file: Vec<u8>,
    pub wrapped_key: Vec<u8>,
    pub file_nonce: Vec<u8>,
}

/// Multipart fields of `POST /files/upload`.
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub encrypted_file: Vec<u8>,
    pub filename: String,
    pub file_type: String,
    /// base64 of the file nonce
    pub iv: String,
    /// hex ContentDigest
    pub original_file_hash: String,
    /// base64 of the tagged wrapped-key blob
    pub encrypted_aes_key: String,
}

impl UploadForm {
    pub fn new(
        encrypted_file: Vec<u8>,
        filename: &str,
        content_type: &str,
        file_nonce: &[u8],
        digest: &ContentDigest,
        wrapped_key: &[u8],
    ) -> Self {
        Self {
            encrypted_file,
            filename: filename.to_string(),
            file_type: content_type.to_string(),
            iv: STANDARD.encode(file_nonce),
            original_file_hash: digest.to_hex(),
            encrypted_aes_key: STANDARD.encode(wrapped_key),
        }
    }

    /// The download-info body a conforming backend returns for this form.
    pub fn to_download_info(&self) -> DownloadInfo {
        DownloadInfo {
            encrypted_file_data: STANDARD.encode(&self.encrypted_file),
            encrypted_aes_key: self.encrypted_aes_key.clone(),
            iv: self.iv.clone(),
        }
    }
}

fn base64_decode(field: &str, s: &str) -> SafeTransferResult<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|e| SafeTransferError::Malformed(format!("{field}: base64 decode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_normalises_checksum_case() {
        let a = Address::parse("0x55EE4E217290854c3285a6725C97748c04Ee3246").unwrap();
        let b = Address::parse("0x55ee4e217290854c3285a6725c97748c04ee3246").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0x55ee4e217290854c3285a6725c97748c04ee3246");
    }

    #[test]
    fn test_address_rejects_garbage() {
        assert!(Address::parse("55ee4e217290854c3285a6725c97748c04ee3246").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xzzee4e217290854c3285a6725c97748c04ee3246").is_err());
    }

    #[test]
    fn test_digest_hex_forms() {
        let d = ContentDigest::from_bytes([0xab; DIGEST_SIZE]);
        assert_eq!(d.to_hex().len(), 64);
        assert_eq!(d.to_bytes32_hex(), format!("0x{}", d.to_hex()));
        assert_eq!(ContentDigest::from_hex(&d.to_hex()).unwrap(), d);
        assert_eq!(ContentDigest::from_hex(&d.to_bytes32_hex()).unwrap(), d);
        assert!(ContentDigest::from_hex("abcd").is_err());
    }

    #[test]
    fn test_wrap_strategy_tags() {
        for s in [WrapStrategy::Asymmetric, WrapStrategy::SignatureDerived] {
            assert_eq!(WrapStrategy::from_tag(s.tag()), Some(s));
        }
        assert_eq!(WrapStrategy::from_tag(b'{'), None);
    }

    #[test]
    fn test_file_info_wire_names() {
        let json = r#"{"fileId":"42","ipfsCid":"bafy","originalFileHash":"00","fileName":"a.txt"}"#;
        let info: FileInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.file_id, FileId("42".into()));
        assert_eq!(info.display_name(), "a.txt");

        let nameless = FileInfo {
            file_name: None,
            ..info
        };
        assert_eq!(nameless.display_name(), "bafy");
    }

    #[test]
    fn test_upload_form_matches_download_info() {
        let digest = ContentDigest::from_bytes([7u8; DIGEST_SIZE]);
        let form = UploadForm::new(
            vec![1, 2, 3],
            "a.bin",
            "application/octet-stream",
            &[9u8; 12],
            &digest,
            &[2u8; 61],
        );
        let payload = form.to_download_info().decode().unwrap();
        assert_eq!(payload.encrypted_file, vec![1, 2, 3]);
        assert_eq!(payload.file_nonce, vec![9u8; 12]);
        assert_eq!(payload.wrapped_key, vec![2u8; 61]);
        assert_eq!(form.original_file_hash, digest.to_hex());
    }

    #[test]
    fn test_download_info_rejects_bad_base64() {
        let info = DownloadInfo {
            encrypted_file_data: "!!!".into(),
            encrypted_aes_key: String::new(),
            iv: String::new(),
        };
        assert!(matches!(
            info.decode(),
            Err(SafeTransferError::Malformed(_))
        ));
    }
}
