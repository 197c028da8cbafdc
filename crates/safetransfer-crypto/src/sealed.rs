//! MetaMask-compatible public-key encryption (`x25519-xsalsa20-poly1305`)
//!
//! Produces the same structured ciphertext as `eth-sig-util`'s `encrypt`:
//! ```text
//! { "version": "x25519-xsalsa20-poly1305",
//!   "nonce": base64(24 bytes),
//!   "ephemPublicKey": base64(32 bytes),
//!   "ciphertext": base64(XSalsa20-Poly1305 box) }
//! ```
//!
//! A fresh ephemeral X25519 keypair is drawn per message, so the sender is
//! anonymous and only the holder of the recipient's secret can open it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crypto_box::{aead::Aead, PublicKey, SalsaBox, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use safetransfer_core::{SafeTransferError, SafeTransferResult};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

pub const SEALED_VERSION: &str = "x25519-xsalsa20-poly1305";

/// Size of an XSalsa20 nonce (192-bit)
pub const BOX_NONCE_SIZE: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthEncryptedData {
    pub version: String,
    pub nonce: String,
    pub ephem_public_key: String,
    pub ciphertext: String,
}

impl EthEncryptedData {
    pub fn to_json(&self) -> SafeTransferResult<String> {
        serde_json::to_string(self)
            .map_err(|e| anyhow::anyhow!("sealed payload serialization: {e}").into())
    }

    pub fn from_json(data: &[u8]) -> SafeTransferResult<Self> {
        let parsed: Self = serde_json::from_slice(data)
            .map_err(|e| SafeTransferError::Malformed(format!("sealed payload: {e}")))?;
        if parsed.version != SEALED_VERSION {
            return Err(SafeTransferError::Malformed(format!(
                "unsupported sealed payload version: {}",
                parsed.version
            )));
        }
        Ok(parsed)
    }
}

/// Parse a base64 X25519 public key as returned by `eth_getEncryptionPublicKey`.
pub fn parse_public_key(b64: &str) -> SafeTransferResult<PublicKey> {
    let bytes: [u8; 32] = decode_fixed("encryption public key", b64)?;
    Ok(PublicKey::from(bytes))
}

/// Encrypt `plaintext` to the holder of `recipient`'s secret key.
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> SafeTransferResult<EthEncryptedData> {
    let mut ephemeral_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut ephemeral_bytes);
    let ephemeral = SecretKey::from(ephemeral_bytes);
    ephemeral_bytes.zeroize();

    let mut nonce_bytes = [0u8; BOX_NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = crypto_box::Nonce::from_slice(&nonce_bytes);

    let the_box = SalsaBox::new(recipient, &ephemeral);
    let ciphertext = the_box
        .encrypt(nonce, plaintext)
        .map_err(|e| anyhow::anyhow!("sealed box encryption failed: {e}"))?;

    Ok(EthEncryptedData {
        version: SEALED_VERSION.to_string(),
        nonce: STANDARD.encode(nonce_bytes),
        ephem_public_key: STANDARD.encode(ephemeral.public_key().as_bytes()),
        ciphertext: STANDARD.encode(ciphertext),
    })
}

/// Open a sealed payload with the recipient's secret key.
pub fn open(recipient: &SecretKey, data: &EthEncryptedData) -> SafeTransferResult<Vec<u8>> {
    let nonce_bytes: [u8; BOX_NONCE_SIZE] = decode_fixed("nonce", &data.nonce)?;
    let ephemeral: [u8; 32] = decode_fixed("ephemPublicKey", &data.ephem_public_key)?;
    let ciphertext = STANDARD
        .decode(&data.ciphertext)
        .map_err(|e| SafeTransferError::Malformed(format!("ciphertext: base64 decode: {e}")))?;

    let the_box = SalsaBox::new(&PublicKey::from(ephemeral), recipient);
    the_box
        .decrypt(crypto_box::Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|_| {
            SafeTransferError::Integrity(
                "sealed box authentication failed: wrong key or corrupted data".into(),
            )
        })
}

fn decode_fixed<const N: usize>(field: &str, b64: &str) -> SafeTransferResult<[u8; N]> {
    let bytes = STANDARD
        .decode(b64)
        .map_err(|e| SafeTransferError::Malformed(format!("{field}: base64 decode: {e}")))?;
    bytes.as_slice().try_into().map_err(|_| {
        SafeTransferError::Malformed(format!(
            "{field}: expected {N} bytes, got {}",
            bytes.len()
        ))
    })
}
