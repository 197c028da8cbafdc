//! Key derivation: wallet signature → wrapping key
//!
//! ECDSA signatures from `personal_sign` are deterministic (RFC 6979), so the
//! same wallet signing the same message always yields the same key. HKDF
//! turns the 65 signature bytes into a uniform 256-bit key.

use hkdf::Hkdf;
use safetransfer_core::{SafeTransferError, SafeTransferResult};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::keys::WrappingKey;
use crate::KEY_SIZE;

const WRAP_KEY_SALT: &[u8] = b"safetransfer/wrap-key/v1";
const WRAP_KEY_INFO: &[u8] = b"safetransfer-file-key-wrap";

/// Decode a `0x`-prefixed hex signature as returned by the wallet.
pub fn parse_signature(signature: &str) -> SafeTransferResult<Vec<u8>> {
    let trimmed = signature.strip_prefix("0x").unwrap_or(signature);
    let bytes = hex::decode(trimmed)
        .map_err(|e| SafeTransferError::Malformed(format!("signature is not hex: {e}")))?;
    if bytes.is_empty() {
        return Err(SafeTransferError::Malformed("empty signature".into()));
    }
    Ok(bytes)
}

/// Derive the wrapping key from raw signature bytes via HKDF-SHA256.
pub fn derive_wrapping_key(signature: &[u8]) -> SafeTransferResult<WrappingKey> {
    let hkdf = Hkdf::<Sha256>::new(Some(WRAP_KEY_SALT), signature);
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(WRAP_KEY_INFO, &mut okm)
        .map_err(|e| anyhow::anyhow!("HKDF expand failed: {e}"))?;
    let key = WrappingKey::from_bytes(okm);
    okm.zeroize();
    Ok(key)
}
