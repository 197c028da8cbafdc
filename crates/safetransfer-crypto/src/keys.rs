//! Key material: per-file keys, wallet-derived wrapping keys, nonces

use rand::rngs::OsRng;
use rand::RngCore;
use safetransfer_core::{SafeTransferError, SafeTransferResult};
use zeroize::Zeroize;

use crate::{KEY_SIZE, NONCE_SIZE};

/// A per-file 256-bit encryption key. Zeroized on drop.
pub struct FileKey {
    bytes: [u8; KEY_SIZE],
}

impl FileKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Copy a key out of a decrypted buffer; a wrong length is an
    /// integrity failure, since it means the wrapped blob was not ours.
    pub fn from_slice(bytes: &[u8]) -> SafeTransferResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(SafeTransferError::Integrity(format!(
                "file key has wrong size: {} bytes (expected {KEY_SIZE})",
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self::from_bytes(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A 256-bit key derived from a wallet signature, used only to wrap file keys.
///
/// Zeroized on drop.
pub struct WrappingKey {
    bytes: [u8; KEY_SIZE],
}

impl WrappingKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for WrappingKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for WrappingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappingKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A 96-bit AEAD nonce. Always drawn fresh from the OS RNG, never counted.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> SafeTransferResult<Self> {
        let arr: [u8; NONCE_SIZE] = bytes.try_into().map_err(|_| {
            SafeTransferError::Integrity(format!(
                "nonce has wrong size: {} bytes (expected {NONCE_SIZE})",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

/// Generate a random 256-bit file encryption key.
pub fn generate_file_key() -> FileKey {
    let mut bytes = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut bytes);
    let key = FileKey::from_bytes(bytes);
    bytes.zeroize();
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_key_generation() {
        let k1 = generate_file_key();
        let k2 = generate_file_key();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_file_key_from_slice_length() {
        assert!(FileKey::from_slice(&[1u8; KEY_SIZE]).is_ok());
        let err = FileKey::from_slice(&[1u8; 16]).unwrap_err();
        assert!(matches!(err, SafeTransferError::Integrity(_)));
    }

    #[test]
    fn test_nonce_from_slice_length() {
        assert!(Nonce::from_slice(&[0u8; NONCE_SIZE]).is_ok());
        assert!(matches!(
            Nonce::from_slice(&[0u8; 16]),
            Err(SafeTransferError::Integrity(_))
        ));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let key = FileKey::from_bytes([0x41u8; KEY_SIZE]);
        let printed = format!("{key:?}");
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("65"), "raw byte values must not appear");

        let wrapping = WrappingKey::from_bytes([0x41u8; KEY_SIZE]);
        assert!(format!("{wrapping:?}").contains("REDACTED"));
    }

    #[test]
    fn test_nonces_differ() {
        assert_ne!(Nonce::generate(), Nonce::generate());
    }
}
