//! AES-256-GCM encryption/decryption of whole buffers
//!
//! Ciphertext format (binary):
//! ```text
//! [N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! The nonce travels separately (the `iv` field of the upload form), so the
//! stored ciphertext of an empty file is exactly the 16-byte tag.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use safetransfer_core::{SafeTransferError, SafeTransferResult};

use crate::keys::Nonce;
use crate::{KEY_SIZE, TAG_SIZE};

/// Authenticated symmetric encryption under a 256-bit key and 96-bit nonce.
///
/// `decrypt` fails closed: any failure is `Integrity` and no partial
/// plaintext is ever returned.
pub trait SymmetricCipher: Send + Sync {
    fn encrypt(
        &self,
        key: &[u8; KEY_SIZE],
        nonce: &Nonce,
        plaintext: &[u8],
    ) -> SafeTransferResult<Vec<u8>>;

    fn decrypt(
        &self,
        key: &[u8; KEY_SIZE],
        nonce: &Nonce,
        ciphertext: &[u8],
    ) -> SafeTransferResult<Vec<u8>>;
}

/// AES-256-GCM, byte-compatible with WebCrypto's `AES-GCM`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmCipher;

impl SymmetricCipher for AesGcmCipher {
    fn encrypt(
        &self,
        key: &[u8; KEY_SIZE],
        nonce: &Nonce,
        plaintext: &[u8],
    ) -> SafeTransferResult<Vec<u8>> {
        let cipher = Aes256Gcm::new(key.into());
        cipher
            .encrypt(nonce.as_bytes().into(), plaintext)
            .map_err(|e| anyhow::anyhow!("AES-GCM encryption failed: {e}").into())
    }

    fn decrypt(
        &self,
        key: &[u8; KEY_SIZE],
        nonce: &Nonce,
        ciphertext: &[u8],
    ) -> SafeTransferResult<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(SafeTransferError::Integrity(format!(
                "ciphertext too short: {} bytes (minimum {TAG_SIZE})",
                ciphertext.len()
            )));
        }

        let cipher = Aes256Gcm::new(key.into());
        cipher
            .decrypt(nonce.as_bytes().into(), ciphertext)
            .map_err(|_| {
                SafeTransferError::Integrity(
                    "AES-GCM authentication failed: wrong key or corrupted data".into(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_file_key;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_file_key();
        let nonce = Nonce::generate();
        let plaintext = b"hello, encrypted world!";

        let ct = AesGcmCipher.encrypt(key.as_bytes(), &nonce, plaintext).unwrap();
        let pt = AesGcmCipher.decrypt(key.as_bytes(), &nonce, &ct).unwrap();

        assert_eq!(&pt, plaintext);
    }

    #[test]
    fn test_empty_plaintext_is_tag_only() {
        let key = generate_file_key();
        let nonce = Nonce::generate();

        let ct = AesGcmCipher.encrypt(key.as_bytes(), &nonce, b"").unwrap();
        assert_eq!(ct.len(), TAG_SIZE);
        assert_eq!(AesGcmCipher.decrypt(key.as_bytes(), &nonce, &ct).unwrap(), b"");
    }

    #[test]
    fn test_encrypted_size() {
        let key = generate_file_key();
        let nonce = Nonce::generate();
        let ct = AesGcmCipher
            .encrypt(key.as_bytes(), &nonce, &vec![0u8; 1000])
            .unwrap();

        // plaintext (1000) + tag (16)
        assert_eq!(ct.len(), 1000 + TAG_SIZE);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let nonce = Nonce::generate();
        let ct = AesGcmCipher
            .encrypt(generate_file_key().as_bytes(), &nonce, b"secret data")
            .unwrap();
        let result = AesGcmCipher.decrypt(generate_file_key().as_bytes(), &nonce, &ct);

        assert!(matches!(result, Err(SafeTransferError::Integrity(_))));
    }

    #[test]
    fn test_decrypt_wrong_nonce() {
        let key = generate_file_key();
        let ct = AesGcmCipher
            .encrypt(key.as_bytes(), &Nonce::generate(), b"secret data")
            .unwrap();
        let result = AesGcmCipher.decrypt(key.as_bytes(), &Nonce::generate(), &ct);

        assert!(matches!(result, Err(SafeTransferError::Integrity(_))));
    }

    #[test]
    fn test_every_bit_flip_detected() {
        let key = generate_file_key();
        let nonce = Nonce::generate();
        let ct = AesGcmCipher.encrypt(key.as_bytes(), &nonce, b"tamper me").unwrap();

        for byte in 0..ct.len() {
            for bit in 0..8 {
                let mut tampered = ct.clone();
                tampered[byte] ^= 1 << bit;
                let result = AesGcmCipher.decrypt(key.as_bytes(), &nonce, &tampered);
                assert!(
                    matches!(result, Err(SafeTransferError::Integrity(_))),
                    "flip of byte {byte} bit {bit} must be detected"
                );
            }
        }
    }

    #[test]
    fn test_truncated_ciphertext() {
        let key = generate_file_key();
        let nonce = Nonce::generate();
        let ct = AesGcmCipher.encrypt(key.as_bytes(), &nonce, b"secret").unwrap();

        for len in [0, TAG_SIZE - 1, ct.len() - 1] {
            let result = AesGcmCipher.decrypt(key.as_bytes(), &nonce, &ct[..len]);
            assert!(matches!(result, Err(SafeTransferError::Integrity(_))));
        }
    }
}
