//! safetransfer-crypto: hybrid encryption envelope for wallet-owned files
//!
//! Upload: file key + nonce → AES-256-GCM(file) → SHA-256(plaintext) → wrap key under wallet secret
//!
//! Key hierarchy:
//! ```text
//! Wallet
//!   ├── Asymmetric: X25519 encryption public key (eth_getEncryptionPublicKey)
//!   │   └── sealed box x25519-xsalsa20-poly1305 over base64(FileKey); wallet opens it (eth_decrypt)
//!   └── SignatureDerived: personal_sign(fixed message) → HKDF-SHA256 → WrappingKey
//!       └── AES-256-GCM(FileKey, nonce=random_96bit)
//! FileKey (per file, 256-bit random)
//!   └── AES-256-GCM(file bytes, nonce=random_96bit)
//! ```
//!
//! The content digest is taken over the plaintext so anyone holding the file
//! can check it against the on-chain registry, independent of how it was
//! encrypted.

pub mod cipher;
pub mod deriver;
pub mod digest;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod local_wallet;
pub mod sealed;
pub mod wrap;

pub use cipher::{AesGcmCipher, SymmetricCipher};
pub use deriver::WalletKeyDeriver;
pub use digest::digest;
pub use envelope::{EnvelopeBuilder, EnvelopeDraft, EnvelopeOpener, Provenance};
pub use keys::{generate_file_key, FileKey, Nonce, WrappingKey};
pub use local_wallet::LocalWallet;
pub use wrap::{KeyWrapper, WrappedKeyBlob};

/// Size of a symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
