//! safetransfer-store: persistence for encrypted envelopes
//!
//! The blob store only ever sees ciphertext, the nonce, the wrapped key and
//! the plaintext digest. `HttpBlobStore` talks to the file API over HTTP;
//! `MemoryBlobStore` keeps everything in process for tests and demos.

pub mod http;
pub mod memory;
pub mod siwe;
pub mod store;

pub use http::{Credential, HttpBlobStore, User};
pub use memory::MemoryBlobStore;
pub use siwe::SiweMessage;
pub use store::BlobStore;
