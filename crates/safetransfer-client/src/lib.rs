//! safetransfer-client: the end-to-end upload and download flows
//!
//! Upload: encrypt + wrap → `addFile` on chain → wait for the receipt →
//! persist the envelope to the blob store → remember the file id.
//!
//! Download: fetch download-info → open, verifying against the chain first
//! unless the file was uploaded in this session.

pub mod client;
pub mod retry;
pub mod session;

pub use client::{DownloadedFile, SafeTransferClient, UploadOutcome};
pub use retry::RetryPolicy;
pub use session::Session;
