//! SHA-256 content digests of original plaintext

use safetransfer_core::types::ContentDigest;
use sha2::{Digest, Sha256};

/// Hash plaintext bytes. Defined for every input, including empty.
pub fn digest(data: &[u8]) -> ContentDigest {
    ContentDigest::from_bytes(Sha256::digest(data).into())
}
