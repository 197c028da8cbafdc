//! Files created during the current session

use std::collections::HashMap;

use safetransfer_core::types::{Address, ContentDigest, FileId};
use safetransfer_crypto::Provenance;

/// Which files this session uploaded, keyed by the id the blob store
/// returned, with the digest we anchored for each.
#[derive(Debug, Clone)]
pub struct Session {
    owner: Address,
    created: HashMap<FileId, ContentDigest>,
}

impl Session {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            created: HashMap::new(),
        }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn record_upload(&mut self, file_id: FileId, digest: ContentDigest) {
        self.created.insert(file_id, digest);
    }

    pub fn created_here(&self, file_id: &FileId) -> bool {
        self.created.contains_key(file_id)
    }

    /// Digest anchored by this session for `file_id`, if we uploaded it.
    pub fn anchored_digest(&self, file_id: &FileId) -> Option<ContentDigest> {
        self.created.get(file_id).copied()
    }

    pub fn provenance_of(&self, file_id: &FileId) -> Provenance {
        if self.created_here(file_id) {
            Provenance::CurrentSession
        } else {
            Provenance::Stored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance() {
        let owner = Address::parse("0x00000000000000000000000000000000000000aa").unwrap();
        let mut session = Session::new(owner);
        let mine = FileId("mine".into());
        let digest = ContentDigest::from_bytes([1; 32]);
        session.record_upload(mine.clone(), digest);

        assert_eq!(session.provenance_of(&mine), Provenance::CurrentSession);
        assert_eq!(session.anchored_digest(&mine), Some(digest));
        assert_eq!(
            session.provenance_of(&FileId("theirs".into())),
            Provenance::Stored
        );
    }
}
