//! The registry contract call surface

use async_trait::async_trait;
use safetransfer_core::types::{Address, ChainRecord, ContentDigest, Receipt, TxHash};
use safetransfer_core::SafeTransferResult;
use serde::{Deserialize, Serialize};

/// One element of `getFilesByOwner`'s return tuple, as the ABI names it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub ipfs_cid: String,
    /// `0x`-prefixed bytes32
    pub original_file_hash: String,
    pub timestamp: u64,
}

impl FileRecord {
    pub fn from_chain_record(record: &ChainRecord) -> Self {
        Self {
            ipfs_cid: record.content_id.clone(),
            original_file_hash: record.digest.to_bytes32_hex(),
            timestamp: record.timestamp,
        }
    }

    pub fn into_chain_record(self, owner: Address) -> SafeTransferResult<ChainRecord> {
        Ok(ChainRecord {
            owner,
            content_id: self.ipfs_cid,
            digest: ContentDigest::from_hex(&self.original_file_hash)?,
            timestamp: self.timestamp,
        })
    }
}

#[async_trait]
pub trait RegistryContract: Send + Sync {
    /// Deployed contract address.
    fn address(&self) -> &Address;

    /// Send `addFile(content_id, digest)` from `from`. Returns as soon as
    /// the transaction is accepted, before it is mined.
    async fn add_file(
        &self,
        from: &Address,
        content_id: &str,
        digest: &ContentDigest,
    ) -> SafeTransferResult<TxHash>;

    /// `getFilesByOwner(owner)`, in insertion order.
    async fn get_files_by_owner(&self, owner: &Address) -> SafeTransferResult<Vec<ChainRecord>>;

    /// `eth_getTransactionReceipt`; `None` while the transaction is pending.
    async fn transaction_receipt(&self, tx: &TxHash) -> SafeTransferResult<Option<Receipt>>;
}
