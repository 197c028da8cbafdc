//! In-memory registry contract
//!
//! Mimics a chain closely enough for the anchor and pipeline tests:
//! transactions stay pending for a configurable number of receipt polls,
//! records are appended only when a transaction is mined successfully, and
//! a transaction can be made to revert.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use safetransfer_core::types::{
    Address, ChainRecord, ContentDigest, Receipt, ReceiptStatus, TxHash,
};
use safetransfer_core::SafeTransferResult;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::contract::RegistryContract;

struct Pending {
    record: ChainRecord,
    polls_left: u32,
    revert: bool,
}

#[derive(Default)]
struct Inner {
    records: Vec<ChainRecord>,
    pending: HashMap<TxHash, Pending>,
    receipts: HashMap<TxHash, Receipt>,
    block_number: u64,
    tx_count: u64,
    confirm_after_polls: u32,
    revert_next: bool,
}

pub struct MemoryRegistry {
    address: Address,
    inner: Mutex<Inner>,
}

impl MemoryRegistry {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            inner: Mutex::new(Inner {
                block_number: 1,
                ..Inner::default()
            }),
        }
    }

    /// Number of receipt polls a new transaction stays pending for.
    pub fn set_confirm_after_polls(&self, polls: u32) {
        self.lock().confirm_after_polls = polls;
    }

    /// Make the next submitted transaction revert when mined.
    pub fn revert_next(&self) {
        self.lock().revert_next = true;
    }

    /// Transactions submitted so far, mined or not.
    pub fn submitted(&self) -> u64 {
        self.lock().tx_count
    }

    pub fn records(&self) -> Vec<ChainRecord> {
        self.lock().records.clone()
    }

    /// Seed a record as if it had been mined in an earlier session.
    pub fn insert_record(&self, record: ChainRecord) {
        self.lock().records.push(record);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[async_trait]
impl RegistryContract for MemoryRegistry {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn add_file(
        &self,
        from: &Address,
        content_id: &str,
        digest: &ContentDigest,
    ) -> SafeTransferResult<TxHash> {
        let mut inner = self.lock();
        inner.tx_count += 1;

        let mut hasher = Sha256::new();
        hasher.update(from.as_str().as_bytes());
        hasher.update(content_id.as_bytes());
        hasher.update(digest.as_bytes());
        hasher.update(inner.tx_count.to_be_bytes());
        let tx = TxHash(format!("0x{}", hex::encode(hasher.finalize())));

        let pending = Pending {
            record: ChainRecord {
                owner: from.clone(),
                content_id: content_id.to_string(),
                digest: *digest,
                timestamp: 0,
            },
            polls_left: inner.confirm_after_polls,
            revert: std::mem::take(&mut inner.revert_next),
        };
        inner.pending.insert(tx.clone(), pending);
        debug!(%tx, %from, content_id, "transaction submitted");
        Ok(tx)
    }

    async fn get_files_by_owner(&self, owner: &Address) -> SafeTransferResult<Vec<ChainRecord>> {
        Ok(self
            .lock()
            .records
            .iter()
            .filter(|r| &r.owner == owner)
            .cloned()
            .collect())
    }

    async fn transaction_receipt(&self, tx: &TxHash) -> SafeTransferResult<Option<Receipt>> {
        let mut inner = self.lock();
        if let Some(receipt) = inner.receipts.get(tx) {
            return Ok(Some(receipt.clone()));
        }

        let Some(pending) = inner.pending.get_mut(tx) else {
            // unknown to this node
            return Ok(None);
        };
        if pending.polls_left > 0 {
            pending.polls_left -= 1;
            return Ok(None);
        }

        let Some(mut pending) = inner.pending.remove(tx) else {
            return Ok(None);
        };
        inner.block_number += 1;
        let status = if pending.revert {
            ReceiptStatus::Reverted
        } else {
            pending.record.timestamp = unix_now();
            inner.records.push(pending.record);
            ReceiptStatus::Success
        };
        let receipt = Receipt {
            tx_hash: tx.clone(),
            block_number: inner.block_number,
            status,
        };
        inner.receipts.insert(tx.clone(), receipt.clone());
        debug!(%tx, block = receipt.block_number, ?status, "transaction mined");
        Ok(Some(receipt))
    }
}

impl std::fmt::Debug for MemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegistry")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
