//! `ChainAnchor` over a registry contract

use std::sync::Arc;

use async_trait::async_trait;
use safetransfer_core::types::{
    Address, ConfirmationPolicy, ContentDigest, Receipt, ReceiptStatus, TxHash,
};
use safetransfer_core::{ChainAnchor, SafeTransferError, SafeTransferResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::contract::RegistryContract;

pub struct RegistryAnchor {
    contract: Arc<dyn RegistryContract>,
}

impl RegistryAnchor {
    pub fn new(contract: Arc<dyn RegistryContract>) -> Self {
        Self { contract }
    }

    pub fn contract(&self) -> &Arc<dyn RegistryContract> {
        &self.contract
    }
}

#[async_trait]
impl ChainAnchor for RegistryAnchor {
    async fn register(
        &self,
        owner: &Address,
        content_id: &str,
        digest: &ContentDigest,
    ) -> SafeTransferResult<TxHash> {
        let tx = self.contract.add_file(owner, content_id, digest).await?;
        info!(
            %tx,
            %owner,
            content_id,
            digest = %digest.to_bytes32_hex(),
            contract = %self.contract.address(),
            "addFile submitted"
        );
        Ok(tx)
    }

    async fn await_confirmation(
        &self,
        tx: &TxHash,
        policy: &ConfirmationPolicy,
        cancel: &CancellationToken,
    ) -> SafeTransferResult<Receipt> {
        let mut attempts: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                debug!(%tx, attempts, "confirmation wait cancelled");
                return Err(SafeTransferError::Cancelled);
            }

            attempts += 1;
            let receipt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SafeTransferError::Cancelled),
                r = self.contract.transaction_receipt(tx) => r?,
            };

            match receipt {
                Some(receipt) if receipt.status == ReceiptStatus::Success => {
                    info!(%tx, block = receipt.block_number, attempts, "transaction confirmed");
                    return Ok(receipt);
                }
                Some(receipt) => {
                    warn!(%tx, block = receipt.block_number, "transaction reverted");
                    return Err(SafeTransferError::TransactionReverted(format!(
                        "{tx} failed in block {}",
                        receipt.block_number
                    )));
                }
                None => debug!(%tx, attempts, "transaction pending"),
            }

            if policy.max_attempts.is_some_and(|max| attempts >= max) {
                warn!(%tx, attempts, "giving up waiting for confirmation");
                return Err(SafeTransferError::ConfirmationTimeout { attempts });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(%tx, attempts, "confirmation wait cancelled");
                    return Err(SafeTransferError::Cancelled);
                }
                _ = tokio::time::sleep(policy.poll_interval) => {}
            }
        }
    }

    async fn verify(&self, owner: &Address, digest: &ContentDigest) -> SafeTransferResult<bool> {
        let records = self.contract.get_files_by_owner(owner).await?;
        let found = records.iter().any(|r| &r.digest == digest);
        debug!(%owner, %digest, records = records.len(), found, "registry lookup");
        Ok(found)
    }
}

impl std::fmt::Debug for RegistryAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryAnchor")
            .field("contract", self.contract.address())
            .finish()
    }
}
