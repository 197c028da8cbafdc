//! Chain anchor capability: on-chain registration and lookup of content digests

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SafeTransferResult;
use crate::types::{Address, ConfirmationPolicy, ContentDigest, Receipt, TxHash};

#[async_trait]
pub trait ChainAnchor: Send + Sync {
    /// Submit `addFile(content_id, digest)` on behalf of `owner`.
    async fn register(
        &self,
        owner: &Address,
        content_id: &str,
        digest: &ContentDigest,
    ) -> SafeTransferResult<TxHash>;

    /// Poll until the transaction is mined.
    ///
    /// A failed receipt is `TransactionReverted`, never `Ok`. Cancelling the
    /// token ends the wait with `Cancelled`; a reached `max_attempts` ends it
    /// with `ConfirmationTimeout`.
    async fn await_confirmation(
        &self,
        tx: &TxHash,
        policy: &ConfirmationPolicy,
        cancel: &CancellationToken,
    ) -> SafeTransferResult<Receipt>;

    /// Whether `owner`'s registry contains `digest`. Absence is `Ok(false)`.
    async fn verify(&self, owner: &Address, digest: &ContentDigest) -> SafeTransferResult<bool>;
}
