//! Registry contract reached through the connected wallet
//!
//! Transactions are signed and sent by the wallet (`eth_sendTransaction`),
//! reads go through `eth_call`, and confirmation polling reads
//! `eth_getTransactionReceipt`. Calldata is ABI-encoded locally.

use std::sync::Arc;

use async_trait::async_trait;
use safetransfer_core::config::ChainConfig;
use safetransfer_core::types::{Address, ChainRecord, ContentDigest, Receipt, ReceiptStatus, TxHash};
use safetransfer_core::{SafeTransferError, SafeTransferResult, WalletProvider};
use serde_json::{json, Value};
use tracing::debug;

use crate::abi;
use crate::contract::RegistryContract;

pub struct WalletRegistry {
    wallet: Arc<dyn WalletProvider>,
    address: Address,
}

impl WalletRegistry {
    pub fn new(wallet: Arc<dyn WalletProvider>, address: Address) -> Self {
        Self { wallet, address }
    }

    /// Registry at `chain.contract_address`.
    pub fn from_config(wallet: Arc<dyn WalletProvider>, chain: &ChainConfig) -> SafeTransferResult<Self> {
        let address = Address::parse(&chain.contract_address).map_err(|e| {
            SafeTransferError::Config(format!("chain.contract_address: {e}"))
        })?;
        Ok(Self::new(wallet, address))
    }
}

fn hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn expect_str<'a>(value: &'a Value, what: &str) -> SafeTransferResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| SafeTransferError::Malformed(format!("{what}: expected a hex string, got {value}")))
}

fn parse_quantity(value: &Value, what: &str) -> SafeTransferResult<u64> {
    let s = expect_str(value, what)?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| SafeTransferError::Malformed(format!("{what}: {s:?} is not 0x-prefixed")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| SafeTransferError::Malformed(format!("{what}: {s:?}: {e}")))
}

fn parse_receipt(tx: &TxHash, receipt: &Value) -> SafeTransferResult<Option<Receipt>> {
    if receipt.is_null() {
        return Ok(None);
    }
    // a receipt seen before its block is final may still lack a number
    if receipt.get("blockNumber").is_none_or(Value::is_null) {
        return Ok(None);
    }

    let block_number = parse_quantity(&receipt["blockNumber"], "receipt.blockNumber")?;
    let status = match parse_quantity(&receipt["status"], "receipt.status")? {
        1 => ReceiptStatus::Success,
        0 => ReceiptStatus::Reverted,
        other => {
            return Err(SafeTransferError::Malformed(format!(
                "receipt.status: unexpected value {other}"
            )))
        }
    };

    Ok(Some(Receipt {
        tx_hash: tx.clone(),
        block_number,
        status,
    }))
}

#[async_trait]
impl RegistryContract for WalletRegistry {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn add_file(
        &self,
        from: &Address,
        content_id: &str,
        digest: &ContentDigest,
    ) -> SafeTransferResult<TxHash> {
        let data = abi::encode_add_file(content_id, digest);
        let result = self
            .wallet
            .request(
                "eth_sendTransaction",
                json!([{
                    "from": from.as_str(),
                    "to": self.address.as_str(),
                    "data": hex_data(&data),
                }]),
            )
            .await?;
        let tx = TxHash(expect_str(&result, "eth_sendTransaction result")?.to_string());
        debug!(%tx, contract = %self.address, "addFile sent through wallet");
        Ok(tx)
    }

    async fn get_files_by_owner(&self, owner: &Address) -> SafeTransferResult<Vec<ChainRecord>> {
        let data = abi::encode_get_files_by_owner(owner)?;
        let result = self
            .wallet
            .request(
                "eth_call",
                json!([{ "to": self.address.as_str(), "data": hex_data(&data) }, "latest"]),
            )
            .await?;

        let raw = expect_str(&result, "eth_call result")?;
        let bytes = hex::decode(raw.trim_start_matches("0x"))
            .map_err(|e| SafeTransferError::Malformed(format!("eth_call result: {e}")))?;
        abi::decode_file_records(&bytes)?
            .into_iter()
            .map(|record| record.into_chain_record(owner.clone()))
            .collect()
    }

    async fn transaction_receipt(&self, tx: &TxHash) -> SafeTransferResult<Option<Receipt>> {
        let receipt = self
            .wallet
            .request("eth_getTransactionReceipt", json!([tx.0]))
            .await?;
        parse_receipt(tx, &receipt)
    }
}

impl std::fmt::Debug for WalletRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletRegistry")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
