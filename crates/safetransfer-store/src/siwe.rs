//! Sign-In with Ethereum (EIP-4361) message text

use chrono::{DateTime, SecondsFormat, Utc};
use safetransfer_core::types::Address;
use safetransfer_core::{SafeTransferError, SafeTransferResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweMessage {
    pub domain: String,
    pub address: Address,
    pub statement: String,
    pub uri: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
}

impl SiweMessage {
    /// The exact text the wallet signs.
    pub fn prepare(&self) -> String {
        format!(
            "{domain} wants you to sign in with your Ethereum account:\n\
             {address}\n\
             \n\
             {statement}\n\
             \n\
             URI: {uri}\n\
             Version: 1\n\
             Chain ID: {chain_id}\n\
             Nonce: {nonce}\n\
             Issued At: {issued_at}",
            domain = self.domain,
            address = self.address,
            statement = self.statement,
            uri = self.uri,
            chain_id = self.chain_id,
            nonce = self.nonce,
            issued_at = self.issued_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }
}

/// Parse an `eth_chainId` result (`0x`-prefixed hex) into a number.
pub fn parse_chain_id(hex_id: &str) -> SafeTransferResult<u64> {
    let digits = hex_id
        .strip_prefix("0x")
        .or_else(|| hex_id.strip_prefix("0X"))
        .ok_or_else(|| SafeTransferError::Malformed(format!("chain id is not hex: {hex_id}")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| SafeTransferError::Malformed(format!("chain id {hex_id}: {e}")))
}
