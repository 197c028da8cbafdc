use thiserror::Error;

pub type SafeTransferResult<T> = Result<T, SafeTransferError>;

/// EIP-1193 provider error: the user rejected the request.
pub const RPC_USER_REJECTED: i64 = 4001;
/// EIP-1193 provider error: the requested method/account is not authorized.
pub const RPC_UNAUTHORIZED: i64 = 4100;
/// EIP-1193 provider error: the provider does not support the method.
pub const RPC_UNSUPPORTED_METHOD: i64 = 4200;
/// EIP-1193 provider error: the provider is disconnected from all chains.
pub const RPC_DISCONNECTED: i64 = 4900;
/// EIP-1193 provider error: the provider is not connected to the requested chain.
pub const RPC_CHAIN_DISCONNECTED: i64 = 4901;
/// MetaMask: `wallet_switchEthereumChain` for a chain the wallet does not know.
pub const RPC_UNRECOGNIZED_CHAIN: i64 = 4902;
/// JSON-RPC internal error.
pub const RPC_INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Error)]
pub enum SafeTransferError {
    #[error("user rejected the wallet request")]
    UserRejected,

    #[error("wallet unavailable: {0}")]
    WalletUnavailable(String),

    #[error("wallet error {code}: {message}")]
    Wallet { code: i64, message: String },

    /// AEAD authentication failed. Wrong key and tampered data are
    /// deliberately indistinguishable.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Protocol-level mismatch between on-chain and recomputed digests.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("transaction not confirmed after {attempts} polls")]
    ConfirmationTimeout { attempts: u32 },

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SafeTransferError {
    /// Map an EIP-1193 provider error code onto the taxonomy.
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        match code {
            RPC_USER_REJECTED => Self::UserRejected,
            RPC_DISCONNECTED | RPC_CHAIN_DISCONNECTED => Self::WalletUnavailable(message.into()),
            _ => Self::Wallet {
                code,
                message: message.into(),
            },
        }
    }

    /// True when the operation ended because someone chose to stop it,
    /// so callers can report "cancelled" instead of "failed".
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::UserRejected | Self::Cancelled)
    }

    /// Only transport failures are worth a bounded retry by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Provider error code, if this error came from a wallet RPC.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::UserRejected => Some(RPC_USER_REJECTED),
            Self::Wallet { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_code_mapping() {
        assert!(matches!(
            SafeTransferError::from_rpc(4001, "User denied"),
            SafeTransferError::UserRejected
        ));
        assert!(matches!(
            SafeTransferError::from_rpc(4900, "disconnected"),
            SafeTransferError::WalletUnavailable(_)
        ));
        assert!(matches!(
            SafeTransferError::from_rpc(4902, "unknown chain"),
            SafeTransferError::Wallet { code: 4902, .. }
        ));
        assert!(matches!(
            SafeTransferError::from_rpc(RPC_UNSUPPORTED_METHOD, "eth_call"),
            SafeTransferError::Wallet { code: 4200, .. }
        ));
    }

    #[test]
    fn test_cancellation_is_not_failure() {
        assert!(SafeTransferError::UserRejected.is_cancellation());
        assert!(SafeTransferError::Cancelled.is_cancellation());
        assert!(!SafeTransferError::Integrity("tag".into()).is_cancellation());
        assert!(!SafeTransferError::TransactionReverted("0xabc".into()).is_cancellation());
    }

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(SafeTransferError::Transport("503".into()).is_retryable());
        assert!(!SafeTransferError::TransactionReverted("0xabc".into()).is_retryable());
        assert!(!SafeTransferError::IntegrityViolation("digest".into()).is_retryable());
    }

    #[test]
    fn test_rpc_code_roundtrip() {
        assert_eq!(SafeTransferError::UserRejected.rpc_code(), Some(4001));
        assert_eq!(
            SafeTransferError::from_rpc(-32603, "internal").rpc_code(),
            Some(-32603)
        );
        assert_eq!(SafeTransferError::Cancelled.rpc_code(), None);
    }
}
