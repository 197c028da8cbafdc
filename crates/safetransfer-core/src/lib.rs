pub mod anchor;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;
pub mod wallet;

pub use anchor::ChainAnchor;
pub use error::{SafeTransferError, SafeTransferResult};
pub use wallet::WalletProvider;
