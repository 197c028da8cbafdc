//! safetransfer-chain: append-only registry of owner → content digest records
//!
//! The registry contract exposes two calls, `addFile(contentId, bytes32)`
//! and `getFilesByOwner(address)`. `RegistryAnchor` turns any
//! `RegistryContract` into a `ChainAnchor`: it submits registrations,
//! polls receipts until they are mined (cancellable, optionally bounded),
//! and answers digest lookups. `WalletRegistry` is the deployed contract
//! reached through the wallet's JSON-RPC; `MemoryRegistry` stands in for
//! it in tests and offline runs.

pub mod abi;
pub mod anchor;
pub mod contract;
pub mod memory;
pub mod network;
pub mod wallet_registry;

pub use anchor::RegistryAnchor;
pub use contract::{FileRecord, RegistryContract};
pub use memory::MemoryRegistry;
pub use network::ensure_network;
pub use wallet_registry::WalletRegistry;
