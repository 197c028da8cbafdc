//! Network selection: make sure the wallet is on the registry's chain

use safetransfer_core::error::RPC_UNRECOGNIZED_CHAIN;
use safetransfer_core::types::ChainParams;
use safetransfer_core::{SafeTransferError, SafeTransferResult, WalletProvider};
use tracing::{debug, info};

fn same_chain(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Switch the wallet to `params.chain_id`, adding the chain first if the
/// wallet does not know it (provider code 4902).
pub async fn ensure_network(
    wallet: &dyn WalletProvider,
    params: &ChainParams,
) -> SafeTransferResult<()> {
    let current = wallet.chain_id().await?;
    if same_chain(&current, &params.chain_id) {
        debug!(chain = %current, "wallet already on registry network");
        return Ok(());
    }

    match wallet.switch_chain(&params.chain_id).await {
        Ok(()) => {
            info!(from = %current, to = %params.chain_id, "switched network");
        }
        Err(e) if e.rpc_code() == Some(RPC_UNRECOGNIZED_CHAIN) => {
            wallet.add_chain(params).await?;
            info!(chain = %params.chain_id, name = %params.chain_name, "network added");

            // some wallets add without switching
            let now = wallet.chain_id().await?;
            if !same_chain(&now, &params.chain_id) {
                wallet.switch_chain(&params.chain_id).await?;
            }
        }
        Err(e) => return Err(e),
    }

    let now = wallet.chain_id().await?;
    if !same_chain(&now, &params.chain_id) {
        return Err(SafeTransferError::Wallet {
            code: RPC_UNRECOGNIZED_CHAIN,
            message: format!("wallet is on {now}, expected {}", params.chain_id),
        });
    }
    Ok(())
}
