//! ensure_network against the in-process wallet.

use safetransfer_chain::ensure_network;
use safetransfer_core::config::ChainConfig;
use safetransfer_core::{SafeTransferError, WalletProvider};
use safetransfer_crypto::LocalWallet;

#[tokio::test]
async fn unknown_chain_is_added_then_selected() {
    let wallet = LocalWallet::generate().unwrap();
    let params = ChainConfig::default().params();
    assert_eq!(wallet.chain_id().await.unwrap(), "0x1");

    ensure_network(&wallet, &params).await.unwrap();
    assert_eq!(wallet.chain_id().await.unwrap(), params.chain_id);
}

#[tokio::test]
async fn already_on_chain_needs_no_prompt() {
    let wallet = LocalWallet::generate().unwrap();
    let params = ChainConfig::default().params();
    ensure_network(&wallet, &params).await.unwrap();
    let prompts = wallet.prompt_count();

    let mut upper = params.clone();
    upper.chain_id = upper.chain_id.to_uppercase().replacen("0X", "0x", 1);
    ensure_network(&wallet, &upper).await.unwrap();
    assert_eq!(wallet.prompt_count(), prompts);
}

#[tokio::test]
async fn known_chain_is_switched_without_adding() {
    let wallet = LocalWallet::generate().unwrap();
    let params = ChainConfig::default().params();
    ensure_network(&wallet, &params).await.unwrap();

    // back to mainnet, then return: one switch prompt only
    wallet.switch_chain("0x1").await.unwrap();
    let prompts = wallet.prompt_count();
    ensure_network(&wallet, &params).await.unwrap();
    assert_eq!(wallet.prompt_count(), prompts + 1);
}

#[tokio::test]
async fn rejected_switch_is_a_cancellation() {
    let wallet = LocalWallet::generate().unwrap();
    wallet.reject_prompts(true);
    let err = ensure_network(&wallet, &ChainConfig::default().params())
        .await
        .unwrap_err();
    assert!(matches!(err, SafeTransferError::UserRejected));
}

#[tokio::test]
async fn missing_wallet_is_reported() {
    let wallet = LocalWallet::generate().unwrap();
    wallet.set_available(false);
    let err = ensure_network(&wallet, &ChainConfig::default().params())
        .await
        .unwrap_err();
    assert!(matches!(err, SafeTransferError::WalletUnavailable(_)));
}
