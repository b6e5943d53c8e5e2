//! Utilities for the deploy scripts.

use std::str::FromStr;

use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::{Address, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use tracing_subscriber::EnvFilter;

use crate::{
    constants::{DEFAULT_LOG_FILTER, NUM_BYTES_ADDRESS, NUM_BYTES_STORAGE_SLOT},
    errors::ScriptError,
};

/// The provider type used by the scripts: an HTTP provider with the
/// deployer's wallet attached
pub type Wallet = DynProvider<Ethereum>;

/// Sets up the client with which to send transactions, signing with the
/// given private key against the given RPC url
pub fn setup_client(priv_key: &str, rpc_url: &str) -> Result<Wallet, ScriptError> {
    let url = Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let signer = PrivateKeySigner::from_str(priv_key)
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .on_http(url);

    Ok(DynProvider::new(provider))
}

/// Sets up a client that can read chain state but not sign
pub fn setup_read_client(rpc_url: &str) -> Result<Wallet, ScriptError> {
    let url = Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    Ok(DynProvider::new(ProviderBuilder::new().on_http(url)))
}

/// The address of the account controlled by the given private key
pub fn signer_address(priv_key: &str) -> Result<Address, ScriptError> {
    PrivateKeySigner::from_str(priv_key)
        .map(|signer| signer.address())
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))
}

/// Set up the global `tracing` subscriber, honouring `RUST_LOG`
pub fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Parse a hex address supplied by the operator
pub fn parse_address(address: &str) -> Result<Address, ScriptError> {
    Address::from_str(address.trim())
        .map_err(|e| ScriptError::CalldataConstruction(format!("invalid address {address}: {e}")))
}

/// Read an address stored in the given storage slot of a contract, as EIP-1967
/// proxies do for their implementation and admin
pub async fn read_address_slot<P: Provider>(
    provider: &P,
    contract: Address,
    slot: &str,
) -> Result<Address, ScriptError> {
    let slot = B256::from_str(slot).map_err(|e| ScriptError::Config(e.to_string()))?;
    let value: U256 = provider
        .get_storage_at(contract, U256::from_be_bytes(slot.0))
        .await
        .map_err(|e| ScriptError::ChainSubmissionFailed(e.to_string()))?;

    let bytes = value.to_be_bytes::<NUM_BYTES_STORAGE_SLOT>();
    Ok(Address::from_slice(
        &bytes[NUM_BYTES_STORAGE_SLOT - NUM_BYTES_ADDRESS..],
    ))
}
