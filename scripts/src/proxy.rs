//! Transparent-proxy deployment, upgrade and import over an alloy provider.
//!
//! Every proxy the scripts touch is recorded in a per-network manifest so the
//! implementation and admin behind each registered address can be audited
//! without reading chain storage.

use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy::{
    json_abi::JsonAbi,
    network::TransactionBuilder,
    primitives::{Address, Bytes},
    providers::Provider,
    rpc::types::{TransactionReceipt, TransactionRequest},
    sol_types::{SolCall, SolValue},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    artifacts::read_artifact,
    constants::{
        INITIALIZER, NUM_DEPLOY_CONFIRMATIONS, PROXY_ADMIN_STORAGE_SLOT,
        PROXY_CONSTRUCTOR_INPUTS, PROXY_IMPLEMENTATION_STORAGE_SLOT,
    },
    errors::ScriptError,
    orchestrator::ProxyUpgrader,
    solidity::{initializeCall, IProxyAdmin},
    types::ContractArtifact,
    utils::read_address_slot,
};

// ------------
// | Manifest |
// ------------

/// A proxy known to the scripts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEntry {
    /// The proxy address
    pub address: Address,
    /// The qualified name of the implementation contract
    pub contract: String,
    /// The current implementation address
    pub implementation: Address,
    /// The proxy admin address
    pub admin: Address,
}

/// The proxies deployed or imported on one network
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyManifest {
    /// The known proxies
    pub proxies: Vec<ProxyEntry>,
}

impl ProxyManifest {
    /// Look up a proxy by address
    pub fn get(&self, address: Address) -> Option<&ProxyEntry> {
        self.proxies.iter().find(|p| p.address == address)
    }

    /// Insert or replace the entry for a proxy
    pub fn upsert(&mut self, entry: ProxyEntry) {
        match self.proxies.iter_mut().find(|p| p.address == entry.address) {
            Some(existing) => *existing = entry,
            None => self.proxies.push(entry),
        }
    }
}

/// Reads and writes the manifest of one network
#[derive(Clone, Debug)]
pub struct ManifestStore {
    /// The manifest file
    path: PathBuf,
}

impl ManifestStore {
    /// The manifest of `network` inside `dir`
    pub fn new(dir: &Path, network: &str) -> Self {
        Self {
            path: dir.join(format!("{network}.json")),
        }
    }

    /// Load the manifest, empty if none exists yet
    pub fn load(&self) -> Result<ProxyManifest, ScriptError> {
        if !self.path.exists() {
            return Ok(ProxyManifest::default());
        }
        let bytes = fs::read(&self.path).map_err(|e| ScriptError::Manifest(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ScriptError::Manifest(e.to_string()))
    }

    /// Record a proxy in the manifest
    pub fn record(&self, entry: ProxyEntry) -> Result<(), ScriptError> {
        let mut manifest = self.load()?;
        manifest.upsert(entry);

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| ScriptError::Manifest(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| ScriptError::Manifest(e.to_string()))?;
        fs::write(&self.path, json + "\n").map_err(|e| ScriptError::Manifest(e.to_string()))
    }

    /// Record a proxy that is already live on chain, logging rather than
    /// returning a failure to write the manifest
    pub fn record_or_warn(&self, entry: ProxyEntry) {
        let address = entry.address;
        if let Err(e) = self.record(entry) {
            warn!(
                "proxy {address:#x} is live but {} was not updated: {e}",
                self.path.display()
            );
        }
    }
}

// ------------
// | Upgrader |
// ------------

/// A [`ProxyUpgrader`] submitting transactions through an alloy provider
pub struct AlloyProxyUpgrader<P> {
    /// The signing provider
    provider: P,
    /// The owner of newly deployed proxies
    owner: Address,
    /// The prebuilt TransparentUpgradeableProxy artifact
    proxy_artifact: PathBuf,
    /// The network's proxy manifest
    manifest: ManifestStore,
}

impl<P: Provider> AlloyProxyUpgrader<P> {
    /// Create an upgrader; new proxies are owned by `owner`
    pub fn new(
        provider: P,
        owner: Address,
        proxy_artifact: PathBuf,
        manifest: ManifestStore,
    ) -> Self {
        Self {
            provider,
            owner,
            proxy_artifact,
            manifest,
        }
    }

    /// Send a contract creation transaction and return the created address
    async fn deploy_code(&self, code: Bytes) -> Result<Address, ScriptError> {
        let tx = TransactionRequest::default().with_deploy_code(code);
        let receipt = self.send(tx).await?;

        receipt.contract_address.ok_or_else(|| {
            ScriptError::ChainSubmissionFailed(format!(
                "no contract address in receipt of {}",
                receipt.transaction_hash
            ))
        })
    }

    /// Send a transaction and wait for a successful receipt
    async fn send(&self, tx: TransactionRequest) -> Result<TransactionReceipt, ScriptError> {
        let receipt = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ScriptError::ChainSubmissionFailed(e.to_string()))?
            .with_required_confirmations(NUM_DEPLOY_CONFIRMATIONS)
            .get_receipt()
            .await
            .map_err(|e| ScriptError::ChainSubmissionFailed(e.to_string()))?;

        check_receipt(receipt)
    }

    /// Read the implementation and admin slots of a proxy
    async fn proxy_slots(&self, proxy: Address) -> Result<(Address, Address), ScriptError> {
        let implementation =
            read_address_slot(&self.provider, proxy, PROXY_IMPLEMENTATION_STORAGE_SLOT).await?;
        let admin = read_address_slot(&self.provider, proxy, PROXY_ADMIN_STORAGE_SLOT).await?;
        Ok((implementation, admin))
    }
}

impl<P: Provider> ProxyUpgrader for AlloyProxyUpgrader<P> {
    async fn deploy_proxy(
        &self,
        artifact: &ContractArtifact,
        initializer: &str,
    ) -> Result<Address, ScriptError> {
        let proxy_artifact = load_proxy_artifact(&self.proxy_artifact)?;
        let init_calldata = initializer_calldata(initializer)?;

        let implementation = self.deploy_code(artifact.bytecode.clone()).await?;
        debug!("{} implementation deployed at {implementation:#x}", artifact.contract_name);

        let constructor_args = (implementation, self.owner, init_calldata).abi_encode_params();
        let code = [proxy_artifact.bytecode.as_ref(), constructor_args.as_slice()].concat();
        let proxy = self.deploy_code(code.into()).await?;

        // The proxy is live from here on, so nothing below may fail the deploy
        match read_address_slot(&self.provider, proxy, PROXY_ADMIN_STORAGE_SLOT).await {
            Ok(admin) => {
                info!("proxy admin for {proxy:#x} deployed at {admin:#x}");
                self.manifest.record_or_warn(ProxyEntry {
                    address: proxy,
                    contract: artifact.qualified_name.clone(),
                    implementation,
                    admin,
                });
            }
            Err(e) => warn!("reading the admin of {proxy:#x}, manifest not updated: {e}"),
        }
        Ok(proxy)
    }

    async fn upgrade_proxy(
        &self,
        proxy: Address,
        artifact: &ContractArtifact,
    ) -> Result<Address, ScriptError> {
        let (_, admin) = self.proxy_slots(proxy).await?;
        let admin_code = self
            .provider
            .get_code_at(admin)
            .await
            .map_err(|e| ScriptError::ChainSubmissionFailed(e.to_string()))?;
        check_admin(proxy, admin, &admin_code)?;

        let implementation = self.deploy_code(artifact.bytecode.clone()).await?;
        debug!("{} implementation deployed at {implementation:#x}", artifact.contract_name);

        let proxy_admin = IProxyAdmin::new(admin, &self.provider);
        let receipt = proxy_admin
            .upgradeAndCall(proxy, implementation, Bytes::new())
            .send()
            .await
            .map_err(|e| ScriptError::ChainSubmissionFailed(e.to_string()))?
            .with_required_confirmations(NUM_DEPLOY_CONFIRMATIONS)
            .get_receipt()
            .await
            .map_err(|e| ScriptError::ChainSubmissionFailed(e.to_string()))?;
        check_receipt(receipt)?;

        let current =
            read_address_slot(&self.provider, proxy, PROXY_IMPLEMENTATION_STORAGE_SLOT).await?;
        check_upgraded(proxy, implementation, current)?;

        self.manifest.record_or_warn(ProxyEntry {
            address: proxy,
            contract: artifact.qualified_name.clone(),
            implementation,
            admin,
        });
        Ok(implementation)
    }

    async fn force_import(
        &self,
        proxy: Address,
        artifact: &ContractArtifact,
    ) -> Result<(), ScriptError> {
        let (implementation, admin) = self.proxy_slots(proxy).await?;
        if implementation.is_zero() {
            return Err(ScriptError::ChainSubmissionFailed(format!(
                "{proxy:#x} is not an EIP-1967 proxy"
            )));
        }

        self.manifest.record(ProxyEntry {
            address: proxy,
            contract: artifact.qualified_name.clone(),
            implementation,
            admin,
        })
    }
}

/// Load the TransparentUpgradeableProxy artifact, rejecting any version whose
/// constructor does not take an initial owner
pub fn load_proxy_artifact(path: &Path) -> Result<ContractArtifact, ScriptError> {
    let artifact = read_artifact(path)?;
    let abi: JsonAbi = serde_json::from_value(Value::Array(artifact.abi.clone()))
        .map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?;

    let inputs: Vec<&str> = abi
        .constructor
        .as_ref()
        .map(|c| c.inputs.iter().map(|p| p.name.as_str()).collect())
        .unwrap_or_default();
    if inputs != PROXY_CONSTRUCTOR_INPUTS {
        return Err(ScriptError::InitializationFailed(format!(
            "{}: constructor takes ({}), expected an OpenZeppelin v5 proxy taking ({})",
            path.display(),
            inputs.join(", "),
            PROXY_CONSTRUCTOR_INPUTS.join(", ")
        )));
    }
    Ok(artifact)
}

/// Calldata for the initializer run through a freshly deployed proxy
pub fn initializer_calldata(initializer: &str) -> Result<Bytes, ScriptError> {
    if initializer != INITIALIZER {
        return Err(ScriptError::CalldataConstruction(format!(
            "unsupported initializer {initializer}"
        )));
    }
    Ok(initializeCall {}.abi_encode().into())
}

/// Fail unless `admin` is a contract able to upgrade `proxy`
fn check_admin(proxy: Address, admin: Address, admin_code: &[u8]) -> Result<(), ScriptError> {
    if admin.is_zero() {
        return Err(ScriptError::ChainSubmissionFailed(format!(
            "{proxy:#x} has no proxy admin, is it a transparent proxy?"
        )));
    }
    if admin_code.is_empty() {
        return Err(ScriptError::ChainSubmissionFailed(format!(
            "admin {admin:#x} of {proxy:#x} has no code, it is not a ProxyAdmin contract"
        )));
    }
    Ok(())
}

/// Fail unless the proxy now points at the new implementation
fn check_upgraded(
    proxy: Address,
    expected: Address,
    current: Address,
) -> Result<(), ScriptError> {
    if current != expected {
        return Err(ScriptError::ChainSubmissionFailed(format!(
            "{proxy:#x} still points at {current:#x} after upgrading to {expected:#x}"
        )));
    }
    Ok(())
}

/// Fail if the transaction reverted
fn check_receipt(receipt: TransactionReceipt) -> Result<TransactionReceipt, ScriptError> {
    if receipt.status() {
        Ok(receipt)
    } else {
        Err(ScriptError::ChainSubmissionFailed(format!(
            "transaction {} reverted",
            receipt.transaction_hash
        )))
    }
}
