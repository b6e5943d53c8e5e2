//! The deploy, upgrade, import and ABI-refresh lifecycle operations.
//!
//! Each operation resolves the contract's build artifact, runs the chain side
//! through a [`ProxyUpgrader`], and only after the chain has confirmed the
//! result folds it into the registry. Explorer verification comes last and
//! cannot undo the registry write.

use std::time::Duration;

use alloy::primitives::Address;
use tracing::{info, warn};

use crate::{
    constants::{ABI_KEY, INITIALIZER},
    errors::ScriptError,
    registry::{RegistryDocument, RegistryStore},
    types::{ContractArtifact, OperationResult},
    verify::{VerificationRetrier, Verifier},
};

/// Resolves a contract name to its compiled artifact
pub trait ContractFactory {
    /// Resolve the artifact for `contract_name`, failing with
    /// [`ScriptError::InitializationFailed`] if it is unknown or malformed
    fn resolve(&self, contract_name: &str) -> Result<ContractArtifact, ScriptError>;
}

/// Performs the on-chain transaction sequences of the proxy-upgrade pattern
pub trait ProxyUpgrader {
    /// Deploy the implementation and a proxy in front of it, calling
    /// `initializer` through the proxy. Returns the confirmed proxy address.
    async fn deploy_proxy(
        &self,
        artifact: &ContractArtifact,
        initializer: &str,
    ) -> Result<Address, ScriptError>;

    /// Deploy a fresh implementation and point the proxy at it. Returns the
    /// new implementation address.
    async fn upgrade_proxy(
        &self,
        proxy: Address,
        artifact: &ContractArtifact,
    ) -> Result<Address, ScriptError>;

    /// Adopt an existing proxy that was deployed outside these scripts
    async fn force_import(
        &self,
        proxy: Address,
        artifact: &ContractArtifact,
    ) -> Result<(), ScriptError>;
}

/// Runs lifecycle operations for a single network
pub struct Orchestrator<F, P, V> {
    /// The lower-cased network name
    network: String,
    /// The artifact resolver
    factory: F,
    /// The chain-side proxy operations
    upgrader: P,
    /// Explorer verification, absent on networks without an explorer
    retrier: Option<VerificationRetrier<V>>,
    /// The registry file
    registry: RegistryStore,
    /// The explorer's browser URL, used for log links
    explorer_url: Option<String>,
}

impl<F, P, V> Orchestrator<F, P, V>
where
    F: ContractFactory,
    P: ProxyUpgrader,
    V: Verifier,
{
    /// Create an orchestrator for `network`
    pub fn new(
        network: &str,
        factory: F,
        upgrader: P,
        verifier: Option<V>,
        registry: RegistryStore,
    ) -> Self {
        Self {
            network: network.to_lowercase(),
            factory,
            upgrader,
            retrier: verifier.map(VerificationRetrier::new),
            registry,
            explorer_url: None,
        }
    }

    /// Link logged addresses to the given explorer
    pub fn with_explorer(mut self, explorer_url: Option<String>) -> Self {
        self.explorer_url = explorer_url;
        self
    }

    /// Override the verification settle window
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.retrier = self.retrier.map(|r| r.with_settle(settle));
        self
    }

    /// The network operations run against
    pub fn network(&self) -> &str {
        &self.network
    }

    /// The registry file operations write to
    pub fn registry(&self) -> &RegistryStore {
        &self.registry
    }

    /// The proxy upgrader
    pub fn upgrader(&self) -> &P {
        &self.upgrader
    }

    /// The verification service, if any
    pub fn verifier(&self) -> Option<&V> {
        self.retrier.as_ref().map(VerificationRetrier::verifier)
    }

    // --------------
    // | Operations |
    // --------------

    /// Deploy `contract_name` behind a new proxy, record it and verify it
    pub async fn deploy(&self, contract_name: &str) -> Result<OperationResult, ScriptError> {
        let artifact = self.init(contract_name)?;

        let address = self.upgrader.deploy_proxy(&artifact, INITIALIZER).await?;
        let result = OperationResult::new(&self.network, contract_name, artifact.abi.clone())
            .with_address(address);
        info!(
            "{contract_name} deployed to {}{} at {address:#x} {}",
            self.network,
            test_tag(&result),
            self.link(address)
        );

        self.persist(&result)?;
        self.verify_best_effort(address, &artifact, true /* wait_for_settle */)
            .await;
        Ok(result)
    }

    /// Upgrade the registered proxy of `contract_name` to a fresh
    /// implementation, record the new ABI and verify it
    pub async fn upgrade(&self, contract_name: &str) -> Result<OperationResult, ScriptError> {
        let artifact = self.init(contract_name)?;
        let address = self
            .registry
            .load_existing()?
            .require_address(&self.network, contract_name)?;

        let implementation = self.upgrader.upgrade_proxy(address, &artifact).await?;
        let result = OperationResult::new(&self.network, contract_name, artifact.abi.clone())
            .with_address(address);
        info!(
            "{contract_name} upgraded on {}{} at {address:#x}, implementation {implementation:#x} {}",
            self.network,
            test_tag(&result),
            self.link(address)
        );

        self.persist(&result)?;
        self.verify_best_effort(address, &artifact, true /* wait_for_settle */)
            .await;
        Ok(result)
    }

    /// Adopt the existing proxy at `address` as `contract_name` and record it
    pub async fn import(
        &self,
        contract_name: &str,
        address: Address,
    ) -> Result<OperationResult, ScriptError> {
        let artifact = self.init(contract_name)?;

        self.upgrader.force_import(address, &artifact).await?;
        let result = OperationResult::new(&self.network, contract_name, artifact.abi.clone())
            .with_address(address);
        info!(
            "{contract_name} imported from {} at {address:#x}",
            self.network
        );

        self.persist(&result)?;
        Ok(result)
    }

    /// Refresh the registry's ABI for `contract_name` without touching the chain
    pub fn update_abi(&self, contract_name: &str) -> Result<OperationResult, ScriptError> {
        update_abi(&self.network, &self.factory, &self.registry, contract_name)
    }

    /// Verify the registered proxy of `contract_name` without waiting
    pub async fn verify_contract(&self, contract_name: &str) -> Result<(), ScriptError> {
        check_network(&self.network)?;
        let address = self
            .registry
            .load_existing()?
            .require_address(&self.network, contract_name)?;
        let artifact = self.init(contract_name)?;

        match &self.retrier {
            Some(retrier) => {
                retrier
                    .verify(address, &self.network, &artifact, false /* wait_for_settle */)
                    .await
            }
            None => Err(ScriptError::VerificationFatal(format!(
                "no explorer configured for {}",
                self.network
            ))),
        }
    }

    /// Read the registry as it currently stands on disk
    pub fn snapshot(&self) -> Result<RegistryDocument, ScriptError> {
        self.registry.load()
    }

    // -----------
    // | Helpers |
    // -----------

    /// Resolve the contract's artifact
    fn init(&self, contract_name: &str) -> Result<ContractArtifact, ScriptError> {
        init(&self.network, &self.factory, contract_name)
    }

    /// Fold the result into the registry file
    fn persist(&self, result: &OperationResult) -> Result<(), ScriptError> {
        self.registry.apply(result)?;
        info!("{} updated", self.registry.path().display());
        Ok(())
    }

    /// Verify on the explorer, reporting but never propagating failures
    async fn verify_best_effort(
        &self,
        address: Address,
        artifact: &ContractArtifact,
        wait_for_settle: bool,
    ) {
        let Some(retrier) = &self.retrier else {
            info!("no explorer configured for {}, skipping verification", self.network);
            return;
        };

        if retrier
            .verify(address, &self.network, artifact, wait_for_settle)
            .await
            .is_err()
        {
            warn!(
                "registry was updated; retry verification with `verify-contract {}`",
                artifact.contract_name
            );
        }
    }

    /// An explorer link for `address`, empty if the network has no explorer
    fn link(&self, address: Address) -> String {
        self.explorer_url
            .as_deref()
            .map(|url| crate::networks::address_link(url, address))
            .unwrap_or_default()
    }
}

/// A marker appended to log lines for the test network
fn test_tag(result: &OperationResult) -> &'static str {
    if result.is_test_network() {
        " (test network)"
    } else {
        ""
    }
}

/// Refresh the registry's ABI for `contract_name`, leaving every address in
/// place. Needs neither a chain connection nor a known network.
pub fn update_abi(
    network: &str,
    factory: &impl ContractFactory,
    registry: &RegistryStore,
    contract_name: &str,
) -> Result<OperationResult, ScriptError> {
    let network = network.to_lowercase();
    let artifact = init(&network, factory, contract_name)?;
    let result = OperationResult::new(&network, contract_name, artifact.abi);

    registry.apply(&result)?;
    info!(
        "{contract_name} ABI updated in {}",
        registry.path().display()
    );
    Ok(result)
}

/// Check the network name, then resolve the contract's artifact
fn init(
    network: &str,
    factory: &impl ContractFactory,
    contract_name: &str,
) -> Result<ContractArtifact, ScriptError> {
    check_network(network)?;
    info!("Initializing configuration for {contract_name} on {network}");
    factory.resolve(contract_name).map_err(|e| match e {
        e @ ScriptError::InitializationFailed(_) => e,
        other => ScriptError::InitializationFailed(other.to_string()),
    })
}

/// Fail if `network` would land on the registry's ABI map
fn check_network(network: &str) -> Result<(), ScriptError> {
    if network == ABI_KEY {
        return Err(ScriptError::Config(format!(
            "`{ABI_KEY}` is reserved in the registry and cannot name a network"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::check_network;
    use crate::errors::ScriptError;

    #[test]
    fn test_abi_key_is_not_a_network() {
        assert!(check_network("mainnet").is_ok());
        assert!(matches!(check_network("abi"), Err(ScriptError::Config(_))));
    }
}
