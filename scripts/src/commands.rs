//! Implementations of the script commands, wiring the lifecycle operations to
//! a live chain, the artifacts tree and the network's block explorer

use alloy::{primitives::Address, transports::http::reqwest::Url};
use tracing::info;

use crate::{
    artifacts::HardhatArtifacts,
    cli::{ConfigureArgs, ContractArgs, GlobalArgs, ImportArgs},
    errors::ScriptError,
    mesh::{members_from_registry, AlloyMeshClient, MeshConfigurator, StaticChainDirectory},
    networks::{network_config, NetworkConfig},
    orchestrator::{self, Orchestrator},
    proxy::{AlloyProxyUpgrader, ManifestStore},
    registry::RegistryStore,
    utils::{parse_address, setup_client, setup_read_client, signer_address, Wallet},
    verify::EtherscanVerifier,
};

/// An orchestrator operating on a live network
type LiveOrchestrator =
    Orchestrator<HardhatArtifacts, AlloyProxyUpgrader<Wallet>, EtherscanVerifier<Wallet>>;

/// Deploy a contract behind a new proxy and record it
pub async fn deploy(args: ContractArgs, global: &GlobalArgs) -> Result<(), ScriptError> {
    let orchestrator = live_orchestrator(global, true /* sign */)?;
    orchestrator.deploy(&args.contract_name).await?;
    Ok(())
}

/// Upgrade a registered proxy and record the new ABI
pub async fn upgrade(args: ContractArgs, global: &GlobalArgs) -> Result<(), ScriptError> {
    let orchestrator = live_orchestrator(global, true /* sign */)?;
    orchestrator.upgrade(&args.contract_name).await?;
    Ok(())
}

/// Record an existing proxy in the registry
pub async fn import(args: ImportArgs, global: &GlobalArgs) -> Result<(), ScriptError> {
    let address = parse_address(&args.address)?;
    let orchestrator = live_orchestrator(global, false /* sign */)?;
    orchestrator.import(&args.contract_name, address).await?;
    Ok(())
}

/// Refresh a contract's ABI in the registry
pub fn update_abi(args: ContractArgs, global: &GlobalArgs) -> Result<(), ScriptError> {
    let artifacts = HardhatArtifacts::new(&global.artifacts);
    let store = RegistryStore::new(&global.registry);
    orchestrator::update_abi(&global.network, &artifacts, &store, &args.contract_name)?;
    Ok(())
}

/// Verify a registered proxy on the explorer
pub async fn verify_contract(args: ContractArgs, global: &GlobalArgs) -> Result<(), ScriptError> {
    let orchestrator = live_orchestrator(global, false /* sign */)?;
    orchestrator.verify_contract(&args.contract_name).await
}

/// Configure the network's bridged contract with its mesh peers
pub async fn configure(args: ConfigureArgs, global: &GlobalArgs) -> Result<(), ScriptError> {
    let network = resolve_network(global)?;
    let (client, _) = connect(global, network, true /* sign */)?;

    let directory = match &args.chains {
        Some(path) => StaticChainDirectory::from_file(path)?,
        None => StaticChainDirectory::builtin(),
    };

    let mut configurator = MeshConfigurator::new(directory, AlloyMeshClient::new(client));
    if let Some(contract_name) = &args.contract {
        let doc = RegistryStore::new(&global.registry).load_existing()?;
        configurator = configurator.with_members(members_from_registry(&doc, contract_name)?);
    }

    let plan = configurator.configure_mesh(network.name).await?;
    info!("{} configured on chain {}", plan.network, plan.chain_id);
    Ok(())
}

// -----------
// | Helpers |
// -----------

/// Look up the selected network
fn resolve_network(global: &GlobalArgs) -> Result<&'static NetworkConfig, ScriptError> {
    network_config(&global.network)
        .ok_or_else(|| ScriptError::Config(format!("unknown network {}", global.network)))
}

/// Connect to the network, with the deployer's wallet attached if `sign` is
/// set. Returns the client and the deployer's address, zero when not signing.
fn connect(
    global: &GlobalArgs,
    network: &NetworkConfig,
    sign: bool,
) -> Result<(Wallet, Address), ScriptError> {
    let rpc_url = network.resolve_rpc_url(global.rpc_url.as_deref())?;
    if !sign {
        return Ok((setup_read_client(&rpc_url)?, Address::ZERO));
    }

    let priv_key = global.private_key.as_deref().ok_or_else(|| {
        ScriptError::Config(
            "no deployer key, set DEPLOYER_PRIVATE_KEY or pass --private-key".to_string(),
        )
    })?;
    Ok((setup_client(priv_key, &rpc_url)?, signer_address(priv_key)?))
}

/// Build an orchestrator against the selected network
fn live_orchestrator(global: &GlobalArgs, sign: bool) -> Result<LiveOrchestrator, ScriptError> {
    let network = resolve_network(global)?;
    let (client, owner) = connect(global, network, sign)?;

    let upgrader = AlloyProxyUpgrader::new(
        client.clone(),
        owner,
        global.proxy_artifact.clone(),
        ManifestStore::new(&global.manifest_dir, network.name),
    );

    let verifier = network
        .explorer
        .map(|explorer| {
            let api_url =
                Url::parse(explorer.api_url).map_err(|e| ScriptError::Config(e.to_string()))?;
            let api_key = global.explorer_api_key.clone().unwrap_or_default();
            Ok::<_, ScriptError>(EtherscanVerifier::new(api_url, api_key, client.clone()))
        })
        .transpose()?;

    let orchestrator = Orchestrator::new(
        network.name,
        HardhatArtifacts::new(&global.artifacts),
        upgrader,
        verifier,
        RegistryStore::new(&global.registry),
    )
    .with_explorer(network.explorer.map(|e| e.browser_url.to_string()));
    Ok(orchestrator)
}
