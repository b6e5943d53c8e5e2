//! Definitions of CLI arguments and commands for the contract management scripts

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    commands::{configure, deploy, import, update_abi, upgrade, verify_contract},
    constants::{
        DEFAULT_ARTIFACTS_DIR, DEFAULT_MANIFEST_DIR, DEFAULT_PROXY_ARTIFACT,
        DEFAULT_REGISTRY_PATH, TEST_NETWORK,
    },
    errors::ScriptError,
};

/// Deploy, upgrade and configure upgradeable contracts
#[derive(Parser)]
pub struct Cli {
    /// Options shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Clone)]
pub struct GlobalArgs {
    /// The network to operate on
    #[arg(short, long, env = "NETWORK", default_value = TEST_NETWORK, global = true)]
    pub network: String,

    /// Network RPC URL, overriding the network's default endpoint
    #[arg(short, long, env = "RPC_URL", global = true)]
    pub rpc_url: Option<String>,

    /// Private key of the deployer
    #[arg(
        short,
        long,
        env = "DEPLOYER_PRIVATE_KEY",
        hide_env_values = true,
        global = true
    )]
    pub private_key: Option<String>,

    /// Path to the contract registry file
    #[arg(long, default_value = DEFAULT_REGISTRY_PATH, global = true)]
    pub registry: PathBuf,

    /// Path to the compilation artifacts directory
    #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR, global = true)]
    pub artifacts: PathBuf,

    /// The OpenZeppelin v5 TransparentUpgradeableProxy artifact new proxies
    /// are deployed from
    #[arg(long, default_value = DEFAULT_PROXY_ARTIFACT, global = true)]
    pub proxy_artifact: PathBuf,

    /// Directory holding the per-network proxy manifests
    #[arg(long, default_value = DEFAULT_MANIFEST_DIR, global = true)]
    pub manifest_dir: PathBuf,

    /// API key for the network's block explorer
    #[arg(long, env = "EXPLORER_API_KEY", hide_env_values = true, global = true)]
    pub explorer_api_key: Option<String>,
}

/// The commands exposed by the scripts
#[derive(Subcommand)]
pub enum Command {
    /// Deploy a contract behind a new transparent proxy
    Deploy(ContractArgs),
    /// Upgrade the registered proxy of a contract to a fresh implementation
    Upgrade(ContractArgs),
    /// Adopt a proxy deployed outside these scripts
    Import(ImportArgs),
    /// Refresh a contract's ABI in the registry
    UpdateAbi(ContractArgs),
    /// Verify the registered proxy of a contract on the block explorer
    VerifyContract(ContractArgs),
    /// Point the network's bridged contract at its peers on every mesh chain
    Configure(ConfigureArgs),
}

impl Command {
    /// The command's name, as typed on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Command::Deploy(_) => "deploy",
            Command::Upgrade(_) => "upgrade",
            Command::Import(_) => "import",
            Command::UpdateAbi(_) => "update-abi",
            Command::VerifyContract(_) => "verify-contract",
            Command::Configure(_) => "configure",
        }
    }

    /// Run the command
    pub async fn run(self, global: &GlobalArgs) -> Result<(), ScriptError> {
        match self {
            Command::Deploy(args) => deploy(args, global).await,
            Command::Upgrade(args) => upgrade(args, global).await,
            Command::Import(args) => import(args, global).await,
            Command::UpdateAbi(args) => update_abi(args, global),
            Command::VerifyContract(args) => verify_contract(args, global).await,
            Command::Configure(args) => configure(args, global).await,
        }
    }
}

/// Select a contract by name
#[derive(Args)]
pub struct ContractArgs {
    /// The contract name, as it appears in `contracts/<Name>.sol`
    pub contract_name: String,
}

/// Adopt an existing proxy
#[derive(Args)]
pub struct ImportArgs {
    /// The contract name, as it appears in `contracts/<Name>.sol`
    pub contract_name: String,

    /// The proxy address in hex
    pub address: String,
}

/// Configure the cross-chain mesh
#[derive(Args)]
pub struct ConfigureArgs {
    /// Take peer addresses from this contract's registry entries instead of
    /// the built-in address table
    #[arg(short, long)]
    pub contract: Option<String>,

    /// JSON file mapping chain IDs to their message contracts
    #[arg(long)]
    pub chains: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};
    use crate::constants::DEFAULT_PROXY_ARTIFACT;

    #[test]
    fn test_parse_import() {
        let cli = Cli::try_parse_from([
            "vtru-scripts",
            "--network",
            "Mainnet",
            "import",
            "VEO",
            "0x4D5B24179c656A88087eF4369887fD58AB5e8EF3",
        ])
        .unwrap();

        assert_eq!(cli.global.network, "Mainnet");
        assert_eq!(
            cli.global.proxy_artifact.to_str(),
            Some(DEFAULT_PROXY_ARTIFACT)
        );
        assert_eq!(cli.command.name(), "import");
        match cli.command {
            Command::Import(args) => {
                assert_eq!(args.contract_name, "VEO");
                assert_eq!(args.address, "0x4D5B24179c656A88087eF4369887fD58AB5e8EF3");
            }
            _ => panic!("expected import"),
        }
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "vtru-scripts",
            "configure",
            "--contract",
            "VTRUBridge",
            "--rpc-url",
            "http://localhost:8545",
        ])
        .unwrap();

        assert_eq!(cli.global.rpc_url.as_deref(), Some("http://localhost:8545"));
        match cli.command {
            Command::Configure(args) => {
                assert_eq!(args.contract.as_deref(), Some("VTRUBridge"));
                assert!(args.chains.is_none());
            }
            _ => panic!("expected configure"),
        }
    }
}
