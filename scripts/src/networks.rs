//! Per-network configuration: RPC endpoints, chain IDs and explorers

use alloy::primitives::Address;

use crate::errors::ScriptError;

/// An Etherscan-compatible block explorer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExplorerConfig {
    /// The API endpoint verification requests are posted to
    pub api_url: &'static str,
    /// The human-facing explorer
    pub browser_url: &'static str,
}

/// A network the scripts can target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    /// The network name, as used in the registry
    pub name: &'static str,
    /// The chain ID
    pub chain_id: u64,
    /// The default RPC endpoint, if there is a public one
    pub rpc_url: Option<&'static str>,
    /// The network's explorer, if verification is supported
    pub explorer: Option<ExplorerConfig>,
}

/// The networks known to the scripts
pub const NETWORKS: &[NetworkConfig] = &[
    NetworkConfig {
        name: "testnet",
        chain_id: 14333,
        rpc_url: Some("https://test-rpc.vitruveo.xyz"),
        explorer: Some(ExplorerConfig {
            api_url: "https://test-explorer.vitruveo.xyz/api",
            browser_url: "https://test-explorer.vitruveo.xyz",
        }),
    },
    NetworkConfig {
        name: "mainnet",
        chain_id: 1490,
        rpc_url: Some("https://rpc.vitruveo.xyz"),
        explorer: Some(ExplorerConfig {
            api_url: "https://explorer.vitruveo.xyz/api",
            browser_url: "https://explorer.vitruveo.xyz",
        }),
    },
    NetworkConfig {
        name: "local",
        chain_id: 31337,
        rpc_url: Some("http://localhost:8545"),
        explorer: None,
    },
    NetworkConfig {
        name: "ethereum",
        chain_id: 1,
        rpc_url: None,
        explorer: None,
    },
    NetworkConfig {
        name: "base",
        chain_id: 8453,
        rpc_url: None,
        explorer: None,
    },
    NetworkConfig {
        name: "bsc",
        chain_id: 56,
        rpc_url: None,
        explorer: None,
    },
    NetworkConfig {
        name: "polygon",
        chain_id: 137,
        rpc_url: None,
        explorer: None,
    },
    NetworkConfig {
        name: "avalanche",
        chain_id: 43114,
        rpc_url: None,
        explorer: None,
    },
];

/// Look up a network by (case-insensitive) name
pub fn network_config(name: &str) -> Option<&'static NetworkConfig> {
    let name = name.to_lowercase();
    NETWORKS.iter().find(|n| n.name == name)
}

impl NetworkConfig {
    /// The RPC endpoint to use, preferring an explicit override
    pub fn resolve_rpc_url(&self, rpc_override: Option<&str>) -> Result<String, ScriptError> {
        rpc_override
            .or(self.rpc_url)
            .map(str::to_string)
            .ok_or_else(|| {
                ScriptError::Config(format!(
                    "no default RPC endpoint for {}, pass --rpc-url",
                    self.name
                ))
            })
    }
}

/// A link to the proxy page of `address` on an explorer
pub fn address_link(browser_url: &str, address: Address) -> String {
    format!(
        "{}/address/{}/read-proxy#address-tabs",
        browser_url.trim_end_matches('/'),
        address.to_checksum(None)
    )
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::{address_link, network_config};

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(network_config("TestNet").unwrap().chain_id, 14333);
        assert!(network_config("goerli").is_none());
    }

    #[test]
    fn test_rpc_override() {
        let base = network_config("base").unwrap();
        assert!(base.resolve_rpc_url(None).is_err());
        assert_eq!(
            base.resolve_rpc_url(Some("http://node:8545")).unwrap(),
            "http://node:8545"
        );
    }

    #[test]
    fn test_address_link() {
        let link = address_link(
            "https://test-explorer.vitruveo.xyz/",
            address!("4D5B24179c656A88087eF4369887fD58AB5e8EF3"),
        );
        assert_eq!(
            link,
            "https://test-explorer.vitruveo.xyz/address/0x4D5B24179c656A88087eF4369887fD58AB5e8EF3/read-proxy#address-tabs"
        );
    }
}
