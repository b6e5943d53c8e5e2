//! Cross-chain mesh configuration.
//!
//! Every network in the mesh runs one deployment of the bridged contract. Each
//! deployment is told, in a single `configureClient` call, which message
//! contract delivers to it locally and which peer contracts on which chains it
//! may trust, with how many confirmations.

use std::{collections::HashMap, fs, path::Path};

use alloy::{
    primitives::{address, Address},
    providers::Provider,
};
use itertools::Itertools;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    constants::NUM_DEPLOY_CONFIRMATIONS,
    errors::ScriptError,
    registry::RegistryDocument,
    solidity::IMessageClient,
    types::{PeerArrays, PeerRecord},
};

// ---------------
// | Static data |
// ---------------

/// One network's place in the mesh
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshMember {
    /// The network name
    pub network: &'static str,
    /// The network's public chain ID
    pub chain_id: u64,
    /// The deployed contract on that network
    pub address: Address,
    /// Confirmations required for messages originating on that network
    pub confirmations: u16,
}

impl MeshMember {
    /// The peer record describing this member
    pub fn peer(&self) -> PeerRecord {
        PeerRecord {
            chain_id: self.chain_id,
            address: self.address,
            confirmations: self.confirmations,
        }
    }
}

/// The mesh, in the order peers are submitted on chain
pub const MESH: [MeshMember; 6] = [
    MeshMember {
        network: "mainnet",
        chain_id: 1490,
        address: address!("4D5B24179c656A88087eF4369887fD58AB5e8EF3"),
        confirmations: 1,
    },
    MeshMember {
        network: "ethereum",
        chain_id: 1,
        address: address!("3153F488233132c429175b5FD8199eb775b6C6Ff"),
        confirmations: 1,
    },
    MeshMember {
        network: "base",
        chain_id: 8453,
        address: address!("6793c3172DacaE034B3e84909E200DB285225AB3"),
        confirmations: 1,
    },
    MeshMember {
        network: "bsc",
        chain_id: 56,
        address: address!("6793c3172DacaE034B3e84909E200DB285225AB3"),
        confirmations: 1,
    },
    MeshMember {
        network: "polygon",
        chain_id: 137,
        address: address!("6793c3172DacaE034B3e84909E200DB285225AB3"),
        confirmations: 1,
    },
    MeshMember {
        network: "avalanche",
        chain_id: 43114,
        address: address!("30d414eab3575ff4bF1Ea2c63401BA1D22De231f"),
        confirmations: 1,
    },
];

/// The message contract deployed on each mesh chain
const MESSAGE_CONTRACTS: [(u64, Address); 6] = [
    (1490, address!("15AC559DA4951c796DB6620fAb286B96840D039A")),
    (1, address!("7b67dF6728E294db2eb173ac7c738a4627Ae5e11")),
    (8453, address!("e3b3274bb685F37C7f17a604039c77a6A16Cfc2a")),
    (56, address!("7b67dF6728E294db2eb173ac7c738a4627Ae5e11")),
    (137, address!("1C5800eb5fECB7760D7F1978ad744feA652a7b27")),
    (43114, address!("72E052Fa7f0788e668965d37B6c38C88703B7859")),
];

// -------------------
// | Chain directory |
// -------------------

/// A chain directory entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct ChainEntry {
    /// The inbound message contract on the chain
    pub message: Address,
}

/// Read-only lookup of per-chain messaging configuration
pub trait ChainDirectory {
    /// The entry for `chain_id`, if the chain is known
    fn get(&self, chain_id: u64) -> Option<ChainEntry>;
}

/// A chain directory held in memory
#[derive(Clone, Debug, Default)]
pub struct StaticChainDirectory {
    /// Entries by chain ID
    entries: HashMap<u64, ChainEntry>,
}

impl StaticChainDirectory {
    /// The built-in directory of message contracts
    pub fn builtin() -> Self {
        let entries = MESSAGE_CONTRACTS
            .iter()
            .map(|(chain_id, message)| (*chain_id, ChainEntry { message: *message }))
            .collect();
        Self { entries }
    }

    /// Load a directory from a JSON object keyed by decimal chain ID
    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let bytes = fs::read(path)
            .map_err(|e| ScriptError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_slice(&bytes)
    }

    /// Parse a directory from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ScriptError> {
        let raw: HashMap<String, ChainEntry> =
            serde_json::from_slice(bytes).map_err(|e| ScriptError::Config(e.to_string()))?;

        let entries = raw
            .into_iter()
            .map(|(chain_id, entry)| {
                chain_id
                    .parse::<u64>()
                    .map(|id| (id, entry))
                    .map_err(|e| ScriptError::Config(format!("invalid chain ID {chain_id}: {e}")))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { entries })
    }
}

impl ChainDirectory for StaticChainDirectory {
    fn get(&self, chain_id: u64) -> Option<ChainEntry> {
        self.entries.get(&chain_id).copied()
    }
}

// ----------
// | Client |
// ----------

/// Submits the mesh configuration to a deployed contract
pub trait MeshClient {
    /// Call `configureClient` on `contract` and wait for it to be mined
    async fn configure_client(
        &self,
        contract: Address,
        message: Address,
        peers: &PeerArrays,
    ) -> Result<(), ScriptError>;
}

/// A [`MeshClient`] sending through an alloy provider
pub struct AlloyMeshClient<P> {
    /// The signing provider
    provider: P,
}

impl<P: Provider> AlloyMeshClient<P> {
    /// Create a client sending through `provider`
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: Provider> MeshClient for AlloyMeshClient<P> {
    async fn configure_client(
        &self,
        contract: Address,
        message: Address,
        peers: &PeerArrays,
    ) -> Result<(), ScriptError> {
        let client = IMessageClient::new(contract, &self.provider);
        let receipt = client
            .configureClient(
                message,
                peers.chain_ids.clone(),
                peers.addresses.clone(),
                peers.confirmations.clone(),
            )
            .send()
            .await
            .map_err(|e| ScriptError::ChainSubmissionFailed(e.to_string()))?
            .with_required_confirmations(NUM_DEPLOY_CONFIRMATIONS)
            .get_receipt()
            .await
            .map_err(|e| ScriptError::ChainSubmissionFailed(e.to_string()))?;

        if !receipt.status() {
            return Err(ScriptError::ChainSubmissionFailed(format!(
                "configureClient reverted in {}",
                receipt.transaction_hash
            )));
        }
        Ok(())
    }
}

// ----------------
// | Configurator |
// ----------------

/// The configuration computed for one network
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshPlan {
    /// The network being configured
    pub network: String,
    /// Its chain ID
    pub chain_id: u64,
    /// The contract being configured
    pub contract: Address,
    /// The local inbound message contract
    pub message: Address,
    /// Every peer, in mesh order
    pub peers: Vec<PeerRecord>,
}

impl MeshPlan {
    /// The peers in the parallel-array layout of `configureClient`
    pub fn peer_arrays(&self) -> PeerArrays {
        self.peers.iter().collect()
    }
}

/// Computes and applies the mesh configuration of a network
pub struct MeshConfigurator<D, C> {
    /// The chain directory
    directory: D,
    /// The chain client
    client: C,
    /// The mesh members, in submission order
    members: Vec<MeshMember>,
}

impl<D: ChainDirectory, C: MeshClient> MeshConfigurator<D, C> {
    /// A configurator over the built-in mesh
    pub fn new(directory: D, client: C) -> Self {
        Self {
            directory,
            client,
            members: MESH.to_vec(),
        }
    }

    /// Replace the mesh members
    pub fn with_members(mut self, members: Vec<MeshMember>) -> Self {
        self.members = members;
        self
    }

    /// The chain client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Compute the configuration of `network` without submitting it
    pub fn plan(&self, network: &str) -> Result<MeshPlan, ScriptError> {
        let network = network.to_lowercase();
        let index = self
            .members
            .iter()
            .position(|m| m.network == network)
            .ok_or_else(|| ScriptError::UnsupportedNetwork(network.clone()))?;
        let member = &self.members[index];

        let message = self
            .directory
            .get(member.chain_id)
            .ok_or(ScriptError::UnknownChain(member.chain_id))?
            .message;

        // Every member is submitted, including `network` itself
        let peers = self.members.iter().map(MeshMember::peer).collect();

        Ok(MeshPlan {
            network,
            chain_id: member.chain_id,
            contract: member.address,
            message,
            peers,
        })
    }

    /// Configure the contract on `network` to trust every mesh member
    pub async fn configure_mesh(&self, network: &str) -> Result<MeshPlan, ScriptError> {
        let plan = self.plan(network)?;
        info!(
            "setting remote contract addresses on {} (chain {}), message address {:#x}",
            plan.network, plan.chain_id, plan.message
        );
        debug!(
            "peers: {}",
            plan.peers
                .iter()
                .map(|p| format!("{}={:#x}/{}", p.chain_id, p.address, p.confirmations))
                .join(", ")
        );

        let arrays = plan.peer_arrays();
        self.client
            .configure_client(plan.contract, plan.message, &arrays)
            .await?;

        info!("{:#x} configured with {} peers", plan.contract, arrays.len());
        Ok(plan)
    }
}

/// The built-in mesh with each member's address taken from the registry
pub fn members_from_registry(
    doc: &RegistryDocument,
    contract_name: &str,
) -> Result<Vec<MeshMember>, ScriptError> {
    MESH.iter()
        .map(|member| {
            doc.require_address(member.network, contract_name)
                .map(|address| MeshMember { address, ..*member })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, U256};

    use super::{ChainDirectory, StaticChainDirectory, MESH};
    use crate::{errors::ScriptError, types::PeerArrays};

    #[test]
    fn test_builtin_directory_covers_mesh() {
        let directory = StaticChainDirectory::builtin();
        for member in MESH {
            assert!(directory.get(member.chain_id).is_some(), "{}", member.network);
        }
    }

    #[test]
    fn test_directory_from_json() {
        let directory = StaticChainDirectory::from_slice(
            br#"{ "8453": { "message": "0xe3b3274bb685F37C7f17a604039c77a6A16Cfc2a", "name": "base" } }"#,
        )
        .unwrap();
        assert_eq!(
            directory.get(8453).unwrap().message,
            address!("e3b3274bb685F37C7f17a604039c77a6A16Cfc2a")
        );
        assert!(directory.get(1).is_none());
    }

    #[test]
    fn test_directory_rejects_bad_chain_id() {
        let err = StaticChainDirectory::from_slice(
            br#"{ "base": { "message": "0xe3b3274bb685F37C7f17a604039c77a6A16Cfc2a" } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::Config(_)));
    }

    #[test]
    fn test_peer_arrays_are_index_aligned() {
        let peers: Vec<_> = MESH.iter().map(|m| m.peer()).collect();
        let arrays: PeerArrays = peers.iter().collect();

        assert_eq!(arrays.chain_ids.len(), arrays.addresses.len());
        assert_eq!(arrays.addresses.len(), arrays.confirmations.len());
        for (i, member) in MESH.iter().enumerate() {
            assert_eq!(arrays.chain_ids[i], U256::from(member.chain_id));
            assert_eq!(arrays.addresses[i], member.address);
            assert_eq!(arrays.confirmations[i], member.confirmations);
        }
    }
}
