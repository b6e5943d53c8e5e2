//! Type definitions used throughout the scripts

use std::path::PathBuf;

use alloy::primitives::{Address, Bytes, U256};
use serde_json::Value;

use crate::constants::{CONTRACTS_SOURCE_DIR, TEST_NETWORK};

/// A contract's interface description, kept verbatim as the ordered list of
/// function, event and error descriptors emitted by the compiler
pub type Abi = Vec<Value>;

/// The outcome of a single lifecycle operation, folded into the registry
#[derive(Clone, Debug, PartialEq)]
pub struct OperationResult {
    /// The (lower-cased) network the operation ran against
    pub network: String,
    /// The name of the contract
    pub contract_name: String,
    /// The proxy address, absent for ABI-only updates
    pub address: Option<Address>,
    /// The contract's current ABI
    pub abi: Abi,
}

impl OperationResult {
    /// A result carrying only an ABI
    pub fn new(network: &str, contract_name: &str, abi: Abi) -> Self {
        Self {
            network: network.to_lowercase(),
            contract_name: contract_name.to_string(),
            address: None,
            abi,
        }
    }

    /// Attach the address confirmed on chain
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Whether the operation targets the test network
    pub fn is_test_network(&self) -> bool {
        self.network == TEST_NETWORK
    }
}

/// A compiled contract resolved from the build artifacts
#[derive(Clone, Debug)]
pub struct ContractArtifact {
    /// The fully qualified name, `<source>:<contract>`
    pub qualified_name: String,
    /// The contract name
    pub contract_name: String,
    /// The source file the contract is defined in
    pub source_name: String,
    /// The contract ABI
    pub abi: Abi,
    /// The creation bytecode
    pub bytecode: Bytes,
    /// The compiler build info this artifact was produced by, if known
    pub build_info: Option<PathBuf>,
}

/// The qualified name under which a project contract is compiled
pub fn qualified_name(contract_name: &str) -> String {
    format!("{CONTRACTS_SOURCE_DIR}/{contract_name}.sol:{contract_name}")
}

/// One trust relationship in the cross-chain mesh
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerRecord {
    /// The peer's public chain ID
    pub chain_id: u64,
    /// The peer contract's address on that chain
    pub address: Address,
    /// The confirmations required before a message from the peer is accepted
    pub confirmations: u16,
}

/// The peer set flattened into the parallel arrays expected by `configureClient`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerArrays {
    /// Peer chain IDs
    pub chain_ids: Vec<U256>,
    /// Peer contract addresses
    pub addresses: Vec<Address>,
    /// Per-peer required confirmations
    pub confirmations: Vec<u16>,
}

impl PeerArrays {
    /// The number of peers
    pub fn len(&self) -> usize {
        self.chain_ids.len()
    }

    /// Whether there are no peers
    pub fn is_empty(&self) -> bool {
        self.chain_ids.is_empty()
    }
}

impl<'a> FromIterator<&'a PeerRecord> for PeerArrays {
    fn from_iter<I: IntoIterator<Item = &'a PeerRecord>>(iter: I) -> Self {
        let mut arrays = PeerArrays::default();
        for peer in iter {
            arrays.chain_ids.push(U256::from(peer.chain_id));
            arrays.addresses.push(peer.address);
            arrays.confirmations.push(peer.confirmations);
        }
        arrays
    }
}
