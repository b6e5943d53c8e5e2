//! Cross-chain mesh configuration against a recording client

use std::sync::Mutex;

use alloy::primitives::{address, Address, U256};
use eyre::Result;
use serde_json::json;
use vtru_scripts::{
    errors::ScriptError,
    mesh::{members_from_registry, MeshClient, MeshConfigurator, StaticChainDirectory, MESH},
    registry::RegistryDocument,
    types::PeerArrays,
};

/// A submitted `configureClient` call
#[derive(Clone, Debug)]
struct ConfigureCall {
    contract: Address,
    message: Address,
    peers: PeerArrays,
}

/// Records submitted configurations
#[derive(Default)]
struct RecordingClient {
    calls: Mutex<Vec<ConfigureCall>>,
}

impl RecordingClient {
    fn calls(&self) -> Vec<ConfigureCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl MeshClient for RecordingClient {
    async fn configure_client(
        &self,
        contract: Address,
        message: Address,
        peers: &PeerArrays,
    ) -> Result<(), ScriptError> {
        self.calls.lock().unwrap().push(ConfigureCall {
            contract,
            message,
            peers: peers.clone(),
        });
        Ok(())
    }
}

fn configurator() -> MeshConfigurator<StaticChainDirectory, RecordingClient> {
    MeshConfigurator::new(StaticChainDirectory::builtin(), RecordingClient::default())
}

#[tokio::test]
async fn test_configure_base() -> Result<()> {
    let configurator = configurator();
    let plan = configurator.configure_mesh("base").await?;

    assert_eq!(plan.chain_id, 8453);
    assert_eq!(plan.contract, MESH[2].address);
    assert_eq!(
        plan.message,
        address!("e3b3274bb685F37C7f17a604039c77a6A16Cfc2a")
    );

    let calls = configurator.client().calls();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.contract, MESH[2].address);
    assert_eq!(call.message, plan.message);

    let peers = &call.peers;
    assert_eq!(peers.len(), MESH.len());
    assert_eq!(peers.chain_ids.len(), peers.addresses.len());
    assert_eq!(peers.addresses.len(), peers.confirmations.len());
    for (i, member) in MESH.iter().enumerate() {
        assert_eq!(peers.chain_ids[i], U256::from(member.chain_id));
        assert_eq!(peers.addresses[i], member.address);
        assert_eq!(peers.confirmations[i], member.confirmations);
    }
    assert_eq!(
        peers.chain_ids,
        [1490u64, 1, 8453, 56, 137, 43114].map(U256::from).to_vec()
    );
    Ok(())
}

#[tokio::test]
async fn test_network_name_is_case_insensitive() -> Result<()> {
    let configurator = configurator();
    let plan = configurator.configure_mesh("Avalanche").await?;
    assert_eq!(plan.chain_id, 43114);
    assert_eq!(plan.network, "avalanche");
    Ok(())
}

#[tokio::test]
async fn test_unsupported_network_submits_nothing() {
    let configurator = configurator();
    let err = configurator.configure_mesh("testnet").await.unwrap_err();

    assert_eq!(err, ScriptError::UnsupportedNetwork("testnet".to_string()));
    assert!(configurator.client().calls().is_empty());
}

#[tokio::test]
async fn test_unknown_chain_submits_nothing() -> Result<()> {
    let directory = StaticChainDirectory::from_slice(
        br#"{ "1490": { "message": "0x15AC559DA4951c796DB6620fAb286B96840D039A" } }"#,
    )?;
    let configurator = MeshConfigurator::new(directory, RecordingClient::default());

    let err = configurator.configure_mesh("polygon").await.unwrap_err();
    assert_eq!(err, ScriptError::UnknownChain(137));
    assert!(configurator.client().calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_registry_driven_members() -> Result<()> {
    let peer = Address::repeat_byte(0x42);
    let mut registry = serde_json::Map::new();
    for member in MESH {
        registry.insert(
            member.network.to_string(),
            json!({ "VTRUBridge": peer.to_checksum(None) }),
        );
    }
    let doc = RegistryDocument::from_slice(&serde_json::to_vec(&registry)?)?;

    let members = members_from_registry(&doc, "VTRUBridge")?;
    let configurator = configurator().with_members(members);
    let plan = configurator.configure_mesh("bsc").await?;

    assert_eq!(plan.contract, peer);
    assert!(plan.peers.iter().all(|p| p.address == peer));
    assert_eq!(plan.peer_arrays().len(), MESH.len());
    Ok(())
}

#[test]
fn test_registry_driven_members_require_every_network() -> Result<()> {
    let doc = RegistryDocument::from_slice(
        br#"{ "mainnet": { "VTRUBridge": "0x4D5B24179c656A88087eF4369887fD58AB5e8EF3" } }"#,
    )?;

    let err = members_from_registry(&doc, "VTRUBridge").unwrap_err();
    assert_eq!(
        err,
        ScriptError::UnknownContract {
            network: "ethereum".to_string(),
            contract: "VTRUBridge".to_string(),
        }
    );
    Ok(())
}
