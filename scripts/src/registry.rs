//! The registry of deployed contracts, persisted in `vtru-contracts.json`.
//!
//! The file is a single JSON object. Every top-level key other than `abi` is a
//! network name mapping contract names to proxy addresses; `abi` maps contract
//! names to the latest ABI seen for that contract on any network. Keys this
//! module does not understand are carried through untouched.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    mem,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy::primitives::Address;
use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Map, Serializer, Value};
use tracing::{debug, warn};

use crate::{
    constants::{ABI_KEY, REGISTRY_INDENT},
    errors::ScriptError,
    types::OperationResult,
};

/// The full registry document
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegistryDocument {
    /// The raw document, in file order
    inner: Map<String, Value>,
}

impl RegistryDocument {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry from the bytes of the file
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ScriptError> {
        match serde_json::from_slice(bytes) {
            Ok(Value::Object(inner)) => Ok(Self { inner }),
            Ok(_) => Err(ScriptError::ReadRegistry(
                "registry root is not a JSON object".to_string(),
            )),
            Err(e) => Err(ScriptError::ReadRegistry(e.to_string())),
        }
    }

    /// Serialize the registry as written to disk: two-space indentation and a
    /// trailing newline
    pub fn to_vec(&self) -> Result<Vec<u8>, ScriptError> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(REGISTRY_INDENT);
        let mut ser = Serializer::with_formatter(&mut buf, formatter);
        self.inner
            .serialize(&mut ser)
            .map_err(|e| ScriptError::WriteRegistry(e.to_string()))?;
        buf.push(b'\n');
        Ok(buf)
    }

    /// The contracts registered on a network
    pub fn network(&self, network: &str) -> Option<&Map<String, Value>> {
        if network == ABI_KEY {
            return None;
        }
        self.inner.get(network).and_then(Value::as_object)
    }

    /// The names of all networks present in the registry
    pub fn networks(&self) -> impl Iterator<Item = &str> {
        self.inner
            .iter()
            .filter(|(key, value)| key.as_str() != ABI_KEY && value.is_object())
            .map(|(key, _)| key.as_str())
    }

    /// The address of a contract on a network, if registered
    pub fn address(&self, network: &str, contract: &str) -> Result<Option<Address>, ScriptError> {
        let Some(value) = self.network(network).and_then(|n| n.get(contract)) else {
            return Ok(None);
        };

        let addr_str = value.as_str().ok_or_else(|| {
            ScriptError::ReadRegistry(format!("address of {contract} on {network} is not a string"))
        })?;
        Address::from_str(addr_str)
            .map(Some)
            .map_err(|e| ScriptError::ReadRegistry(format!("invalid address {addr_str}: {e}")))
    }

    /// The address of a contract on a network, failing if it is not registered
    pub fn require_address(&self, network: &str, contract: &str) -> Result<Address, ScriptError> {
        self.address(network, contract)?
            .ok_or_else(|| ScriptError::UnknownContract {
                network: network.to_string(),
                contract: contract.to_string(),
            })
    }

    /// The latest ABI recorded for a contract
    pub fn abi(&self, contract: &str) -> Option<&Value> {
        self.inner
            .get(ABI_KEY)
            .and_then(Value::as_object)
            .and_then(|abis| abis.get(contract))
    }

    /// Fold an operation result into the registry.
    ///
    /// Only `result.network`'s entry for `result.contract_name` and the
    /// contract's ABI are written; everything else is left as is.
    pub fn merge(mut self, result: &OperationResult) -> Self {
        update_object(&mut self.inner, &result.network, |network| {
            if let Some(address) = result.address {
                network.insert(
                    result.contract_name.clone(),
                    Value::String(address.to_checksum(None)),
                );
            }
        });

        update_object(&mut self.inner, ABI_KEY, |abis| {
            abis.insert(result.contract_name.clone(), Value::Array(result.abi.clone()));
        });

        self
    }
}

/// Apply `f` to the object stored under `key`, creating it if absent
fn update_object(
    map: &mut Map<String, Value>,
    key: &str,
    f: impl FnOnce(&mut Map<String, Value>),
) {
    let slot = map.entry(key.to_string()).or_insert(Value::Null);
    let mut inner = match mem::take(slot) {
        Value::Object(inner) => inner,
        Value::Null => Map::new(),
        _ => {
            warn!("registry key `{key}` is not an object, replacing it");
            Map::new()
        }
    };

    f(&mut inner);
    *slot = Value::Object(inner);
}

/// Fold an operation result into a registry document
pub fn merge(doc: RegistryDocument, result: &OperationResult) -> RegistryDocument {
    doc.merge(result)
}

/// Reads and writes the registry file
#[derive(Clone, Debug)]
pub struct RegistryStore {
    /// The path of the registry file
    path: PathBuf,
}

impl RegistryStore {
    /// A store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path of the registry file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the registry file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the registry, or an empty one if the file does not exist yet
    pub fn load(&self) -> Result<RegistryDocument, ScriptError> {
        if !self.exists() {
            debug!("no registry at {}, starting empty", self.path.display());
            return Ok(RegistryDocument::new());
        }
        self.read()
    }

    /// Load the registry, failing if the file does not exist
    pub fn load_existing(&self) -> Result<RegistryDocument, ScriptError> {
        if !self.exists() {
            return Err(ScriptError::RegistryMissing(self.path.display().to_string()));
        }
        self.read()
    }

    /// Read and parse the registry file
    fn read(&self) -> Result<RegistryDocument, ScriptError> {
        let bytes = fs::read(&self.path).map_err(|e| {
            ScriptError::ReadRegistry(format!("{}: {}", self.path.display(), e))
        })?;
        RegistryDocument::from_slice(&bytes)
    }

    /// Write the registry.
    ///
    /// The document is written to a sibling temporary file which is synced and
    /// then renamed over the registry, so readers see either the old or the
    /// new document.
    pub fn save(&self, doc: &RegistryDocument) -> Result<(), ScriptError> {
        let bytes = doc.to_vec()?;
        let tmp_path = self.tmp_path();
        let write_err = |e: std::io::Error| {
            ScriptError::WriteRegistry(format!("{}: {}", tmp_path.display(), e))
        };

        {
            let file = File::create(&tmp_path).map_err(write_err)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&bytes).map_err(write_err)?;
            let file = writer
                .into_inner()
                .map_err(|e| write_err(e.into_error()))?;
            file.sync_all().map_err(write_err)?;
        }

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(ScriptError::WriteRegistry(format!(
                "{}: {}",
                self.path.display(),
                e
            )));
        }

        Ok(())
    }

    /// Load, merge one result and save in a single step, returning the new document
    pub fn apply(&self, result: &OperationResult) -> Result<RegistryDocument, ScriptError> {
        let doc = self.load()?.merge(result);
        self.save(&doc)?;
        Ok(doc)
    }

    /// The temporary file the registry is staged in before being renamed
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, Address};
    use serde_json::json;

    use super::{RegistryDocument, RegistryStore};
    use crate::{errors::ScriptError, types::OperationResult};

    const VEO: Address = address!("00000000000000000000000000000000000abcd1");
    const BRIDGE: Address = address!("0000000000000000000000000000000000002222");

    fn abi(tag: &str) -> Vec<serde_json::Value> {
        vec![json!({ "type": "function", "name": tag, "inputs": [], "outputs": [] })]
    }

    fn existing() -> RegistryDocument {
        RegistryDocument::from_slice(
            json!({
                "mainnet": { "VEO": "0x0000000000000000000000000000000000001111", "Other": "0x0000000000000000000000000000000000003333" },
                "testnet": {},
                "custom": { "note": "manually added" },
                "abi": { "VEO": [], "Other": [{ "type": "event", "name": "E" }] },
                "extra": 42
            })
            .to_string()
            .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_merge_into_empty() {
        let result = OperationResult::new("testnet", "VEO", abi("a")).with_address(VEO);
        let doc = RegistryDocument::new().merge(&result);

        assert_eq!(doc.address("testnet", "VEO").unwrap(), Some(VEO));
        assert_eq!(doc.abi("VEO"), Some(&json!(abi("a"))));
        assert!(doc.network("mainnet").is_none());
    }

    #[test]
    fn test_merge_preserves_unrelated_entries() {
        let before = existing();
        let result = OperationResult::new("mainnet", "Bridge", abi("b")).with_address(BRIDGE);
        let after = before.clone().merge(&result);

        assert_eq!(
            after.network("mainnet").unwrap().get("VEO"),
            before.network("mainnet").unwrap().get("VEO")
        );
        assert_eq!(after.network("custom"), before.network("custom"));
        assert_eq!(after.abi("Other"), before.abi("Other"));
        assert_eq!(after.inner.get("extra"), Some(&json!(42)));
        assert_eq!(after.address("mainnet", "Bridge").unwrap(), Some(BRIDGE));
    }

    #[test]
    fn test_abi_only_merge_leaves_addresses() {
        let before = existing();
        let after = before
            .clone()
            .merge(&OperationResult::new("mainnet", "VEO", abi("new")));

        assert_eq!(after.network("mainnet"), before.network("mainnet"));
        assert_eq!(after.abi("VEO"), Some(&json!(abi("new"))));
    }

    #[test]
    fn test_merge_commutes_across_keys() {
        let a = OperationResult::new("testnet", "VEO", abi("a")).with_address(VEO);
        let b = OperationResult::new("mainnet", "Bridge", abi("b")).with_address(BRIDGE);

        // Map equality ignores key order
        let ab = existing().merge(&a).merge(&b);
        let ba = existing().merge(&b).merge(&a);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let result = OperationResult::new("testnet", "VEO", abi("a")).with_address(VEO);
        let once = existing().merge(&result);
        let twice = once.clone().merge(&result);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_last_write_wins() {
        let first = OperationResult::new("testnet", "VEO", abi("a")).with_address(VEO);
        let second = OperationResult::new("testnet", "VEO", abi("b")).with_address(BRIDGE);
        let doc = RegistryDocument::new().merge(&first).merge(&second);

        assert_eq!(doc.address("testnet", "VEO").unwrap(), Some(BRIDGE));
        assert_eq!(doc.abi("VEO"), Some(&json!(abi("b"))));
    }

    #[test]
    fn test_require_address_unknown_contract() {
        let err = existing().require_address("testnet", "VEO").unwrap_err();
        assert_eq!(
            err,
            ScriptError::UnknownContract {
                network: "testnet".to_string(),
                contract: "VEO".to_string()
            }
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path().join("vtru-contracts.json"));

        assert_eq!(store.load().unwrap(), RegistryDocument::new());
        assert!(matches!(
            store.load_existing(),
            Err(ScriptError::RegistryMissing(_))
        ));
    }

    #[test]
    fn test_save_load_is_byte_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path().join("vtru-contracts.json"));
        store.save(&existing()).unwrap();
        let first = std::fs::read(store.path()).unwrap();

        let loaded = store.load_existing().unwrap();
        store.save(&loaded).unwrap();
        let second = std::fs::read(store.path()).unwrap();

        assert_eq!(first, second);
        assert!(!dir.path().join("vtru-contracts.json.tmp").exists());
    }

    #[test]
    fn test_rejects_non_object_root() {
        assert!(matches!(
            RegistryDocument::from_slice(b"[1, 2]"),
            Err(ScriptError::ReadRegistry(_))
        ));
    }

    #[test]
    fn test_merge_replaces_non_object_network() {
        let doc = RegistryDocument::from_slice(br#"{ "testnet": "oops", "abi": [] }"#).unwrap();
        let result = OperationResult::new("testnet", "VEO", abi("a")).with_address(VEO);
        let doc = doc.merge(&result);

        assert_eq!(doc.address("testnet", "VEO").unwrap(), Some(VEO));
        assert_eq!(doc.network("testnet").unwrap().len(), 1);
        assert_eq!(doc.abi("VEO"), Some(&json!(abi("a"))));
    }
}
