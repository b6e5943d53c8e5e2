//! Resolution of compiled contracts from a Hardhat `artifacts/` tree

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy::{json_abi::JsonAbi, primitives::Bytes};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    errors::ScriptError,
    orchestrator::ContractFactory,
    types::{qualified_name, Abi, ContractArtifact},
};

/// The subset of a Hardhat artifact the scripts use
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    /// The contract name
    contract_name: String,
    /// The source file the contract is defined in
    source_name: String,
    /// The contract ABI
    abi: Abi,
    /// The creation bytecode, hex encoded
    bytecode: String,
}

/// The debug file written next to each artifact
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    /// Path of the build info, relative to the debug file
    build_info: PathBuf,
}

/// A [`ContractFactory`] reading Hardhat compilation artifacts
#[derive(Clone, Debug)]
pub struct HardhatArtifacts {
    /// The artifacts directory
    root: PathBuf,
}

impl HardhatArtifacts {
    /// Read artifacts from the directory at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a fully qualified `<source>:<contract>` name
    pub fn resolve_qualified(&self, qualified: &str) -> Result<ContractArtifact, ScriptError> {
        let (source, name) = qualified.rsplit_once(':').ok_or_else(|| {
            ScriptError::InitializationFailed(format!("{qualified} is not a qualified name"))
        })?;

        let artifact_path = self.root.join(source).join(format!("{name}.json"));
        read_artifact(&artifact_path).map_err(|e| match e {
            e @ ScriptError::InitializationFailed(_) => e,
            other => ScriptError::InitializationFailed(format!("{qualified}: {other}")),
        })
    }
}

/// Read a single Hardhat-format artifact file, as found in the artifacts tree
/// or shipped prebuilt in a package's `build/contracts`
pub fn read_artifact(artifact_path: &Path) -> Result<ContractArtifact, ScriptError> {
    let artifact: HardhatArtifact = read_json(artifact_path)?;
    let qualified = format!("{}:{}", artifact.source_name, artifact.contract_name);

    serde_json::from_value::<JsonAbi>(Value::Array(artifact.abi.clone())).map_err(|e| {
        ScriptError::InitializationFailed(format!("{qualified}: malformed ABI: {e}"))
    })?;

    let bytecode = Bytes::from_str(&artifact.bytecode).map_err(|e| {
        ScriptError::InitializationFailed(format!("{qualified}: malformed bytecode: {e}"))
    })?;
    if bytecode.is_empty() {
        return Err(ScriptError::InitializationFailed(format!(
            "{qualified} has no bytecode, is it abstract?"
        )));
    }

    let build_info = artifact_path
        .parent()
        .and_then(|dir| build_info_path(dir, &artifact.contract_name));
    debug!("resolved {qualified} from {}", artifact_path.display());

    Ok(ContractArtifact {
        qualified_name: qualified,
        contract_name: artifact.contract_name,
        source_name: artifact.source_name,
        abi: artifact.abi,
        bytecode,
        build_info,
    })
}

impl ContractFactory for HardhatArtifacts {
    fn resolve(&self, contract_name: &str) -> Result<ContractArtifact, ScriptError> {
        self.resolve_qualified(&qualified_name(contract_name))
    }
}

/// Locate the build info of an artifact through its debug file
fn build_info_path(dir: &Path, name: &str) -> Option<PathBuf> {
    let dbg_path = dir.join(format!("{name}.dbg.json"));
    let dbg: DebugFile = read_json(&dbg_path).ok()?;
    Some(dir.join(dbg.build_info))
}

/// Read and deserialize a JSON file
fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ScriptError> {
    let bytes = fs::read(path)
        .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {}", path.display(), e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use serde_json::json;

    use super::HardhatArtifacts;
    use crate::{errors::ScriptError, orchestrator::ContractFactory};

    fn write_artifact(root: &Path, name: &str, abi: serde_json::Value, bytecode: &str) {
        let dir = root.join("contracts").join(format!("{name}.sol"));
        fs::create_dir_all(&dir).unwrap();
        let artifact = json!({
            "_format": "hh-sol-artifact-1",
            "contractName": name,
            "sourceName": format!("contracts/{name}.sol"),
            "abi": abi,
            "bytecode": bytecode,
            "deployedBytecode": "0x",
            "linkReferences": {},
            "deployedLinkReferences": {}
        });
        fs::write(dir.join(format!("{name}.json")), artifact.to_string()).unwrap();
        fs::write(
            dir.join(format!("{name}.dbg.json")),
            json!({ "_format": "hh-sol-dbg-1", "buildInfo": "../../build-info/abc.json" }).to_string(),
        )
        .unwrap();
    }

    #[test]
    fn test_resolve_contract() {
        let dir = tempfile::tempdir().unwrap();
        let abi = json!([{ "type": "function", "name": "initialize", "inputs": [], "outputs": [], "stateMutability": "nonpayable" }]);
        write_artifact(dir.path(), "VEO", abi.clone(), "0x6080");

        let artifact = HardhatArtifacts::new(dir.path()).resolve("VEO").unwrap();
        assert_eq!(artifact.qualified_name, "contracts/VEO.sol:VEO");
        assert_eq!(serde_json::Value::Array(artifact.abi), abi);
        assert_eq!(artifact.bytecode.as_ref(), &[0x60, 0x80]);
        assert_eq!(
            artifact.build_info.unwrap(),
            dir.path().join("contracts/VEO.sol/../../build-info/abc.json")
        );
    }

    #[test]
    fn test_unknown_contract_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let err = HardhatArtifacts::new(dir.path()).resolve("Missing").unwrap_err();
        assert!(matches!(err, ScriptError::InitializationFailed(_)));
    }

    #[test]
    fn test_abstract_contract_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "Base", json!([]), "0x");
        let err = HardhatArtifacts::new(dir.path()).resolve("Base").unwrap_err();
        assert!(matches!(err, ScriptError::InitializationFailed(_)));
    }

    #[test]
    fn test_unlinked_bytecode_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "Linked", json!([]), "0x60__$abcdef$__");
        let err = HardhatArtifacts::new(dir.path()).resolve("Linked").unwrap_err();
        assert!(matches!(err, ScriptError::InitializationFailed(_)));
    }
}
