//! Constants used in the deploy scripts

/// The default path of the registry file, relative to the repository root
pub const DEFAULT_REGISTRY_PATH: &str = "vtru-contracts.json";

/// The default path of the Hardhat artifacts directory
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// The default directory holding the per-network proxy manifests
pub const DEFAULT_MANIFEST_DIR: &str = ".openzeppelin";

/// The key of the shared ABI mapping in the registry file
pub const ABI_KEY: &str = "abi";

/// The network whose operations are considered test operations
pub const TEST_NETWORK: &str = "testnet";

/// The number of spaces used to indent the registry file
pub const REGISTRY_INDENT: &[u8] = b"  ";

/// Seconds to wait for a block to be sealed and indexed before verification
pub const VERIFICATION_SETTLE_SECS: u64 = 6;

/// Fragments of explorer error messages that mean the contract is already
/// verified or not indexed yet. Matched case-insensitively.
pub const BENIGN_VERIFICATION_MARKERS: [&str; 4] = [
    "Etherscan API call failed with status 400",
    "already verified",
    "not yet indexed",
    "Unable to locate ContractCode",
];

/// The name of the initializer invoked on a freshly deployed proxy
pub const INITIALIZER: &str = "initialize";

/// The directory, within the artifacts tree, holding the project's contracts
pub const CONTRACTS_SOURCE_DIR: &str = "contracts";

/// The prebuilt TransparentUpgradeableProxy artifact shipped with the
/// OpenZeppelin contracts package.
///
/// Built from https://github.com/OpenZeppelin/openzeppelin-contracts/blob/v5.0.0/contracts/proxy/transparent/TransparentUpgradeableProxy.sol
pub const DEFAULT_PROXY_ARTIFACT: &str =
    "node_modules/@openzeppelin/contracts/build/contracts/TransparentUpgradeableProxy.json";

/// The constructor parameters of the v5 TransparentUpgradeableProxy. Earlier
/// versions take an admin in place of `initialOwner` and are rejected.
pub const PROXY_CONSTRUCTOR_INPUTS: [&str; 3] = ["_logic", "initialOwner", "_data"];

/// The number of confirmations to wait for deployment transactions
pub const NUM_DEPLOY_CONFIRMATIONS: u64 = 1;

/// The storage slot containing the implementation address of an EIP-1967 proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#logic-contract-address
pub const PROXY_IMPLEMENTATION_STORAGE_SLOT: &str =
    "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";

/// The storage slot containing the proxy admin contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#admin-address
pub const PROXY_ADMIN_STORAGE_SLOT: &str =
    "0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103";

/// The number of bytes stored in a single storage slot
pub const NUM_BYTES_STORAGE_SLOT: usize = 32;

/// The number of bytes in an Ethereum address
pub const NUM_BYTES_ADDRESS: usize = 20;

/// The code format sent to the explorer for standard JSON input verification
pub const STANDARD_JSON_CODE_FORMAT: &str = "solidity-standard-json-input";

/// The log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";
