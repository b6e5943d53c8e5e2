//! Definitions of errors that can occur during the execution of the contract management scripts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use crate::constants::BENIGN_VERIFICATION_MARKERS;

/// Errors that can occur during the execution of the contract management scripts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// The contract's construction metadata could not be resolved
    InitializationFailed(String),
    /// The registry file does not exist, but the operation requires it
    RegistryMissing(String),
    /// Error reading the registry file
    ReadRegistry(String),
    /// Error writing the registry file
    WriteRegistry(String),
    /// The registry has no address for the contract on the network
    UnknownContract {
        /// The network that was searched
        network: String,
        /// The contract that was not found
        contract: String,
    },
    /// The network is not part of the cross-chain mesh
    UnsupportedNetwork(String),
    /// The chain directory has no entry for the chain ID
    UnknownChain(u64),
    /// The explorer rejected verification with a known benign status
    VerificationRecoverable(String),
    /// Any other verification failure
    VerificationFatal(String),
    /// A transaction reverted, was not mined, or could not be sent
    ChainSubmissionFailed(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// Error constructing calldata for a contract method
    CalldataConstruction(String),
    /// Error parsing a Solidity compilation artifact
    ArtifactParsing(String),
    /// Error reading or writing the proxy manifest
    Manifest(String),
    /// Invalid configuration
    Config(String),
}

impl ScriptError {
    /// Builds the verification error matching the explorer's message,
    /// recoverable if it reports a known benign condition
    pub fn from_verification_message(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let lower = msg.to_lowercase();
        if BENIGN_VERIFICATION_MARKERS
            .iter()
            .any(|marker| lower.contains(&marker.to_lowercase()))
        {
            ScriptError::VerificationRecoverable(msg)
        } else {
            ScriptError::VerificationFatal(msg)
        }
    }

    /// Whether this error is a verification failure that should be swallowed
    pub fn is_recoverable_verification(&self) -> bool {
        matches!(self, ScriptError::VerificationRecoverable(_))
    }
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::InitializationFailed(s) => write!(f, "initialization failed: {}", s),
            ScriptError::RegistryMissing(s) => write!(f, "{} file is missing", s),
            ScriptError::ReadRegistry(s) => write!(f, "error reading registry: {}", s),
            ScriptError::WriteRegistry(s) => write!(f, "error writing registry: {}", s),
            ScriptError::UnknownContract { network, contract } => {
                write!(f, "no address for {} on {} in registry", contract, network)
            }
            ScriptError::UnsupportedNetwork(s) => write!(f, "unsupported network: {}", s),
            ScriptError::UnknownChain(id) => write!(f, "no chain directory entry for chain {}", id),
            ScriptError::VerificationRecoverable(s) => {
                write!(f, "verification skipped by explorer: {}", s)
            }
            ScriptError::VerificationFatal(s) => write!(f, "verification failed: {}", s),
            ScriptError::ChainSubmissionFailed(s) => write!(f, "chain submission failed: {}", s),
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            ScriptError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            ScriptError::Manifest(s) => write!(f, "error updating proxy manifest: {}", s),
            ScriptError::Config(s) => write!(f, "invalid configuration: {}", s),
        }
    }
}

impl Error for ScriptError {}
