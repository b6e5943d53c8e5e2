//! Scripts for deploying, upgrading and configuring upgradeable contracts,
//! and for keeping the shared contract registry in step with the chain.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod cli;
mod commands;
pub mod constants;
pub mod errors;
pub mod mesh;
pub mod networks;
pub mod orchestrator;
pub mod proxy;
pub mod registry;
mod solidity;
pub mod types;
pub mod utils;
pub mod verify;
