//! Deploycache - deployment cache orchestrator
//!
//! Restores the cache units a deployment depends on, runs the deployment,
//! persists the units it built and exports the search paths they declare.

pub mod cache;
pub mod cli;
pub mod config;
pub mod deployment;
pub mod error;
pub mod export;
pub mod journal;
pub mod orchestrator;

pub use error::{DeployError, DeployResult};
