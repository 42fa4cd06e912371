//! Bindings for the factory/market contract pair and the deployment flow.

pub mod abi;
pub mod deploy;
