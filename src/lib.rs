//! Core library for bootstrapping liquidity into UniswapV2-style pools.
//!
//! The binary (`main.rs`) wires configuration, an ethers-backed chain client
//! and the [`liquidity::Orchestrator`] together; everything else lives here so
//! it can be exercised against the in-memory AMM in tests.

pub mod config;
pub mod dex;
pub mod errors;
pub mod liquidity;
pub mod models;
pub mod report;
pub mod utils;
