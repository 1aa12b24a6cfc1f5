use crate::dex::PoolState;
use crate::errors::AppError;
use crate::models::TransactionOutcome;
use ethers::types::{Address, U256};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// How liquidity reaches the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Approve the router, then one combined add-liquidity call.
    Router,
    /// Wrap native, transfer both tokens to the pair, call `mint`.
    Direct,
}

impl FromStr for Strategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "router" => Ok(Strategy::Router),
            "direct" => Ok(Strategy::Direct),
            other => Err(AppError::Config(format!(
                "unknown strategy {other:?} (expected router or direct)"
            ))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Router => f.write_str("router"),
            Strategy::Direct => f.write_str("direct"),
        }
    }
}

/// What to do when a direct deposit would not match the pool price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationPolicy {
    Abort,
    /// Log and mint anyway; the caller accepts donating the excess.
    Warn,
}

impl FromStr for DonationPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(DonationPolicy::Abort),
            "warn" => Ok(DonationPolicy::Warn),
            other => Err(AppError::Config(format!(
                "unknown donation policy {other:?} (expected abort or warn)"
            ))),
        }
    }
}

/// Knobs shared by both strategies.
#[derive(Debug, Clone)]
pub struct SupplySettings {
    /// Native currency kept back for gas on top of the native deposit.
    pub fee_reserve: U256,
    pub donation_policy: DonationPolicy,
    pub ratio_tolerance_bps: u32,
    /// Check `router.WETH()` / `router.factory()` before the router path.
    pub verify_router: bool,
}

impl Default for SupplySettings {
    fn default() -> Self {
        Self {
            fee_reserve: U256::zero(),
            donation_policy: DonationPolicy::Abort,
            ratio_tolerance_bps: 10,
            verify_router: true,
        }
    }
}

/// Orchestrator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PairResolved,
    Approved,
    RouterSupply,
    DirectSupply,
    Reconciled,
    Done,
}

/// Before/after comparison of a supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub reserves_before: (U256, U256),
    pub reserves_after: (U256, U256),
    pub lp_before: U256,
    pub lp_after: U256,
    pub lp_minted: U256,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct LiquidityReport {
    pub strategy: Strategy,
    pub recipient: Address,
    pub outcomes: Vec<TransactionOutcome>,
    pub initial_state: PoolState,
    pub final_state: PoolState,
    pub reconciliation: Reconciliation,
}
