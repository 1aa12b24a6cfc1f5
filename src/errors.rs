use crate::dex::state::PoolState;
use crate::models::{Asset, TransactionOutcome};
use ethers::types::{Address, H256, U256};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Provider error: {0}")]
    Provider(#[from] ethers::providers::ProviderError),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract call error: {0}")]
    Contract(String),

    #[error("Serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Amount error: {0}")]
    Amount(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Asset mismatch: cannot combine {left} with {right}")]
    AssetMismatch { left: Asset, right: Asset },

    #[error("Insufficient balance of {asset}: required {required}, available {available}")]
    InsufficientBalance {
        asset: Asset,
        required: U256,
        available: U256,
    },

    #[error("Router misconfigured: {field} is {actual:?}, expected {expected:?}")]
    RouterMisconfigured {
        field: &'static str,
        expected: Address,
        actual: Address,
    },

    /// Rejected during simulation; nothing was broadcast.
    #[error("Transaction reverted: {reason}")]
    Reverted { reason: String },

    #[error("Pool creation failed: {reason}")]
    PoolCreationFailed { reason: String },

    #[error("Approval failed: {reason}")]
    ApprovalFailed { reason: String },

    #[error("Supply reverted ({kind}): {reason}")]
    SupplyReverted { kind: SupplyRevert, reason: String },

    #[error(
        "Deposit ratio deviates {deviation_bps} bps from pool price (tolerance {tolerance_bps} bps); minting would donate value to existing LPs"
    )]
    DonationRisk {
        deviation_bps: u64,
        tolerance_bps: u32,
    },

    #[error("Deadline {deadline} already passed (chain time {now})")]
    DeadlineExpired { deadline: u64, now: u64 },

    #[error("Silent failure: {detail}")]
    SilentFailure { detail: String },

    #[error("Inclusion timeout: {tx_hash:?} not confirmed after {waited_secs}s")]
    InclusionTimeout { tx_hash: H256, waited_secs: u64 },

    #[error("Transaction {tx_hash:?} dropped from the mempool")]
    TransactionDropped { tx_hash: H256 },
}

/// Sub-cases of a reverted supply call, decoded from the revert string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyRevert {
    Expired,
    Slippage,
    Allowance,
    InsufficientLiquidityMinted,
    Other,
}

impl SupplyRevert {
    pub fn classify(reason: &str) -> Self {
        let upper = reason.to_ascii_uppercase();
        if upper.contains("EXPIRED") {
            SupplyRevert::Expired
        } else if upper.contains("INSUFFICIENT_A_AMOUNT") || upper.contains("INSUFFICIENT_B_AMOUNT")
        {
            SupplyRevert::Slippage
        } else if upper.contains("TRANSFER_FROM_FAILED") || upper.contains("ALLOWANCE") {
            SupplyRevert::Allowance
        } else if upper.contains("INSUFFICIENT_LIQUIDITY_MINTED") {
            SupplyRevert::InsufficientLiquidityMinted
        } else {
            SupplyRevert::Other
        }
    }
}

impl fmt::Display for SupplyRevert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SupplyRevert::Expired => "expired",
            SupplyRevert::Slippage => "slippage",
            SupplyRevert::Allowance => "allowance",
            SupplyRevert::InsufficientLiquidityMinted => "insufficient liquidity minted",
            SupplyRevert::Other => "other",
        };
        f.write_str(s)
    }
}

/// Stage of a liquidity run that a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preflight,
    Resolve,
    Approve,
    Supply,
    Reconcile,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Preflight => "preflight",
            Stage::Resolve => "resolve",
            Stage::Approve => "approve",
            Stage::Supply => "supply",
            Stage::Reconcile => "reconcile",
        };
        f.write_str(s)
    }
}

/// Terminal failure of a run: the stage, the cause, the last pool state that
/// was read and every transaction already sent.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct Failed {
    pub stage: Stage,
    pub source: AppError,
    pub last_known: Option<PoolState>,
    pub outcomes: Vec<TransactionOutcome>,
}

impl Failed {
    /// True when nothing was broadcast before the failure.
    pub fn is_free(&self) -> bool {
        self.outcomes.is_empty()
    }
}
