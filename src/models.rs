//! Shared data structures used throughout the application.

use crate::errors::{AppError, Result};
use ethers::types::{Address, H256, TransactionReceipt, U256};
use serde::Serialize;
use std::fmt;

/// One side of a pool. The native currency is supplied to the pool through
/// its wrapped token, so both variants resolve to a token address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    Native { wrapped: Address },
    Token(Address),
}

impl Asset {
    /// Address of the token the pair actually holds.
    pub fn token(&self) -> Address {
        match self {
            Asset::Native { wrapped } => *wrapped,
            Asset::Token(addr) => *addr,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native { .. })
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native { wrapped } => write!(f, "native (wrapped {wrapped:?})"),
            Asset::Token(addr) => write!(f, "token {addr:?}"),
        }
    }
}

/// Integer quantity of one asset in its smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssetAmount {
    pub asset: Asset,
    pub amount: U256,
}

impl AssetAmount {
    pub fn new(asset: Asset, amount: U256) -> Self {
        Self { asset, amount }
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn checked_add(&self, other: &AssetAmount) -> Result<AssetAmount> {
        self.same_asset(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| AppError::Amount(format!("overflow adding to {}", self.asset)))?;
        Ok(Self::new(self.asset, amount))
    }

    pub fn checked_sub(&self, other: &AssetAmount) -> Result<AssetAmount> {
        self.same_asset(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or_else(|| AppError::Amount(format!("underflow subtracting from {}", self.asset)))?;
        Ok(Self::new(self.asset, amount))
    }

    fn same_asset(&self, other: &AssetAmount) -> Result<()> {
        if self.asset != other.asset {
            return Err(AppError::AssetMismatch {
                left: self.asset,
                right: other.asset,
            });
        }
        Ok(())
    }
}

/// Unordered pair of two distinct assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolIdentity {
    a: Asset,
    b: Asset,
}

impl PoolIdentity {
    pub fn new(a: Asset, b: Asset) -> Result<Self> {
        if a.token() == b.token() {
            return Err(AppError::InvalidRequest(format!(
                "pool needs two distinct tokens, got {a} twice"
            )));
        }
        if a.token().is_zero() || b.token().is_zero() {
            return Err(AppError::InvalidRequest(
                "token address must be non-zero".into(),
            ));
        }
        Ok(Self { a, b })
    }

    pub fn a(&self) -> Asset {
        self.a
    }

    pub fn b(&self) -> Asset {
        self.b
    }

    /// The native side, if any.
    pub fn native(&self) -> Option<Asset> {
        [self.a, self.b].into_iter().find(Asset::is_native)
    }

    /// Token addresses sorted the way a UniswapV2 factory sorts them. Only a
    /// hint for logging; the pair's own `token0()` is authoritative.
    pub fn sorted_tokens(&self) -> (Address, Address) {
        let (x, y) = (self.a.token(), self.b.token());
        if x < y { (x, y) } else { (y, x) }
    }
}

/// Liquidity to add, in smallest units.
///
/// A minimum of zero disables slippage protection for that side.
#[derive(Debug, Clone, Serialize)]
pub struct LiquidityRequest {
    pub desired_a: AssetAmount,
    pub desired_b: AssetAmount,
    pub min_a: U256,
    pub min_b: U256,
    pub recipient: Address,
    /// Unix timestamp (seconds).
    pub deadline: u64,
}

impl LiquidityRequest {
    pub fn pool(&self) -> Result<PoolIdentity> {
        PoolIdentity::new(self.desired_a.asset, self.desired_b.asset)
    }

    /// Structural checks that need no chain access.
    pub fn validate(&self) -> Result<PoolIdentity> {
        let pool = self.pool()?;
        if self.desired_a.is_zero() || self.desired_b.is_zero() {
            return Err(AppError::InvalidRequest(
                "desired amounts must be greater than zero".into(),
            ));
        }
        if self.min_a > self.desired_a.amount {
            return Err(AppError::InvalidRequest(format!(
                "min_a {} exceeds desired_a {}",
                self.min_a, self.desired_a.amount
            )));
        }
        if self.min_b > self.desired_b.amount {
            return Err(AppError::InvalidRequest(format!(
                "min_b {} exceeds desired_b {}",
                self.min_b, self.desired_b.amount
            )));
        }
        if self.recipient.is_zero() {
            return Err(AppError::InvalidRequest(
                "recipient must be non-zero".into(),
            ));
        }
        Ok(pool)
    }

    pub fn slippage_unprotected(&self) -> bool {
        self.min_a.is_zero() || self.min_b.is_zero()
    }
}

/// Minimums derived from desired amounts and a slippage tolerance.
///
/// Splits `desired` around the bps scale so any `U256` amount stays in range.
pub fn min_with_slippage(desired: U256, slippage_bps: u32) -> U256 {
    let keep = U256::from(10_000u64.saturating_sub(slippage_bps as u64));
    let scale = U256::from(10_000u64);
    desired / scale * keep + desired % scale * keep / scale
}

/// Result of one included transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionOutcome {
    pub label: String,
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
    pub success: bool,
    pub revert_reason: Option<String>,
}

impl TransactionOutcome {
    /// The receipt carries no revert reason; the client fills it in for
    /// reverted transactions.
    pub fn from_receipt(label: &str, receipt: &TransactionReceipt) -> Self {
        let success = receipt.status.map(|s| s.as_u64() == 1).unwrap_or(false);
        Self {
            label: label.to_string(),
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|b| b.as_u64()),
            gas_used: receipt.gas_used,
            success,
            revert_reason: None,
        }
    }
}

/// Token metadata read from the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenMeta {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}
