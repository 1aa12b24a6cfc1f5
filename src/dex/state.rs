use ethers::types::{Address, U256, U512};
use serde::Serialize;

/// Snapshot of a UniswapV2-style pair as read from the chain.
///
/// `token0`/`token1` follow the pair's own canonical order, which may differ
/// from the order the caller named the assets in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PoolState {
    pub exists: bool,
    pub address: Option<Address>,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
    pub total_supply: U256,
}

impl PoolState {
    /// No pair registered for the tokens yet.
    pub fn absent(token_a: Address, token_b: Address) -> Self {
        Self {
            exists: false,
            address: None,
            token0: token_a,
            token1: token_b,
            reserve0: U256::zero(),
            reserve1: U256::zero(),
            total_supply: U256::zero(),
        }
    }

    pub fn new(
        address: Address,
        token0: Address,
        token1: Address,
        reserve0: U256,
        reserve1: U256,
        total_supply: U256,
    ) -> Self {
        Self {
            exists: true,
            address: Some(address),
            token0,
            token1,
            reserve0,
            reserve1,
            total_supply,
        }
    }

    /// True when the pool holds nothing and the first deposit sets the price.
    pub fn is_empty(&self) -> bool {
        self.reserve0.is_zero() && self.reserve1.is_zero()
    }

    /// Reorder a pair of (token, amount) into (amount0, amount1).
    pub fn canonical_amounts(
        &self,
        first: (Address, U256),
        second: (Address, U256),
    ) -> Option<(U256, U256)> {
        if first.0 == self.token0 && second.0 == self.token1 {
            Some((first.1, second.1))
        } else if first.0 == self.token1 && second.0 == self.token0 {
            Some((second.1, first.1))
        } else {
            None
        }
    }

    pub fn reserve_sum(&self) -> U256 {
        self.reserve0.saturating_add(self.reserve1)
    }
}

/// How far a deposit strays from the pool's current price, in basis points.
///
/// Compares `amount0 * reserve1` with `amount1 * reserve0`; the share of the
/// larger side that mints no LP is the fraction donated to existing holders.
/// Returns `None` when the pool is empty and the deposit defines the price.
pub fn deposit_ratio_deviation_bps(
    reserve0: U256,
    reserve1: U256,
    amount0: U256,
    amount1: U256,
) -> Option<u64> {
    if reserve0.is_zero() || reserve1.is_zero() {
        return None;
    }
    let lhs = amount0.full_mul(reserve1);
    let rhs = amount1.full_mul(reserve0);
    let (hi, lo) = if lhs >= rhs { (lhs, rhs) } else { (rhs, lhs) };
    if hi.is_zero() {
        return Some(0);
    }
    let bps = (hi - lo) * U512::from(10_000u64) / hi;
    Some(bps.low_u64())
}
