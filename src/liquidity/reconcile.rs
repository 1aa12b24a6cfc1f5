//! Pre-mint price check and post-supply reconciliation.

use super::resolver::PoolResolver;
use super::types::{DonationPolicy, Reconciliation};
use crate::dex::state::deposit_ratio_deviation_bps;
use crate::dex::{ChainClient, PoolState};
use crate::errors::{AppError, Result};
use ethers::types::{Address, U256};
use tracing::{info, warn};

/// Pool state together with one holder's LP balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: PoolState,
    pub lp_balance: U256,
}

pub async fn snapshot<C: ChainClient + ?Sized>(
    client: &C,
    factory: Address,
    pair: Address,
    holder: Address,
) -> Result<Snapshot> {
    let state = PoolResolver::new(client, factory).read_state(pair).await?;
    // The pair contract is the LP token.
    let lp_balance = client.token_balance(pair, holder).await?;
    Ok(Snapshot { state, lp_balance })
}

/// Checks a direct deposit of (amount0, amount1) against the pool's price.
///
/// Empty pools accept any ratio. Otherwise a deviation above `tolerance_bps`
/// aborts under [`DonationPolicy::Abort`] and is logged under `Warn`.
pub fn check_deposit_ratio(
    state: &PoolState,
    amount0: U256,
    amount1: U256,
    policy: DonationPolicy,
    tolerance_bps: u32,
) -> Result<Option<u64>> {
    let Some(deviation_bps) =
        deposit_ratio_deviation_bps(state.reserve0, state.reserve1, amount0, amount1)
    else {
        info!("[RECONCILE] empty pool, deposit sets the initial price");
        return Ok(None);
    };
    if deviation_bps <= tolerance_bps as u64 {
        return Ok(Some(deviation_bps));
    }
    match policy {
        DonationPolicy::Abort => Err(AppError::DonationRisk {
            deviation_bps,
            tolerance_bps,
        }),
        DonationPolicy::Warn => {
            warn!(
                deviation_bps,
                tolerance_bps,
                "[RECONCILE] unbalanced deposit, excess goes to existing LPs"
            );
            Ok(Some(deviation_bps))
        }
    }
}

/// Compares snapshots taken around a supply. Reserves may not shrink, their
/// sum must grow, and the holder must have received LP shares.
pub fn verify(before: &Snapshot, after: &Snapshot) -> Result<Reconciliation> {
    let (b, a) = (&before.state, &after.state);
    if a.reserve0 < b.reserve0 || a.reserve1 < b.reserve1 {
        return Err(AppError::SilentFailure {
            detail: format!(
                "reserves decreased from ({}, {}) to ({}, {})",
                b.reserve0, b.reserve1, a.reserve0, a.reserve1
            ),
        });
    }
    if a.reserve_sum() <= b.reserve_sum() {
        return Err(AppError::SilentFailure {
            detail: "reserves did not grow".into(),
        });
    }
    if after.lp_balance <= before.lp_balance {
        return Err(AppError::SilentFailure {
            detail: format!(
                "no LP shares minted (balance {} before, {} after)",
                before.lp_balance, after.lp_balance
            ),
        });
    }
    Ok(Reconciliation {
        reserves_before: (b.reserve0, b.reserve1),
        reserves_after: (a.reserve0, a.reserve1),
        lp_before: before.lp_balance,
        lp_after: after.lp_balance,
        lp_minted: after.lp_balance - before.lp_balance,
    })
}
