//! Pre-flight balance checks. Nothing here sends a transaction.

use super::types::Strategy;
use crate::config::GasConfig;
use crate::dex::ChainClient;
use crate::errors::{AppError, Result};
use crate::models::{Asset, AssetAmount, LiquidityRequest};
use ethers::types::{Address, U256};
use tracing::{debug, info};

/// Balance read for one asset during the check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Funding {
    pub asset: Asset,
    pub required: U256,
    pub available: U256,
}

pub struct BalanceGuard<'a, C: ?Sized> {
    client: &'a C,
    wrapped_native: Address,
}

impl<'a, C: ChainClient + ?Sized> BalanceGuard<'a, C> {
    pub fn new(client: &'a C, wrapped_native: Address) -> Self {
        Self {
            client,
            wrapped_native,
        }
    }

    /// Fails with `InsufficientBalance` unless `operator` holds every desired
    /// amount. The native side must also cover `fee_reserve`; for token/token
    /// pools the native balance alone must cover it.
    ///
    /// The direct strategy only wraps what the operator does not already hold
    /// wrapped, so wrapped-native up to the desired amount counts toward the
    /// native side. The fee reserve is always paid from raw native.
    pub async fn ensure_funded(
        &self,
        operator: Address,
        request: &LiquidityRequest,
        strategy: Strategy,
        fee_reserve: U256,
    ) -> Result<Vec<Funding>> {
        let mut checked = Vec::with_capacity(3);
        for desired in [request.desired_a, request.desired_b] {
            let (required, available) = match desired.asset {
                Asset::Native { wrapped } => {
                    let native = self.client.native_balance(operator).await?;
                    let usable_wrapped = match strategy {
                        Strategy::Direct => self
                            .client
                            .token_balance(wrapped, operator)
                            .await?
                            .min(desired.amount),
                        Strategy::Router => U256::zero(),
                    };
                    (
                        desired
                            .checked_add(&AssetAmount::new(desired.asset, fee_reserve))?
                            .amount,
                        native.saturating_add(usable_wrapped),
                    )
                }
                Asset::Token(token) => (
                    desired.amount,
                    self.client.token_balance(token, operator).await?,
                ),
            };
            checked.push(Funding {
                asset: desired.asset,
                required,
                available,
            });
        }

        let has_native = checked.iter().any(|f| f.asset.is_native());
        if !has_native && !fee_reserve.is_zero() {
            checked.push(Funding {
                asset: Asset::Native {
                    wrapped: self.wrapped_native,
                },
                required: fee_reserve,
                available: self.client.native_balance(operator).await?,
            });
        }

        for f in &checked {
            debug!(asset = %f.asset, required = %f.required, available = %f.available, "[GUARD] balance");
            if f.available < f.required {
                return Err(AppError::InsufficientBalance {
                    asset: f.asset,
                    required: f.required,
                    available: f.available,
                });
            }
        }
        info!(assets = checked.len(), %fee_reserve, "[GUARD] operator funded");
        Ok(checked)
    }
}

/// Native currency to hold back for gas: `gas_price * gas_units * multiplier`.
pub fn estimate_fee_reserve(gas_price: U256, gas: &GasConfig) -> Result<U256> {
    let multiplier_bps = (gas.gas_multiplier.max(0.0) * 10_000.0).round() as u64;
    gas_price
        .checked_mul(U256::from(gas.gas_units))
        .and_then(|cost| cost.checked_mul(U256::from(multiplier_bps)))
        .map(|scaled| scaled / U256::from(10_000u64))
        .ok_or_else(|| {
            AppError::Amount(format!(
                "fee reserve overflows: gas price {gas_price}, {} gas units, multiplier {}",
                gas.gas_units, gas.gas_multiplier
            ))
        })
}
