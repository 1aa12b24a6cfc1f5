//! Value-moving steps of the router and direct strategies.

use super::reconcile::check_deposit_ratio;
use super::types::SupplySettings;
use crate::config::Contracts;
use crate::dex::{ChainClient, PoolState, RouterDeposit};
use crate::errors::{AppError, Result, SupplyRevert};
use crate::models::{Asset, LiquidityRequest, TransactionOutcome};
use ethers::types::{Address, U256};
use tracing::{debug, info, warn};

pub struct Supplier<'a, C: ?Sized> {
    client: &'a C,
    contracts: Contracts,
}

impl<'a, C: ChainClient + ?Sized> Supplier<'a, C> {
    pub fn new(client: &'a C, contracts: Contracts) -> Self {
        Self { client, contracts }
    }

    /// Approves the router for exactly the desired amount of each token side
    /// whose allowance falls short. Native value needs no approval. Returns
    /// the number of approvals sent.
    pub async fn approve_router(
        &self,
        request: &LiquidityRequest,
        journal: &mut Vec<TransactionOutcome>,
    ) -> Result<usize> {
        let operator = self.client.operator();
        let router = self.contracts.router;
        let mut sent = 0;
        for desired in [request.desired_a, request.desired_b] {
            let Asset::Token(token) = desired.asset else {
                continue;
            };
            let current = self.client.allowance(token, operator, router).await?;
            if current >= desired.amount {
                debug!(?token, %current, "[APPROVE] allowance already covers deposit");
                continue;
            }

            let outcome = self.client.approve(token, router, desired.amount).await?;
            journal.push(outcome.clone());
            sent += 1;
            if !outcome.success {
                return Err(AppError::ApprovalFailed {
                    reason: outcome
                        .revert_reason
                        .unwrap_or_else(|| "approve reverted".into()),
                });
            }

            let updated = self.client.allowance(token, operator, router).await?;
            if updated < desired.amount {
                return Err(AppError::ApprovalFailed {
                    reason: format!(
                        "allowance of {token:?} is {updated} after approving {}",
                        desired.amount
                    ),
                });
            }
            info!(?token, amount = %desired.amount, tx = ?outcome.tx_hash, "[APPROVE] router approved");
        }
        Ok(sent)
    }

    /// One combined add-liquidity call through the router.
    pub async fn supply_router(
        &self,
        request: &LiquidityRequest,
        journal: &mut Vec<TransactionOutcome>,
    ) -> Result<()> {
        let deposit = router_deposit(request);
        info!(router = ?self.contracts.router, deadline = request.deadline, "[SUPPLY] adding liquidity via router");
        let outcome = self
            .client
            .add_liquidity(self.contracts.router, &deposit)
            .await?;
        record(outcome, journal)
    }

    /// Wraps any native shortfall, transfers both amounts to the pair and
    /// mints LP shares to the recipient.
    ///
    /// The price check against `state` and the deadline check both happen
    /// before the first transaction. Once transfers land, mint always follows.
    pub async fn supply_direct(
        &self,
        state: &PoolState,
        request: &LiquidityRequest,
        settings: &SupplySettings,
        journal: &mut Vec<TransactionOutcome>,
    ) -> Result<()> {
        let pair = state
            .address
            .ok_or_else(|| AppError::InvalidRequest("direct supply needs an existing pair".into()))?;
        let (a, b) = (request.desired_a, request.desired_b);
        let (amount0, amount1) = state
            .canonical_amounts((a.asset.token(), a.amount), (b.asset.token(), b.amount))
            .ok_or_else(|| {
                AppError::InvalidRequest(format!("pair {pair:?} does not hold the requested tokens"))
            })?;

        check_deposit_ratio(
            state,
            amount0,
            amount1,
            settings.donation_policy,
            settings.ratio_tolerance_bps,
        )?;

        let now = self.client.latest_timestamp().await?;
        if now > request.deadline {
            return Err(AppError::DeadlineExpired {
                deadline: request.deadline,
                now,
            });
        }

        if let Some(native) = [a, b].into_iter().find(|d| d.asset.is_native()) {
            self.wrap_shortfall(native.asset.token(), native.amount, journal)
                .await?;
        }

        for desired in [a, b] {
            let token = desired.asset.token();
            info!(?token, amount = %desired.amount, ?pair, "[SUPPLY] transferring to pair");
            let outcome = self.client.transfer(token, pair, desired.amount).await?;
            record(outcome, journal)?;
        }

        self.confirm_credited(state, pair, amount0, amount1).await?;

        info!(?pair, recipient = ?request.recipient, "[SUPPLY] minting LP shares");
        let outcome = self.client.mint(pair, request.recipient).await?;
        record(outcome, journal)
    }

    async fn wrap_shortfall(
        &self,
        wrapped: Address,
        amount: U256,
        journal: &mut Vec<TransactionOutcome>,
    ) -> Result<()> {
        let held = self
            .client
            .token_balance(wrapped, self.client.operator())
            .await?;
        if held >= amount {
            debug!(%held, "[SUPPLY] wrapped balance already covers deposit");
            return Ok(());
        }
        let shortfall = amount - held;
        info!(%shortfall, %held, "[SUPPLY] wrapping native currency");
        let outcome = self.client.wrap_native(wrapped, shortfall).await?;
        record(outcome, journal)
    }

    /// The pair must hold at least reserves plus our transfers before mint.
    async fn confirm_credited(
        &self,
        state: &PoolState,
        pair: Address,
        amount0: U256,
        amount1: U256,
    ) -> Result<()> {
        let (reserves, balance0, balance1) = futures::try_join!(
            self.client.reserves(pair),
            self.client.token_balance(state.token0, pair),
            self.client.token_balance(state.token1, pair),
        )?;
        let (reserve0, reserve1) = reserves;
        if (reserve0, reserve1) != (state.reserve0, state.reserve1) {
            warn!(
                before = ?(state.reserve0, state.reserve1),
                now = ?(reserve0, reserve1),
                "[SUPPLY] reserves moved since the price check"
            );
        }
        if balance0 < reserve0.saturating_add(amount0) || balance1 < reserve1.saturating_add(amount1)
        {
            return Err(AppError::SilentFailure {
                detail: format!(
                    "pair {pair:?} holds ({balance0}, {balance1}) against reserves ({reserve0}, {reserve1}); transfers of ({amount0}, {amount1}) not credited"
                ),
            });
        }
        Ok(())
    }
}

/// Router arguments for a request: `addLiquidityETH` when one side is native,
/// `addLiquidity` otherwise.
pub fn router_deposit(request: &LiquidityRequest) -> RouterDeposit {
    let (a, b) = (request.desired_a, request.desired_b);
    match (a.asset, b.asset) {
        (Asset::Native { .. }, Asset::Token(token)) => RouterDeposit::WithNative {
            token,
            amount_token_desired: b.amount,
            amount_token_min: request.min_b,
            amount_native: a.amount,
            amount_native_min: request.min_a,
            to: request.recipient,
            deadline: request.deadline,
        },
        (Asset::Token(token), Asset::Native { .. }) => RouterDeposit::WithNative {
            token,
            amount_token_desired: a.amount,
            amount_token_min: request.min_a,
            amount_native: b.amount,
            amount_native_min: request.min_b,
            to: request.recipient,
            deadline: request.deadline,
        },
        _ => RouterDeposit::Tokens {
            token_a: a.asset.token(),
            token_b: b.asset.token(),
            amount_a_desired: a.amount,
            amount_b_desired: b.amount,
            amount_a_min: request.min_a,
            amount_b_min: request.min_b,
            to: request.recipient,
            deadline: request.deadline,
        },
    }
}

/// Journals an included transaction and turns an on-chain revert into
/// `SupplyReverted`.
fn record(outcome: TransactionOutcome, journal: &mut Vec<TransactionOutcome>) -> Result<()> {
    journal.push(outcome.clone());
    if outcome.success {
        return Ok(());
    }
    let reason = outcome
        .revert_reason
        .unwrap_or_else(|| format!("{} reverted", outcome.label));
    Err(AppError::SupplyReverted {
        kind: SupplyRevert::classify(&reason),
        reason,
    })
}
