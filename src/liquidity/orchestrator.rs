//! Drives a liquidity run through its phases and turns any error into a
//! [`Failed`] that names the stage and keeps every transaction already sent.

use super::guard::BalanceGuard;
use super::reconcile;
use super::resolver::{PoolResolver, Resolution};
use super::supply::Supplier;
use super::types::{LiquidityReport, Phase, Strategy, SupplySettings};
use crate::config::Contracts;
use crate::dex::{ChainClient, PoolState};
use crate::errors::{AppError, Failed, Result, Stage, SupplyRevert};
use crate::models::{Asset, LiquidityRequest, PoolIdentity, TransactionOutcome};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Bookkeeping for one invocation.
struct Run {
    stage: Stage,
    phase: Phase,
    outcomes: Vec<TransactionOutcome>,
    last_known: Option<PoolState>,
}

impl Run {
    fn new() -> Self {
        Self {
            stage: Stage::Preflight,
            phase: Phase::Idle,
            outcomes: Vec::new(),
            last_known: None,
        }
    }

    fn advance(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "[PHASE] transition");
        self.phase = phase;
    }

    /// Simulation reverts carry no stage; name them after the step that hit one.
    fn classify(&self, err: AppError) -> AppError {
        match (self.stage, err) {
            (Stage::Resolve, AppError::Reverted { reason }) => {
                AppError::PoolCreationFailed { reason }
            }
            (Stage::Approve, AppError::Reverted { reason }) => AppError::ApprovalFailed { reason },
            (Stage::Supply, AppError::Reverted { reason }) => AppError::SupplyReverted {
                kind: SupplyRevert::classify(&reason),
                reason,
            },
            (_, other) => other,
        }
    }
}

pub struct Orchestrator<C: ChainClient + ?Sized> {
    client: Arc<C>,
    contracts: Contracts,
    settings: SupplySettings,
}

impl<C: ChainClient + ?Sized> Orchestrator<C> {
    pub fn new(client: Arc<C>, contracts: Contracts, settings: SupplySettings) -> Self {
        Self {
            client,
            contracts,
            settings,
        }
    }

    /// Finds the pair for `a`/`b`, creating it when the factory has none.
    pub async fn resolve_pool(&self, a: Asset, b: Asset) -> std::result::Result<Resolution, Failed> {
        let mut run = Run::new();
        match self.run_resolve(&mut run, a, b).await {
            Ok(resolution) => Ok(resolution),
            Err(err) => Err(self.fail(run, err).await),
        }
    }

    /// Adds `request` to its pool with the chosen strategy and reconciles the
    /// result against the pool as it was before the first transaction.
    pub async fn provide_liquidity(
        &self,
        request: &LiquidityRequest,
        strategy: Strategy,
    ) -> std::result::Result<LiquidityReport, Failed> {
        let mut run = Run::new();
        match self.run_supply(&mut run, request, strategy).await {
            Ok(report) => Ok(report),
            Err(err) => Err(self.fail(run, err).await),
        }
    }

    async fn run_resolve(&self, run: &mut Run, a: Asset, b: Asset) -> Result<Resolution> {
        let pool = PoolIdentity::new(a, b)?;
        self.check_wrapped(&pool)?;

        run.stage = Stage::Resolve;
        let resolution = PoolResolver::new(self.client.as_ref(), self.contracts.factory)
            .resolve(&pool, &mut run.outcomes)
            .await?;
        run.last_known = Some(resolution.state.clone());
        run.advance(Phase::PairResolved);
        Ok(resolution)
    }

    async fn run_supply(
        &self,
        run: &mut Run,
        request: &LiquidityRequest,
        strategy: Strategy,
    ) -> Result<LiquidityReport> {
        let client = self.client.as_ref();
        let operator = client.operator();
        info!(%strategy, ?operator, recipient = ?request.recipient, "[SUPPLY] starting liquidity run");

        let pool = request.validate()?;
        self.check_wrapped(&pool)?;
        if request.slippage_unprotected() {
            warn!(
                min_a = %request.min_a,
                min_b = %request.min_b,
                "[SUPPLY] zero minimum disables slippage protection"
            );
        }
        if strategy == Strategy::Router && self.settings.verify_router {
            self.verify_router().await?;
        }
        BalanceGuard::new(client, self.contracts.wrapped_native)
            .ensure_funded(operator, request, strategy, self.settings.fee_reserve)
            .await?;

        run.stage = Stage::Resolve;
        let resolution = PoolResolver::new(client, self.contracts.factory)
            .resolve(&pool, &mut run.outcomes)
            .await?;
        run.last_known = Some(resolution.state.clone());
        let pair = resolution.state.address.ok_or_else(|| AppError::PoolCreationFailed {
            reason: "resolved pool has no address".into(),
        })?;
        run.advance(Phase::PairResolved);

        let before =
            reconcile::snapshot(client, self.contracts.factory, pair, request.recipient).await?;
        run.last_known = Some(before.state.clone());

        let supplier = Supplier::new(client, self.contracts);
        match strategy {
            Strategy::Router => {
                run.stage = Stage::Approve;
                supplier.approve_router(request, &mut run.outcomes).await?;
                run.advance(Phase::Approved);

                run.stage = Stage::Supply;
                run.advance(Phase::RouterSupply);
                supplier.supply_router(request, &mut run.outcomes).await?;
            }
            Strategy::Direct => {
                // Transfers to the pair need no allowance.
                run.advance(Phase::Approved);

                run.stage = Stage::Supply;
                run.advance(Phase::DirectSupply);
                supplier
                    .supply_direct(&before.state, request, &self.settings, &mut run.outcomes)
                    .await?;
            }
        }

        run.stage = Stage::Reconcile;
        let after =
            reconcile::snapshot(client, self.contracts.factory, pair, request.recipient).await?;
        run.last_known = Some(after.state.clone());
        let reconciliation = reconcile::verify(&before, &after)?;

        let reread = client.reserves(pair).await?;
        if reread != (after.state.reserve0, after.state.reserve1) {
            return Err(AppError::SilentFailure {
                detail: format!(
                    "reserves changed between consecutive reads: {:?} then {reread:?}",
                    (after.state.reserve0, after.state.reserve1)
                ),
            });
        }
        run.advance(Phase::Reconciled);
        info!(
            lp_minted = %reconciliation.lp_minted,
            reserve0 = %after.state.reserve0,
            reserve1 = %after.state.reserve1,
            "[RECONCILE] pool matches expectations"
        );

        run.advance(Phase::Done);
        Ok(LiquidityReport {
            strategy,
            recipient: request.recipient,
            outcomes: std::mem::take(&mut run.outcomes),
            initial_state: before.state,
            final_state: after.state,
            reconciliation,
        })
    }

    /// A native side must use the configured wrapped-native token.
    fn check_wrapped(&self, pool: &PoolIdentity) -> Result<()> {
        if let Some(Asset::Native { wrapped }) = pool.native() {
            if wrapped != self.contracts.wrapped_native {
                return Err(AppError::InvalidRequest(format!(
                    "native side wraps to {wrapped:?}, but the network's wrapped-native token is {:?}",
                    self.contracts.wrapped_native
                )));
            }
        }
        Ok(())
    }

    async fn verify_router(&self) -> Result<()> {
        let wiring = self.client.router_wiring(self.contracts.router).await?;
        if wiring.wrapped_native != self.contracts.wrapped_native {
            return Err(AppError::RouterMisconfigured {
                field: "WETH",
                expected: self.contracts.wrapped_native,
                actual: wiring.wrapped_native,
            });
        }
        if wiring.factory != self.contracts.factory {
            return Err(AppError::RouterMisconfigured {
                field: "factory",
                expected: self.contracts.factory,
                actual: wiring.factory,
            });
        }
        debug!(router = ?self.contracts.router, "[SUPPLY] router wiring verified");
        Ok(())
    }

    async fn fail(&self, mut run: Run, err: AppError) -> Failed {
        let source = run.classify(err);
        if let Some(pair) = run.last_known.as_ref().and_then(|s| s.address) {
            match PoolResolver::new(self.client.as_ref(), self.contracts.factory)
                .read_state(pair)
                .await
            {
                Ok(state) => run.last_known = Some(state),
                Err(e) => debug!(error = %e, "[PHASE] could not refresh pool state"),
            }
        }
        error!(
            stage = %run.stage,
            phase = ?run.phase,
            sent = run.outcomes.len(),
            error = %source,
            "[FAILED] liquidity run aborted"
        );
        Failed {
            stage: run.stage,
            source,
            last_known: run.last_known,
            outcomes: run.outcomes,
        }
    }
}
