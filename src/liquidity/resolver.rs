//! Pool resolution: find the pair for two tokens, creating it when missing.

use crate::dex::{ChainClient, PoolState};
use crate::errors::{AppError, Result};
use crate::models::{PoolIdentity, TransactionOutcome};
use ethers::types::Address;
use serde::Serialize;
use tracing::{info, warn};

/// Pair state plus the creation transaction, if this call sent one.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub state: PoolState,
    pub creation: Option<TransactionOutcome>,
}

pub struct PoolResolver<'a, C: ?Sized> {
    client: &'a C,
    factory: Address,
}

impl<'a, C: ChainClient + ?Sized> PoolResolver<'a, C> {
    pub fn new(client: &'a C, factory: Address) -> Self {
        Self { client, factory }
    }

    /// Read-only lookup; returns an absent state when no pair exists.
    pub async fn lookup(&self, pool: &PoolIdentity) -> Result<PoolState> {
        let (a, b) = (pool.a().token(), pool.b().token());
        let pair = self.client.get_pair(self.factory, a, b).await?;
        if pair.is_zero() {
            let (t0, t1) = pool.sorted_tokens();
            return Ok(PoolState::absent(t0, t1));
        }
        self.read_state(pair).await
    }

    /// Reads canonical token order, reserves and LP supply from the pair.
    pub async fn read_state(&self, pair: Address) -> Result<PoolState> {
        let ((token0, token1), (reserve0, reserve1), total_supply) = futures::try_join!(
            self.client.pair_tokens(pair),
            self.client.reserves(pair),
            self.client.total_supply(pair),
        )?;
        Ok(PoolState::new(
            pair,
            token0,
            token1,
            reserve0,
            reserve1,
            total_supply,
        ))
    }

    /// Returns the pair for `pool`, sending `createPair` only when the factory
    /// has none. The factory is re-queried after creation instead of trusting
    /// the call's return value. Sent transactions are appended to `journal`.
    pub async fn resolve(
        &self,
        pool: &PoolIdentity,
        journal: &mut Vec<TransactionOutcome>,
    ) -> Result<Resolution> {
        let existing = self.lookup(pool).await?;
        if existing.exists {
            info!(pair = ?existing.address, "[RESOLVE] pair already exists");
            return Ok(Resolution {
                state: existing,
                creation: None,
            });
        }

        let (a, b) = (pool.a().token(), pool.b().token());
        info!(token_a = ?a, token_b = ?b, "[RESOLVE] no pair yet, creating");
        let creation = match self.client.create_pair(self.factory, a, b).await {
            Ok(outcome) if outcome.success => {
                journal.push(outcome.clone());
                Some(outcome)
            }
            Ok(outcome) => {
                journal.push(outcome.clone());
                let reason = outcome
                    .revert_reason
                    .unwrap_or_else(|| "reverted without reason".into());
                return self.adopt_raced(pool, reason).await;
            }
            Err(AppError::Reverted { reason }) => return self.adopt_raced(pool, reason).await,
            Err(other) => return Err(other),
        };

        let created = self.lookup(pool).await?;
        if !created.exists {
            return Err(AppError::PoolCreationFailed {
                reason: "factory still reports no pair after creation".into(),
            });
        }
        info!(pair = ?created.address, token0 = ?created.token0, "[RESOLVE] pair created");
        Ok(Resolution {
            state: created,
            creation,
        })
    }

    /// After a failed `createPair`, someone else may have created the pair
    /// since our lookup.
    async fn adopt_raced(&self, pool: &PoolIdentity, reason: String) -> Result<Resolution> {
        let raced = self.lookup(pool).await?;
        if raced.exists {
            warn!(%reason, pair = ?raced.address, "[RESOLVE] creation reverted but pair now exists");
            return Ok(Resolution {
                state: raced,
                creation: None,
            });
        }
        Err(AppError::PoolCreationFailed { reason })
    }
}
