//! Chain access for UniswapV2-style deployments.
//!
//! The orchestrator only talks to the chain through [`ChainClient`]. Reads are
//! side-effect free. Every write blocks until the transaction is included and
//! returns its [`TransactionOutcome`]; a call rejected during simulation comes
//! back as `AppError::Reverted` and nothing is broadcast. A call that is mined
//! and reverts comes back as an outcome with `success: false` and the reason
//! decoded.

use crate::errors::Result;
use crate::models::{TokenMeta, TransactionOutcome};
use async_trait::async_trait;
use ethers::types::{Address, U256};

pub mod bindings;
pub mod client;
#[cfg(test)]
pub mod mock;
pub mod state;

pub use client::EthersClient;
pub use state::PoolState;

/// What a router reports about its own wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterWiring {
    pub factory: Address,
    pub wrapped_native: Address,
}

/// Arguments for the router's combined add-liquidity entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterDeposit {
    /// `addLiquidityETH`; `amount_native` is attached as call value.
    WithNative {
        token: Address,
        amount_token_desired: U256,
        amount_token_min: U256,
        amount_native: U256,
        amount_native_min: U256,
        to: Address,
        deadline: u64,
    },
    /// `addLiquidity` for two plain tokens.
    Tokens {
        token_a: Address,
        token_b: Address,
        amount_a_desired: U256,
        amount_b_desired: U256,
        amount_a_min: U256,
        amount_b_min: U256,
        to: Address,
        deadline: u64,
    },
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address of the signer all writes are sent from.
    fn operator(&self) -> Address;

    async fn latest_timestamp(&self) -> Result<u64>;
    async fn gas_price(&self) -> Result<U256>;
    async fn native_balance(&self, owner: Address) -> Result<U256>;
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;
    async fn token_meta(&self, token: Address) -> Result<TokenMeta>;
    async fn router_wiring(&self, router: Address) -> Result<RouterWiring>;

    /// Zero address when the factory has no pair for the tokens.
    async fn get_pair(&self, factory: Address, token_a: Address, token_b: Address)
    -> Result<Address>;
    async fn pair_tokens(&self, pair: Address) -> Result<(Address, Address)>;
    async fn reserves(&self, pair: Address) -> Result<(U256, U256)>;
    async fn total_supply(&self, pair: Address) -> Result<U256>;

    async fn create_pair(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<TransactionOutcome>;
    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TransactionOutcome>;
    async fn transfer(&self, token: Address, to: Address, amount: U256)
    -> Result<TransactionOutcome>;
    async fn wrap_native(&self, wrapped: Address, amount: U256) -> Result<TransactionOutcome>;
    async fn add_liquidity(
        &self,
        router: Address,
        deposit: &RouterDeposit,
    ) -> Result<TransactionOutcome>;
    async fn mint(&self, pair: Address, to: Address) -> Result<TransactionOutcome>;
}
