//! In-memory UniswapV2 deployment for exercising the orchestrator.
//!
//! Mirrors the factory/router/pair semantics the bootstrapper relies on:
//! sorted token order, `EXPIRED` and `INSUFFICIENT_*_AMOUNT` router checks,
//! allowance-gated `transferFrom`, and `mint` crediting balance above reserves.
//! Gas is not charged. Knobs inject the failures a live chain produces.

use super::{ChainClient, RouterDeposit, RouterWiring};
use crate::errors::{AppError, Result};
use crate::models::{TokenMeta, TransactionOutcome};
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use std::collections::HashMap;
use std::sync::Mutex;

pub const MINIMUM_LIQUIDITY: u64 = 1_000;

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub fn units(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

#[derive(Debug, Clone)]
struct MockPair {
    token0: Address,
    token1: Address,
    reserve0: U256,
    reserve1: U256,
    total_supply: U256,
}

#[derive(Debug, Default, Clone)]
struct Ledger {
    now: u64,
    native: HashMap<Address, U256>,
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    pairs: HashMap<(Address, Address), Address>,
    pools: HashMap<Address, MockPair>,
    sent: Vec<String>,
    block: u64,
    // knobs
    fail_create: Option<String>,
    rival_create: Option<bool>,
    mined_revert: Option<(String, String)>,
    router_noop: bool,
    timeout_label: Option<String>,
    router_wiring: Option<RouterWiring>,
}

pub struct MockChain {
    pub operator: Address,
    pub factory: Address,
    pub router: Address,
    pub wrapped: Address,
    ledger: Mutex<Ledger>,
}

impl MockChain {
    pub fn new(operator: Address, factory: Address, router: Address, wrapped: Address) -> Self {
        let ledger = Ledger {
            now: 1_700_000_000,
            block: 100,
            ..Ledger::default()
        };
        Self {
            operator,
            factory,
            router,
            wrapped,
            ledger: Mutex::new(ledger),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap()
    }

    pub fn now(&self) -> u64 {
        self.lock().now
    }

    pub fn fund_native(&self, who: Address, amount: U256) {
        *self.lock().native.entry(who).or_default() += amount;
    }

    pub fn fund_token(&self, token: Address, who: Address, amount: U256) {
        *self.lock().balances.entry((token, who)).or_default() += amount;
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.lock().allowances.insert((token, owner, spender), amount);
    }

    pub fn fail_create(&self, reason: &str) {
        self.lock().fail_create = Some(reason.to_string());
    }

    /// Another account creates the pair just before our next `createPair`.
    /// With `mined`, ours is still included and reverts on-chain with
    /// `PAIR_EXISTS`; otherwise simulation rejects it.
    pub fn rival_creates_pair(&self, mined: bool) {
        self.lock().rival_create = Some(mined);
    }

    /// The next write with this label is included but reverts with `reason`,
    /// leaving state untouched.
    pub fn revert_on_chain(&self, label: &str, reason: &str) {
        self.lock().mined_revert = Some((label.to_string(), reason.to_string()));
    }

    /// Router calls get included but do nothing.
    pub fn router_noop(&self) {
        self.lock().router_noop = true;
    }

    /// The next write with this label never confirms.
    pub fn time_out(&self, label: &str) {
        self.lock().timeout_label = Some(label.to_string());
    }

    pub fn set_router_wiring(&self, wiring: RouterWiring) {
        self.lock().router_wiring = Some(wiring);
    }

    /// Labels of every broadcast transaction, in order.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.lock().sent.iter().filter(|l| l.as_str() == label).count()
    }

    pub fn balance(&self, token: Address, who: Address) -> U256 {
        self.lock()
            .balances
            .get(&(token, who))
            .copied()
            .unwrap_or_default()
    }

    /// Creates a pair and seeds it through a third party, as if another LP
    /// had bootstrapped it earlier.
    pub fn seed_pool(&self, token_a: Address, token_b: Address, amount_a: U256, amount_b: U256) {
        let lp = addr(0xdead_beef);
        let mut l = self.lock();
        let pair = l.create(token_a, token_b).unwrap();
        *l.balances.entry((token_a, pair)).or_default() += amount_a;
        *l.balances.entry((token_b, pair)).or_default() += amount_b;
        l.mint(pair, lp).unwrap();
    }

    fn route(&self, l: &mut Ledger, deposit: &RouterDeposit) -> std::result::Result<(), String> {
        let (router, operator) = (self.router, self.operator);
        match deposit {
            RouterDeposit::WithNative {
                token,
                amount_token_desired,
                amount_token_min,
                amount_native,
                amount_native_min,
                to,
                deadline,
            } => {
                if *deadline < l.now {
                    return Err("UniswapV2Router: EXPIRED".into());
                }
                let (pair, amount_token, amount_eth) = l.optimal(
                    *token,
                    self.wrapped,
                    *amount_token_desired,
                    *amount_native,
                    *amount_token_min,
                    *amount_native_min,
                )?;
                let have = l.native.get(&operator).copied().unwrap_or_default();
                if have < *amount_native {
                    return Err("insufficient funds for value".into());
                }
                l.transfer_from(*token, operator, router, pair, amount_token)?;
                l.native.insert(operator, have - amount_eth);
                *l.balances.entry((self.wrapped, pair)).or_default() += amount_eth;
                l.mint(pair, *to)?;
            }
            RouterDeposit::Tokens {
                token_a,
                token_b,
                amount_a_desired,
                amount_b_desired,
                amount_a_min,
                amount_b_min,
                to,
                deadline,
            } => {
                if *deadline < l.now {
                    return Err("UniswapV2Router: EXPIRED".into());
                }
                let (pair, amount_a, amount_b) = l.optimal(
                    *token_a,
                    *token_b,
                    *amount_a_desired,
                    *amount_b_desired,
                    *amount_a_min,
                    *amount_b_min,
                )?;
                l.transfer_from(*token_a, operator, router, pair, amount_a)?;
                l.transfer_from(*token_b, operator, router, pair, amount_b)?;
                l.mint(pair, *to)?;
            }
        }
        Ok(())
    }
}

fn sorted(a: Address, b: Address) -> (Address, Address) {
    if a < b { (a, b) } else { (b, a) }
}

fn quote(amount_a: U256, reserve_a: U256, reserve_b: U256) -> U256 {
    amount_a * reserve_b / reserve_a
}

impl Ledger {
    fn bal(&self, token: Address, who: Address) -> U256 {
        self.balances
            .get(&(token, who))
            .copied()
            .unwrap_or_default()
    }

    fn move_tokens(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> std::result::Result<(), String> {
        let have = self.bal(token, from);
        if have < amount {
            return Err("TransferHelper: TRANSFER_FAILED".into());
        }
        self.balances.insert((token, from), have - amount);
        *self.balances.entry((token, to)).or_default() += amount;
        Ok(())
    }

    fn transfer_from(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        to: Address,
        amount: U256,
    ) -> std::result::Result<(), String> {
        let allowed = self
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default();
        if allowed < amount || self.bal(token, owner) < amount {
            return Err("TransferHelper: TRANSFER_FROM_FAILED".into());
        }
        self.allowances.insert((token, owner, spender), allowed - amount);
        self.move_tokens(token, owner, to, amount)
    }

    fn create(&mut self, a: Address, b: Address) -> std::result::Result<Address, String> {
        let key = sorted(a, b);
        if self.pairs.contains_key(&key) {
            return Err("UniswapV2: PAIR_EXISTS".into());
        }
        let pair = addr(0x1000 + self.pairs.len() as u64);
        self.pairs.insert(key, pair);
        self.pools.insert(
            pair,
            MockPair {
                token0: key.0,
                token1: key.1,
                reserve0: U256::zero(),
                reserve1: U256::zero(),
                total_supply: U256::zero(),
            },
        );
        Ok(pair)
    }

    fn mint(&mut self, pair: Address, to: Address) -> std::result::Result<U256, String> {
        let p = self.pools.get(&pair).cloned().ok_or("no such pair")?;
        let bal0 = self.bal(p.token0, pair);
        let bal1 = self.bal(p.token1, pair);
        let amount0 = bal0 - p.reserve0;
        let amount1 = bal1 - p.reserve1;
        let min_liq = U256::from(MINIMUM_LIQUIDITY);
        let liquidity = if p.total_supply.is_zero() {
            let root = (amount0 * amount1).integer_sqrt();
            if root <= min_liq {
                return Err("UniswapV2: INSUFFICIENT_LIQUIDITY_MINTED".into());
            }
            *self.balances.entry((pair, Address::zero())).or_default() += min_liq;
            root - min_liq
        } else {
            let l0 = amount0 * p.total_supply / p.reserve0;
            let l1 = amount1 * p.total_supply / p.reserve1;
            l0.min(l1)
        };
        if liquidity.is_zero() {
            return Err("UniswapV2: INSUFFICIENT_LIQUIDITY_MINTED".into());
        }
        *self.balances.entry((pair, to)).or_default() += liquidity;
        let minted_total = if p.total_supply.is_zero() {
            liquidity + min_liq
        } else {
            liquidity
        };
        let pool = self.pools.get_mut(&pair).ok_or("no such pair")?;
        pool.total_supply += minted_total;
        pool.reserve0 = bal0;
        pool.reserve1 = bal1;
        Ok(liquidity)
    }

    /// The router's `_addLiquidity` amount selection.
    fn optimal(
        &mut self,
        token_a: Address,
        token_b: Address,
        desired_a: U256,
        desired_b: U256,
        min_a: U256,
        min_b: U256,
    ) -> std::result::Result<(Address, U256, U256), String> {
        let key = sorted(token_a, token_b);
        let pair = match self.pairs.get(&key) {
            Some(p) => *p,
            None => self.create(token_a, token_b)?,
        };
        let p = self.pools[&pair].clone();
        let (reserve_a, reserve_b) = if p.token0 == token_a {
            (p.reserve0, p.reserve1)
        } else {
            (p.reserve1, p.reserve0)
        };
        if reserve_a.is_zero() && reserve_b.is_zero() {
            return Ok((pair, desired_a, desired_b));
        }
        let optimal_b = quote(desired_a, reserve_a, reserve_b);
        if optimal_b <= desired_b {
            if optimal_b < min_b {
                return Err("UniswapV2Router: INSUFFICIENT_B_AMOUNT".into());
            }
            Ok((pair, desired_a, optimal_b))
        } else {
            let optimal_a = quote(desired_b, reserve_b, reserve_a);
            if optimal_a < min_a {
                return Err("UniswapV2Router: INSUFFICIENT_A_AMOUNT".into());
            }
            Ok((pair, optimal_a, desired_b))
        }
    }

    fn record(&mut self, label: &str) -> std::result::Result<TransactionOutcome, AppError> {
        if self.timeout_label.as_deref() == Some(label) {
            self.timeout_label = None;
            let tx_hash = H256::from_low_u64_be(self.sent.len() as u64 + 1);
            self.sent.push(label.to_string());
            return Err(AppError::InclusionTimeout {
                tx_hash,
                waited_secs: 120,
            });
        }
        Ok(self.include(label, None))
    }

    fn include(&mut self, label: &str, revert_reason: Option<String>) -> TransactionOutcome {
        let tx_hash = H256::from_low_u64_be(self.sent.len() as u64 + 1);
        self.sent.push(label.to_string());
        self.block += 1;
        self.now += 12;
        TransactionOutcome {
            label: label.to_string(),
            tx_hash,
            block_number: Some(self.block),
            gas_used: Some(U256::from(100_000u64)),
            success: revert_reason.is_none(),
            revert_reason,
        }
    }

    /// Consumes the on-chain revert knob when it targets `label`.
    fn mined_revert(&mut self, label: &str) -> Option<TransactionOutcome> {
        match &self.mined_revert {
            Some((target, _)) if target == label => {}
            _ => return None,
        }
        let (_, reason) = self.mined_revert.take()?;
        Some(self.include(label, Some(reason)))
    }
}

fn simulate<T>(r: std::result::Result<T, String>) -> Result<T> {
    r.map_err(|reason| AppError::Reverted { reason })
}

#[async_trait]
impl ChainClient for MockChain {
    fn operator(&self) -> Address {
        self.operator
    }

    async fn latest_timestamp(&self) -> Result<u64> {
        Ok(self.lock().now)
    }

    async fn gas_price(&self) -> Result<U256> {
        Ok(U256::from(50_000_000_000u64))
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        Ok(self.lock().native.get(&owner).copied().unwrap_or_default())
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        Ok(self.lock().bal(token, owner))
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        Ok(self
            .lock()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn token_meta(&self, token: Address) -> Result<TokenMeta> {
        Ok(TokenMeta {
            address: token,
            symbol: if token == self.wrapped {
                "WNATIVE".into()
            } else {
                "TKN".into()
            },
            decimals: 18,
        })
    }

    async fn router_wiring(&self, _router: Address) -> Result<RouterWiring> {
        Ok(self.lock().router_wiring.unwrap_or(RouterWiring {
            factory: self.factory,
            wrapped_native: self.wrapped,
        }))
    }

    async fn get_pair(
        &self,
        _factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<Address> {
        Ok(self
            .lock()
            .pairs
            .get(&sorted(token_a, token_b))
            .copied()
            .unwrap_or_else(Address::zero))
    }

    async fn pair_tokens(&self, pair: Address) -> Result<(Address, Address)> {
        let l = self.lock();
        let p = l
            .pools
            .get(&pair)
            .ok_or_else(|| AppError::Contract("no such pair".into()))?;
        Ok((p.token0, p.token1))
    }

    async fn reserves(&self, pair: Address) -> Result<(U256, U256)> {
        let l = self.lock();
        let p = l
            .pools
            .get(&pair)
            .ok_or_else(|| AppError::Contract("no such pair".into()))?;
        Ok((p.reserve0, p.reserve1))
    }

    async fn total_supply(&self, pair: Address) -> Result<U256> {
        let l = self.lock();
        let p = l
            .pools
            .get(&pair)
            .ok_or_else(|| AppError::Contract("no such pair".into()))?;
        Ok(p.total_supply)
    }

    async fn create_pair(
        &self,
        _factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<TransactionOutcome> {
        let mut l = self.lock();
        if let Some(reason) = l.fail_create.clone() {
            return Err(AppError::Reverted { reason });
        }
        if let Some(mined) = l.rival_create.take() {
            simulate(l.create(token_a, token_b))?;
            if mined {
                return Ok(l.include("createPair", Some("UniswapV2: PAIR_EXISTS".into())));
            }
        }
        if let Some(outcome) = l.mined_revert("createPair") {
            return Ok(outcome);
        }
        simulate(l.create(token_a, token_b))?;
        l.record("createPair")
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TransactionOutcome> {
        let mut l = self.lock();
        if let Some(outcome) = l.mined_revert("approve") {
            return Ok(outcome);
        }
        l.allowances.insert((token, self.operator, spender), amount);
        l.record("approve")
    }

    async fn transfer(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<TransactionOutcome> {
        let mut l = self.lock();
        if let Some(outcome) = l.mined_revert("transfer") {
            return Ok(outcome);
        }
        simulate(l.move_tokens(token, self.operator, to, amount))?;
        l.record("transfer")
    }

    async fn wrap_native(&self, wrapped: Address, amount: U256) -> Result<TransactionOutcome> {
        let mut l = self.lock();
        if let Some(outcome) = l.mined_revert("deposit") {
            return Ok(outcome);
        }
        let have = l.native.get(&self.operator).copied().unwrap_or_default();
        if have < amount {
            return Err(AppError::Reverted {
                reason: "insufficient funds for value".into(),
            });
        }
        l.native.insert(self.operator, have - amount);
        *l.balances.entry((wrapped, self.operator)).or_default() += amount;
        l.record("deposit")
    }

    async fn add_liquidity(
        &self,
        _router: Address,
        deposit: &RouterDeposit,
    ) -> Result<TransactionOutcome> {
        let mut l = self.lock();
        let label = match deposit {
            RouterDeposit::WithNative { .. } => "addLiquidityETH",
            RouterDeposit::Tokens { .. } => "addLiquidity",
        };
        if let Some(outcome) = l.mined_revert(label) {
            return Ok(outcome);
        }
        if l.router_noop {
            return l.record(label);
        }
        // A reverted call leaves no trace, pair creation included.
        let snapshot = l.clone();
        match self.route(&mut l, deposit) {
            Ok(()) => l.record(label),
            Err(reason) => {
                *l = snapshot;
                Err(AppError::Reverted { reason })
            }
        }
    }

    async fn mint(&self, pair: Address, to: Address) -> Result<TransactionOutcome> {
        let mut l = self.lock();
        if let Some(outcome) = l.mined_revert("mint") {
            return Ok(outcome);
        }
        simulate(l.mint(pair, to))?;
        l.record("mint")
    }
}
