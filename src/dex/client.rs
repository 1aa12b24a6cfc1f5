use super::bindings::{Erc20, UniswapV2Factory, UniswapV2Pair, UniswapV2Router02, WrappedNative};
use super::{ChainClient, RouterDeposit, RouterWiring};
use crate::errors::{AppError, Result};
use crate::models::{TokenMeta, TransactionOutcome};
use async_trait::async_trait;
use ethers::{
    abi::Detokenize,
    contract::{ContractCall, ContractError},
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, BlockNumber, U256},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Provider plus local signing key, the middleware every write goes through.
pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// How writes are sent and awaited.
#[derive(Debug, Clone)]
pub struct TxSettings {
    pub inclusion_timeout: Duration,
    pub confirmations: usize,
    /// Skips estimation for the router call when set.
    pub router_gas_limit: Option<u64>,
    pub mint_gas_limit: Option<u64>,
}

impl Default for TxSettings {
    fn default() -> Self {
        Self {
            inclusion_timeout: Duration::from_secs(120),
            confirmations: 1,
            router_gas_limit: None,
            mint_gas_limit: None,
        }
    }
}

/// [`ChainClient`] backed by ethers contract bindings.
#[derive(Clone)]
pub struct EthersClient<M> {
    client: Arc<M>,
    operator: Address,
    settings: TxSettings,
}

impl EthersClient<SignerClient> {
    /// Connects over HTTP and checks the node serves the expected chain.
    pub async fn connect(
        rpc_url: &str,
        private_key: &str,
        expected_chain_id: u64,
        settings: TxSettings,
    ) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)?;
        let chain_id = provider.get_chainid().await?.as_u64();
        if chain_id != expected_chain_id {
            return Err(AppError::Config(format!(
                "RPC serves chain {chain_id}, network config expects {expected_chain_id}"
            )));
        }
        let wallet = private_key
            .trim()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| AppError::Config(format!("invalid PRIVATE_KEY: {e}")))?
            .with_chain_id(chain_id);
        let operator = wallet.address();
        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        Ok(Self::new(client, operator, settings))
    }
}

impl<M: Middleware + 'static> EthersClient<M> {
    pub fn new(client: Arc<M>, operator: Address, settings: TxSettings) -> Self {
        Self {
            client,
            operator,
            settings,
        }
    }

    fn erc20(&self, token: Address) -> Erc20<M> {
        Erc20::new(token, self.client.clone())
    }

    fn pair(&self, pair: Address) -> UniswapV2Pair<M> {
        UniswapV2Pair::new(pair, self.client.clone())
    }

    fn router(&self, router: Address) -> UniswapV2Router02<M> {
        UniswapV2Router02::new(router, self.client.clone())
    }

    fn factory(&self, factory: Address) -> UniswapV2Factory<M> {
        UniswapV2Factory::new(factory, self.client.clone())
    }

    /// Broadcasts `call` and blocks until it is included (or the wait times out).
    ///
    /// Receipts carry no revert data, so a call that is mined and reverts is
    /// replayed at its block to recover the reason.
    async fn submit<D: Detokenize>(
        &self,
        label: &str,
        call: ContractCall<M, D>,
    ) -> Result<TransactionOutcome> {
        let pending = call.send().await.map_err(|e| write_error(label, e))?;
        let tx_hash = *pending;
        info!(label, ?tx_hash, "[TX] submitted, waiting for inclusion");

        let waited = self.settings.inclusion_timeout;
        let receipt = tokio::time::timeout(
            waited,
            pending.confirmations(self.settings.confirmations),
        )
        .await
        .map_err(|_| AppError::InclusionTimeout {
            tx_hash,
            waited_secs: waited.as_secs(),
        })??
        .ok_or(AppError::TransactionDropped { tx_hash })?;

        let mut outcome = TransactionOutcome::from_receipt(label, &receipt);
        if outcome.success {
            info!(
                label,
                ?tx_hash,
                block = ?outcome.block_number,
                gas_used = ?outcome.gas_used,
                "[TX] included"
            );
            return Ok(outcome);
        }

        let replay = match outcome.block_number {
            Some(block) => call.block(BlockNumber::Number(block.into())),
            None => call,
        };
        let replayed = replay
            .call()
            .await
            .map(|_| ())
            .map_err(|e| write_error(label, e));
        let reason = mined_revert_reason(replayed);
        warn!(label, ?tx_hash, block = ?outcome.block_number, %reason, "[TX] included but reverted");
        outcome.revert_reason = Some(reason);
        Ok(outcome)
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainClient for EthersClient<M> {
    fn operator(&self) -> Address {
        self.operator
    }

    async fn latest_timestamp(&self) -> Result<u64> {
        let block = self
            .client
            .get_block(BlockNumber::Latest)
            .await
            .map_err(rpc_error)?
            .ok_or_else(|| AppError::Rpc("latest block unavailable".into()))?;
        Ok(block.timestamp.as_u64())
    }

    async fn gas_price(&self) -> Result<U256> {
        self.client.get_gas_price().await.map_err(rpc_error)
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        self.client.get_balance(owner, None).await.map_err(rpc_error)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        self.erc20(token)
            .balance_of(owner)
            .call()
            .await
            .map_err(read_error)
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        self.erc20(token)
            .allowance(owner, spender)
            .call()
            .await
            .map_err(read_error)
    }

    async fn token_meta(&self, token: Address) -> Result<TokenMeta> {
        let erc20 = self.erc20(token);
        let decimals = erc20.decimals().call().await.map_err(read_error)?;
        // Some tokens return bytes32 symbols; the address is good enough for logs.
        let symbol = match erc20.symbol().call().await {
            Ok(s) => s,
            Err(e) => {
                warn!(?token, error = %e, "[DEX] symbol() unreadable");
                format!("{token:?}")
            }
        };
        Ok(TokenMeta {
            address: token,
            symbol,
            decimals,
        })
    }

    async fn router_wiring(&self, router: Address) -> Result<RouterWiring> {
        let router = self.router(router);
        let factory = router.factory().call().await.map_err(read_error)?;
        let wrapped_native = router.weth().call().await.map_err(read_error)?;
        Ok(RouterWiring {
            factory,
            wrapped_native,
        })
    }

    async fn get_pair(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<Address> {
        self.factory(factory)
            .get_pair(token_a, token_b)
            .call()
            .await
            .map_err(read_error)
    }

    async fn pair_tokens(&self, pair: Address) -> Result<(Address, Address)> {
        let pair = self.pair(pair);
        let token0 = pair.token_0().call().await.map_err(read_error)?;
        let token1 = pair.token_1().call().await.map_err(read_error)?;
        Ok((token0, token1))
    }

    async fn reserves(&self, pair: Address) -> Result<(U256, U256)> {
        let (reserve0, reserve1, _ts) = self
            .pair(pair)
            .get_reserves()
            .call()
            .await
            .map_err(read_error)?;
        Ok((U256::from(reserve0), U256::from(reserve1)))
    }

    async fn total_supply(&self, pair: Address) -> Result<U256> {
        self.pair(pair)
            .total_supply()
            .call()
            .await
            .map_err(read_error)
    }

    async fn create_pair(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<TransactionOutcome> {
        let call = self.factory(factory).create_pair(token_a, token_b);
        self.submit("createPair", call).await
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TransactionOutcome> {
        let call = self.erc20(token).approve(spender, amount);
        self.submit("approve", call).await
    }

    async fn transfer(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<TransactionOutcome> {
        let call = self.erc20(token).transfer(to, amount);
        self.submit("transfer", call).await
    }

    async fn wrap_native(&self, wrapped: Address, amount: U256) -> Result<TransactionOutcome> {
        let call = WrappedNative::new(wrapped, self.client.clone())
            .deposit()
            .value(amount);
        self.submit("deposit", call).await
    }

    async fn add_liquidity(
        &self,
        router: Address,
        deposit: &RouterDeposit,
    ) -> Result<TransactionOutcome> {
        let router = self.router(router);
        let (label, mut call) = match deposit {
            RouterDeposit::WithNative {
                token,
                amount_token_desired,
                amount_token_min,
                amount_native,
                amount_native_min,
                to,
                deadline,
            } => (
                "addLiquidityETH",
                router
                    .add_liquidity_eth(
                        *token,
                        *amount_token_desired,
                        *amount_token_min,
                        *amount_native_min,
                        *to,
                        U256::from(*deadline),
                    )
                    .value(*amount_native),
            ),
            RouterDeposit::Tokens {
                token_a,
                token_b,
                amount_a_desired,
                amount_b_desired,
                amount_a_min,
                amount_b_min,
                to,
                deadline,
            } => (
                "addLiquidity",
                router.add_liquidity(
                    *token_a,
                    *token_b,
                    *amount_a_desired,
                    *amount_b_desired,
                    *amount_a_min,
                    *amount_b_min,
                    *to,
                    U256::from(*deadline),
                ),
            ),
        };
        if let Some(limit) = self.settings.router_gas_limit {
            call = call.gas(limit);
        }
        self.submit(label, call).await
    }

    async fn mint(&self, pair: Address, to: Address) -> Result<TransactionOutcome> {
        let mut call = self.pair(pair).mint(to);
        if let Some(limit) = self.settings.mint_gas_limit {
            call = call.gas(limit);
        }
        self.submit("mint", call).await
    }
}

fn rpc_error<E: std::fmt::Display>(err: E) -> AppError {
    AppError::Rpc(err.to_string())
}

fn read_error<M: Middleware>(err: ContractError<M>) -> AppError {
    AppError::Contract(err.to_string())
}

/// Maps a failed send into `Reverted` when the node rejected it in simulation.
fn write_error<M: Middleware>(label: &str, err: ContractError<M>) -> AppError {
    if let Some(reason) = err.decode_revert::<String>() {
        return AppError::Reverted { reason };
    }
    if err.as_revert().is_some() {
        return AppError::Reverted {
            reason: "reverted without reason".into(),
        };
    }
    let message = err.to_string();
    match revert_reason_from_message(&message) {
        Some(reason) => AppError::Reverted { reason },
        None => AppError::Contract(format!("{label}: {message}")),
    }
}

/// Reason for a mined revert, taken from replaying the call at its block.
fn mined_revert_reason(replay: Result<()>) -> String {
    match replay {
        Err(AppError::Reverted { reason }) => reason,
        Err(other) => format!("reverted on-chain; replay failed: {other}"),
        Ok(()) => "reverted on-chain; replay at the same block succeeded".into(),
    }
}

/// Extracts the reason from node messages like `execution reverted: EXPIRED`.
fn revert_reason_from_message(message: &str) -> Option<String> {
    let idx = message.find("execution reverted")?;
    let rest = &message[idx + "execution reverted".len()..];
    let reason = rest
        .split(", data:")
        .next()
        .unwrap_or(rest)
        .trim_start_matches(':')
        .trim();
    if reason.is_empty() {
        Some("reverted without reason".into())
    } else {
        Some(reason.to_string())
    }
}
