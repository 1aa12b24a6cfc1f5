//! Configuration loader and application settings.
//!
//! Contract addresses live in a `deployments.json` file keyed by network
//! name; everything about the run itself comes from environment variables.

use crate::errors::{AppError, Result};
use crate::liquidity::{DonationPolicy, Strategy, SupplySettings};
use crate::models::{Asset, AssetAmount, LiquidityRequest, min_with_slippage};
use crate::utils::parse_units;
use ethers::types::{Address, U256};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Well-known contracts of one UniswapV2 deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contracts {
    pub factory: Address,
    pub router: Address,
    pub wrapped_native: Address,
}

/// One entry of `deployments.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    #[serde(flatten)]
    pub contracts: Contracts,
    /// Named tokens, so assets can be given by symbol.
    #[serde(default)]
    pub tokens: HashMap<String, Address>,
    #[serde(default)]
    pub explorer_url: Option<String>,
}

impl NetworkConfig {
    pub fn token(&self, symbol: &str) -> Option<Address> {
        self.tokens
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(symbol))
            .map(|(_, addr)| *addr)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct Deployments {
    networks: HashMap<String, NetworkConfig>,
}

impl Deployments {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read deployments file {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        self.networks.get(name).ok_or_else(|| {
            let mut known: Vec<_> = self.networks.keys().map(String::as_str).collect();
            known.sort_unstable();
            AppError::Config(format!(
                "network {name:?} not in deployments (known: {})",
                known.join(", ")
            ))
        })
    }
}

/// How an asset is named in the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSpec {
    Native,
    Symbol(String),
    Address(Address),
}

impl FromStr for AssetSpec {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("native") {
            return Ok(AssetSpec::Native);
        }
        if s.starts_with("0x") {
            let addr = s
                .parse::<Address>()
                .map_err(|e| AppError::Config(format!("invalid asset address {s:?}: {e}")))?;
            return Ok(AssetSpec::Address(addr));
        }
        if s.is_empty() {
            return Err(AppError::Config("asset must not be empty".into()));
        }
        Ok(AssetSpec::Symbol(s.to_string()))
    }
}

impl AssetSpec {
    pub fn resolve(&self, network: &NetworkConfig) -> Result<Asset> {
        match self {
            AssetSpec::Native => Ok(Asset::Native {
                wrapped: network.contracts.wrapped_native,
            }),
            AssetSpec::Address(addr) => Ok(Asset::Token(*addr)),
            AssetSpec::Symbol(symbol) => network
                .token(symbol)
                .map(Asset::Token)
                .ok_or_else(|| AppError::Config(format!("unknown token symbol {symbol:?}"))),
        }
    }
}

/// Signing key; never printed.
#[derive(Clone)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Resolve the pair and add liquidity.
    Supply,
    /// Only resolve (and if needed create) the pair.
    Resolve,
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supply" => Ok(Action::Supply),
            "resolve" => Ok(Action::Resolve),
            other => Err(AppError::Config(format!(
                "unknown action {other:?} (expected supply or resolve)"
            ))),
        }
    }
}

/// Gas configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct GasConfig {
    /// Gas units assumed for the fee reserve estimate.
    pub gas_units: u64,
    pub gas_multiplier: f64,
    pub router_gas_limit: Option<u64>,
    pub mint_gas_limit: Option<u64>,
}

/// Load gas configuration from environment variables
fn gas_config_from(lookup: &dyn Fn(&str) -> Option<String>) -> Result<GasConfig> {
    Ok(GasConfig {
        gas_units: parse_var(lookup, "GAS_UNITS")?.unwrap_or(500_000),
        gas_multiplier: parse_var(lookup, "GAS_MULTIPLIER")?.unwrap_or(1.2),
        router_gas_limit: parse_var(lookup, "ROUTER_GAS_LIMIT")?,
        mint_gas_limit: parse_var(lookup, "MINT_GAS_LIMIT")?,
    })
}

/// Consolidated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub network_name: String,
    pub network: NetworkConfig,
    /// `RPC_URL` when set, otherwise the network's own endpoint.
    pub rpc_url: String,
    pub private_key: PrivateKey,
    pub action: Action,
    pub asset_a: AssetSpec,
    pub asset_b: AssetSpec,
    /// Human-readable quantities, converted once token decimals are known.
    pub amount_a: Option<String>,
    pub amount_b: Option<String>,
    pub min_a: Option<String>,
    pub min_b: Option<String>,
    pub slippage_bps: Option<u32>,
    pub recipient: Option<Address>,
    pub deadline_secs: u64,
    pub strategy: Strategy,
    pub donation_policy: DonationPolicy,
    pub ratio_tolerance_bps: u32,
    /// Native currency held back for gas; estimated from gas price when unset.
    pub fee_reserve: Option<String>,
    pub verify_router: bool,
    pub inclusion_timeout: Duration,
    pub confirmations: usize,
    pub report_dir: PathBuf,
    pub gas: GasConfig,
}

impl AppConfig {
    /// Load configuration from the process environment and the deployments
    /// file named by `DEPLOYMENTS_FILE` (default `deployments.json`).
    pub fn load() -> Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok();
        let path = lookup("DEPLOYMENTS_FILE").unwrap_or_else(|| "deployments.json".into());
        let deployments = Deployments::load(Path::new(&path))?;
        Self::from_lookup(&lookup, &deployments)
    }

    pub fn from_lookup(
        lookup: &dyn Fn(&str) -> Option<String>,
        deployments: &Deployments,
    ) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require =
            |key: &str| get(key).ok_or_else(|| AppError::Config(format!("{key} is not set")));

        let network_name = require("NETWORK")?;
        let network = deployments.network(&network_name)?.clone();
        let rpc_url = get("RPC_URL").unwrap_or_else(|| network.rpc_url.clone());
        let private_key = PrivateKey(require("PRIVATE_KEY")?);
        let action = get("ACTION")
            .map(|v| v.parse::<Action>())
            .transpose()?
            .unwrap_or(Action::Supply);

        let asset_a: AssetSpec = get("ASSET_A").unwrap_or_else(|| "native".into()).parse()?;
        let asset_b: AssetSpec = require("ASSET_B")?.parse()?;
        let (amount_a, amount_b) = (get("AMOUNT_A"), get("AMOUNT_B"));
        if action == Action::Supply && (amount_a.is_none() || amount_b.is_none()) {
            return Err(AppError::Config(
                "AMOUNT_A and AMOUNT_B are required to supply liquidity".into(),
            ));
        }

        let recipient = get("RECIPIENT")
            .map(|v| {
                v.parse::<Address>()
                    .map_err(|e| AppError::Config(format!("invalid RECIPIENT {v:?}: {e}")))
            })
            .transpose()?;

        Ok(Self {
            network_name,
            network,
            rpc_url,
            private_key,
            action,
            asset_a,
            asset_b,
            amount_a,
            amount_b,
            min_a: get("MIN_A"),
            min_b: get("MIN_B"),
            slippage_bps: parse_var(lookup, "SLIPPAGE_BPS")?,
            recipient,
            deadline_secs: parse_var(lookup, "DEADLINE_SECS")?.unwrap_or(1_200),
            strategy: get("STRATEGY")
                .map(|v| v.parse::<Strategy>())
                .transpose()?
                .unwrap_or(Strategy::Router),
            donation_policy: get("DONATION_POLICY")
                .map(|v| v.parse::<DonationPolicy>())
                .transpose()?
                .unwrap_or(DonationPolicy::Abort),
            ratio_tolerance_bps: parse_var(lookup, "RATIO_TOLERANCE_BPS")?.unwrap_or(10),
            fee_reserve: get("FEE_RESERVE"),
            verify_router: parse_var(lookup, "VERIFY_ROUTER")?.unwrap_or(true),
            inclusion_timeout: Duration::from_secs(
                parse_var(lookup, "INCLUSION_TIMEOUT_SECS")?.unwrap_or(120),
            ),
            confirmations: parse_var(lookup, "CONFIRMATIONS")?.unwrap_or(1),
            report_dir: get("REPORT_DIR").map(PathBuf::from).unwrap_or_default(),
            gas: gas_config_from(lookup)?,
        })
    }

    pub fn supply_settings(&self, fee_reserve: U256) -> SupplySettings {
        SupplySettings {
            fee_reserve,
            donation_policy: self.donation_policy,
            ratio_tolerance_bps: self.ratio_tolerance_bps,
            verify_router: self.verify_router,
        }
    }

    /// Builds the request in smallest units. Minimums come from `MIN_A`/`MIN_B`
    /// when given, else from `SLIPPAGE_BPS`, else zero.
    pub fn liquidity_request(
        &self,
        (asset_a, decimals_a): (Asset, u8),
        (asset_b, decimals_b): (Asset, u8),
        operator: Address,
        now: u64,
    ) -> Result<LiquidityRequest> {
        let amount = |v: &Option<String>, key: &str, decimals| match v {
            Some(human) => parse_units(human, decimals),
            None => Err(AppError::Config(format!("{key} is not set"))),
        };
        let desired_a = amount(&self.amount_a, "AMOUNT_A", decimals_a)?;
        let desired_b = amount(&self.amount_b, "AMOUNT_B", decimals_b)?;

        let minimum = |explicit: &Option<String>, desired: U256, decimals| -> Result<U256> {
            match (explicit, self.slippage_bps) {
                (Some(human), _) => parse_units(human, decimals),
                (None, Some(bps)) => Ok(min_with_slippage(desired, bps)),
                (None, None) => Ok(U256::zero()),
            }
        };
        let min_a = minimum(&self.min_a, desired_a, decimals_a)?;
        let min_b = minimum(&self.min_b, desired_b, decimals_b)?;
        if self.min_a.is_none() && self.min_b.is_none() && self.slippage_bps.is_none() {
            warn!("[INIT] neither MIN_A/MIN_B nor SLIPPAGE_BPS set, minimums are zero");
        }

        Ok(LiquidityRequest {
            desired_a: AssetAmount::new(asset_a, desired_a),
            desired_b: AssetAmount::new(asset_b, desired_b),
            min_a,
            min_b,
            recipient: self.recipient.unwrap_or(operator),
            deadline: now.saturating_add(self.deadline_secs),
        })
    }

    /// `<REPORT_DIR>/liquidity-<network>.json`
    pub fn report_path(&self) -> PathBuf {
        self.report_dir
            .join(format!("liquidity-{}.json", self.network_name))
    }
}

fn parse_var<T>(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|e| AppError::Config(format!("invalid {key} {v:?}: {e}"))),
    }
}
