//! Run summaries: log lines for the operator and a JSON record per network.

use crate::dex::PoolState;
use crate::errors::{AppError, Failed, Result, Stage, SupplyRevert};
use crate::liquidity::{LiquidityReport, Resolution};
use crate::models::{TokenMeta, TransactionOutcome};
use crate::utils::{format_units, signed_delta};
use ethers::types::{Address, U256};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

/// LP shares of UniswapV2 pairs always carry 18 decimals.
const LP_DECIMALS: u8 = 18;

/// Token metadata for rendering amounts.
#[derive(Debug, Clone, Default)]
pub struct TokenBook {
    metas: HashMap<Address, TokenMeta>,
}

impl TokenBook {
    pub fn new(metas: impl IntoIterator<Item = TokenMeta>) -> Self {
        Self {
            metas: metas.into_iter().map(|m| (m.address, m)).collect(),
        }
    }

    pub fn symbol(&self, token: Address) -> String {
        self.metas
            .get(&token)
            .map(|m| m.symbol.clone())
            .unwrap_or_else(|| format!("{token:?}"))
    }

    /// "1.5 WMON"; raw units when the token is unknown.
    pub fn amount(&self, token: Address, amount: U256) -> String {
        match self.metas.get(&token) {
            Some(meta) => format!("{} {}", format_units(amount, meta.decimals), meta.symbol),
            None => format!("{amount} units of {token:?}"),
        }
    }
}

pub fn log_outcomes(outcomes: &[TransactionOutcome], explorer: Option<&str>) {
    for o in outcomes {
        let link = explorer.map(|base| format!("{}/tx/{:?}", base.trim_end_matches('/'), o.tx_hash));
        if o.success {
            info!(
                label = %o.label,
                tx = ?o.tx_hash,
                block = ?o.block_number,
                gas_used = ?o.gas_used,
                link = ?link,
                "[REPORT] transaction included"
            );
        } else {
            warn!(
                label = %o.label,
                tx = ?o.tx_hash,
                block = ?o.block_number,
                reason = ?o.revert_reason,
                link = ?link,
                "[REPORT] transaction reverted"
            );
        }
    }
}

pub fn log_pool_state(state: &PoolState, book: &TokenBook) {
    if !state.exists {
        info!(
            token0 = %book.symbol(state.token0),
            token1 = %book.symbol(state.token1),
            "[REPORT] no pair deployed"
        );
        return;
    }
    info!(
        pair = ?state.address,
        reserve0 = %book.amount(state.token0, state.reserve0),
        reserve1 = %book.amount(state.token1, state.reserve1),
        lp_supply = %format_units(state.total_supply, LP_DECIMALS),
        "[REPORT] pool state"
    );
}

pub fn log_report(report: &LiquidityReport, book: &TokenBook, explorer: Option<&str>) {
    log_outcomes(&report.outcomes, explorer);
    log_pool_state(&report.final_state, book);
    let rec = &report.reconciliation;
    info!(
        strategy = %report.strategy,
        recipient = ?report.recipient,
        reserve0_delta = %signed_delta(rec.reserves_before.0, rec.reserves_after.0),
        reserve1_delta = %signed_delta(rec.reserves_before.1, rec.reserves_after.1),
        lp_minted = %format_units(rec.lp_minted, LP_DECIMALS),
        lp_balance = %format_units(rec.lp_after, LP_DECIMALS),
        "[REPORT] liquidity added"
    );
}

pub fn log_failure(failed: &Failed, book: &TokenBook, explorer: Option<&str>) {
    error!(stage = %failed.stage, error = %failed.source, "[REPORT] run failed");
    if failed.is_free() {
        info!("[REPORT] nothing was broadcast");
    } else {
        log_outcomes(&failed.outcomes, explorer);
    }
    if let Some(state) = &failed.last_known {
        log_pool_state(state, book);
    }
}

/// Failure as written to the run record.
#[derive(Debug, Serialize)]
pub struct FailureRecord<'a> {
    pub stage: Stage,
    pub error: String,
    pub supply_revert: Option<&'a SupplyRevert>,
    pub last_known: Option<&'a PoolState>,
    pub outcomes: &'a [TransactionOutcome],
}

impl<'a> From<&'a Failed> for FailureRecord<'a> {
    fn from(failed: &'a Failed) -> Self {
        let supply_revert = match &failed.source {
            AppError::SupplyReverted { kind, .. } => Some(kind),
            _ => None,
        };
        Self {
            stage: failed.stage,
            error: failed.source.to_string(),
            supply_revert,
            last_known: failed.last_known.as_ref(),
            outcomes: &failed.outcomes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunRecord<'a> {
    Resolved {
        network: &'a str,
        chain_id: u64,
        resolution: &'a Resolution,
    },
    Supplied {
        network: &'a str,
        chain_id: u64,
        report: &'a LiquidityReport,
    },
    Failed {
        network: &'a str,
        chain_id: u64,
        failure: FailureRecord<'a>,
    },
}

/// Writes `record` as pretty JSON, creating parent directories as needed.
pub fn write_report(path: &Path, record: &RunRecord<'_>) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let json = serde_json::to_string_pretty(record)?;
    fs::write(path, json)?;
    info!(path = %path.display(), "[REPORT] run record written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::H256;

    fn meta(n: u64, symbol: &str, decimals: u8) -> TokenMeta {
        TokenMeta {
            address: Address::from_low_u64_be(n),
            symbol: symbol.into(),
            decimals,
        }
    }

    #[test]
    fn amounts_render_with_symbol() {
        let book = TokenBook::new([meta(1, "WMON", 18), meta(2, "USDC", 6)]);
        let one = U256::exp10(18);
        assert_eq!(
            book.amount(Address::from_low_u64_be(1), one * 3u64 / 2u64),
            "1.5 WMON"
        );
        assert_eq!(
            book.amount(Address::from_low_u64_be(2), U256::from(2_500_000u64)),
            "2.5 USDC"
        );
        assert!(book.amount(Address::from_low_u64_be(3), U256::from(7u64)).starts_with("7 units"));
    }

    #[test]
    fn failure_record_is_written_as_json() {
        let failed = Failed {
            stage: Stage::Supply,
            source: AppError::SupplyReverted {
                kind: SupplyRevert::Expired,
                reason: "UniswapV2Router: EXPIRED".into(),
            },
            last_known: None,
            outcomes: vec![TransactionOutcome {
                label: "approve".into(),
                tx_hash: H256::from_low_u64_be(1),
                block_number: Some(10),
                gas_used: Some(U256::from(46_000u64)),
                success: true,
                revert_reason: None,
            }],
        };
        let record = RunRecord::Failed {
            network: "localhost",
            chain_id: 31337,
            failure: FailureRecord::from(&failed),
        };
        let dir = std::env::temp_dir().join(format!("liquidity-report-{}", std::process::id()));
        let path = dir.join("liquidity-localhost.json");

        write_report(&path, &record).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(written["status"], "failed");
        assert_eq!(written["failure"]["stage"], "supply");
        assert_eq!(written["failure"]["supply_revert"], "expired");
        assert_eq!(written["failure"]["outcomes"][0]["label"], "approve");
    }
}
