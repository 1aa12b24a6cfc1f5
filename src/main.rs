use anyhow::{Context, Result};
use liquidity_bootstrap::{
    config::{Action, AppConfig},
    dex::{ChainClient, EthersClient, client::TxSettings},
    liquidity::{Orchestrator, SupplySettings, estimate_fee_reserve},
    report::{self, FailureRecord, RunRecord, TokenBook},
    utils,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let cfg = AppConfig::load().context("loading configuration")?;
    tracing::info!(
        network = %cfg.network_name,
        chain_id = cfg.network.chain_id,
        action = ?cfg.action,
        strategy = %cfg.strategy,
        "[INIT] liquidity-bootstrap starting"
    );

    let tx_settings = TxSettings {
        inclusion_timeout: cfg.inclusion_timeout,
        confirmations: cfg.confirmations,
        router_gas_limit: cfg.gas.router_gas_limit,
        mint_gas_limit: cfg.gas.mint_gas_limit,
    };
    let client = Arc::new(
        EthersClient::connect(
            &cfg.rpc_url,
            cfg.private_key.expose(),
            cfg.network.chain_id,
            tx_settings,
        )
        .await
        .context("connecting to RPC")?,
    );
    tracing::info!(operator = ?client.operator(), "[INIT] signer ready");

    let asset_a = cfg.asset_a.resolve(&cfg.network)?;
    let asset_b = cfg.asset_b.resolve(&cfg.network)?;
    let (meta_a, meta_b) = futures::try_join!(
        client.token_meta(asset_a.token()),
        client.token_meta(asset_b.token()),
    )?;
    tracing::info!(
        asset_a = %meta_a.symbol,
        asset_b = %meta_b.symbol,
        "[INIT] assets resolved"
    );
    let book = TokenBook::new([meta_a.clone(), meta_b.clone()]);
    let explorer = cfg.network.explorer_url.as_deref();
    let report_path = cfg.report_path();
    let network = cfg.network_name.as_str();
    let chain_id = cfg.network.chain_id;

    if cfg.action == Action::Resolve {
        let orchestrator =
            Orchestrator::new(client.clone(), cfg.network.contracts, SupplySettings::default());
        return match orchestrator.resolve_pool(asset_a, asset_b).await {
            Ok(resolution) => {
                if let Some(creation) = &resolution.creation {
                    report::log_outcomes(std::slice::from_ref(creation), explorer);
                }
                report::log_pool_state(&resolution.state, &book);
                report::write_report(
                    &report_path,
                    &RunRecord::Resolved {
                        network,
                        chain_id,
                        resolution: &resolution,
                    },
                )?;
                Ok(())
            }
            Err(failed) => {
                report::log_failure(&failed, &book, explorer);
                report::write_report(
                    &report_path,
                    &RunRecord::Failed {
                        network,
                        chain_id,
                        failure: FailureRecord::from(&failed),
                    },
                )?;
                Err(failed.into())
            }
        };
    }

    let now = client.latest_timestamp().await?;
    let request = cfg.liquidity_request(
        (asset_a, meta_a.decimals),
        (asset_b, meta_b.decimals),
        client.operator(),
        now,
    )?;
    let fee_reserve = match &cfg.fee_reserve {
        Some(human) => utils::parse_units(human, 18).context("parsing FEE_RESERVE")?,
        None => estimate_fee_reserve(client.gas_price().await?, &cfg.gas)?,
    };
    tracing::info!(
        desired_a = %book.amount(asset_a.token(), request.desired_a.amount),
        desired_b = %book.amount(asset_b.token(), request.desired_b.amount),
        fee_reserve = %utils::format_units(fee_reserve, 18),
        deadline = request.deadline,
        "[INIT] request built"
    );

    let orchestrator = Orchestrator::new(
        client.clone(),
        cfg.network.contracts,
        cfg.supply_settings(fee_reserve),
    );
    match orchestrator.provide_liquidity(&request, cfg.strategy).await {
        Ok(outcome) => {
            report::log_report(&outcome, &book, explorer);
            report::write_report(
                &report_path,
                &RunRecord::Supplied {
                    network,
                    chain_id,
                    report: &outcome,
                },
            )?;
            Ok(())
        }
        Err(failed) => {
            report::log_failure(&failed, &book, explorer);
            report::write_report(
                &report_path,
                &RunRecord::Failed {
                    network,
                    chain_id,
                    failure: FailureRecord::from(&failed),
                },
            )?;
            Err(failed.into())
        }
    }
}
