//! Command-line entry point: run one report action over pasted codes and
//! print the result as CSV on stdout.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use lastmile_client::{Endpoints, HttpFetcher};
use lastmile_core::{config::load_dotenv, Config, Report};
use lastmile_recon::{lookups, AuditPipeline};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Action {
    /// Missing/missort audit reconciliation over validation tasks.
    Audit,
    /// List every shipment on each transfer order.
    TransferOrders,
    /// Latest tracking message per shipment.
    LastStatus,
    /// Most recent station per shipment.
    LastStation,
    /// Hours each shipment spent at the configured station.
    Aging,
    /// Latest assignment-task id mentioned in each shipment's tracking.
    LastAssignment,
    /// Most recent on-hold reason per shipment.
    OnHoldReason,
    /// Chronological station history per shipment, consecutive repeats collapsed.
    StationHistory,
    /// Declared item name per shipment (trade info plus sensitive-data detail).
    ItemName,
    /// Transfer order and linehaul task each return parcel was added to.
    Returns,
}

#[derive(Debug, Parser)]
#[command(name = "lastmile", about = "Station-side logistics report toolkit")]
struct Args {
    /// Which report to run.
    #[arg(value_enum)]
    action: Action,

    /// Identifier codes. When omitted, codes are read from stdin.
    codes: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    load_dotenv();
    let config = Config::from_env();
    config.log_summary();

    let raw = if args.codes.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read codes from stdin")?;
        buf
    } else {
        args.codes.join(" ")
    };

    let fetcher = Arc::new(HttpFetcher::new(config.csrf_token.clone()));
    let endpoints = Endpoints::new(&config.base_url);

    let report: Report = match args.action {
        Action::Audit => {
            let mut pipeline = AuditPipeline::new(fetcher, config);
            pipeline.run(&raw).await.context("audit run failed")?
        }
        Action::TransferOrders => {
            lookups::transfer_order_report(fetcher.as_ref(), &endpoints, &config, &raw)
                .await
                .context("transfer-order lookup failed")?
        }
        Action::LastStatus => {
            lookups::last_status_report(fetcher.as_ref(), &endpoints, &config, &raw)
                .await
                .context("last-status lookup failed")?
        }
        Action::LastStation => {
            lookups::last_station_report(fetcher.as_ref(), &endpoints, &config, &raw)
                .await
                .context("last-station lookup failed")?
        }
        Action::Aging => {
            lookups::station_aging_report(fetcher.as_ref(), &endpoints, &config, &raw)
                .await
                .context("aging lookup failed")?
        }
        Action::LastAssignment => {
            lookups::last_assignment_report(fetcher.as_ref(), &endpoints, &config, &raw)
                .await
                .context("last-assignment lookup failed")?
        }
        Action::OnHoldReason => {
            lookups::on_hold_reason_report(fetcher.as_ref(), &endpoints, &config, &raw)
                .await
                .context("on-hold lookup failed")?
        }
        Action::StationHistory => {
            lookups::station_history_report(fetcher.as_ref(), &endpoints, &config, &raw)
                .await
                .context("station-history lookup failed")?
        }
        Action::ItemName => {
            lookups::item_name_report(fetcher.as_ref(), &endpoints, &config, &raw)
                .await
                .context("item-name lookup failed")?
        }
        Action::Returns => {
            lookups::returns_report(fetcher.as_ref(), &endpoints, &config, &raw)
                .await
                .context("returns lookup failed")?
        }
    };

    info!(rows = report.len(), "report complete");
    println!("{}", report.to_csv());
    Ok(())
}
