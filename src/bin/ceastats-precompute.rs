//! One-shot materialization of the aggregate tables. Run after the loader
//! has populated `transactions`; safe to re-run at any time.

use ceastats::store::precompute;
use ceastats::Config;
use clap::Parser;
use rusqlite::Connection;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ceastats-precompute")]
#[command(about = "Rebuild the pre-computed aggregate tables", long_about = None)]
struct Args {
    /// Data directory (falls back to CEASTATS_DATA_DIR)
    #[arg(long)]
    data_dir: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ceastats=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = args
        .data_dir
        .or_else(|| std::env::var("CEASTATS_DATA_DIR").ok())
        .ok_or_else(|| anyhow::anyhow!("--data-dir or CEASTATS_DATA_DIR is required"))?;
    let config = Config::new(&data_dir, vec![]);
    let db_path = config.db_path();
    anyhow::ensure!(db_path.exists(), "store not found at {}", db_path.display());

    let mut conn = Connection::open(&db_path)?;
    let report = precompute::run(&mut conn)?;
    tracing::info!(
        "aggregates rebuilt: {} agents, {} monthly rows, {} property types, {} transaction types, {} towns",
        report.top_agents,
        report.monthly_stats,
        report.property_type_stats,
        report.transaction_type_stats,
        report.town_stats,
    );
    Ok(())
}
