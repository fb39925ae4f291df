//! Anchor Sniper - Cycle Detection CLI
//!
//! Run with: cargo run -- --snapshot markets.json --anchor WETH
//!
//! Reads a market snapshot (file or stdin), searches every anchor and
//! prints the profitable cycles it finds.

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use console::style;
use std::fs::File;
use std::io;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anchor_sniper::brain::CycleEvaluator;
use anchor_sniper::cartographer::load_snapshot;
use anchor_sniper::config::{Config, OpportunityLog};
use anchor_sniper::{ScanSettings, Scanner};

#[derive(Debug, Parser)]
#[command(name = "anchor-sniper", version, about = "Find profitable cycles through anchor tokens")]
struct Args {
    /// TOML configuration file (defaults to environment / .env)
    #[arg(short, long)]
    config: Option<String>,

    /// Market snapshot JSON ("-" for stdin)
    #[arg(short, long)]
    snapshot: Option<String>,

    /// Anchor token; repeat for several
    #[arg(short, long = "anchor")]
    anchors: Vec<String>,

    /// Per-hop fee override (0.003 = 0.3%)
    #[arg(long)]
    fee: Option<f64>,

    /// Maximum hops per cycle (0 = unbounded)
    #[arg(long)]
    max_hops: Option<usize>,

    /// Opportunities shown in the report
    #[arg(long)]
    top: Option<usize>,

    /// Print opportunities as JSON instead of the report
    #[arg(long)]
    json: bool,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 🎯 ANCHOR SNIPER - Cycle Detection").cyan().bold()
    );
    println!(
        "{}",
        style("    Log-price graph | Line-graph Bellman-Ford").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path).wrap_err_with(|| format!("reading config {}", path))?,
        None => Config::from_env()?,
    };

    if !args.anchors.is_empty() {
        config.anchors = args.anchors.clone();
    }
    if let Some(path) = &args.snapshot {
        config.snapshot_path = Some(path.clone());
    }
    if let Some(fee) = args.fee {
        config.pricing.fee = fee;
    }
    if let Some(max_hops) = args.max_hops {
        config.max_hops = max_hops;
    }
    if let Some(top) = args.top {
        config.top = top;
    }

    Ok(config)
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("anchor_sniper=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        return Err(e);
    }

    if !args.json {
        print_banner();
        config.print_summary();
        println!();
    }

    // =============================================
    // PHASE 1: THE CARTOGRAPHER
    // =============================================
    let start = Instant::now();
    let markets = match config.snapshot_path.as_deref() {
        None | Some("-") => load_snapshot(io::stdin().lock())?,
        Some(path) => {
            let file = File::open(path).wrap_err_with(|| format!("opening snapshot {}", path))?;
            load_snapshot(file)?
        }
    };
    info!("Snapshot loaded in {:?}: {} markets", start.elapsed(), markets.len());

    // =============================================
    // PHASE 2: THE BRAIN
    // =============================================
    let start = Instant::now();
    let scanner = Scanner::new(ScanSettings::from(&config));
    let opportunities = scanner.scan(&markets, &config.anchor_tokens())?;
    info!("Search finished in {:?}", start.elapsed());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&opportunities)?);
    } else {
        let evaluator = CycleEvaluator::new(&config.pricing);
        evaluator.print_summary(&opportunities, config.top);
    }

    if config.opportunity_log {
        for opportunity in &opportunities {
            OpportunityLog::new(opportunity).append_to_file(&config.opportunity_log_path)?;
        }
        if !opportunities.is_empty() {
            info!(
                "Logged {} opportunities to {}",
                opportunities.len(),
                config.opportunity_log_path
            );
        }
    }

    Ok(())
}
