//! Scanner Configuration
//!
//! Pricing constants, search bounds and output settings, loaded from the
//! environment (.env supported) or a TOML file.

use chrono::{DateTime, Utc};
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::brain::Opportunity;
use crate::cartographer::{ParallelPools, Token};

// ============================================
// PRICING
// ============================================

/// Constants shared by the price model and the cycle evaluator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Per-hop trading fee (0.003 = 0.3%)
    pub fee: f64,

    /// Log-weight credited per hop when scoring a cycle.
    /// 0.0 scores cycles by their net rate product.
    pub hop_offset: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            fee: 0.003,
            hop_offset: 0.0,
        }
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Search Settings ==========
    /// Tokens every cycle starts and ends at
    pub anchors: Vec<String>,

    /// Maximum pool-edges in a cycle (0 = bounded only by the round count)
    pub max_hops: usize,

    /// Cycles below this profit fraction are dropped (0.0 keeps every gain)
    pub min_profit_fraction: f64,

    /// Which pool quotes an ordered pair when several markets share it
    pub parallel_pools: ParallelPools,

    // ========== Input / Output ==========
    /// Snapshot to scan ("-" or unset reads stdin)
    pub snapshot_path: Option<String>,

    /// Append every reported opportunity to `opportunity_log_path`
    pub opportunity_log: bool,

    pub opportunity_log_path: String,

    /// Opportunities printed in the console report
    pub top: usize,

    // TOML tables must follow plain keys
    pub pricing: PricingConfig,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let pricing = PricingConfig {
            fee: env::var("SWAP_FEE")
                .unwrap_or_else(|_| "0.003".to_string())
                .parse()
                .unwrap_or(defaults.pricing.fee),
            hop_offset: env::var("HOP_OFFSET")
                .unwrap_or_else(|_| "0.0".to_string())
                .parse()
                .unwrap_or(defaults.pricing.hop_offset),
        };

        Ok(Self {
            anchors: env::var("ANCHORS")
                .map(|s| {
                    s.split(',')
                        .map(|a| a.trim().to_string())
                        .filter(|a| !a.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            max_hops: env::var("MAX_HOPS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(defaults.max_hops),
            min_profit_fraction: env::var("MIN_PROFIT_FRACTION")
                .unwrap_or_else(|_| "0.0".to_string())
                .parse()
                .unwrap_or(defaults.min_profit_fraction),
            parallel_pools: env::var("PARALLEL_POOLS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.parallel_pools),

            snapshot_path: env::var("SNAPSHOT_PATH").ok(),
            opportunity_log: env::var("OPPORTUNITY_LOG")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            opportunity_log_path: env::var("OPPORTUNITY_LOG_PATH")
                .unwrap_or(defaults.opportunity_log_path),
            top: env::var("TOP")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(defaults.top),
            pricing,
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn anchor_tokens(&self) -> Vec<Token> {
        self.anchors.iter().map(|a| Token::new(a.as_str())).collect()
    }

    /// `max_hops` as a search bound
    pub fn hop_limit(&self) -> Option<usize> {
        (self.max_hops > 0).then_some(self.max_hops)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.pricing.fee) {
            return Err(eyre::eyre!(
                "SWAP_FEE must be in [0, 1) (currently {})",
                self.pricing.fee
            ));
        }
        if !self.pricing.hop_offset.is_finite() {
            return Err(eyre::eyre!("HOP_OFFSET must be finite"));
        }
        if self.anchors.is_empty() {
            return Err(eyre::eyre!(
                "No anchor tokens configured - set ANCHORS or pass --anchor"
            ));
        }
        if self.max_hops == 1 || self.max_hops == 2 {
            return Err(eyre::eyre!(
                "MAX_HOPS of {} cannot close a cycle through a third token (use 0 or >= 3)",
                self.max_hops
            ));
        }
        if self.min_profit_fraction < 0.0 || !self.min_profit_fraction.is_finite() {
            return Err(eyre::eyre!(
                "MIN_PROFIT_FRACTION must be a non-negative number (currently {})",
                self.min_profit_fraction
            ));
        }

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let hops = match self.hop_limit() {
            Some(h) => h.to_string(),
            None => "unbounded".to_string(),
        };
        let source = self.snapshot_path.as_deref().unwrap_or("stdin");

        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║            ANCHOR SNIPER - CONFIGURATION                   ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ PRICING                                                    ║");
        println!("║ • Swap Fee:        {:<39.4}% ║", self.pricing.fee * 100.0);
        println!("║ • Hop Offset:      {:<40} ║", self.pricing.hop_offset);
        println!("║ • Parallel Pools:  {:<40} ║", self.parallel_pools.to_string());
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ SEARCH                                                     ║");
        println!("║ • Anchors:         {:<40} ║", self.anchors.len());
        println!("║ • Max Hops:        {:<40} ║", hops);
        println!("║ • Min Profit:      {:<39.4}% ║", self.min_profit_fraction * 100.0);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ OUTPUT                                                     ║");
        println!("║ • Snapshot:        {:<40} ║", source);
        println!("║ • Opportunity Log: {:<40} ║",
            if self.opportunity_log { "✓ Enabled" } else { "✗ Disabled" }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anchors: vec![],
            max_hops: 0,
            min_profit_fraction: 0.0,
            parallel_pools: ParallelPools::LastWins,
            snapshot_path: None,
            opportunity_log: false,
            opportunity_log_path: "./logs/opportunities.jsonl".to_string(),
            top: 10,
            pricing: PricingConfig::default(),
        }
    }
}

// ============================================
// OPPORTUNITY LOGGER
// ============================================

/// One reported opportunity, as written to the JSONL log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityLog {
    pub timestamp: DateTime<Utc>,
    pub anchor: String,
    pub path: Vec<String>,
    pub pools: Vec<String>,
    pub total_weight: f64,
    pub hop_count: usize,
    pub profit_fraction: f64,
}

impl OpportunityLog {
    pub fn new(opportunity: &Opportunity) -> Self {
        Self {
            timestamp: Utc::now(),
            anchor: opportunity.anchor.to_string(),
            path: opportunity.tokens().iter().map(|t| t.to_string()).collect(),
            pools: opportunity.pools().map(String::from).collect(),
            total_weight: opportunity.total_weight,
            hop_count: opportunity.hop_count,
            profit_fraction: opportunity.profit_fraction,
        }
    }

    /// Append this log to a file
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let json = serde_json::to_string(self)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

// ============================================
// TESTS
// ============================================
