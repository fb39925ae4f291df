//! Scanner
//!
//! Runs the whole pipeline over one snapshot:
//! markets -> market graph -> line graph -> anchor -> search -> evaluation.

use std::collections::HashSet;
use tracing::{info, warn};

use crate::brain::{
    rank, AnchorInjector, BoundedBellmanFord, CycleEvaluator, LineGraph, LineGraphBuilder, Opportunity,
};
use crate::cartographer::{Market, MarketGraph, ParallelPools, PriceModel, Token};
use crate::config::{Config, PricingConfig};
use crate::error::{Result, ScanError};

/// The subset of `Config` the core pipeline reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSettings {
    pub pricing: PricingConfig,
    pub max_hops: Option<usize>,
    pub min_profit_fraction: f64,
    pub parallel_pools: ParallelPools,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            pricing: PricingConfig::default(),
            max_hops: None,
            min_profit_fraction: 0.0,
            parallel_pools: ParallelPools::LastWins,
        }
    }
}

impl From<&Config> for ScanSettings {
    fn from(config: &Config) -> Self {
        Self {
            pricing: config.pricing,
            max_hops: config.hop_limit(),
            min_profit_fraction: config.min_profit_fraction,
            parallel_pools: config.parallel_pools,
        }
    }
}

pub struct Scanner {
    settings: ScanSettings,
}

impl Scanner {
    pub fn new(settings: ScanSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    fn market_graph(&self, markets: &[Market]) -> Result<MarketGraph> {
        let model = PriceModel::from_config(&self.settings.pricing)?;
        MarketGraph::build_with(markets, &model, self.settings.parallel_pools)
    }

    fn evaluator(&self) -> CycleEvaluator {
        CycleEvaluator::new(&self.settings.pricing).with_min_profit(self.settings.min_profit_fraction)
    }

    /// Profitable cycles through `anchor`, best first.
    pub fn find_opportunities(&self, markets: &[Market], anchor: &Token) -> Result<Vec<Opportunity>> {
        let market = self.market_graph(markets)?;
        let line = LineGraphBuilder::build(&market);
        self.search_anchor(&market, line, anchor)
    }

    fn search_anchor(&self, market: &MarketGraph, line: LineGraph, anchor: &Token) -> Result<Vec<Opportunity>> {
        let anchored = AnchorInjector::new(market).inject(line, anchor)?;
        let outcome = BoundedBellmanFord::new(market, &anchored, self.settings.max_hops).search();
        Ok(self.evaluator().evaluate(market, anchor, &outcome.cycles))
    }

    /// Scan several anchors over one snapshot.
    ///
    /// Anchors missing from the snapshot are skipped; if none is present the
    /// first one's `AnchorNotFound` is returned. The same loop found from two
    /// anchors is reported once, from whichever anchor ranks it higher.
    pub fn scan(&self, markets: &[Market], anchors: &[Token]) -> Result<Vec<Opportunity>> {
        let market = self.market_graph(markets)?;
        let line = LineGraphBuilder::build(&market);

        let mut all = Vec::new();
        let mut searched = 0;
        let mut first_missing = None;

        for anchor in anchors {
            match self.search_anchor(&market, line.clone(), anchor) {
                Ok(found) => {
                    searched += 1;
                    info!("  {}: {} profitable cycles", anchor, found.len());
                    all.extend(found);
                }
                Err(ScanError::AnchorNotFound(missing)) => {
                    warn!("Anchor {} is not in the snapshot - skipping", missing);
                    first_missing.get_or_insert(missing);
                }
                Err(e) => return Err(e),
            }
        }

        if searched == 0 {
            if let Some(missing) = first_missing {
                return Err(ScanError::AnchorNotFound(missing));
            }
        }

        all.sort_by(rank);

        let mut seen = HashSet::new();
        all.retain(|opp| seen.insert(opp.rotation_key()));

        info!(
            "Scan complete: {} unique opportunities across {} anchors",
            all.len(),
            searched
        );

        Ok(all)
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(ScanSettings::default())
    }
}
