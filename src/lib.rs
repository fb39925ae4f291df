//! Anchor Sniper
//!
//! Finds profitable trading cycles through an anchor token in a static
//! snapshot of constant-product markets.
//!
//! Phase 1 (cartographer) prices pools into a token graph. Phase 2 (brain)
//! searches that graph's line graph from the anchor and scores what it finds.

pub mod brain;
pub mod cartographer;
pub mod config;
pub mod error;
pub mod scanner;

pub use brain::{CycleEvaluator, Hop, Opportunity};
pub use cartographer::{Market, MarketGraph, ParallelPools, PriceModel, Token};
pub use config::{Config, PricingConfig};
pub use error::{Result, ScanError};
pub use scanner::{ScanSettings, Scanner};

/// Profitable cycles through `anchor` under default settings
/// (fee 0.003, no hop offset, unbounded hops), best first.
pub fn find_opportunities(markets: &[Market], anchor: &Token) -> Result<Vec<Opportunity>> {
    Scanner::default().find_opportunities(markets, anchor)
}
