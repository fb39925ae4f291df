//! Phase 1: The Cartographer (Market Snapshot)
//!
//! Loads a market snapshot, prices every pool in both directions and
//! lays the result out as a token graph.

mod graph;
mod market;
mod price;

pub use graph::{DirectedEdge, MarketGraph, ParallelPools, PoolEdge};
pub use market::{load_snapshot, parse_snapshot, Market, MarketRecord, Token};
pub use price::PriceModel;
