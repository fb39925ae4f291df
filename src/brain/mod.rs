//! Phase 2: The Brain
//!
//! Responsible for:
//! - Turning the market graph into a line graph rooted at an anchor
//! - Finding closed walks back to the anchor with a bounded Bellman-Ford
//! - Scoring those walks and keeping the profitable ones

mod bellman_ford;
mod filter;
mod line_graph;

pub use bellman_ford::{BoundedBellmanFord, CandidateCycle, DistanceTable, PredecessorMap, SearchOutcome};
pub use filter::{rank, CycleEvaluator, Hop, Opportunity};
pub use line_graph::{AnchorInjector, AnchoredLineGraph, LineGraph, LineGraphBuilder, LineNode, Origin};
