//! Bounded Bellman-Ford over the line graph
//!
//! Step 2.2: The Pathfinder
//!
//! Relaxes line-graph edges out of the anchor's zero node. Each node keeps a
//! single predecessor, so following predecessors from any node spells out one
//! path back to the anchor. A relaxation is only accepted when it keeps that
//! path simple, or when it closes the path back at the anchor. Closing nodes
//! are sinks: the walk is recorded, never extended.

use petgraph::graph::{EdgeIndex, NodeIndex};
use std::collections::HashSet;
use tracing::{debug, info, trace, warn};

use super::line_graph::{AnchoredLineGraph, Origin};
use crate::cartographer::MarketGraph;

/// Best known cumulative weight per line-graph node
#[derive(Debug, Clone)]
pub struct DistanceTable {
    dist: Vec<f64>,
}

impl DistanceTable {
    fn new(len: usize, source: NodeIndex) -> Self {
        let mut dist = vec![f64::INFINITY; len];
        dist[source.index()] = 0.0;
        Self { dist }
    }

    pub fn get(&self, node: NodeIndex) -> f64 {
        self.dist[node.index()]
    }

    /// Lower the distance of `node`; never raises it.
    fn improve(&mut self, node: NodeIndex, candidate: f64) -> bool {
        let slot = &mut self.dist[node.index()];
        if candidate < *slot {
            *slot = candidate;
            true
        } else {
            false
        }
    }
}

/// One predecessor per line-graph node
#[derive(Debug, Clone)]
pub struct PredecessorMap {
    pred: Vec<Option<NodeIndex>>,
}

impl PredecessorMap {
    fn new(len: usize) -> Self {
        Self {
            pred: vec![None; len],
        }
    }

    pub fn get(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.pred[node.index()]
    }

    /// Point `node` at `pred`, returning whatever it pointed at before.
    pub fn replace(&mut self, node: NodeIndex, pred: NodeIndex) -> Option<NodeIndex> {
        self.pred[node.index()].replace(pred)
    }

    /// Nodes from `node` back to (and including) `source`.
    ///
    /// `None` if the chain breaks or runs longer than `limit` steps.
    pub fn chain(&self, node: NodeIndex, source: NodeIndex, limit: usize) -> Option<Vec<NodeIndex>> {
        let mut chain = vec![node];
        let mut current = node;
        while current != source {
            if chain.len() > limit {
                return None;
            }
            current = self.get(current)?;
            chain.push(current);
        }
        Some(chain)
    }
}

/// A closed walk found by the search, before scoring
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateCycle {
    /// Market-graph pool-edges, anchor first
    pub edges: Vec<EdgeIndex>,
    /// Weight recomputed from the pool-edges themselves
    pub total_weight: f64,
}

impl CandidateCycle {
    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }
}

/// Everything one search produced
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub cycles: Vec<CandidateCycle>,
    pub distances: DistanceTable,
    pub predecessors: PredecessorMap,
    pub rounds: usize,
    pub converged: bool,
}

/// Bounded Bellman-Ford algorithm for finding cycles through one anchor
pub struct BoundedBellmanFord<'a> {
    market: &'a MarketGraph,
    line: &'a AnchoredLineGraph,
    max_hops: Option<usize>,
}

impl<'a> BoundedBellmanFord<'a> {
    pub fn new(market: &'a MarketGraph, line: &'a AnchoredLineGraph, max_hops: Option<usize>) -> Self {
        Self {
            market,
            line,
            max_hops,
        }
    }

    pub fn search(&self) -> SearchOutcome {
        let graph = &self.line.graph;
        let source = self.line.source;
        let anchor = self.line.anchor;
        let n = graph.node_count();

        let mut distances = DistanceTable::new(n, source);
        let mut predecessors = PredecessorMap::new(n);

        let mut cycles = Vec::new();
        let mut seen: HashSet<Vec<EdgeIndex>> = HashSet::new();

        let mut rounds = 0;
        let mut converged = false;

        while rounds < n {
            rounds += 1;
            let mut relaxed = false;

            for (u, v, w) in graph.edges() {
                let du = distances.get(u);
                if du.is_infinite() {
                    continue;
                }
                // A walk that is back at the anchor is finished
                if u != source && graph.node(u).to == anchor {
                    continue;
                }

                let candidate = du + w;
                if candidate >= distances.get(v) {
                    continue;
                }

                let target = graph.node(v).to;
                let closes = target == anchor;
                if closes && u == source {
                    continue;
                }

                // Depth comes from the live chain: re-pointing an ancestor
                // changes the length of every path below it
                let Some((depth, visits)) = self.trace_path(&predecessors, u, target) else {
                    continue;
                };
                if !closes && visits {
                    continue;
                }
                if let Some(max) = self.max_hops {
                    if depth + 1 > max {
                        continue;
                    }
                }

                distances.improve(v, candidate);
                if let Some(old) = predecessors.replace(v, u) {
                    if old != u {
                        trace!("predecessor of {:?} moved {:?} -> {:?}", v, old, u);
                    }
                }
                relaxed = true;

                if closes {
                    if let Some(cycle) = self.close(&predecessors, v) {
                        if seen.insert(cycle.edges.clone()) {
                            debug!(
                                "Closed {}-hop walk, weight {:.6}",
                                cycle.hop_count(),
                                cycle.total_weight
                            );
                            cycles.push(cycle);
                        }
                    }
                }
            }

            if !relaxed {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                "Relaxation still improving after {} rounds from {}",
                rounds,
                self.market.token(anchor)
            );
        }

        info!(
            "Search from {} finished in {} rounds: {} closed walks",
            self.market.token(anchor),
            rounds,
            cycles.len()
        );

        SearchOutcome {
            cycles,
            distances,
            predecessors,
            rounds,
            converged,
        }
    }

    /// Follow predecessors from `node` back to the zero node.
    ///
    /// Returns the hop count of that path and whether `token` appears on it,
    /// or `None` if the chain breaks or loops.
    fn trace_path(&self, predecessors: &PredecessorMap, node: NodeIndex, token: NodeIndex) -> Option<(usize, bool)> {
        let graph = &self.line.graph;
        let mut current = node;
        let mut depth = 0;
        let mut visits = false;
        for _ in 0..=graph.node_count() {
            visits |= graph.node(current).to == token;
            if current == self.line.source {
                return Some((depth, visits));
            }
            depth += 1;
            current = predecessors.get(current)?;
        }
        None
    }

    /// Rebuild the walk ending at closing node `end` and check it is a simple
    /// cycle through the anchor.
    fn close(&self, predecessors: &PredecessorMap, end: NodeIndex) -> Option<CandidateCycle> {
        let graph = &self.line.graph;
        let mut chain = predecessors.chain(end, self.line.source, graph.node_count())?;
        chain.pop(); // zero node
        chain.reverse();

        let anchor = self.line.anchor;
        let first = graph.node(*chain.first()?);
        if first.from != Origin::Token(anchor) {
            return None;
        }

        let mut visited = HashSet::new();
        let mut edges = Vec::with_capacity(chain.len());
        for (i, &idx) in chain.iter().enumerate() {
            let node = graph.node(idx);
            let last = i + 1 == chain.len();
            if (node.to == anchor) != last || !visited.insert(node.to) {
                debug!("Discarding non-simple walk through {:?}", idx);
                return None;
            }
            edges.push(node.edge?);
        }

        if edges.len() < 2 || self.max_hops.is_some_and(|max| edges.len() > max) {
            return None;
        }

        let total_weight = edges.iter().map(|&e| self.market.pool_edge(e).weight).sum();

        Some(CandidateCycle {
            edges,
            total_weight,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::line_graph::{AnchorInjector, LineGraphBuilder};
    use crate::cartographer::{Market, PriceModel, Token};

    fn market_graph(markets: &[(&str, &str, &str, &str, &str)]) -> MarketGraph {
        let markets: Vec<Market> = markets
            .iter()
            .map(|&(p, t0, r0, t1, r1)| Market::from_decimal(p, t0, r0, t1, r1).unwrap())
            .collect();
        MarketGraph::build(&markets, &PriceModel::new(0.003).unwrap()).unwrap()
    }

    fn anchored(market: &MarketGraph, anchor: &str) -> AnchoredLineGraph {
        AnchorInjector::new(market)
            .inject(LineGraphBuilder::build(market), &Token::new(anchor))
            .unwrap()
    }

    fn pools(market: &MarketGraph, cycle: &CandidateCycle) -> Vec<String> {
        cycle
            .edges
            .iter()
            .map(|&e| market.pool_edge(e).pool.clone())
            .collect()
    }

    fn triangle() -> MarketGraph {
        market_graph(&[
            ("UNI1", "WETH", "4", "X", "2"),
            ("UNI2", "WETH", "1", "K", "2"),
            ("UNI3", "K", "1", "X", "3"),
        ])
    }

    #[test]
    fn test_predecessor_replace_keeps_one() {
        let mut preds = PredecessorMap::new(4);
        let (a, b, c) = (NodeIndex::new(0), NodeIndex::new(1), NodeIndex::new(2));

        assert_eq!(preds.replace(c, a), None);
        assert_eq!(preds.replace(c, b), Some(a));
        assert_eq!(preds.get(c), Some(b));
    }

    #[test]
    fn test_chain_stops_on_loops() {
        let mut preds = PredecessorMap::new(3);
        let (a, b, source) = (NodeIndex::new(0), NodeIndex::new(1), NodeIndex::new(2));
        preds.replace(a, b);
        preds.replace(b, a);

        assert_eq!(preds.chain(a, source, 3), None);

        preds.replace(b, source);
        assert_eq!(preds.chain(a, source, 3), Some(vec![a, b, source]));
    }

    #[test]
    fn test_triangle_closes_both_directions() {
        let market = triangle();
        let line = anchored(&market, "X");
        let outcome = BoundedBellmanFord::new(&market, &line, None).search();

        assert!(outcome.converged);
        assert_eq!(outcome.cycles.len(), 2);

        let routes: Vec<Vec<String>> = outcome.cycles.iter().map(|c| pools(&market, c)).collect();
        assert!(routes.contains(&vec!["UNI3".into(), "UNI2".into(), "UNI1".into()]));
        assert!(routes.contains(&vec!["UNI1".into(), "UNI2".into(), "UNI3".into()]));

        for cycle in &outcome.cycles {
            assert_eq!(cycle.hop_count(), 3);
        }
        assert_eq!(outcome.distances.get(line.source), 0.0);
    }

    #[test]
    fn test_weight_is_sum_of_hops() {
        let market = triangle();
        let line = anchored(&market, "X");
        let outcome = BoundedBellmanFord::new(&market, &line, None).search();

        let profitable = outcome
            .cycles
            .iter()
            .find(|c| pools(&market, c)[0] == "UNI3")
            .unwrap();
        let expected = -(2.991f64).ln() - (0.997f64 * 2.0).ln() - (0.997f64 * 2.0).ln();
        assert!((profitable.total_weight - expected).abs() < 1e-12);
    }

    #[test]
    fn test_single_pool_has_no_cycle() {
        let market = market_graph(&[("UNI1", "WETH", "4", "X", "2")]);
        let line = anchored(&market, "X");
        let outcome = BoundedBellmanFord::new(&market, &line, None).search();

        assert!(outcome.cycles.is_empty());
        assert!(outcome.converged);
    }

    #[test]
    fn test_hop_limit() {
        let market = triangle();
        let line = anchored(&market, "X");

        let bounded = BoundedBellmanFord::new(&market, &line, Some(3)).search();
        assert_eq!(bounded.cycles.len(), 2);

        let too_short = BoundedBellmanFord::new(&market, &line, Some(2)).search();
        assert!(too_short.cycles.is_empty());
    }

    /// Deterministic pseudo-random snapshot of `count` pools over `tokens` tokens
    fn scrambled_markets(seed: u64, tokens: usize, count: usize) -> Vec<Market> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            state >> 33
        };

        (0..count)
            .map(|i| {
                let a = next() as usize % tokens;
                let b = (a + 1 + next() as usize % (tokens - 1)) % tokens;
                let r0 = (next() % 1000 + 1).to_string();
                let r1 = (next() % 1000 + 1).to_string();
                Market::from_decimal(format!("P{}", i), format!("T{}", a), &r0, format!("T{}", b), &r1)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_hop_limit_holds_when_paths_are_rerouted() {
        let model = PriceModel::new(0.003).unwrap();
        let mut closed = 0;

        for seed in 0..300 {
            let markets = scrambled_markets(seed, 7, 14);
            let market = MarketGraph::build(&markets, &model).unwrap();
            if market.get_node(&Token::new("T0")).is_none() {
                continue;
            }
            let line = anchored(&market, "T0");

            for max in [3, 4] {
                let outcome = BoundedBellmanFord::new(&market, &line, Some(max)).search();
                for cycle in &outcome.cycles {
                    assert!(
                        cycle.hop_count() <= max,
                        "seed {} max {}: {}-hop walk {:?}",
                        seed,
                        max,
                        cycle.hop_count(),
                        pools(&market, cycle)
                    );
                    let used: HashSet<usize> = cycle.edges.iter().map(|&e| market.pool_edge(e).market).collect();
                    assert_eq!(used.len(), cycle.hop_count());
                }
                closed += outcome.cycles.len();
            }
        }

        assert!(closed > 0);
    }

    #[test]
    fn test_cycles_are_simple() {
        let market = market_graph(&[
            ("P1", "A", "5", "B", "7"),
            ("P2", "B", "3", "C", "2"),
            ("P3", "C", "9", "A", "4"),
            ("P4", "A", "1", "D", "8"),
            ("P5", "D", "6", "B", "6"),
            ("P6", "C", "2", "D", "3"),
        ]);
        let line = anchored(&market, "A");
        let outcome = BoundedBellmanFord::new(&market, &line, None).search();
        assert!(!outcome.cycles.is_empty());

        for cycle in &outcome.cycles {
            let market_ids: Vec<usize> = cycle
                .edges
                .iter()
                .map(|&e| market.pool_edge(e).market)
                .collect();
            let unique: HashSet<_> = market_ids.iter().collect();
            assert_eq!(unique.len(), market_ids.len(), "pool reused in {:?}", market_ids);
        }
    }
}
