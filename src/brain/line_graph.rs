//! Line Graph
//!
//! Step 2.1: The Switchyard
//!
//! Nodes are the market graph's pool-edges (one per ordered token pair);
//! (i->j) links to (j->l) for every successor l of j except i, weighted by
//! w(j->l). A path in this graph never steps straight back through the pool
//! it arrived on, and each node carries its own predecessor, which is what
//! lets the search keep a single simple path per node.
//!
//! The anchor injector then adds a synthetic zero node (zero -> anchor)
//! feeding every pool-edge that leaves the anchor.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::cartographer::{MarketGraph, Token};
use crate::error::{Result, ScanError};

/// Where a line-graph node's pool-edge starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// The synthetic zero token in front of the anchor
    Zero,
    Token(NodeIndex),
}

/// A pool-edge seen as a node. `edge` is `None` only for the zero node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineNode {
    pub from: Origin,
    pub to: NodeIndex,
    pub edge: Option<EdgeIndex>,
}

#[derive(Debug, Clone, Default)]
pub struct LineGraph {
    graph: DiGraph<LineNode, f64>,
    by_pair: HashMap<(Origin, NodeIndex), NodeIndex>,
}

impl LineGraph {
    fn get_or_add(&mut self, node: LineNode) -> NodeIndex {
        if let Some(&idx) = self.by_pair.get(&(node.from, node.to)) {
            return idx;
        }
        let idx = self.graph.add_node(node);
        self.by_pair.insert((node.from, node.to), idx);
        idx
    }

    pub fn find(&self, from: Origin, to: NodeIndex) -> Option<NodeIndex> {
        self.by_pair.get(&(from, to)).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &LineNode {
        &self.graph[idx]
    }

    /// Every line edge as (source, target, weight), in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, f64)> + '_ {
        self.graph
            .edge_references()
            .map(|e| (e.source(), e.target(), *e.weight()))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

pub struct LineGraphBuilder;

impl LineGraphBuilder {
    pub fn build(market: &MarketGraph) -> LineGraph {
        let mut line = LineGraph::default();

        for (i, j, edge) in market.pairs() {
            let u = line.get_or_add(LineNode {
                from: Origin::Token(i),
                to: j,
                edge: Some(edge),
            });

            for &l in market.successor_nodes(j) {
                if l == i {
                    continue;
                }
                let Some(next) = market.pair_edge(j, l) else {
                    continue;
                };
                let v = line.get_or_add(LineNode {
                    from: Origin::Token(j),
                    to: l,
                    edge: Some(next),
                });
                line.graph.add_edge(u, v, market.pool_edge(next).weight);
            }
        }

        info!(
            "Line graph built: {} pool-edge nodes, {} transitions",
            line.node_count(),
            line.edge_count()
        );

        line
    }
}

/// A line graph with the zero node wired in front of one anchor
#[derive(Debug, Clone)]
pub struct AnchoredLineGraph {
    pub graph: LineGraph,
    /// The zero node; the search's only source
    pub source: NodeIndex,
    pub anchor: NodeIndex,
}

pub struct AnchorInjector<'a> {
    market: &'a MarketGraph,
}

impl<'a> AnchorInjector<'a> {
    pub fn new(market: &'a MarketGraph) -> Self {
        Self { market }
    }

    pub fn inject(&self, mut line: LineGraph, anchor: &Token) -> Result<AnchoredLineGraph> {
        let anchor_node = self
            .market
            .get_node(anchor)
            .ok_or_else(|| ScanError::AnchorNotFound(anchor.clone()))?;

        let source = line.get_or_add(LineNode {
            from: Origin::Zero,
            to: anchor_node,
            edge: None,
        });

        for &l in self.market.successor_nodes(anchor_node) {
            let Some(edge) = self.market.pair_edge(anchor_node, l) else {
                continue;
            };
            let Some(target) = line.find(Origin::Token(anchor_node), l) else {
                continue;
            };
            line.graph
                .update_edge(source, target, self.market.pool_edge(edge).weight);
        }

        debug!(
            "Anchor {} injected: {} opening pool-edges",
            anchor,
            line.graph.edges(source).count()
        );

        Ok(AnchoredLineGraph {
            graph: line,
            source,
            anchor: anchor_node,
        })
    }
}
