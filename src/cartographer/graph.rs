//! Market Graph
//!
//! Step 1.3: The Map Maker
//!
//! Directed multigraph over tokens. Every market contributes two pool-edges
//! (token0 -> token1 and back), weighted by the price model. Parallel pools
//! between the same ordered pair all stay in the graph; `edge_weight` and the
//! line graph see one resolved pool-edge per pair, picked by `ParallelPools`.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

use super::{Market, PriceModel, Token};
use crate::error::{Result, ScanError};

/// How to resolve several pools quoting the same ordered token pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelPools {
    /// The market listed last in the snapshot wins
    #[default]
    LastWins,
    /// The lowest-weight (best rate) pool wins
    BestRate,
}

impl fmt::Display for ParallelPools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParallelPools::LastWins => write!(f, "last_wins"),
            ParallelPools::BestRate => write!(f, "best_rate"),
        }
    }
}

impl std::str::FromStr for ParallelPools {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "last_wins" | "last" => Ok(ParallelPools::LastWins),
            "best_rate" | "best" => Ok(ParallelPools::BestRate),
            other => Err(format!("unknown parallel pool policy: {}", other)),
        }
    }
}

/// One direction of exchange through a market
#[derive(Debug, Clone)]
pub struct PoolEdge {
    /// Index of the market in `MarketGraph::markets`
    pub market: usize,
    pub pool: String,
    pub weight: f64,
}

/// A pool-edge with its endpoints resolved to tokens
#[derive(Debug, Clone, Copy)]
pub struct DirectedEdge<'a> {
    pub from: &'a Token,
    pub to: &'a Token,
    pub edge: &'a PoolEdge,
}

pub struct MarketGraph {
    graph: DiGraph<Token, PoolEdge>,
    token_to_node: HashMap<Token, NodeIndex>,
    /// Resolved pool-edge per ordered pair
    pair_edges: HashMap<(NodeIndex, NodeIndex), EdgeIndex>,
    /// Ordered pairs in first-seen order
    pairs: Vec<(NodeIndex, NodeIndex)>,
    /// Distinct successors per node, in first-seen order
    successors: Vec<Vec<NodeIndex>>,
    markets: Vec<Market>,
}

impl MarketGraph {
    pub fn build(markets: &[Market], model: &PriceModel) -> Result<Self> {
        Self::build_with(markets, model, ParallelPools::default())
    }

    pub fn build_with(markets: &[Market], model: &PriceModel, policy: ParallelPools) -> Result<Self> {
        if markets.is_empty() {
            return Err(ScanError::EmptyGraph);
        }

        // Price everything first so a bad market leaves no partial graph behind
        let weights = markets
            .iter()
            .map(|market| model.market_weights(market))
            .collect::<Result<Vec<_>>>()?;

        let mut graph = Self {
            graph: DiGraph::new(),
            token_to_node: HashMap::new(),
            pair_edges: HashMap::new(),
            pairs: Vec::new(),
            successors: Vec::new(),
            markets: markets.to_vec(),
        };

        let mut collapsed = 0;
        for (idx, (market, (forward, backward))) in markets.iter().zip(weights).enumerate() {
            let node0 = graph.get_or_create_node(&market.token0);
            let node1 = graph.get_or_create_node(&market.token1);

            for (from, to, weight) in [(node0, node1, forward), (node1, node0, backward)] {
                let edge = graph.graph.add_edge(
                    from,
                    to,
                    PoolEdge {
                        market: idx,
                        pool: market.pool.clone(),
                        weight,
                    },
                );
                if graph.resolve_pair(from, to, edge, policy) {
                    collapsed += 1;
                }
            }
        }

        info!(
            "Market graph built: {} tokens, {} pool-edges",
            graph.graph.node_count(),
            graph.graph.edge_count()
        );
        if collapsed > 0 {
            debug!("  {} parallel pool-edges resolved by {}", collapsed, policy);
        }

        Ok(graph)
    }

    /// Record `edge` as the pool-edge for (from, to). Returns true if the pair
    /// already had one.
    fn resolve_pair(&mut self, from: NodeIndex, to: NodeIndex, edge: EdgeIndex, policy: ParallelPools) -> bool {
        match self.pair_edges.get(&(from, to)).copied() {
            None => {
                self.pair_edges.insert((from, to), edge);
                self.pairs.push((from, to));
                self.successors[from.index()].push(to);
                false
            }
            Some(current) => {
                let replace = match policy {
                    ParallelPools::LastWins => true,
                    ParallelPools::BestRate => self.graph[edge].weight < self.graph[current].weight,
                };
                if replace {
                    self.pair_edges.insert((from, to), edge);
                }
                true
            }
        }
    }

    fn get_or_create_node(&mut self, token: &Token) -> NodeIndex {
        if let Some(&node) = self.token_to_node.get(token) {
            return node;
        }

        let node = self.graph.add_node(token.clone());
        self.token_to_node.insert(token.clone(), node);
        self.successors.push(Vec::new());
        node
    }

    pub fn get_node(&self, token: &Token) -> Option<NodeIndex> {
        self.token_to_node.get(token).copied()
    }

    pub fn require_node(&self, token: &Token) -> Result<NodeIndex> {
        self.get_node(token)
            .ok_or_else(|| ScanError::MissingToken(token.clone()))
    }

    pub fn token(&self, node: NodeIndex) -> &Token {
        &self.graph[node]
    }

    /// Distinct successor tokens, in the order their first pool appeared.
    pub fn successors(&self, token: &Token) -> Result<Vec<&Token>> {
        let node = self.require_node(token)?;
        Ok(self
            .successor_nodes(node)
            .iter()
            .map(|&n| self.token(n))
            .collect())
    }

    /// Distinct predecessor tokens, in node order.
    pub fn predecessors(&self, token: &Token) -> Result<Vec<&Token>> {
        let node = self.require_node(token)?;
        let mut preds: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect();
        preds.sort();
        preds.dedup();
        Ok(preds.into_iter().map(|n| self.token(n)).collect())
    }

    /// Weight of the resolved pool-edge from -> to, `None` if no market links them.
    pub fn edge_weight(&self, from: &Token, to: &Token) -> Result<Option<f64>> {
        let from = self.require_node(from)?;
        let to = self.require_node(to)?;
        Ok(self.pair_edge(from, to).map(|e| self.graph[e].weight))
    }

    pub(crate) fn successor_nodes(&self, node: NodeIndex) -> &[NodeIndex] {
        &self.successors[node.index()]
    }

    pub(crate) fn pair_edge(&self, from: NodeIndex, to: NodeIndex) -> Option<EdgeIndex> {
        self.pair_edges.get(&(from, to)).copied()
    }

    /// Resolved ordered pairs with their pool-edge, in first-seen order.
    pub(crate) fn pairs(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, EdgeIndex)> + '_ {
        self.pairs
            .iter()
            .map(move |&(from, to)| (from, to, self.pair_edges[&(from, to)]))
    }

    pub fn pool_edge(&self, edge: EdgeIndex) -> &PoolEdge {
        &self.graph[edge]
    }

    pub fn market(&self, idx: usize) -> &Market {
        &self.markets[idx]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Token> {
        self.graph.node_weights()
    }

    /// Every pool-edge, parallel pools included, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = DirectedEdge<'_>> {
        self.graph.edge_references().map(move |e| DirectedEdge {
            from: &self.graph[e.source()],
            to: &self.graph[e.target()],
            edge: e.weight(),
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
