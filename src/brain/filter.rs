//! Cycle Evaluator
//!
//! Step 2.3: The Filter
//!
//! Scores closed walks and keeps the ones that make money:
//!
//! ```text
//! profit = exp(-(W - H * hop_offset)) - 1
//! ```
//!
//! where W is the walk's total log-weight and H its hop count.

use console::style;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

use super::CandidateCycle;
use crate::cartographer::{MarketGraph, Token};
use crate::config::PricingConfig;

/// One swap in an opportunity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hop {
    pub pool: String,
    pub from: Token,
    pub to: Token,
    pub weight: f64,
}

/// A profitable closed walk through the anchor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub anchor: Token,
    pub hops: Vec<Hop>,
    /// Always `hops.len()`; kept as a field so JSON output carries it
    pub hop_count: usize,
    pub total_weight: f64,
    pub profit_fraction: f64,
}

impl Opportunity {
    pub fn profit_percentage(&self) -> f64 {
        self.profit_fraction * 100.0
    }

    /// Tokens visited, anchor at both ends.
    pub fn tokens(&self) -> Vec<&Token> {
        let mut tokens = vec![&self.anchor];
        tokens.extend(self.hops.iter().map(|h| &h.to));
        tokens
    }

    pub fn pools(&self) -> impl Iterator<Item = &str> {
        self.hops.iter().map(|h| h.pool.as_str())
    }

    pub fn format_path(&self) -> String {
        self.tokens()
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" → ")
    }

    /// Pool sequence rotated to start at its smallest pool id, so the same
    /// loop entered from different anchors compares equal.
    pub fn rotation_key(&self) -> Vec<String> {
        let pools: Vec<String> = self.pools().map(String::from).collect();
        let start = pools
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        pools[start..].iter().chain(&pools[..start]).cloned().collect()
    }

    /// Starts and ends at the anchor, chains hop to hop, repeats no token.
    pub fn is_valid(&self) -> bool {
        if self.hops.len() < 2 || self.hop_count != self.hops.len() || !self.profit_fraction.is_finite() {
            return false;
        }
        if self.hops[0].from != self.anchor || self.hops[self.hops.len() - 1].to != self.anchor {
            return false;
        }
        if self.hops.windows(2).any(|w| w[0].to != w[1].from) {
            return false;
        }
        let mut seen = std::collections::HashSet::new();
        self.hops.iter().all(|h| seen.insert(&h.to))
    }
}

/// Ranking: best profit first, then fewer hops, then pool ids
pub fn rank(a: &Opportunity, b: &Opportunity) -> Ordering {
    b.profit_fraction
        .partial_cmp(&a.profit_fraction)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.hop_count.cmp(&b.hop_count))
        .then_with(|| a.anchor.cmp(&b.anchor))
        .then_with(|| a.pools().cmp(b.pools()))
}

pub struct CycleEvaluator {
    hop_offset: f64,
    min_profit_fraction: f64,
}

impl CycleEvaluator {
    pub fn new(pricing: &PricingConfig) -> Self {
        Self {
            hop_offset: pricing.hop_offset,
            min_profit_fraction: 0.0,
        }
    }

    pub fn with_min_profit(mut self, min_profit_fraction: f64) -> Self {
        self.min_profit_fraction = min_profit_fraction;
        self
    }

    pub fn profit_fraction(&self, total_weight: f64, hop_count: usize) -> f64 {
        (-(total_weight - hop_count as f64 * self.hop_offset)).exp() - 1.0
    }

    /// Score, filter and rank the walks found from `anchor`.
    pub fn evaluate(
        &self,
        market: &MarketGraph,
        anchor: &Token,
        cycles: &[CandidateCycle],
    ) -> Vec<Opportunity> {
        let mut kept = Vec::new();
        let mut filtered = 0;

        for cycle in cycles {
            let profit_fraction = self.profit_fraction(cycle.total_weight, cycle.hop_count());
            let opportunity = self.describe(market, anchor, cycle, profit_fraction);

            if profit_fraction > 0.0 && profit_fraction >= self.min_profit_fraction {
                if opportunity.is_valid() {
                    debug!(
                        "Kept {} ({:+.4}%)",
                        opportunity.format_path(),
                        opportunity.profit_percentage()
                    );
                    kept.push(opportunity);
                } else {
                    warn!("Dropping malformed walk {}", opportunity.format_path());
                }
            } else {
                filtered += 1;
                debug!(
                    "Filtered: {} | {:+.4}%",
                    opportunity.format_path(),
                    opportunity.profit_percentage()
                );
            }
        }

        if filtered > 0 {
            info!(
                "Filtered out {} walks at or below {:.4}% profit",
                filtered,
                self.min_profit_fraction * 100.0
            );
        }

        kept.sort_by(rank);
        kept
    }

    fn describe(
        &self,
        market: &MarketGraph,
        anchor: &Token,
        cycle: &CandidateCycle,
        profit_fraction: f64,
    ) -> Opportunity {
        let mut from = anchor.clone();
        let hops = cycle
            .edges
            .iter()
            .map(|&e| {
                let edge = market.pool_edge(e);
                let m = market.market(edge.market);
                let to = if m.token0 == from {
                    m.token1.clone()
                } else {
                    m.token0.clone()
                };
                Hop {
                    pool: edge.pool.clone(),
                    from: std::mem::replace(&mut from, to.clone()),
                    to,
                    weight: edge.weight,
                }
            })
            .collect::<Vec<_>>();

        Opportunity {
            anchor: anchor.clone(),
            hop_count: hops.len(),
            hops,
            total_weight: cycle.total_weight,
            profit_fraction,
        }
    }

    /// Print the top opportunities as a console report
    pub fn print_summary(&self, opportunities: &[Opportunity], top: usize) {
        println!();
        println!("{}", style("═══ OPPORTUNITIES ═══").yellow().bold());
        println!();

        if opportunities.is_empty() {
            println!("  {}", style("No profitable cycles through the anchors").dim());
            return;
        }

        let to_show = opportunities.len().min(top.max(1));
        for (i, opp) in opportunities.iter().take(to_show).enumerate() {
            println!(
                "  {}. {} | {:.6}x return ({:+.4}%) | {} hops",
                i + 1,
                style("✓ PROFITABLE").green(),
                1.0 + opp.profit_fraction,
                opp.profit_percentage(),
                opp.hop_count
            );
            println!("     Path:  {}", style(opp.format_path()).cyan());
            println!(
                "     Pools: {}",
                style(opp.pools().collect::<Vec<_>>().join(" → ")).magenta()
            );
            println!("     Log-weight: {:.9}", opp.total_weight);
            println!();
        }

        if opportunities.len() > to_show {
            println!("  ... and {} more", opportunities.len() - to_show);
        }
    }
}

impl Default for CycleEvaluator {
    fn default() -> Self {
        Self::new(&PricingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opportunity(anchor: &str, route: &[(&str, &str, &str)], profit_fraction: f64) -> Opportunity {
        Opportunity {
            anchor: Token::new(anchor),
            hop_count: route.len(),
            hops: route
                .iter()
                .map(|&(pool, from, to)| Hop {
                    pool: pool.to_string(),
                    from: Token::new(from),
                    to: Token::new(to),
                    weight: 0.0,
                })
                .collect(),
            total_weight: -(1.0 + profit_fraction).ln(),
            profit_fraction,
        }
    }

    #[test]
    fn test_profit_formula() {
        let evaluator = CycleEvaluator::default();
        let w = -(1.05f64).ln();
        assert!((evaluator.profit_fraction(w, 3) - 0.05).abs() < 1e-12);
        assert!(evaluator.profit_fraction(0.01, 3) < 0.0);
    }

    #[test]
    fn test_hop_offset_credits_each_hop() {
        let pricing = PricingConfig {
            fee: 0.003,
            hop_offset: 0.01,
        };
        let evaluator = CycleEvaluator::new(&pricing);
        let profit = evaluator.profit_fraction(0.02, 3);
        assert!((profit - (0.01f64).exp() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_validation() {
        let good = opportunity("X", &[("P1", "X", "A"), ("P2", "A", "B"), ("P3", "B", "X")], 0.1);
        assert!(good.is_valid());
        assert_eq!(good.format_path(), "X → A → B → X");

        let broken_chain = opportunity("X", &[("P1", "X", "A"), ("P2", "B", "X")], 0.1);
        assert!(!broken_chain.is_valid());

        let revisits = opportunity(
            "X",
            &[("P1", "X", "A"), ("P2", "A", "B"), ("P3", "B", "A"), ("P4", "A", "X")],
            0.1,
        );
        assert!(!revisits.is_valid());
    }

    #[test]
    fn test_json_carries_hop_count() {
        let opp = opportunity("X", &[("P1", "X", "A"), ("P2", "A", "B"), ("P3", "B", "X")], 0.1);
        let json = serde_json::to_value(&opp).unwrap();
        assert_eq!(json["hop_count"], 3);
        assert_eq!(json["hops"].as_array().unwrap().len(), 3);

        let mut stale = opp.clone();
        stale.hop_count = 2;
        assert!(!stale.is_valid());
    }

    #[test]
    fn test_ranking_is_total() {
        let mut opps = vec![
            opportunity("X", &[("P1", "X", "A"), ("P2", "A", "B"), ("P3", "B", "X")], 0.02),
            opportunity("X", &[("P9", "X", "A"), ("P8", "A", "X")], 0.02),
            opportunity("X", &[("P4", "X", "C"), ("P5", "C", "D"), ("P6", "D", "X")], 0.30),
            opportunity("X", &[("P0", "X", "A"), ("P2", "A", "B"), ("P3", "B", "X")], 0.02),
        ];
        opps.sort_by(rank);

        let order: Vec<String> = opps.iter().map(|o| o.pools().collect::<Vec<_>>().join(",")).collect();
        assert_eq!(order, vec!["P4,P5,P6", "P9,P8", "P0,P2,P3", "P1,P2,P3"]);
    }

    #[test]
    fn test_rotation_key() {
        let a = opportunity("X", &[("P3", "X", "A"), ("P1", "A", "B"), ("P2", "B", "X")], 0.1);
        let b = opportunity("A", &[("P1", "A", "B"), ("P2", "B", "X"), ("P3", "X", "A")], 0.1);
        assert_eq!(a.rotation_key(), b.rotation_key());
        assert_eq!(a.rotation_key(), vec!["P1", "P2", "P3"]);
    }
}
