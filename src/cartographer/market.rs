//! Market Snapshot
//!
//! Step 1.1: The Ledger
//!
//! Tokens, markets and the JSON snapshot format they are loaded from.
//! A snapshot is either one JSON array of market records or one array
//! per line; a record whose pool id was already seen replaces the
//! earlier record in place.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use tracing::{debug, info, warn};

use crate::error::{Result, ScanError};

/// Opaque token identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Token {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Token {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A constant-product pool between two tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    pub pool: String,
    pub token0: Token,
    pub reserve0: U256,
    pub token1: Token,
    pub reserve1: U256,
}

impl Market {
    pub fn new(
        pool: impl Into<String>,
        token0: impl Into<Token>,
        reserve0: U256,
        token1: impl Into<Token>,
        reserve1: U256,
    ) -> Self {
        Self {
            pool: pool.into(),
            token0: token0.into(),
            reserve0,
            token1: token1.into(),
            reserve1,
        }
    }

    /// Build a market from decimal reserve strings.
    ///
    /// A zero reserve parses fine here; it is rejected when the market is priced.
    pub fn from_decimal(
        pool: impl Into<String>,
        token0: impl Into<Token>,
        reserve0: &str,
        token1: impl Into<Token>,
        reserve1: &str,
    ) -> Result<Self> {
        let pool = pool.into();
        let reserve0 = parse_reserve(&pool, reserve0)?;
        let reserve1 = parse_reserve(&pool, reserve1)?;
        Ok(Self::new(pool, token0, reserve0, token1, reserve1))
    }

    /// Reserves seen from `token`'s side: (reserve of token, reserve of the other).
    pub fn reserves_from(&self, token: &Token) -> Option<(U256, U256)> {
        if *token == self.token0 {
            Some((self.reserve0, self.reserve1))
        } else if *token == self.token1 {
            Some((self.reserve1, self.reserve0))
        } else {
            None
        }
    }
}

fn parse_reserve(pool: &str, value: &str) -> Result<U256> {
    U256::from_str_radix(value.trim(), 10).map_err(|_| ScanError::InvalidReserve {
        pool: pool.to_string(),
        value: value.to_string(),
    })
}

/// Wire shape of one market in a snapshot.
///
/// Accepts both `pool/reserve0/reserve1` and the exporter's
/// `marketAddress/balance0/balance1` spelling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRecord {
    #[serde(alias = "marketAddress")]
    pub pool: String,
    pub token0: String,
    #[serde(alias = "balance0")]
    pub reserve0: String,
    pub token1: String,
    #[serde(alias = "balance1")]
    pub reserve1: String,
}

impl TryFrom<MarketRecord> for Market {
    type Error = ScanError;

    fn try_from(record: MarketRecord) -> Result<Self> {
        Market::from_decimal(
            record.pool,
            record.token0,
            &record.reserve0,
            record.token1,
            &record.reserve1,
        )
    }
}

impl From<&Market> for MarketRecord {
    fn from(market: &Market) -> Self {
        Self {
            pool: market.pool.clone(),
            token0: market.token0.to_string(),
            reserve0: market.reserve0.to_string(),
            token1: market.token1.to_string(),
            reserve1: market.reserve1.to_string(),
        }
    }
}

/// Parse a snapshot held in memory.
pub fn parse_snapshot(input: &str) -> Result<Vec<Market>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    // One array for the whole document, or one array per line
    let batches: Vec<Vec<MarketRecord>> = match serde_json::from_str(trimmed) {
        Ok(records) => vec![records],
        Err(whole_err) => {
            let mut batches = Vec::new();
            for (line_no, line) in trimmed.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let records = serde_json::from_str(line).map_err(|e| {
                    debug!("Snapshot is not a single JSON array: {}", whole_err);
                    ScanError::Snapshot(format!("line {}: {}", line_no + 1, e))
                })?;
                batches.push(records);
            }
            batches
        }
    };

    let mut markets: Vec<Market> = Vec::new();
    let mut by_pool: HashMap<String, usize> = HashMap::new();
    let mut replaced = 0;

    for record in batches.into_iter().flatten() {
        let market = Market::try_from(record)?;
        match by_pool.get(&market.pool) {
            Some(&slot) => {
                markets[slot] = market;
                replaced += 1;
            }
            None => {
                by_pool.insert(market.pool.clone(), markets.len());
                markets.push(market);
            }
        }
    }

    if replaced > 0 {
        warn!("  {} market records replaced an earlier record for the same pool", replaced);
    }
    info!("Loaded {} markets from snapshot", markets.len());

    Ok(markets)
}

/// Read and parse a snapshot from any reader (file, stdin).
pub fn load_snapshot<R: Read>(mut reader: R) -> Result<Vec<Market>> {
    let mut input = String::new();
    reader
        .read_to_string(&mut input)
        .map_err(|e| ScanError::Snapshot(e.to_string()))?;
    parse_snapshot(&input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_field_names() {
        let input = r#"[
            {"marketAddress": "0xpool", "token0": "WETH", "balance0": "4000000000000000000", "token1": "X", "balance1": "2"}
        ]"#;

        let markets = parse_snapshot(input).unwrap();
        assert_eq!(markets.len(), 1);
        assert_eq!(markets[0].pool, "0xpool");
        assert_eq!(markets[0].token0, Token::new("WETH"));
        assert_eq!(markets[0].reserve0, U256::from(4_000_000_000_000_000_000u64));
        assert_eq!(markets[0].reserve1, U256::from(2u64));
    }

    #[test]
    fn test_reserves_wider_than_u128() {
        let big = "340282366920938463463374607431768211457"; // 2^128 + 1
        let market = Market::from_decimal("P", "A", big, "B", "1").unwrap();
        assert_eq!(market.reserve0, U256::from(u128::MAX) + U256::from(2u64));
    }

    #[test]
    fn test_one_array_per_line_later_record_wins() {
        let input = concat!(
            r#"[{"pool": "P1", "token0": "A", "reserve0": "1", "token1": "B", "reserve1": "2"},"#,
            r#" {"pool": "P2", "token0": "B", "reserve0": "3", "token1": "C", "reserve1": "4"}]"#,
            "\n",
            r#"[{"pool": "P1", "token0": "A", "reserve0": "10", "token1": "B", "reserve1": "20"}]"#,
            "\n",
        );

        let markets = parse_snapshot(input).unwrap();
        assert_eq!(markets.len(), 2);
        assert_eq!(markets[0].pool, "P1");
        assert_eq!(markets[0].reserve0, U256::from(10u64));
        assert_eq!(markets[1].pool, "P2");
    }

    #[test]
    fn test_bad_reserve_is_reported() {
        let input = r#"[{"pool": "P1", "token0": "A", "reserve0": "-5", "token1": "B", "reserve1": "2"}]"#;
        let err = parse_snapshot(input).unwrap_err();
        assert!(matches!(err, ScanError::InvalidReserve { ref pool, .. } if pool == "P1"));
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_snapshot("[{\"pool\": ").unwrap_err();
        assert!(matches!(err, ScanError::Snapshot(_)));
    }

    #[test]
    fn test_empty_input_has_no_markets() {
        assert!(parse_snapshot("  \n").unwrap().is_empty());
        assert!(parse_snapshot("[]").unwrap().is_empty());
    }

    #[test]
    fn test_reserves_from_either_side() {
        let market = Market::from_decimal("P", "A", "4", "B", "2").unwrap();
        assert_eq!(
            market.reserves_from(&Token::new("B")),
            Some((U256::from(2u64), U256::from(4u64)))
        );
        assert_eq!(market.reserves_from(&Token::new("C")), None);
    }
}
