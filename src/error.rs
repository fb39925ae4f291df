//! Scan errors
//!
//! Everything the core pipeline can fail with. Outer layers (config, CLI)
//! wrap these in `eyre` reports.

use alloy_primitives::U256;
use thiserror::Error;

use crate::cartographer::Token;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    /// A market cannot be priced because one side holds nothing
    #[error(
        "reserves must be strictly positive (in={reserve_in}, out={reserve_out}){}",
        market_suffix(.pool)
    )]
    Domain {
        pool: Option<String>,
        reserve_in: U256,
        reserve_out: U256,
    },

    #[error("token {0} is not in the market graph")]
    MissingToken(Token),

    #[error("anchor token {0} is not in the market graph")]
    AnchorNotFound(Token),

    #[error("no markets to build a graph from")]
    EmptyGraph,

    #[error("swap fee must be in [0, 1) (got {0})")]
    InvalidFee(f64),

    #[error("market {pool}: reserve {value:?} is not a 256-bit decimal integer")]
    InvalidReserve { pool: String, value: String },

    #[error("malformed market snapshot: {0}")]
    Snapshot(String),
}

impl ScanError {
    /// Attach the pool id to a domain error raised by the bare price model.
    pub fn in_market(self, pool: &str) -> Self {
        match self {
            ScanError::Domain {
                pool: None,
                reserve_in,
                reserve_out,
            } => ScanError::Domain {
                pool: Some(pool.to_string()),
                reserve_in,
                reserve_out,
            },
            other => other,
        }
    }
}

fn market_suffix(pool: &Option<String>) -> String {
    pool.as_ref()
        .map(|p| format!(" in market {}", p))
        .unwrap_or_default()
}
