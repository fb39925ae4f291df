//! Price Model
//!
//! Step 1.2: The Scale
//!
//! Turns a pool's reserves into a directed edge weight:
//!
//! ```text
//! w(in -> out) = -ln((1 - fee) * reserve_in / reserve_out)
//! ```
//!
//! Summing weights along a path gives -ln(product of per-hop rates), so a
//! profitable cycle has negative total weight.

use alloy_primitives::U256;

use super::Market;
use crate::config::PricingConfig;
use crate::error::{Result, ScanError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceModel {
    fee: f64,
}

impl PriceModel {
    pub fn new(fee: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&fee) {
            return Err(ScanError::InvalidFee(fee));
        }
        Ok(Self { fee })
    }

    pub fn from_config(pricing: &PricingConfig) -> Result<Self> {
        Self::new(pricing.fee)
    }

    pub fn fee(&self) -> f64 {
        self.fee
    }

    /// Log-price weight of swapping from the `reserve_in` side to the `reserve_out` side.
    pub fn weight(&self, reserve_in: U256, reserve_out: U256) -> Result<f64> {
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(ScanError::Domain {
                pool: None,
                reserve_in,
                reserve_out,
            });
        }

        let rate = (1.0 - self.fee) * (to_f64(reserve_in) / to_f64(reserve_out));
        Ok(-rate.ln())
    }

    /// Both directions of a market: (token0 -> token1, token1 -> token0).
    pub fn market_weights(&self, market: &Market) -> Result<(f64, f64)> {
        let forward = self
            .weight(market.reserve0, market.reserve1)
            .map_err(|e| e.in_market(&market.pool))?;
        let backward = self
            .weight(market.reserve1, market.reserve0)
            .map_err(|e| e.in_market(&market.pool))?;
        Ok((forward, backward))
    }
}

impl Default for PriceModel {
    fn default() -> Self {
        Self {
            fee: PricingConfig::default().fee,
        }
    }
}

// Decimal round-trip keeps full precision up to f64's own limit
fn to_f64(value: U256) -> f64 {
    value.to_string().parse::<f64>().unwrap_or(f64::INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserves(a: u64, b: u64) -> (U256, U256) {
        (U256::from(a), U256::from(b))
    }

    #[test]
    fn test_weight_matches_log_price() {
        let model = PriceModel::new(0.003).unwrap();
        let (four, two) = reserves(4, 2);

        assert_eq!(model.weight(four, two).unwrap(), -(0.997f64 * 2.0).ln());
        assert_eq!(model.weight(two, four).unwrap(), -(0.997f64 * 0.5).ln());
    }

    #[test]
    fn test_round_trip_costs_two_fees() {
        let model = PriceModel::new(0.003).unwrap();
        let expected = -(0.997f64 * 0.997).ln();

        for (a, b) in [(4, 2), (1, 3), (1_000_000, 7), (123_456_789, 987_654_321)] {
            let (ra, rb) = reserves(a, b);
            let there = model.weight(ra, rb).unwrap();
            let back = model.weight(rb, ra).unwrap();
            assert!(
                (there + back - expected).abs() < 1e-12,
                "({}, {}): {} + {} != {}",
                a,
                b,
                there,
                back,
                expected
            );
        }
    }

    #[test]
    fn test_zero_reserve_is_a_domain_error() {
        let model = PriceModel::default();
        let (zero, two) = reserves(0, 2);

        assert!(matches!(
            model.weight(zero, two),
            Err(ScanError::Domain { pool: None, .. })
        ));
        assert!(model.weight(two, zero).is_err());
    }

    #[test]
    fn test_market_weights_name_the_pool() {
        let model = PriceModel::default();
        let market = Market::from_decimal("UNI1", "WETH", "0", "X", "2").unwrap();

        match model.market_weights(&market) {
            Err(ScanError::Domain { pool: Some(pool), .. }) => assert_eq!(pool, "UNI1"),
            other => panic!("expected domain error, got {:?}", other),
        }
    }

    #[test]
    fn test_fee_outside_unit_range_is_rejected() {
        assert!(matches!(PriceModel::new(1.0), Err(ScanError::InvalidFee(f)) if f == 1.0));
        assert!(matches!(PriceModel::new(-0.01), Err(ScanError::InvalidFee(_))));
        assert!(PriceModel::new(f64::NAN).is_err());
        assert_eq!(PriceModel::new(0.0).unwrap().fee(), 0.0);
    }

    #[test]
    fn test_huge_reserves_stay_finite() {
        let model = PriceModel::new(0.003).unwrap();
        let huge = U256::MAX;
        let w = model.weight(huge, U256::from(1u64)).unwrap();
        assert!(w.is_finite());
        assert!(w < 0.0);
    }
}
