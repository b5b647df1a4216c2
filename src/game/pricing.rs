//! Shop prices.
//!
//! `unit = floor(base × shop multiplier × charisma factor)`, computed in
//! basis points so `15 × 1.2` is exactly 18. The charisma factor falls as
//! charisma rises above the neutral value when buying and rises with it when
//! selling, clamped to `[min_factor, max_factor]`.

use serde::{Deserialize, Serialize};

const BPS: u128 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Charisma at which the factor is exactly 1.
    pub charisma_base: i32,
    /// Factor change per charisma point.
    pub charisma_rate: f64,
    pub min_factor: f64,
    pub max_factor: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            charisma_base: 10,
            charisma_rate: 0.05,
            min_factor: 0.5,
            max_factor: 1.5,
        }
    }
}

fn to_bps(value: f64) -> u128 {
    if value.is_finite() && value > 0.0 {
        (value * BPS as f64).round() as u128
    } else {
        0
    }
}

impl PricingConfig {
    fn charisma_steps(&self, charisma: i32) -> f64 {
        f64::from(charisma) - f64::from(self.charisma_base)
    }

    fn clamp_factor(&self, factor: f64) -> f64 {
        factor.max(self.min_factor).min(self.max_factor)
    }

    /// Price factor applied when the player buys.
    pub fn buy_factor(&self, charisma: i32) -> f64 {
        let steps = self.charisma_steps(charisma);
        self.clamp_factor(1.0 - steps * self.charisma_rate)
    }

    /// Price factor applied when the player sells.
    pub fn sell_factor(&self, charisma: i32) -> f64 {
        let steps = self.charisma_steps(charisma);
        self.clamp_factor(1.0 + steps * self.charisma_rate)
    }

    pub fn unit_buy_price(&self, base_value: u64, buy_multiplier: f64, charisma: i32) -> u64 {
        scaled(base_value, buy_multiplier, self.buy_factor(charisma))
    }

    pub fn unit_sell_price(&self, base_value: u64, sell_multiplier: f64, charisma: i32) -> u64 {
        scaled(base_value, sell_multiplier, self.sell_factor(charisma))
    }
}

fn scaled(base_value: u64, multiplier: f64, factor: f64) -> u64 {
    let raw = u128::from(base_value) * to_bps(multiplier) * to_bps(factor) / (BPS * BPS);
    u64::try_from(raw).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_charisma_is_exact() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.unit_buy_price(15, 1.2, 10), 18);
        assert_eq!(pricing.unit_sell_price(15, 0.5, 10), 7);
        assert_eq!(pricing.unit_buy_price(10, 1.1, 10), 11);
    }

    #[test]
    fn charisma_moves_prices_in_the_players_favour() {
        let pricing = PricingConfig::default();
        assert!(pricing.unit_buy_price(100, 1.2, 16) < pricing.unit_buy_price(100, 1.2, 10));
        assert!(pricing.unit_buy_price(100, 1.2, 4) > pricing.unit_buy_price(100, 1.2, 10));
        assert!(pricing.unit_sell_price(100, 0.5, 16) > pricing.unit_sell_price(100, 0.5, 10));
        // 1 - 4 * 0.05 = 0.8
        assert_eq!(pricing.unit_buy_price(100, 1.0, 14), 80);
    }

    #[test]
    fn factor_is_clamped() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.buy_factor(40), 0.5);
        assert_eq!(pricing.buy_factor(-40), 1.5);
        assert_eq!(pricing.sell_factor(40), 1.5);
    }

    #[test]
    fn extreme_charisma_hits_the_clamps() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.buy_factor(i32::MIN), 1.5);
        assert_eq!(pricing.buy_factor(i32::MAX), 0.5);
        assert_eq!(pricing.sell_factor(i32::MIN), 0.5);
        assert_eq!(pricing.sell_factor(i32::MAX), 1.5);
        assert_eq!(pricing.unit_buy_price(15, 1.2, i32::MIN), 27);

        let skewed = PricingConfig {
            charisma_base: i32::MIN,
            ..PricingConfig::default()
        };
        assert_eq!(skewed.buy_factor(i32::MAX), 0.5);
    }

    #[test]
    fn bad_multiplier_prices_at_zero() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.unit_buy_price(15, f64::NAN, 10), 0);
        assert_eq!(pricing.unit_buy_price(15, -1.0, 10), 0);
    }
}
