//! Slippage model (§4.13), ported from the source's `SlippageCalculator`.
//!
//! The source computes `slippage_pct = slippage_bps / 100.0`, which is
//! dimensionally wrong (basis points need `/ 10_000.0` to become a
//! fraction) and would overstate slippage by 100x; this port divides by
//! `10_000.0` (decided open question, see DESIGN.md).

use crate::config::SlippageRates;

pub struct SlippageCalculator {
    rates: SlippageRates,
}

impl SlippageCalculator {
    pub fn new(rates: SlippageRates) -> Self {
        Self { rates }
    }

    /// Standard deviation of returns over the trailing `period` prices
    /// (default 20), expressed as a percentage.
    pub fn calculate_volatility(&self, recent_prices: &[f64], period: usize) -> f64 {
        let window = if recent_prices.len() > period {
            &recent_prices[recent_prices.len() - period..]
        } else {
            recent_prices
        };
        if window.len() < 2 {
            return 0.0;
        }
        let returns: Vec<f64> = window
            .windows(2)
            .filter(|pair| pair[0] != 0.0)
            .map(|pair| (pair[1] - pair[0]) / pair[0])
            .collect();
        if returns.len() < 2 {
            return 0.0;
        }
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
        variance.sqrt() * 100.0
    }

    /// Piecewise market-impact curve keyed on traded volume as a percentage
    /// of the day's volume, capped at `impact_cap_bps`.
    pub fn calculate_market_impact(&self, quantity: f64, daily_volume: Option<f64>) -> f64 {
        let daily_volume = match daily_volume {
            Some(v) if v > 0.0 => v,
            _ => return self.rates.missing_volume_impact_bps,
        };
        let volume_pct = (quantity / daily_volume) * 100.0;
        let impact = if volume_pct < 0.1 {
            0.0
        } else if volume_pct < 1.0 {
            volume_pct * 2.0
        } else if volume_pct < 5.0 {
            2.0 + (volume_pct - 1.0) * 5.0
        } else if volume_pct < 10.0 {
            22.0 + (volume_pct - 5.0) * 10.0
        } else {
            72.0 + (volume_pct - 10.0) * 20.0
        };
        impact.min(self.rates.impact_cap_bps)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn calculate_slippage(
        &self,
        quantity: f64,
        is_sell: bool,
        recent_prices: &[f64],
        daily_volume: Option<f64>,
        is_limit_order: bool,
        limit_crossed_wrong_side: bool,
    ) -> f64 {
        let market_impact_bps = self.calculate_market_impact(quantity, daily_volume) * self.rates.impact_factor;
        let volatility_pct = self.calculate_volatility(recent_prices, 20);
        let volatility_impact_bps = volatility_pct * 0.5;

        let mut slippage_bps = self.rates.base_slippage_bps + market_impact_bps + volatility_impact_bps;

        if is_limit_order {
            slippage_bps *= self.rates.limit_order_multiplier;
            if limit_crossed_wrong_side {
                slippage_bps *= self.rates.wrong_side_multiplier;
            }
        }

        if is_sell {
            slippage_bps *= self.rates.sell_multiplier;
        }

        slippage_bps / 10_000.0
    }

    /// Applies `calculate_slippage` to a reference price to get the
    /// execution price: sells fill below, buys fill above.
    pub fn apply_slippage(&self, price: f64, slippage_pct: f64, is_sell: bool) -> f64 {
        if is_sell {
            price * (1.0 - slippage_pct)
        } else {
            price * (1.0 + slippage_pct)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc() -> SlippageCalculator {
        SlippageCalculator::new(SlippageRates::default())
    }

    #[test]
    fn slippage_pct_is_a_small_fraction_not_a_percentage() {
        let slippage = calc().calculate_slippage(1000.0, false, &[100.0; 20], Some(1_000_000.0), false, false);
        assert!(slippage < 0.05, "expected a fraction well under 5%, got {slippage}");
    }

    #[test]
    fn sell_orders_incur_more_slippage_than_buys() {
        let prices = [100.0; 20];
        let buy = calc().calculate_slippage(1000.0, false, &prices, Some(1_000_000.0), false, false);
        let sell = calc().calculate_slippage(1000.0, true, &prices, Some(1_000_000.0), false, false);
        assert!(sell > buy);
    }

    #[test]
    fn limit_orders_incur_less_slippage_than_market_orders() {
        let prices = [100.0; 20];
        let market = calc().calculate_slippage(1000.0, false, &prices, Some(1_000_000.0), false, false);
        let limit = calc().calculate_slippage(1000.0, false, &prices, Some(1_000_000.0), true, false);
        assert!(limit < market);
    }

    #[test]
    fn missing_volume_falls_back_to_default_impact() {
        assert_eq!(calc().calculate_market_impact(1000.0, None), 50.0);
    }

    #[test]
    fn market_impact_is_capped() {
        let impact = calc().calculate_market_impact(10_000_000.0, Some(1_000_000.0));
        assert!(impact <= 200.0);
    }

    #[test]
    fn apply_slippage_moves_price_against_the_trader() {
        assert!(calc().apply_slippage(100.0, 0.001, false) > 100.0);
        assert!(calc().apply_slippage(100.0, 0.001, true) < 100.0);
    }
}
