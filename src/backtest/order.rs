//! Order execution simulation (§4.14), ported from the source's
//! `OrderSimulator`.

use chrono::{DateTime, Utc};

use super::cost::TransactionCostCalculator;
use super::slippage::SlippageCalculator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Filled,
    Pending,
    Expired,
}

#[derive(Debug, Clone)]
pub struct FilledOrder {
    pub status: OrderStatus,
    pub fill_price: f64,
    pub quantity: f64,
    pub trade_value: f64,
    pub costs: f64,
    pub net_value: f64,
}

#[derive(Debug, Clone)]
pub struct PendingOrder {
    pub limit_price: f64,
    pub quantity: f64,
    pub is_sell: bool,
    pub placed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of checking a `PendingOrder` against a later market price.
#[derive(Debug, Clone)]
pub enum LimitCheckOutcome {
    Filled(FilledOrder),
    StillPending,
    Expired,
}

pub struct OrderSimulator<'a> {
    pub cost_calculator: &'a TransactionCostCalculator,
    pub slippage_calculator: &'a SlippageCalculator,
}

impl<'a> OrderSimulator<'a> {
    pub fn new(cost_calculator: &'a TransactionCostCalculator, slippage_calculator: &'a SlippageCalculator) -> Self {
        Self {
            cost_calculator,
            slippage_calculator,
        }
    }

    pub fn simulate_market_order(
        &self,
        current_price: f64,
        quantity: f64,
        is_sell: bool,
        recent_prices: &[f64],
        daily_volume: Option<f64>,
    ) -> FilledOrder {
        let slippage_pct = self
            .slippage_calculator
            .calculate_slippage(quantity, is_sell, recent_prices, daily_volume, false, false);
        let fill_price = self.slippage_calculator.apply_slippage(current_price, slippage_pct, is_sell);
        let trade_value = fill_price * quantity;
        let costs = self.cost_calculator.calculate_total_cost(trade_value, is_sell).total_cost;
        let net_value = if is_sell { trade_value - costs } else { trade_value + costs };

        FilledOrder {
            status: OrderStatus::Filled,
            fill_price,
            quantity,
            trade_value,
            costs,
            net_value,
        }
    }

    /// Fills immediately if the limit crosses the current price, otherwise
    /// returns a `PendingOrder` for later resolution via
    /// `check_limit_order_fill`. Immediate fills still pass through the
    /// slippage model with the limit-order discount applied (§4.14).
    pub fn simulate_limit_order(
        &self,
        current_price: f64,
        limit_price: f64,
        quantity: f64,
        is_sell: bool,
        recent_prices: &[f64],
        daily_volume: Option<f64>,
        placed_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<FilledOrder, PendingOrder> {
        let immediately_fillable = if is_sell {
            limit_price <= current_price
        } else {
            limit_price >= current_price
        };

        if immediately_fillable {
            let slippage_pct = self
                .slippage_calculator
                .calculate_slippage(quantity, is_sell, recent_prices, daily_volume, true, false);
            let fill_price = self.slippage_calculator.apply_slippage(current_price, slippage_pct, is_sell);
            let trade_value = fill_price * quantity;
            let costs = self.cost_calculator.calculate_total_cost(trade_value, is_sell).total_cost;
            let net_value = if is_sell { trade_value - costs } else { trade_value + costs };
            Ok(FilledOrder {
                status: OrderStatus::Filled,
                fill_price,
                quantity,
                trade_value,
                costs,
                net_value,
            })
        } else {
            Err(PendingOrder {
                limit_price,
                quantity,
                is_sell,
                placed_at,
                expires_at,
            })
        }
    }

    /// Checks whether a pending limit order would fill against `current_price`
    /// at `now`, expiring it instead if past `expires_at`.
    pub fn check_limit_order_fill(&self, order: &PendingOrder, current_price: f64, now: DateTime<Utc>) -> LimitCheckOutcome {
        if now >= order.expires_at {
            return LimitCheckOutcome::Expired;
        }

        let crossed = if order.is_sell {
            current_price >= order.limit_price
        } else {
            current_price <= order.limit_price
        };
        if !crossed {
            return LimitCheckOutcome::StillPending;
        }

        let trade_value = order.limit_price * order.quantity;
        let costs = self.cost_calculator.calculate_total_cost(trade_value, order.is_sell).total_cost;
        let net_value = if order.is_sell { trade_value - costs } else { trade_value + costs };
        LimitCheckOutcome::Filled(FilledOrder {
            status: OrderStatus::Filled,
            fill_price: order.limit_price,
            quantity: order.quantity,
            trade_value,
            costs,
            net_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CostRates, SlippageRates};
    use chrono::Duration;

    fn simulator() -> (TransactionCostCalculator, SlippageCalculator) {
        (
            TransactionCostCalculator::new(CostRates::default()),
            SlippageCalculator::new(SlippageRates::default()),
        )
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-11-05T04:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn market_buy_fills_above_quoted_price() {
        let (cost, slip) = simulator();
        let sim = OrderSimulator::new(&cost, &slip);
        let order = sim.simulate_market_order(100.0, 10.0, false, &[100.0; 20], Some(1_000_000.0));
        assert!(order.fill_price > 100.0);
        assert!(order.net_value > order.trade_value);
    }

    #[test]
    fn market_sell_fills_below_quoted_price() {
        let (cost, slip) = simulator();
        let sim = OrderSimulator::new(&cost, &slip);
        let order = sim.simulate_market_order(100.0, 10.0, true, &[100.0; 20], Some(1_000_000.0));
        assert!(order.fill_price < 100.0);
        assert!(order.net_value < order.trade_value);
    }

    #[test]
    fn limit_buy_fills_immediately_when_crossing() {
        let (cost, slip) = simulator();
        let sim = OrderSimulator::new(&cost, &slip);
        let result = sim.simulate_limit_order(100.0, 101.0, 10.0, false, &[100.0; 20], Some(1_000_000.0), now(), now() + Duration::days(1));
        assert!(result.is_ok());
    }

    #[test]
    fn immediate_limit_fill_still_applies_slippage() {
        let (cost, slip) = simulator();
        let sim = OrderSimulator::new(&cost, &slip);
        let order = sim
            .simulate_limit_order(100.0, 101.0, 10.0, false, &[100.0; 20], Some(1_000_000.0), now(), now() + Duration::days(1))
            .unwrap();
        assert_ne!(order.fill_price, 100.0);
    }

    #[test]
    fn limit_buy_pends_when_not_crossing() {
        let (cost, slip) = simulator();
        let sim = OrderSimulator::new(&cost, &slip);
        let result = sim.simulate_limit_order(100.0, 95.0, 10.0, false, &[100.0; 20], Some(1_000_000.0), now(), now() + Duration::days(1));
        assert!(result.is_err());
    }

    #[test]
    fn pending_limit_order_fills_once_price_crosses() {
        let (cost, slip) = simulator();
        let sim = OrderSimulator::new(&cost, &slip);
        let pending = match sim.simulate_limit_order(100.0, 95.0, 10.0, false, &[100.0; 20], Some(1_000_000.0), now(), now() + Duration::days(1)) {
            Err(p) => p,
            Ok(_) => panic!("expected pending order"),
        };
        assert!(matches!(
            sim.check_limit_order_fill(&pending, 98.0, now() + Duration::hours(1)),
            LimitCheckOutcome::StillPending
        ));
        assert!(matches!(
            sim.check_limit_order_fill(&pending, 94.0, now() + Duration::hours(2)),
            LimitCheckOutcome::Filled(_)
        ));
    }

    #[test]
    fn pending_limit_order_expires() {
        let (cost, slip) = simulator();
        let sim = OrderSimulator::new(&cost, &slip);
        let pending = match sim.simulate_limit_order(100.0, 95.0, 10.0, false, &[100.0; 20], Some(1_000_000.0), now(), now() + Duration::hours(1)) {
            Err(p) => p,
            Ok(_) => panic!("expected pending order"),
        };
        assert!(matches!(
            sim.check_limit_order_fill(&pending, 94.0, now() + Duration::hours(2)),
            LimitCheckOutcome::Expired
        ));
    }
}
