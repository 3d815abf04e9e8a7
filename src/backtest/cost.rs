//! Indian-equity transaction cost model (§4.12), ported from the source's
//! `TransactionCostCalculator`.

use crate::config::CostRates;

/// Rounds to 2 decimal places, matching §4.12's rounding rule for money
/// fields.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rounds to 4 decimal places, matching §4.12's rounding rule for
/// `cost_percentage`.
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, Copy)]
pub struct CostBreakdown {
    pub trade_value: f64,
    pub is_sell: bool,
    pub brokerage: f64,
    pub stt: f64,
    pub gst: f64,
    pub exchange_charges: f64,
    pub sebi_charges: f64,
    pub stamp_duty: f64,
    pub total_cost: f64,
    pub cost_percentage: f64,
}

pub struct TransactionCostCalculator {
    rates: CostRates,
}

impl TransactionCostCalculator {
    pub fn new(rates: CostRates) -> Self {
        Self { rates }
    }

    pub fn calculate_brokerage(&self, trade_value: f64) -> f64 {
        (trade_value * self.rates.brokerage_rate).max(self.rates.min_brokerage)
    }

    /// Securities Transaction Tax applies on sell trades only.
    pub fn calculate_stt(&self, trade_value: f64, is_sell: bool) -> f64 {
        if is_sell {
            trade_value * self.rates.stt_rate
        } else {
            0.0
        }
    }

    pub fn calculate_gst(&self, brokerage: f64) -> f64 {
        brokerage * self.rates.gst_rate
    }

    pub fn calculate_exchange_charges(&self, trade_value: f64) -> f64 {
        trade_value * self.rates.exchange_rate
    }

    pub fn calculate_sebi_charges(&self, trade_value: f64) -> f64 {
        trade_value * self.rates.sebi_rate
    }

    /// Stamp duty applies on buy trades only.
    pub fn calculate_stamp_duty(&self, trade_value: f64, is_sell: bool) -> f64 {
        if is_sell {
            0.0
        } else {
            trade_value * self.rates.stamp_duty_rate
        }
    }

    pub fn calculate_total_cost(&self, trade_value: f64, is_sell: bool) -> CostBreakdown {
        let brokerage = self.calculate_brokerage(trade_value);
        let stt = self.calculate_stt(trade_value, is_sell);
        let gst = self.calculate_gst(brokerage);
        let exchange_charges = self.calculate_exchange_charges(trade_value);
        let sebi_charges = self.calculate_sebi_charges(trade_value);
        let stamp_duty = self.calculate_stamp_duty(trade_value, is_sell);
        let total_cost = brokerage + stt + gst + exchange_charges + sebi_charges + stamp_duty;
        let cost_percentage = if trade_value != 0.0 { total_cost / trade_value * 100.0 } else { 0.0 };

        CostBreakdown {
            trade_value: round2(trade_value),
            is_sell,
            brokerage: round2(brokerage),
            stt: round2(stt),
            gst: round2(gst),
            exchange_charges: round2(exchange_charges),
            sebi_charges: round2(sebi_charges),
            stamp_duty: round2(stamp_duty),
            total_cost: round2(total_cost),
            cost_percentage: round4(cost_percentage),
        }
    }

    /// Combined buy + sell cost for a full round trip on the same trade value.
    pub fn calculate_round_trip_cost(&self, trade_value: f64) -> f64 {
        round2(
            self.calculate_total_cost(trade_value, false).total_cost
                + self.calculate_total_cost(trade_value, true).total_cost,
        )
    }
}
