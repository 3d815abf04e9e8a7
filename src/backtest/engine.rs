//! Backtest event loop (§4.17), ported from the source's
//! `BacktestEngine.run_backtest`.
//!
//! The source compares `stop_loss`/`take_profit` against the candle
//! `close`. Per seed scenario 6 this port checks the candle's `low`/`high`
//! instead, filling at the threshold price itself — a deliberate
//! redesign (decided open question, see DESIGN.md).

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{info_span, warn};

use crate::calendar::ExchangeCalendar;
use crate::config::CoreConfig;
use crate::data::schema::CandleRecord;
use crate::error::CoreError;

use super::cost::TransactionCostCalculator;
use super::metrics::{calculate_metrics, PerformanceSummary};
use super::position::{ClosedTrade, PositionManager, PositionStatistics};
use super::slippage::SlippageCalculator;
use super::strategy::{Action, MarketWindow, SignalStrategy};

#[derive(Debug, Clone, Copy)]
pub struct BacktestParams {
    pub initial_capital: f64,
    pub position_size_pct: f64,
    pub max_positions: usize,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            position_size_pct: 0.1,
            max_positions: 1,
            stop_loss_pct: 0.0,
            take_profit_pct: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TradeEvent {
    pub timestamp: DateTime<Utc>,
    pub action: &'static str,
    pub price: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub metrics: PerformanceSummary,
    pub statistics: PositionStatistics,
    pub total_pnl: f64,
    pub trades: Vec<TradeEvent>,
    pub equity_curve: Vec<f64>,
    pub returns: Vec<f64>,
    pub closed_positions: Vec<ClosedTrade>,
    pub open_position_quantity: f64,
}

pub struct BacktestEngine<'a> {
    config: &'a CoreConfig,
    calendar: ExchangeCalendar,
}

impl<'a> BacktestEngine<'a> {
    pub fn new(config: &'a CoreConfig) -> Self {
        Self {
            config,
            calendar: ExchangeCalendar::new(&config.data.timezone),
        }
    }

    pub fn run_backtest(
        &self,
        symbol: &str,
        candles: &[CandleRecord],
        params: BacktestParams,
        strategy: &dyn SignalStrategy,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<BacktestResult> {
        let span = info_span!("run_backtest", symbol);
        let _enter = span.enter();

        let filtered: Vec<&CandleRecord> = candles
            .iter()
            .filter(|c| start_date.map(|s| c.start_ts >= s).unwrap_or(true))
            .filter(|c| end_date.map(|e| c.start_ts <= e).unwrap_or(true))
            .collect();
        if filtered.is_empty() {
            return Err(CoreError::EmptyWindow.into());
        }

        let cost_calculator = TransactionCostCalculator::new(self.config.cost);
        let slippage_calculator = SlippageCalculator::new(self.config.slippage);

        let mut position_manager = PositionManager::new(params.initial_capital);
        let mut equity_curve = vec![params.initial_capital];
        let mut returns = Vec::new();
        let mut trades = Vec::new();

        let closes: Vec<f64> = filtered.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = filtered.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = filtered.iter().map(|c| c.low).collect();
        let volumes: Vec<f64> = filtered.iter().map(|c| c.volume).collect();

        let mut entry_price: Option<f64> = None;

        for (i, candle) in filtered.iter().enumerate() {
            let local_ts = candle.start_ts.with_timezone(&chrono_tz::Asia::Kolkata);
            if !self.calendar.is_market_open(local_ts) {
                continue;
            }

            let has_position = !position_manager.positions.is_empty();
            let mut exited = false;

            if has_position {
                if let Some(entry) = entry_price {
                    let stop_price = entry * (1.0 - params.stop_loss_pct);
                    let take_price = entry * (1.0 + params.take_profit_pct);

                    if params.stop_loss_pct > 0.0 && candle.low <= stop_price {
                        self.close_all(&mut position_manager, symbol, stop_price, &cost_calculator, candle.start_ts, &mut trades, "stop_loss");
                        entry_price = None;
                        exited = true;
                    } else if params.take_profit_pct > 0.0 && candle.high >= take_price {
                        self.close_all(&mut position_manager, symbol, take_price, &cost_calculator, candle.start_ts, &mut trades, "take_profit");
                        entry_price = None;
                        exited = true;
                    }
                }
            }

            if !exited {
                let has_position = !position_manager.positions.is_empty();
                if has_position {
                    let window = MarketWindow {
                        close: &closes[..=i],
                        high: &highs[..=i],
                        low: &lows[..=i],
                        volume: &volumes[..=i],
                    };
                    if let Some(signal) = strategy.generate_signal(&window) {
                        if signal.action == Action::Sell {
                            self.close_all(
                                &mut position_manager,
                                symbol,
                                candle.close,
                                &cost_calculator,
                                candle.start_ts,
                                &mut trades,
                                "signal_sell",
                            );
                            entry_price = None;
                        }
                    }
                } else if position_manager.positions.len() < params.max_positions {
                    let window = MarketWindow {
                        close: &closes[..=i],
                        high: &highs[..=i],
                        low: &lows[..=i],
                        volume: &volumes[..=i],
                    };
                    if let Some(signal) = strategy.generate_signal(&window) {
                        if signal.action == Action::Buy {
                            let portfolio_value = position_manager.get_portfolio_value(&HashMap::from([(symbol.to_string(), candle.close)]));
                            let quantity = (portfolio_value * params.position_size_pct / candle.close).floor();
                            if quantity > 0.0 {
                                let recent_prices = &closes[..=i];
                                let slippage_pct = slippage_calculator.calculate_slippage(quantity, false, recent_prices, None, false, false);
                                let fill_price = slippage_calculator.apply_slippage(candle.close, slippage_pct, false);
                                let trade_value = fill_price * quantity;
                                let costs = cost_calculator.calculate_total_cost(trade_value, false).total_cost;

                                match position_manager.open_position(symbol, fill_price, quantity, costs, candle.start_ts) {
                                    Ok(()) => {
                                        entry_price = Some(fill_price);
                                        trades.push(TradeEvent {
                                            timestamp: candle.start_ts,
                                            action: "buy",
                                            price: fill_price,
                                            quantity,
                                        });
                                    }
                                    Err(err) => {
                                        warn!(symbol, error = %err, "insufficient cash for signal buy");
                                    }
                                }
                            }
                        }
                    }
                }
            }

            let portfolio_value = position_manager.get_portfolio_value(&HashMap::from([(symbol.to_string(), candle.close)]));
            equity_curve.push(portfolio_value);
            if equity_curve.len() >= 2 {
                let prev = equity_curve[equity_curve.len() - 2];
                if prev != 0.0 {
                    returns.push((portfolio_value - prev) / prev);
                }
            }
        }

        let days = (filtered.last().unwrap().start_ts - filtered.first().unwrap().start_ts).num_days();
        let metrics = calculate_metrics(&equity_curve, &returns, days, self.config.risk_free_rate);
        let statistics = position_manager.get_statistics();
        let last_close = filtered.last().unwrap().close;
        let total_pnl = position_manager.get_total_pnl(&HashMap::from([(symbol.to_string(), last_close)]));
        let open_position_quantity = position_manager.positions.iter().map(|p| p.quantity).sum();

        Ok(BacktestResult {
            metrics,
            statistics,
            total_pnl,
            trades,
            equity_curve,
            returns,
            closed_positions: position_manager.closed_trades,
            open_position_quantity,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn close_all(
        &self,
        position_manager: &mut PositionManager,
        symbol: &str,
        exit_price: f64,
        cost_calculator: &TransactionCostCalculator,
        exit_time: DateTime<Utc>,
        trades: &mut Vec<TradeEvent>,
        reason: &'static str,
    ) {
        let Some(position) = position_manager.positions.iter().find(|p| p.symbol == symbol) else {
            return;
        };
        let quantity = position.quantity;
        let trade_value = exit_price * quantity;
        let costs = cost_calculator.calculate_total_cost(trade_value, true).total_cost;
        if position_manager.close_position(symbol, exit_price, quantity, costs, exit_time).is_ok() {
            trades.push(TradeEvent {
                timestamp: exit_time,
                action: reason,
                price: exit_price,
                quantity,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::strategy::MultiIndicatorStrategy;
    use chrono::{Duration, TimeZone};

    fn candles(n: usize, start_price: f64) -> Vec<CandleRecord> {
        let start = chrono_tz::Asia::Kolkata
            .with_ymd_and_hms(2025, 11, 5, 9, 15, 0)
            .unwrap()
            .with_timezone(&Utc);
        (0..n)
            .map(|i| {
                let close = start_price - i as f64 * 1.5;
                CandleRecord {
                    start_ts: start + Duration::minutes(5 * i as i64),
                    open: close + 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 10_000.0,
                }
            })
            .collect()
    }

    #[test]
    fn empty_window_after_date_filter_errors() {
        let cfg = CoreConfig::new(std::env::temp_dir()).unwrap();
        let engine = BacktestEngine::new(&cfg);
        let data = candles(10, 200.0);
        let strategy = MultiIndicatorStrategy::default();
        let far_future = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let result = engine.run_backtest("RELIANCE.NS", &data, BacktestParams::default(), &strategy, Some(far_future), None);
        assert!(result.is_err());
    }

    #[test]
    fn backtest_produces_an_equity_curve_covering_every_open_candle() {
        let cfg = CoreConfig::new(std::env::temp_dir()).unwrap();
        let engine = BacktestEngine::new(&cfg);
        let data = candles(100, 200.0);
        let strategy = MultiIndicatorStrategy::default();
        let result = engine
            .run_backtest("RELIANCE.NS", &data, BacktestParams::default(), &strategy, None, None)
            .unwrap();
        assert!(result.equity_curve.len() > 1);
        assert_eq!(result.equity_curve.len(), result.returns.len() + 1);
    }

    #[test]
    fn stop_loss_closes_position_at_the_threshold_price() {
        let cfg = CoreConfig::new(std::env::temp_dir()).unwrap();
        let engine = BacktestEngine::new(&cfg);
        let data = candles(100, 200.0);
        let params = BacktestParams {
            stop_loss_pct: 0.01,
            ..BacktestParams::default()
        };
        let strategy = MultiIndicatorStrategy::default();
        let result = engine.run_backtest("RELIANCE.NS", &data, params, &strategy, None, None).unwrap();
        assert!(result.trades.iter().any(|t| t.action == "stop_loss") || result.closed_positions.is_empty());
    }
}
