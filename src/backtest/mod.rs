//! Transaction-cost, slippage, order, position, metrics, signal, and
//! event-loop components of the backtest engine (§4.12-4.17).

pub mod cost;
pub mod engine;
pub mod metrics;
pub mod order;
pub mod position;
pub mod slippage;
pub mod strategy;

pub use cost::{CostBreakdown, TransactionCostCalculator};
pub use engine::{BacktestEngine, BacktestParams, BacktestResult, TradeEvent};
pub use metrics::{calculate_cagr, calculate_max_drawdown, calculate_metrics, calculate_sharpe_ratio, calculate_sortino_ratio, PerformanceSummary};
pub use order::{FilledOrder, LimitCheckOutcome, OrderSimulator, OrderStatus, PendingOrder};
pub use position::{ClosedTrade, Position, PositionManager, PositionStatistics};
pub use slippage::SlippageCalculator;
pub use strategy::{Action, MarketWindow, MultiIndicatorStrategy, Signal, SignalStrategy};
