//! Performance metrics (§4.16), ported from the source's
//! `PerformanceMetrics`.

#[derive(Debug, Clone, Default)]
pub struct PerformanceSummary {
    pub total_return_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown_pct: f64,
    pub cagr_pct: f64,
    pub volatility_pct: f64,
}

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Annualized Sharpe ratio over daily `returns` (fractions, not percent).
/// Zero when fewer than two returns are supplied or the sample has no
/// variance. Uses population variance (divides by N, not N-1) to match the
/// source's `np.std` default, unlike `calculate_volatility_pct`'s sample
/// variance.
pub fn calculate_sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean_excess = excess.iter().sum::<f64>() / excess.len() as f64;
    let variance = excess.iter().map(|r| (r - mean_excess).powi(2)).sum::<f64>() / excess.len() as f64;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        return 0.0;
    }
    mean_excess / std_dev * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Sortino ratio. Matches the source's choice to divide the downside
/// variance by the TOTAL number of returns, not just the downside count.
pub fn calculate_sortino_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean_excess = excess.iter().sum::<f64>() / excess.len() as f64;
    let downside_sq_sum: f64 = excess.iter().filter(|r| **r < 0.0).map(|r| r.powi(2)).sum();

    if downside_sq_sum == 0.0 {
        return if excess.iter().sum::<f64>() > 0.0 { f64::INFINITY } else { 0.0 };
    }

    let downside_variance = downside_sq_sum / excess.len() as f64;
    let downside_dev = downside_variance.sqrt();
    if downside_dev == 0.0 {
        return 0.0;
    }
    mean_excess / downside_dev * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Maximum drawdown over an equity curve, as a percentage. `trough` is the
/// equity value observed AT the point of maximum drawdown (not the curve's
/// global minimum), matching the source.
pub fn calculate_max_drawdown(equity_curve: &[f64]) -> (f64, f64, f64) {
    if equity_curve.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let mut peak = equity_curve[0];
    let mut max_drawdown_pct = 0.0;
    let mut peak_at_max = equity_curve[0];
    let mut trough_at_max = equity_curve[0];

    for &value in equity_curve {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let drawdown_pct = (peak - value) / peak * 100.0;
            if drawdown_pct > max_drawdown_pct {
                max_drawdown_pct = drawdown_pct;
                peak_at_max = peak;
                trough_at_max = value;
            }
        }
    }

    (max_drawdown_pct, peak_at_max, trough_at_max)
}

/// Compound annual growth rate as a percentage, 0 when the window is
/// degenerate (non-positive initial value, non-positive elapsed days).
pub fn calculate_cagr(initial_value: f64, final_value: f64, days: i64) -> f64 {
    if initial_value <= 0.0 || days <= 0 {
        return 0.0;
    }
    let years = days as f64 / 365.25;
    if years <= 0.0 {
        return 0.0;
    }
    ((final_value / initial_value).powf(1.0 / years) - 1.0) * 100.0
}

pub fn calculate_volatility_pct(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt() * 100.0
}

pub fn calculate_metrics(
    equity_curve: &[f64],
    daily_returns: &[f64],
    days: i64,
    risk_free_rate: f64,
) -> PerformanceSummary {
    if equity_curve.is_empty() {
        return PerformanceSummary::default();
    }
    let initial_value = equity_curve[0];
    let final_value = *equity_curve.last().unwrap();
    let total_return_pct = if initial_value != 0.0 {
        (final_value - initial_value) / initial_value * 100.0
    } else {
        0.0
    };
    let (max_drawdown_pct, _, _) = calculate_max_drawdown(equity_curve);

    PerformanceSummary {
        total_return_pct: round2(total_return_pct),
        sharpe_ratio: round4(calculate_sharpe_ratio(daily_returns, risk_free_rate)),
        sortino_ratio: round4(calculate_sortino_ratio(daily_returns, risk_free_rate)),
        max_drawdown_pct: round2(max_drawdown_pct),
        cagr_pct: round2(calculate_cagr(initial_value, final_value, days)),
        volatility_pct: round2(calculate_volatility_pct(daily_returns)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sharpe_is_zero_with_fewer_than_two_returns() {
        assert_eq!(calculate_sharpe_ratio(&[0.01], 0.06), 0.0);
    }

    #[test]
    fn sharpe_is_positive_for_consistently_positive_returns() {
        let returns = vec![0.01; 30];
        assert!(calculate_sharpe_ratio(&returns, 0.06) > 0.0);
    }

    #[test]
    fn sortino_divides_by_total_count_not_downside_count() {
        let returns = vec![0.01, 0.01, 0.01, -0.02];
        let sortino = calculate_sortino_ratio(&returns, 0.0);
        let mean_excess = returns.iter().sum::<f64>() / returns.len() as f64;
        let downside_dev = ((0.02f64).powi(2) / returns.len() as f64).sqrt();
        let expected = mean_excess / downside_dev * TRADING_DAYS_PER_YEAR.sqrt();
        assert!((sortino - expected).abs() < 1e-9);
    }

    #[test]
    fn sortino_is_infinite_with_no_downside_and_positive_sum() {
        let returns = vec![0.01, 0.02, 0.015];
        assert_eq!(calculate_sortino_ratio(&returns, 0.0), f64::INFINITY);
    }

    #[test]
    fn max_drawdown_reports_trough_at_the_worst_point() {
        let curve = vec![100.0, 120.0, 90.0, 110.0, 80.0, 150.0];
        let (pct, peak, trough) = calculate_max_drawdown(&curve);
        assert!(pct > 0.0);
        assert_eq!(peak, 120.0);
        assert_eq!(trough, 80.0);
    }

    #[test]
    fn cagr_is_zero_for_degenerate_windows() {
        assert_eq!(calculate_cagr(0.0, 100.0, 365), 0.0);
        assert_eq!(calculate_cagr(100.0, 110.0, 0), 0.0);
    }

    #[test]
    fn cagr_matches_analytic_formula_for_one_year() {
        let cagr = calculate_cagr(100.0, 121.0, 365);
        assert!((cagr - 21.0).abs() < 1.0);
    }
}
