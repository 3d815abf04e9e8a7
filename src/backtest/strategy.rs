//! Pluggable signal strategies. The default `MultiIndicatorStrategy`
//! reproduces the source's weighted-vote logic exactly (§4.17).

use rust_ti::standard_indicators::bulk as sti;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Buy,
    Sell,
}

#[derive(Debug, Clone)]
pub struct Signal {
    pub action: Action,
    pub confidence: f64,
    pub votes: f64,
    pub reasons: Vec<String>,
}

/// A window of candles up to and including the current one, oldest first.
pub struct MarketWindow<'a> {
    pub close: &'a [f64],
    pub high: &'a [f64],
    pub low: &'a [f64],
    pub volume: &'a [f64],
}

pub trait SignalStrategy {
    fn generate_signal(&self, window: &MarketWindow) -> Option<Signal>;
}

fn rsi_last(close: &[f64]) -> Option<f64> {
    if close.len() < 14 {
        return None;
    }
    sti::rsi(close).last().copied()
}

fn macd_last(close: &[f64]) -> Option<(f64, f64, f64)> {
    if close.len() < 34 {
        return None;
    }
    sti::macd(close).last().copied()
}

fn bollinger_last(close: &[f64], period: usize) -> Option<(f64, f64, f64)> {
    if close.len() < period {
        return None;
    }
    rust_ti::candle_indicators::bulk::moving_constant_bands(
        close,
        rust_ti::ConstantModelType::SimpleMovingAverage,
        rust_ti::DeviationModel::StandardDeviation,
        2.0,
        period,
    )
    .last()
    .copied()
}

fn mfi_last(high: &[f64], low: &[f64], close: &[f64], volume: &[f64], period: usize) -> Option<f64> {
    if close.len() < period {
        return None;
    }
    let typical: Vec<f64> = high
        .iter()
        .zip(low)
        .zip(close)
        .map(|((h, l), c)| (h + l + c) / 3.0)
        .collect();
    rust_ti::momentum_indicators::bulk::money_flow_index(&typical, volume, period)
        .last()
        .copied()
}

fn sma(close: &[f64], period: usize) -> Option<f64> {
    if close.len() < period {
        return None;
    }
    let window = &close[close.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Wilder's Average Directional Index. No `rust_ti` usage of ADX appears in
/// the retrieved corpus, so this is a from-scratch implementation of the
/// standard formula rather than a guessed crate call (see DESIGN.md).
fn adx_last(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Option<f64> {
    let n = close.len();
    if n < period * 2 + 1 {
        return None;
    }

    let mut tr = Vec::with_capacity(n - 1);
    let mut plus_dm = Vec::with_capacity(n - 1);
    let mut minus_dm = Vec::with_capacity(n - 1);
    for i in 1..n {
        let up_move = high[i] - high[i - 1];
        let down_move = low[i - 1] - low[i];
        plus_dm.push(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
        minus_dm.push(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });
        tr.push(
            (high[i] - low[i])
                .max((high[i] - close[i - 1]).abs())
                .max((low[i] - close[i - 1]).abs()),
        );
    }

    let wilder_smooth = |values: &[f64]| -> Vec<f64> {
        let mut smoothed = Vec::with_capacity(values.len());
        let mut running: f64 = values[..period].iter().sum();
        smoothed.push(running);
        for &v in &values[period..] {
            running = running - running / period as f64 + v;
            smoothed.push(running);
        }
        smoothed
    };

    let tr_smooth = wilder_smooth(&tr);
    let plus_dm_smooth = wilder_smooth(&plus_dm);
    let minus_dm_smooth = wilder_smooth(&minus_dm);

    let dx: Vec<f64> = tr_smooth
        .iter()
        .zip(&plus_dm_smooth)
        .zip(&minus_dm_smooth)
        .map(|((&atr, &pdm), &mdm)| {
            if atr == 0.0 {
                return 0.0;
            }
            let plus_di = 100.0 * pdm / atr;
            let minus_di = 100.0 * mdm / atr;
            let denom = plus_di + minus_di;
            if denom == 0.0 {
                0.0
            } else {
                100.0 * (plus_di - minus_di).abs() / denom
            }
        })
        .collect();

    if dx.len() < period {
        return dx.last().copied();
    }
    Some(dx[dx.len() - period..].iter().sum::<f64>() / period as f64)
}

/// The default strategy (§4.17): accumulates weighted votes from RSI, MACD,
/// Bollinger Bands, ADX (trend-strength confirmation, counted on both
/// sides), MFI, and an SMA20/SMA50 cross; requires >= 3 accumulated votes
/// on one side.
pub struct MultiIndicatorStrategy {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub adx_threshold: f64,
    pub mfi_oversold: f64,
    pub mfi_overbought: f64,
}

impl Default for MultiIndicatorStrategy {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            adx_threshold: 25.0,
            mfi_oversold: 20.0,
            mfi_overbought: 80.0,
        }
    }
}

impl SignalStrategy for MultiIndicatorStrategy {
    fn generate_signal(&self, window: &MarketWindow) -> Option<Signal> {
        let rsi = rsi_last(window.close)?;
        let (macd, macd_signal, macd_hist) = macd_last(window.close)?;
        let (bb_lower, _bb_middle, bb_upper) = bollinger_last(window.close, 20)?;
        let adx = adx_last(window.high, window.low, window.close, 14)?;
        let mfi = mfi_last(window.high, window.low, window.close, window.volume, 14)?;
        let price = *window.close.last()?;
        let sma_20 = sma(window.close, 20);
        let sma_50 = sma(window.close, 50);

        let mut buy_votes: f64 = 0.0;
        let mut sell_votes: f64 = 0.0;
        let mut reasons = Vec::new();

        if rsi < self.rsi_oversold {
            buy_votes += 1.0;
            reasons.push(format!("RSI oversold ({rsi:.1})"));
        } else if rsi > self.rsi_overbought {
            sell_votes += 1.0;
            reasons.push(format!("RSI overbought ({rsi:.1})"));
        }

        if macd_hist > 0.0 && macd > macd_signal {
            buy_votes += 1.0;
            reasons.push("MACD bullish".to_string());
        } else if macd_hist < 0.0 && macd < macd_signal {
            sell_votes += 1.0;
            reasons.push("MACD bearish".to_string());
        }

        if price < bb_lower {
            buy_votes += 1.0;
            reasons.push("Price below BB lower".to_string());
        } else if price > bb_upper {
            sell_votes += 1.0;
            reasons.push("Price above BB upper".to_string());
        }

        if adx > self.adx_threshold {
            buy_votes += 0.5;
            sell_votes += 0.5;
            reasons.push(format!("Strong trend (ADX: {adx:.1})"));
        }

        if mfi < self.mfi_oversold {
            buy_votes += 1.0;
            reasons.push(format!("MFI oversold ({mfi:.1})"));
        } else if mfi > self.mfi_overbought {
            sell_votes += 1.0;
            reasons.push(format!("MFI overbought ({mfi:.1})"));
        }

        if let (Some(s20), Some(s50)) = (sma_20, sma_50) {
            if s20 > s50 {
                buy_votes += 0.5;
                reasons.push("Golden cross (SMA20 > SMA50)".to_string());
            } else if s20 < s50 {
                sell_votes += 0.5;
                reasons.push("Death cross (SMA20 < SMA50)".to_string());
            }
        }

        if buy_votes >= 3.0 {
            Some(Signal {
                action: Action::Buy,
                confidence: (buy_votes / 5.0).min(1.0),
                votes: buy_votes,
                reasons,
            })
        } else if sell_votes >= 3.0 {
            Some(Signal {
                action: Action::Sell,
                confidence: (sell_votes / 5.0).min(1.0),
                votes: sell_votes,
                reasons,
            })
        } else {
            None
        }
    }
}
