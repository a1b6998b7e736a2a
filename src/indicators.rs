//! Technical indicators over an ordered series of closing prices.
//!
//! All functions are pure and take closes most-recent-last. Insufficient
//! history yields `None` rather than an error.

use serde::{Deserialize, Serialize};

/// Indicator periods and the lookback they are recomputed over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_window: usize,
    pub bollinger_deviations: f64,
    /// Bars the window must hold before any snapshot is computed.
    pub min_bars: usize,
    /// Number of most recent closes fed to the indicators. `None` uses
    /// [`IndicatorParams::required_history`].
    pub lookback: Option<usize>,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_window: 20,
            bollinger_deviations: 2.0,
            min_bars: 14,
            lookback: None,
        }
    }
}

impl IndicatorParams {
    /// Fewest closes for which every indicator is defined.
    pub fn required_history(&self) -> usize {
        let macd = (self.macd_slow + self.macd_signal).saturating_sub(1);
        (self.rsi_period + 1).max(macd).max(self.bollinger_window)
    }

    pub fn effective_lookback(&self) -> usize {
        self.lookback.unwrap_or_else(|| self.required_history())
    }
}

/// MACD line and its signal line at the most recent aligned point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Macd {
    pub value: Option<f64>,
    pub signal: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Indicator values derived from the current window. Replaced wholesale
/// on every bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    pub macd: Macd,
    pub bollinger: Option<BollingerBands>,
}

/// A snapshot with every field present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompleteIndicators {
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub bollinger: BollingerBands,
}

impl IndicatorSnapshot {
    /// Computes all indicators over `closes`.
    pub fn compute(closes: &[f64], params: &IndicatorParams) -> Self {
        Self {
            rsi: rsi(closes, params.rsi_period),
            macd: macd(
                closes,
                params.macd_fast,
                params.macd_slow,
                params.macd_signal,
            ),
            bollinger: bollinger(
                closes,
                params.bollinger_window,
                params.bollinger_deviations,
            ),
        }
    }

    /// Returns the values if every indicator is present.
    pub fn complete(&self) -> Option<CompleteIndicators> {
        Some(CompleteIndicators {
            rsi: self.rsi?,
            macd: self.macd.value?,
            macd_signal: self.macd.signal?,
            bollinger: self.bollinger?,
        })
    }
}

/// Relative Strength Index with Wilder smoothing.
///
/// Averages are seeded from the first `period` deltas and smoothed over the
/// rest. Needs at least `period + 1` prices. A zero average loss yields 100.
pub fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let (seed, rest) = deltas.split_at(period);
    let p = period as f64;

    let mut avg_gain = seed.iter().filter(|d| **d > 0.0).sum::<f64>() / p;
    let mut avg_loss = seed.iter().filter(|d| **d < 0.0).map(|d| -d).sum::<f64>() / p;

    for &delta in rest {
        let (gain, loss) = if delta > 0.0 {
            (delta, 0.0)
        } else {
            (0.0, -delta)
        };
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Simple moving averages over every full window of `period` values.
fn sma_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    values
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

/// MACD from simple moving averages: `fast SMA - slow SMA`, with the
/// signal line as the `signal`-period SMA of that difference.
///
/// The value needs `slow` prices; the signal needs `slow + signal - 1`.
pub fn macd(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast_sma = sma_series(prices, fast);
    let slow_sma = sma_series(prices, slow);
    if slow_sma.is_empty() || fast_sma.len() < slow_sma.len() {
        return Macd::default();
    }

    // Align both series on their most recent point.
    let offset = fast_sma.len() - slow_sma.len();
    let history: Vec<f64> = fast_sma[offset..]
        .iter()
        .zip(&slow_sma)
        .map(|(f, s)| f - s)
        .collect();

    Macd {
        value: history.last().copied(),
        signal: sma_series(&history, signal).last().copied(),
    }
}

/// Bollinger bands over the last `window` prices (or all, if fewer),
/// using the population standard deviation.
pub fn bollinger(prices: &[f64], window: usize, deviations: f64) -> Option<BollingerBands> {
    if prices.is_empty() || window == 0 {
        return None;
    }

    let tail = &prices[prices.len().saturating_sub(window)..];
    let n = tail.len() as f64;
    let mean = tail.iter().sum::<f64>() / n;
    let variance = tail.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    Some(BollingerBands {
        upper: mean + deviations * std_dev,
        middle: mean,
        lower: mean - deviations * std_dev,
    })
}
