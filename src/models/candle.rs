//! Candlestick models: the validated [`Bar`] and the `candle-generated`
//! wire payload it is built from.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{CandlewickError, Result};

/// A completed OHLCV bar.
///
/// Construct with [`Bar::new`], which rejects non-finite values and
/// inconsistent high/low ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    /// Start of the bar's interval, in seconds.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Builds a bar after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`CandlewickError::InvalidBar`] if any price is not finite,
    /// if `high < max(open, close)`, or if `low > min(open, close)`.
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self> {
        if ![open, high, low, close, volume].iter().all(|v| v.is_finite()) {
            return Err(CandlewickError::InvalidBar(format!(
                "non-finite value in bar at {open_time}"
            )));
        }
        if high < open.max(close) {
            return Err(CandlewickError::InvalidBar(format!(
                "high {high} below body at {open_time}"
            )));
        }
        if low > open.min(close) {
            return Err(CandlewickError::InvalidBar(format!(
                "low {low} above body at {open_time}"
            )));
        }

        Ok(Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// `true` when the bar closed strictly above its open.
    ///
    /// A bar with `close == open` is not bullish.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Payload of a `candle-generated` text event.
#[derive(Debug, Clone, Deserialize)]
pub struct CandleGenerated {
    pub symbol: String,
    pub msg: CandleMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandleMessage {
    pub candle: WireCandle,
}

/// Candle fields as sent by the feed. Prices may be numbers or numeric
/// strings; the feed names high/low `max`/`min`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireCandle {
    #[serde(deserialize_with = "lenient_f64")]
    pub time: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub open: f64,
    #[serde(rename = "max", deserialize_with = "lenient_f64")]
    pub high: f64,
    #[serde(rename = "min", deserialize_with = "lenient_f64")]
    pub low: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub close: f64,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub volume: Option<f64>,
}

impl TryFrom<WireCandle> for Bar {
    type Error = CandlewickError;

    fn try_from(wire: WireCandle) -> Result<Self> {
        if !wire.time.is_finite() {
            return Err(CandlewickError::InvalidBar(
                "non-finite candle time".to_string(),
            ));
        }
        Bar::new(
            wire.time as i64,
            wire.open,
            wire.high,
            wire.low,
            wire.close,
            wire.volume.unwrap_or(0.0),
        )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    fn into_f64<E: serde::de::Error>(self) -> std::result::Result<f64, E> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::Text(s) => s.trim().parse().map_err(E::custom),
        }
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberOrString::deserialize(deserializer)?.into_f64()
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumberOrString>::deserialize(deserializer)?
        .map(NumberOrString::into_f64)
        .transpose()
}
