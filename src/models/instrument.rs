//! Instrument state rows carried in binary frames.
//!
//! Each row is a positional JSON array. The row is validated up front and
//! turned into an [`InstrumentSnapshot`]; rows that do not have the expected
//! shape are reported as [`CandlewickError::MalformedFrame`].

use serde::Serialize;
use serde_json::Value;

use super::Direction;
use crate::{CandlewickError, Result};

const COL_ASSET_ID: usize = 0;
const COL_SYMBOL: usize = 1;
const COL_NAME: usize = 2;
const COL_KIND: usize = 3;
const COL_OPTION_SIDES: usize = 10;
const COL_OPTIONS: usize = 11;
const COL_ACTIVE: usize = 13;
const COL_TREND: usize = 19;
const COL_VOLATILITY: usize = 20;

/// Volatility readings above this are flagged as high.
pub const HIGH_VOLATILITY: f64 = 50.0;

/// Parsed instrument state for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentSnapshot {
    pub asset_id: Option<i64>,
    pub symbol: String,
    pub name: String,
    /// Instrument class reported by the feed (e.g. `"currency"`).
    pub kind: String,
    pub active: bool,
    /// Priced option expiries (non-positive prices dropped).
    pub options: Vec<OptionQuote>,
    /// Signed trend reading; non-negative means bullish.
    pub trend: Option<f64>,
    pub volatility: Option<f64>,
}

/// A priced option expiry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionQuote {
    pub expiry_secs: i64,
    pub price: f64,
    pub direction: Direction,
}

impl InstrumentSnapshot {
    /// Minimum number of columns in a complete row.
    pub const MIN_COLUMNS: usize = 22;

    /// Symbol column of a row, if present and a string.
    pub fn row_symbol(row: &[Value]) -> Option<&str> {
        row.get(COL_SYMBOL).and_then(Value::as_str)
    }

    /// Parses a positional instrument row.
    ///
    /// # Errors
    ///
    /// Returns [`CandlewickError::MalformedFrame`] if the row is too short
    /// or the symbol column is not a string.
    pub fn from_row(row: &[Value]) -> Result<Self> {
        if row.len() < Self::MIN_COLUMNS {
            return Err(CandlewickError::MalformedFrame(format!(
                "instrument row has {} columns, expected at least {}",
                row.len(),
                Self::MIN_COLUMNS
            )));
        }

        let symbol = Self::row_symbol(row)
            .ok_or_else(|| {
                CandlewickError::MalformedFrame("instrument symbol is not a string".to_string())
            })?
            .to_string();

        let text = |col: usize| {
            row[col]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| row[col].to_string())
        };

        Ok(Self {
            asset_id: row[COL_ASSET_ID].as_i64(),
            symbol,
            name: text(COL_NAME),
            kind: text(COL_KIND),
            active: is_truthy(&row[COL_ACTIVE]),
            options: parse_options(&row[COL_OPTION_SIDES], &row[COL_OPTIONS]),
            trend: row[COL_TREND].as_f64(),
            volatility: row[COL_VOLATILITY].as_f64(),
        })
    }

    /// `true` when the trend reading is present and non-negative.
    pub fn is_bullish(&self) -> Option<bool> {
        self.trend.map(|t| t >= 0.0)
    }

    pub fn is_high_volatility(&self) -> Option<bool> {
        self.volatility.map(|v| v > HIGH_VOLATILITY)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    }
}

/// Joins priced expiries with the `[expiry, "call"]` side list.
fn parse_options(sides: &Value, options: &Value) -> Vec<OptionQuote> {
    let Some(options) = options.as_array() else {
        return Vec::new();
    };

    let call_expiries: Vec<i64> = sides
        .as_array()
        .map(|sides| {
            sides
                .iter()
                .filter_map(Value::as_array)
                .filter(|pair| pair.get(1).and_then(Value::as_str) == Some(Direction::Call.as_str()))
                .filter_map(|pair| pair.first().and_then(Value::as_i64))
                .collect()
        })
        .unwrap_or_default();

    options
        .iter()
        .filter_map(|option| {
            let expiry_secs = option.get("time")?.as_i64()?;
            let price = option.get("price")?.as_f64()?;
            if price <= 0.0 {
                return None;
            }
            let direction = if call_expiries.contains(&expiry_secs) {
                Direction::Call
            } else {
                Direction::Put
            };
            Some(OptionQuote {
                expiry_secs,
                price,
                direction,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> Vec<Value> {
        let mut row = vec![Value::Null; InstrumentSnapshot::MIN_COLUMNS];
        row[0] = json!(66);
        row[1] = json!("USDCHF_otc");
        row[2] = json!("USD/CHF (OTC)");
        row[3] = json!("currency");
        row[10] = json!([[60, "call"], [120, "put"]]);
        row[11] = json!([
            {"time": 60, "price": 0.82},
            {"time": 120, "price": 0.79},
            {"time": 300, "price": 0.0}
        ]);
        row[13] = json!(true);
        row[19] = json!(-0.4);
        row[20] = json!(61.5);
        row
    }

    #[test]
    fn parses_complete_row() {
        let snapshot = InstrumentSnapshot::from_row(&row()).unwrap();

        assert_eq!(snapshot.asset_id, Some(66));
        assert_eq!(snapshot.symbol, "USDCHF_otc");
        assert_eq!(snapshot.name, "USD/CHF (OTC)");
        assert_eq!(snapshot.kind, "currency");
        assert!(snapshot.active);
        assert_eq!(snapshot.is_bullish(), Some(false));
        assert_eq!(snapshot.is_high_volatility(), Some(true));
        assert_eq!(
            snapshot.options,
            vec![
                OptionQuote {
                    expiry_secs: 60,
                    price: 0.82,
                    direction: Direction::Call
                },
                OptionQuote {
                    expiry_secs: 120,
                    price: 0.79,
                    direction: Direction::Put
                },
            ]
        );
    }

    #[test]
    fn short_row_is_malformed() {
        let short = row()[..10].to_vec();
        let err = InstrumentSnapshot::from_row(&short).unwrap_err();
        assert!(matches!(err, CandlewickError::MalformedFrame(_)));
    }

    #[test]
    fn non_string_symbol_is_malformed() {
        let mut bad = row();
        bad[1] = json!(42);
        assert!(InstrumentSnapshot::from_row(&bad).is_err());
    }

    #[test]
    fn missing_options_yield_empty_list() {
        let mut sparse = row();
        sparse[11] = json!("n/a");
        sparse[13] = json!(0);
        let snapshot = InstrumentSnapshot::from_row(&sparse).unwrap();
        assert!(snapshot.options.is_empty());
        assert!(!snapshot.active);
    }
}
