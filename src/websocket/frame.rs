//! Inbound frame classification and outbound event encoding.
//!
//! The feed speaks engine.io/socket.io over WebSocket:
//! - text `"2"` / `"3"` are ping / pong, `"0{..}"` is the open packet,
//!   `"40"` acknowledges the namespace handshake, `"41"` drops it
//! - text `"42[name, payload]"` carries a JSON event
//! - binary frames are a `0x04` tag byte followed by UTF-8 JSON
//!
//! [`decode`] never fails: any error is logged and the frame is reported
//! as [`Frame::Ignored`] so one bad frame cannot end the stream.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use tungstenite::Message;

use crate::models::candle::CandleGenerated;
use crate::models::{Bar, FeedEvent, InstrumentSnapshot, Quote};
use crate::{CandlewickError, Result};

pub const PING: &str = "2";
pub const PONG: &str = "3";
/// Transport probe sent right after connecting.
pub const PROBE: &str = "2probe";
pub const PROBE_ACK: &str = "3probe";
pub const HANDSHAKE_ACK: &str = "40";
pub const NAMESPACE_DISCONNECT: &str = "41";
pub const EVENT_PREFIX: &str = "42";
pub const OPEN_PREFIX: char = '0';
/// Type tag of binary data frames.
pub const BINARY_TAG: u8 = 0x04;

/// Text event announcing a completed candle.
pub const CANDLE_GENERATED: &str = "candle-generated";

/// Classification of one inbound WebSocket message.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Server heartbeat; must be answered with [`PONG`].
    Ping,
    Pong,
    /// Engine.io open packet.
    Open,
    /// Namespace handshake acknowledged; subscriptions may be sent.
    HandshakeAck,
    /// Server dropped the namespace.
    Disconnect,
    /// WebSocket close frame.
    Close,
    /// Data for the subscribed symbol.
    Events(Vec<FeedEvent>),
    /// Anything else, including frames for other symbols and frames that
    /// failed to decode.
    Ignored,
}

impl Frame {
    /// The text to send back immediately, if the frame requires one.
    pub fn reply(&self) -> Option<&'static str> {
        match self {
            Frame::Ping => Some(PONG),
            _ => None,
        }
    }
}

/// Classifies a WebSocket message, keeping only events for `symbol`.
pub fn decode(message: &Message, symbol: &str) -> Frame {
    let result = match message {
        Message::Text(text) => decode_text(text.as_str(), symbol),
        Message::Binary(bytes) => decode_binary(bytes, symbol),
        Message::Close(frame) => {
            debug!(frame = ?frame, "Received close frame");
            Ok(Frame::Close)
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(Frame::Ignored),
    };

    result.unwrap_or_else(|e| {
        warn!(symbol, "Dropping frame: {e}");
        Frame::Ignored
    })
}

/// Classifies a text frame.
///
/// # Errors
///
/// Returns an error if an event frame carries malformed JSON or a payload
/// of the wrong shape.
pub fn decode_text(text: &str, symbol: &str) -> Result<Frame> {
    let text = text.trim();
    match text {
        PING => Ok(Frame::Ping),
        PONG | PROBE_ACK => Ok(Frame::Pong),
        NAMESPACE_DISCONNECT => Ok(Frame::Disconnect),
        _ if text.starts_with(HANDSHAKE_ACK) => Ok(Frame::HandshakeAck),
        _ if text.starts_with(EVENT_PREFIX) => decode_event(&text[EVENT_PREFIX.len()..], symbol),
        _ if text.starts_with(OPEN_PREFIX) => Ok(Frame::Open),
        _ => {
            debug!(len = text.len(), "Ignoring unrecognized text frame");
            Ok(Frame::Ignored)
        }
    }
}

/// Decodes the `[name, payload]` array of a text event.
fn decode_event(json: &str, symbol: &str) -> Result<Frame> {
    let Value::Array(items) = serde_json::from_str::<Value>(json)? else {
        return Err(CandlewickError::MalformedFrame(
            "event frame is not an array".to_string(),
        ));
    };

    let mut items = items.into_iter();
    let Some(Value::String(name)) = items.next() else {
        return Err(CandlewickError::MalformedFrame(
            "event frame has no name".to_string(),
        ));
    };
    let payload = items.next().unwrap_or(Value::Null);

    match name.as_str() {
        CANDLE_GENERATED => {
            let candle: CandleGenerated = serde_json::from_value(payload)?;
            if candle.symbol != symbol {
                debug!(symbol = %candle.symbol, "Ignoring candle for other symbol");
                return Ok(Frame::Ignored);
            }
            let bar = Bar::try_from(candle.msg.candle)?;
            Ok(Frame::Events(vec![FeedEvent::BarClosed(bar)]))
        }
        other => {
            debug!(event = other, "Ignoring unhandled event");
            Ok(Frame::Ignored)
        }
    }
}

/// Classifies a tagged binary frame.
///
/// # Errors
///
/// Returns an error for an empty frame, an unknown tag, invalid UTF-8,
/// malformed JSON or a payload of unrecognized shape.
pub fn decode_binary(bytes: &[u8], symbol: &str) -> Result<Frame> {
    let (&tag, body) = bytes.split_first().ok_or_else(|| {
        CandlewickError::MalformedFrame("empty binary frame".to_string())
    })?;
    if tag != BINARY_TAG {
        return Err(CandlewickError::MalformedFrame(format!(
            "unknown binary tag {tag:#04x}"
        )));
    }

    let text = std::str::from_utf8(body)
        .map_err(|e| CandlewickError::MalformedFrame(format!("binary frame: {e}")))?;
    let value: Value = serde_json::from_str(text)?;

    decode_binary_payload(value, symbol)
}

/// Dispatches on payload shape:
/// - `[symbol, price]` is a single quote
/// - an array of arrays holds per-tick rows `[symbol, time, price, volume?]`
///   and/or instrument rows `[asset_id, symbol, ...]`
fn decode_binary_payload(value: Value, symbol: &str) -> Result<Frame> {
    let Value::Array(items) = value else {
        return Err(CandlewickError::MalformedFrame(
            "binary payload is not an array".to_string(),
        ));
    };

    if items.len() == 2 && items[0].is_string() {
        if items[0].as_str() != Some(symbol) {
            return Ok(Frame::Ignored);
        }
        let price = items[1].as_f64().ok_or_else(|| {
            CandlewickError::MalformedFrame("quote price is not a number".to_string())
        })?;
        return Ok(Frame::Events(vec![FeedEvent::Quote(Quote {
            symbol: symbol.to_string(),
            price,
            timestamp: None,
            volume: None,
        })]));
    }

    if !items.iter().any(Value::is_array) {
        return Err(CandlewickError::MalformedFrame(
            "unrecognized binary payload shape".to_string(),
        ));
    }

    let mut events = Vec::new();
    for row in items.iter().filter_map(Value::as_array) {
        match decode_row(row, symbol) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(e) => warn!(symbol, "Dropping row: {e}"),
        }
    }

    if events.is_empty() {
        Ok(Frame::Ignored)
    } else {
        Ok(Frame::Events(events))
    }
}

/// Parses one nested row, returning `None` for other symbols.
fn decode_row(row: &[Value], symbol: &str) -> Result<Option<FeedEvent>> {
    if let Some(Value::String(row_symbol)) = row.first() {
        if row_symbol != symbol {
            return Ok(None);
        }
        return decode_tick(row).map(|quote| Some(FeedEvent::Quote(quote)));
    }

    if InstrumentSnapshot::row_symbol(row) != Some(symbol) {
        return Ok(None);
    }
    InstrumentSnapshot::from_row(row).map(|snapshot| Some(FeedEvent::Instrument(snapshot)))
}

/// Parses `[symbol, timestamp, price, volume?]`.
fn decode_tick(row: &[Value]) -> Result<Quote> {
    if !(3..=4).contains(&row.len()) {
        return Err(CandlewickError::MalformedFrame(format!(
            "tick row has {} fields",
            row.len()
        )));
    }

    let number = |idx: usize, field: &str| {
        row[idx].as_f64().ok_or_else(|| {
            CandlewickError::MalformedFrame(format!("tick {field} is not a number"))
        })
    };

    Ok(Quote {
        symbol: row[0].as_str().unwrap_or_default().to_string(),
        timestamp: Some(number(1, "timestamp")?),
        price: number(2, "price")?,
        volume: row.get(3).and_then(Value::as_f64),
    })
}

/// Encodes `"42" + [event, payload]`.
///
/// # Errors
///
/// Returns an error if `payload` cannot be serialized.
pub fn encode_event<T: Serialize + ?Sized>(event: &str, payload: &T) -> Result<String> {
    Ok(format!(
        "{EVENT_PREFIX}{}",
        serde_json::to_string(&(event, payload))?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SYMBOL: &str = "USDCHF_otc";

    fn binary(payload: &Value) -> Vec<u8> {
        let mut bytes = vec![BINARY_TAG];
        bytes.extend_from_slice(payload.to_string().as_bytes());
        bytes
    }

    fn candle_frame(symbol: &str) -> String {
        format!(
            r#"42["candle-generated",{{"symbol":"{symbol}","msg":{{"candle":{{"time":1700000000,"open":0.9,"max":0.92,"min":0.89,"close":0.91}}}}}}]"#
        )
    }

    #[test]
    fn ping_requires_pong_and_no_event() {
        let frame = decode_text("2", SYMBOL).unwrap();
        assert_eq!(frame, Frame::Ping);
        assert_eq!(frame.reply(), Some("3"));
    }

    #[test]
    fn control_frames() {
        assert_eq!(decode_text("3", SYMBOL).unwrap(), Frame::Pong);
        assert_eq!(decode_text("3probe", SYMBOL).unwrap(), Frame::Pong);
        assert_eq!(decode_text("40", SYMBOL).unwrap(), Frame::HandshakeAck);
        assert_eq!(
            decode_text(r#"40{"sid":"abc"}"#, SYMBOL).unwrap(),
            Frame::HandshakeAck
        );
        assert_eq!(decode_text("41", SYMBOL).unwrap(), Frame::Disconnect);
        assert_eq!(
            decode_text(r#"0{"sid":"x","pingInterval":25000}"#, SYMBOL).unwrap(),
            Frame::Open
        );
        assert_eq!(decode_text("hello", SYMBOL).unwrap(), Frame::Ignored);
        assert_eq!(Frame::HandshakeAck.reply(), None);
    }

    #[test]
    fn candle_for_subscribed_symbol_becomes_bar() {
        let frame = decode_text(&candle_frame(SYMBOL), SYMBOL).unwrap();
        let Frame::Events(events) = frame else {
            panic!("expected events");
        };
        let FeedEvent::BarClosed(bar) = &events[0] else {
            panic!("expected bar");
        };
        assert_eq!(bar.open_time, 1_700_000_000);
        assert_eq!(bar.close, 0.91);
    }

    #[test]
    fn candle_for_other_symbol_is_ignored() {
        let frame = decode_text(&candle_frame("EURUSD_otc"), SYMBOL).unwrap();
        assert_eq!(frame, Frame::Ignored);
    }

    #[test]
    fn malformed_event_json_is_contained() {
        assert!(decode_text(r#"42["candle-generated",{"#, SYMBOL).is_err());
        let message = Message::Text(r#"42["candle-generated",{"#.into());
        assert_eq!(decode(&message, SYMBOL), Frame::Ignored);
    }

    #[test]
    fn inconsistent_candle_is_dropped() {
        let text = format!(
            r#"42["candle-generated",{{"symbol":"{SYMBOL}","msg":{{"candle":{{"time":1,"open":1.0,"max":0.5,"min":0.4,"close":1.1}}}}}}]"#
        );
        let message = Message::Text(text.into());
        assert_eq!(decode(&message, SYMBOL), Frame::Ignored);
    }

    #[test]
    fn binary_price_pair() {
        let bytes = binary(&json!([SYMBOL, 0.91234]));
        let frame = decode_binary(&bytes, SYMBOL).unwrap();
        assert_eq!(
            frame,
            Frame::Events(vec![FeedEvent::Quote(Quote {
                symbol: SYMBOL.to_string(),
                price: 0.91234,
                timestamp: None,
                volume: None,
            })])
        );

        let other = binary(&json!(["EURUSD_otc", 1.08]));
        assert_eq!(decode_binary(&other, SYMBOL).unwrap(), Frame::Ignored);
    }

    #[test]
    fn binary_tick_rows_filtered_by_symbol() {
        let bytes = binary(&json!([
            [SYMBOL, 1700000000.5, 0.9121, 3],
            ["EURUSD_otc", 1700000000.6, 1.0812],
            [SYMBOL, 1700000001.0, 0.9122]
        ]));
        let Frame::Events(events) = decode_binary(&bytes, SYMBOL).unwrap() else {
            panic!("expected events");
        };
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            FeedEvent::Quote(Quote {
                symbol: SYMBOL.to_string(),
                price: 0.9121,
                timestamp: Some(1700000000.5),
                volume: Some(3.0),
            })
        );
    }

    #[test]
    fn binary_instrument_row_for_symbol() {
        let mut row = vec![Value::Null; InstrumentSnapshot::MIN_COLUMNS];
        row[0] = json!(66);
        row[1] = json!(SYMBOL);
        row[2] = json!("USD/CHF (OTC)");
        row[3] = json!("currency");
        row[13] = json!(1);
        let mut other = row.clone();
        other[1] = json!("EURUSD_otc");

        let bytes = binary(&json!([other, row]));
        let Frame::Events(events) = decode_binary(&bytes, SYMBOL).unwrap() else {
            panic!("expected events");
        };
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], FeedEvent::Instrument(s) if s.symbol == SYMBOL && s.active));
    }

    #[test]
    fn truncated_instrument_row_is_dropped() {
        let bytes = binary(&json!([[66, SYMBOL, "USD/CHF"]]));
        assert_eq!(decode_binary(&bytes, SYMBOL).unwrap(), Frame::Ignored);
    }

    #[test]
    fn binary_errors_are_reported() {
        assert!(decode_binary(&[], SYMBOL).is_err());
        assert!(decode_binary(b"\x05[1]", SYMBOL).is_err());
        assert!(decode_binary(&[BINARY_TAG, 0xff, 0xfe], SYMBOL).is_err());
        assert!(decode_binary(b"\x04{\"a\":1}", SYMBOL).is_err());
        assert!(decode_binary(b"\x04[1,2,3]", SYMBOL).is_err());

        let message = Message::Binary(b"\x04not json".to_vec().into());
        assert_eq!(decode(&message, SYMBOL), Frame::Ignored);
    }

    #[test]
    fn encodes_event_frames() {
        let frame = encode_event("subscribe", &json!({"name": "quotes/stream"})).unwrap();
        assert_eq!(frame, r#"42["subscribe",{"name":"quotes/stream"}]"#);
    }
}
