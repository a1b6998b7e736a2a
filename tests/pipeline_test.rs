//! Frames in, sink events out: decoder and session wired together.

mod common;

use candlewick::config::StreamConfig;
use candlewick::models::Direction;
use candlewick::session::TradingSession;
use candlewick::signal::{Confidence, Reason};
use candlewick::sink::SinkEvent;
use candlewick::websocket::frame::{Frame, decode};
use tungstenite::Message;

use common::{SYMBOL, binary_frame, candle_frame, fixtures_dir};

/// Decodes each message and applies its events, collecting sink output.
fn feed(session: &mut TradingSession, messages: &[Message]) -> Vec<SinkEvent> {
    let mut out = Vec::new();
    for message in messages {
        if let Frame::Events(events) = decode(message, SYMBOL) {
            for event in events {
                out.extend(session.apply(event));
            }
        }
    }
    out
}

fn candles(closes: impl Iterator<Item = (f64, f64)>) -> Vec<Message> {
    closes
        .enumerate()
        .map(|(i, (open, close))| {
            Message::Text(candle_frame(SYMBOL, 60 * (i as i64 + 1), open, close).into())
        })
        .collect()
}

fn signals(events: &[SinkEvent]) -> Vec<&candlewick::signal::Signal> {
    events
        .iter()
        .filter_map(|e| match e {
            SinkEvent::Signal(signal) => Some(signal),
            _ => None,
        })
        .collect()
}

#[test]
fn falling_market_yields_oversold_call() {
    let mut session = TradingSession::new(SYMBOL, &StreamConfig::default());
    let messages = candles((0..34).map(|i| {
        let open = 1.0 - f64::from(i) * 0.01;
        (open, open - 0.008)
    }));

    let events = feed(&mut session, &messages);
    let signals = signals(&events);

    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].direction, Direction::Call);
    assert_eq!(signals[0].reason, Reason::OversoldReversal);
    assert_eq!(signals[0].confidence, Confidence::High);
    assert_eq!(signals[0].timestamp, 60 * 34);
    assert_eq!(session.bars().len(), 34);
}

#[test]
fn rising_market_yields_overbought_put() {
    let mut session = TradingSession::new(SYMBOL, &StreamConfig::default());
    let messages = candles((0..36).map(|i| {
        let open = 1.0 + f64::from(i) * 0.01;
        (open, open + 0.008)
    }));

    let events = feed(&mut session, &messages);
    let signals = signals(&events);

    // one signal per bar once the full history is available
    assert_eq!(signals.len(), 3);
    assert!(signals.iter().all(|s| s.direction == Direction::Put
        && s.reason == Reason::OverboughtReversal));
    assert_eq!(session.signals().len(), 3);
}

#[test]
fn indicators_start_after_min_bars() {
    let mut session = TradingSession::new(SYMBOL, &StreamConfig::default());
    let messages = candles((0..14).map(|i| (1.0, 1.0 + f64::from(i % 3) * 0.001)));

    let events = feed(&mut session, &messages);
    let snapshots: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SinkEvent::Indicators(snapshot) => Some(snapshot),
            _ => None,
        })
        .collect();

    assert_eq!(snapshots.len(), 1);
    let bands = snapshots[0].bollinger.unwrap();
    assert!(bands.lower <= bands.middle && bands.middle <= bands.upper);
}

#[test]
fn signal_uses_last_tick_price() {
    let mut session = TradingSession::new(SYMBOL, &StreamConfig::default());
    let mut messages = candles((0..33).map(|i| {
        let open = 1.0 - f64::from(i) * 0.01;
        (open, open - 0.008)
    }));
    messages.push(Message::Binary(
        binary_frame(r#"[["USDCHF_otc",1700000000.5,0.655,3]]"#).into(),
    ));
    messages.push(Message::Text(candle_frame(SYMBOL, 60 * 34, 0.67, 0.662).into()));

    let events = feed(&mut session, &messages);
    let signals = signals(&events);

    assert_eq!(signals.len(), 1);
    assert!((signals[0].price - 0.655).abs() < 1e-12);
    assert_eq!(session.last_price(), Some(0.655));
}

#[test]
fn replayed_bars_are_dropped() {
    let mut session = TradingSession::new(SYMBOL, &StreamConfig::default());
    let first = candles((0..3).map(|_| (1.0, 1.01)));
    feed(&mut session, &first);

    // a reconnect replays the last bar
    let replay = Message::Text(candle_frame(SYMBOL, 180, 1.0, 1.01).into());
    let events = feed(&mut session, &[replay]);

    assert!(events.is_empty());
    assert_eq!(session.bars().len(), 3);
}

#[test]
fn window_keeps_configured_capacity() {
    let config = StreamConfig::load(&fixtures_dir().join("stream_config.json")).unwrap();
    let mut session = TradingSession::new(SYMBOL, &config);
    let messages = candles((0..80).map(|i| (1.0, 1.0 + f64::from(i % 2) * 0.01)));

    feed(&mut session, &messages);

    assert_eq!(session.bars().len(), 50);
    assert_eq!(session.bars().latest().unwrap().open_time, 60 * 80);
}

#[test]
fn instrument_row_reaches_sink() {
    let mut session = TradingSession::new(SYMBOL, &StreamConfig::default());
    let message = Message::Binary(binary_frame(include_str!("fixtures/instruments.json")).into());

    let events = feed(&mut session, &[message]);

    assert!(matches!(
        &events[..],
        [SinkEvent::Instrument(snapshot)] if snapshot.symbol == SYMBOL
    ));
}
