//! Application configuration loaded from environment variables.
//!
//! The session bootstrap tuple is produced out of band (a logged-in browser
//! session) and handed over through the environment:
//! - `FEED_WEBSOCKET_URL`: live socket endpoint (**required**)
//! - `FEED_COOKIE`: session cookie header
//! - `FEED_USER_AGENT`: user agent of the bootstrapping browser
//! - `FEED_ORIGIN`: origin header, defaults to the trading site
//! - `FEED_SYMBOL`: instrument to follow, defaults to `USDCHF_otc`
//! - `FEED_INSTRUMENT_TYPE`: routing instrument type, defaults to `OTC`
//!
//! Stream tuning is optional and read from the JSON file named by
//! `FEED_CONFIG`. Missing keys fall back to [`StreamConfig::default`].

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::indicators::IndicatorParams;
use crate::window::DEFAULT_BAR_CAPACITY;

const DEFAULT_ORIGIN: &str = "https://qxbroker.com";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const DEFAULT_SYMBOL: &str = "USDCHF_otc";
const DEFAULT_INSTRUMENT_TYPE: &str = "OTC";

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bootstrap: SessionBootstrap,
    pub stream: StreamConfig,
}

/// Endpoint, auth headers and symbol issued by the bootstrap step.
///
/// Treated as opaque and reused unchanged on every reconnect.
#[derive(Debug, Clone)]
pub struct SessionBootstrap {
    pub endpoint: String,
    pub headers: AuthHeaders,
    pub symbol: String,
    pub instrument_type: String,
}

/// Headers sent with the WebSocket upgrade request.
#[derive(Debug, Clone)]
pub struct AuthHeaders {
    pub user_agent: String,
    pub origin: String,
    pub cookie: Option<String>,
}

impl SessionBootstrap {
    /// Bootstrap tuple with default headers and an empty cookie.
    pub fn new(endpoint: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers: AuthHeaders {
                user_agent: DEFAULT_USER_AGENT.to_string(),
                origin: DEFAULT_ORIGIN.to_string(),
                cookie: None,
            },
            symbol: symbol.into(),
            instrument_type: DEFAULT_INSTRUMENT_TYPE.to_string(),
        }
    }
}

/// Stream, indicator and reconnect tuning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Candle duration requested from the feed, in seconds.
    pub timeframe_secs: u64,
    pub window_capacity: usize,
    pub signal_history_capacity: usize,
    pub indicators: IndicatorParams,
    pub heartbeat_interval_ms: u64,
    /// Pause after the protocol probe before anything else is sent.
    pub probe_delay_ms: u64,
    /// How long to wait for a handshake ack before subscribing anyway.
    pub subscribe_delay_ms: u64,
    /// Pause between consecutive subscription messages.
    pub subscribe_gap_ms: u64,
    pub reconnect_delay_ms: u64,
    /// Backoff ceiling. Equal to `reconnect_delay_ms` for a fixed delay.
    pub max_reconnect_delay_ms: u64,
    /// Give up after this many consecutive failed connections.
    pub max_reconnect_attempts: Option<u32>,
    /// Treat the connection as dead if no frame arrives within this time.
    pub read_timeout_ms: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            timeframe_secs: 60,
            window_capacity: DEFAULT_BAR_CAPACITY,
            signal_history_capacity: 1000,
            indicators: IndicatorParams::default(),
            heartbeat_interval_ms: 25_000,
            probe_delay_ms: 1_000,
            subscribe_delay_ms: 2_000,
            subscribe_gap_ms: 300,
            reconnect_delay_ms: 5_000,
            max_reconnect_delay_ms: 60_000,
            max_reconnect_attempts: None,
            read_timeout_ms: None,
        }
    }
}

impl StreamConfig {
    /// Loads tuning from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`CandlewickError::Io`](crate::CandlewickError::Io) if the
    /// file cannot be read, a JSON error if it cannot be parsed, or a
    /// configuration error if the values are inconsistent.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would stall or break the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`CandlewickError::Config`](crate::CandlewickError::Config)
    /// describing the first offending field.
    pub fn validate(&self) -> crate::Result<()> {
        let fail = |msg: &str| Err(crate::CandlewickError::Config(msg.to_string()));

        if self.window_capacity < 2 {
            return fail("window_capacity must be at least 2");
        }
        if self.window_capacity < self.indicators.min_bars {
            return fail("window_capacity must be at least indicators.min_bars");
        }
        if self.window_capacity < self.indicators.required_history() {
            return fail("window_capacity must hold indicators.required_history() bars");
        }
        if self.heartbeat_interval_ms == 0 {
            return fail("heartbeat_interval_ms must be positive");
        }
        if self.max_reconnect_delay_ms < self.reconnect_delay_ms {
            return fail("max_reconnect_delay_ms must not be below reconnect_delay_ms");
        }
        if self.indicators.rsi_period == 0
            || self.indicators.macd_fast == 0
            || self.indicators.macd_slow == 0
            || self.indicators.macd_signal == 0
            || self.indicators.bollinger_window == 0
        {
            return fail("indicator periods must be positive");
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn probe_delay(&self) -> Duration {
        Duration::from_millis(self.probe_delay_ms)
    }

    pub fn subscribe_delay(&self) -> Duration {
        Duration::from_millis(self.subscribe_delay_ms)
    }

    pub fn subscribe_gap(&self) -> Duration {
        Duration::from_millis(self.subscribe_gap_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`CandlewickError::Bootstrap`](crate::CandlewickError::Bootstrap)
/// if no endpoint was provided, or a configuration error if `FEED_CONFIG`
/// names an unreadable or invalid file.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let endpoint = non_empty_var("FEED_WEBSOCKET_URL").ok_or_else(|| {
        crate::CandlewickError::Bootstrap(
            "FEED_WEBSOCKET_URL is not set; rerun the session bootstrap".to_string(),
        )
    })?;

    let bootstrap = SessionBootstrap {
        endpoint,
        headers: AuthHeaders {
            user_agent: non_empty_var("FEED_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            origin: non_empty_var("FEED_ORIGIN").unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
            cookie: non_empty_var("FEED_COOKIE"),
        },
        symbol: non_empty_var("FEED_SYMBOL").unwrap_or_else(|| DEFAULT_SYMBOL.to_string()),
        instrument_type: non_empty_var("FEED_INSTRUMENT_TYPE")
            .unwrap_or_else(|| DEFAULT_INSTRUMENT_TYPE.to_string()),
    };

    let stream = match non_empty_var("FEED_CONFIG") {
        Some(path) => StreamConfig::load(Path::new(&path))?,
        None => StreamConfig::default(),
    };

    Ok(AppConfig { bootstrap, stream })
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
