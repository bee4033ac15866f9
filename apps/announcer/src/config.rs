use std::{env::var, str::FromStr, time::Duration};

use anyhow::{Context, Result, ensure};
use ticker::{DEFAULT_RATE_WPM, DEFAULT_SCAN_URL, DEFAULT_TIMEOUT, SpeakMode};
use tracing::warn;

use crate::poll::Failure;

pub const DEFAULT_TICKER: &str = "BINANCE:LTCUSDT";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub ticker: String,
    pub interval: Duration,
    pub error_backoff: Duration,
    pub speak_mode: SpeakMode,
    pub voice_rate_wpm: u32,
    pub request_timeout: Duration,
    pub scan_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ticker: DEFAULT_TICKER.to_string(),
            interval: DEFAULT_INTERVAL,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            speak_mode: SpeakMode::Always,
            voice_rate_wpm: DEFAULT_RATE_WPM,
            request_timeout: DEFAULT_TIMEOUT,
            scan_url: DEFAULT_SCAN_URL.to_string(),
        }
    }
}

impl Config {
    /// Defaults overridden by any `ANNOUNCER_*` variables that are set.
    /// Any problem is a [`Failure::Fatal`].
    pub fn load() -> Result<Self, Failure> {
        Self::load_from(|key| var(key).ok())
    }

    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Failure> {
        Self::from_lookup(lookup)
            .context("invalid configuration")
            .map_err(Failure::Fatal)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(ticker) = lookup("ANNOUNCER_TICKER") {
            config.ticker = ticker.trim().to_string();
        }
        if let Some(secs) = parsed::<u64>(&lookup, "ANNOUNCER_INTERVAL_SECS")? {
            config.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed::<u64>(&lookup, "ANNOUNCER_ERROR_BACKOFF_SECS")? {
            config.error_backoff = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed::<u64>(&lookup, "ANNOUNCER_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(mode) = parsed::<SpeakMode>(&lookup, "ANNOUNCER_SPEAK_MODE")? {
            config.speak_mode = mode;
        }
        if let Some(pct) = parsed::<f64>(&lookup, "ANNOUNCER_CHANGE_THRESHOLD_PCT")? {
            ensure_threshold(pct)?;
            if !matches!(config.speak_mode, SpeakMode::OnChange { .. }) {
                warn!(
                    threshold_pct = pct,
                    speak_mode = %config.speak_mode,
                    "ANNOUNCER_CHANGE_THRESHOLD_PCT only applies to ANNOUNCER_SPEAK_MODE=change, ignoring"
                );
            }
            config.speak_mode = config.speak_mode.with_threshold(pct);
        }
        if let Some(wpm) = parsed::<u32>(&lookup, "ANNOUNCER_VOICE_RATE_WPM")? {
            config.voice_rate_wpm = wpm;
        }
        if let Some(url) = lookup("ANNOUNCER_SCAN_URL") {
            config.scan_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.ticker.is_empty(), "ticker must not be empty");
        ensure!(!self.interval.is_zero(), "poll interval must be at least 1s");
        ensure!(!self.request_timeout.is_zero(), "request timeout must be at least 1s");
        ensure!(self.voice_rate_wpm > 0, "voice rate must be positive");
        if let SpeakMode::OnChange { threshold_pct } = self.speak_mode {
            ensure_threshold(threshold_pct)?;
        }
        Ok(())
    }
}

fn ensure_threshold(threshold_pct: f64) -> Result<()> {
    ensure!(
        threshold_pct.is_finite() && threshold_pct >= 0.0,
        "change threshold must be a non-negative number, got {threshold_pct}"
    );
    Ok(())
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Into<anyhow::Error>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| -> anyhow::Error { e.into() })
                .with_context(|| format!("invalid {key}={raw:?}"))
        })
        .transpose()
}
