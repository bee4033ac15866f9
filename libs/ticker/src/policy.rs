use std::{fmt, str::FromStr};

use anyhow::{Error, bail};

use crate::{format::phrase, quote::Quote};

pub const DEFAULT_CHANGE_THRESHOLD_PCT: f64 = 0.01;

/// When a fetched quote gets read out loud.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum SpeakMode {
    /// Every cycle, whatever the close looks like.
    #[default]
    Always,
    /// First cycle, then only once price moved `threshold_pct` percent
    /// away from the last announced price.
    OnChange { threshold_pct: f64 },
    /// Console only.
    Muted,
}

impl FromStr for SpeakMode {
    type Err = Error;

    /// Parses `always`, `change` or `off`. The threshold for `change`
    /// is the default one and can be replaced with [`SpeakMode::with_threshold`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" | "every" => Ok(SpeakMode::Always),
            "change" | "on_change" | "on-change" => Ok(SpeakMode::OnChange {
                threshold_pct: DEFAULT_CHANGE_THRESHOLD_PCT,
            }),
            "off" | "muted" | "none" => Ok(SpeakMode::Muted),
            other => bail!("unknown speak mode {other:?} (expected always, change or off)"),
        }
    }
}

impl fmt::Display for SpeakMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeakMode::Always => write!(f, "always"),
            SpeakMode::OnChange { threshold_pct } => write!(f, "on change >= {threshold_pct}%"),
            SpeakMode::Muted => write!(f, "off"),
        }
    }
}

impl SpeakMode {
    pub fn with_threshold(self, threshold_pct: f64) -> Self {
        match self {
            SpeakMode::OnChange { .. } => SpeakMode::OnChange { threshold_pct },
            other => other,
        }
    }

    /// Phrase to speak for `quote`, or `None` to stay quiet this cycle.
    pub fn decide(&self, quote: &Quote, state: SpeakState) -> Option<String> {
        let speak = match *self {
            SpeakMode::Muted => false,
            SpeakMode::Always => true,
            SpeakMode::OnChange { threshold_pct } => match (quote.close.as_f64(), state.last_spoken_price) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(close), Some(last)) => pct_move(last, close) >= threshold_pct,
            },
        };

        speak.then(|| phrase(quote))
    }
}

/// Absolute percent move from `from` to `to`. Moving off zero counts as 100%.
pub fn pct_move(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        return 100.0;
    }
    ((to - from) / from).abs() * 100.0
}

/// What the loop remembers between cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpeakState {
    pub last_spoken_price: Option<f64>,
}

impl SpeakState {
    /// State once `quote` has been spoken successfully.
    pub fn after_speaking(self, quote: &Quote) -> Self {
        match quote.close.as_f64() {
            Some(close) => SpeakState {
                last_spoken_price: Some(close),
            },
            None => self,
        }
    }
}
