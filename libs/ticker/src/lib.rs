mod policy;
mod quote;
mod scan_client;
mod speech;

pub mod format;

pub use policy::{DEFAULT_CHANGE_THRESHOLD_PCT, SpeakMode, SpeakState, pct_move};
pub use quote::{DEFAULT_COLUMNS, Fields, Price, Quote, default_columns};
pub use scan_client::{DEFAULT_SCAN_URL, DEFAULT_TIMEOUT, QuoteSource, ScanClient, ScanResponse};
pub use speech::{CommandSpeaker, DEFAULT_RATE_WPM, Engine, Speaker};
