pub mod config;
pub mod poll;

pub use config::Config;
pub use poll::{Failure, Poller};
