use std::{future::Future, io::Write, time::Duration};

use anyhow::{Error, Result};
use chrono::Utc;
use ticker::{Quote, QuoteSource, SpeakState, Speaker, default_columns, format::console_line};
use tokio::time::sleep;
use tracing::{debug, info, info_span, warn};
use tracing_futures::Instrument;

use crate::config::Config;

/// How a failed cycle is handled.
#[derive(Debug)]
pub enum Failure {
    /// Fetch, parse or speech trouble; back off and try again.
    Transient(Error),
    /// Bad configuration or a closed console; nothing to retry.
    Fatal(Error),
}

impl Failure {
    fn fatal(e: impl Into<Error>) -> Self {
        Failure::Fatal(e.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Failure::Fatal(_))
    }

    pub fn into_inner(self) -> Error {
        match self {
            Failure::Transient(e) | Failure::Fatal(e) => e,
        }
    }
}

impl From<Error> for Failure {
    fn from(e: Error) -> Self {
        Failure::Transient(e)
    }
}

/// The fetch, print, speak, sleep loop for one ticker.
pub struct Poller<S, V, W> {
    config: Config,
    columns: Vec<String>,
    source: S,
    speaker: V,
    out: W,
    state: SpeakState,
    cycles: u64,
}

impl<S, V, W> Poller<S, V, W>
where
    S: QuoteSource,
    V: Speaker,
    W: Write,
{
    pub fn new(config: Config, source: S, speaker: V, out: W) -> Self {
        Self {
            config,
            columns: default_columns(),
            source,
            speaker,
            out,
            state: SpeakState::default(),
            cycles: 0,
        }
    }

    pub fn state(&self) -> SpeakState {
        self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn speaker(&self) -> &V {
        &self.speaker
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Polls until `shutdown` resolves or a fatal error comes up.
    /// Shutdown may land anywhere in a cycle; whatever was in flight is dropped.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        writeln!(
            self.out,
            "Polling TradingView for {} every {}s. Ctrl+C to stop.",
            self.config.ticker,
            self.config.interval.as_secs()
        )?;
        info!(
            ticker = %self.config.ticker,
            interval_secs = self.config.interval.as_secs(),
            speak_mode = %self.config.speak_mode,
            "poller started"
        );

        tokio::pin!(shutdown);

        loop {
            let stopped = tokio::select! {
                _ = &mut shutdown => true,
                res = self.step() => {
                    res?;
                    false
                }
            };

            if stopped {
                writeln!(self.out, "\nStopped.")?;
                info!(cycles = self.cycles, "poller stopped");
                return Ok(());
            }
        }
    }

    /// One cycle followed by its pause.
    async fn step(&mut self) -> Result<()> {
        self.cycles += 1;
        let span = info_span!("cycle", ticker = %self.config.ticker, n = self.cycles);

        let pause = match self.cycle().instrument(span).await {
            Ok(()) => self.config.interval,
            Err(Failure::Transient(e)) => {
                warn!(error = ?e, "cycle failed");
                self.report_error(&e)?
            }
            Err(Failure::Fatal(e)) => return Err(e),
        };

        sleep(pause).await;
        Ok(())
    }

    fn report_error(&mut self, e: &Error) -> Result<Duration> {
        let backoff = self.config.error_backoff;
        writeln!(
            self.out,
            "Error: {e:#}. Retrying in {}s\u{2026}",
            backoff.as_secs()
        )?;
        Ok(backoff)
    }

    /// Fetch, print and maybe speak once. `SpeakState` only moves forward
    /// when the phrase was actually spoken.
    pub async fn cycle(&mut self) -> Result<(), Failure> {
        let fields = self
            .source
            .fetch_fields(&self.config.ticker, &self.columns)
            .await?;

        let Some(fields) = fields else {
            debug!("scan returned no rows");
            writeln!(
                self.out,
                "No data returned (check ticker like 'BINANCE:BTCUSDT')."
            )
            .map_err(Failure::fatal)?;
            return Ok(());
        };

        let quote = Quote::from_fields(&self.config.ticker, &fields);
        writeln!(self.out, "{}", console_line(Utc::now(), &quote)).map_err(Failure::fatal)?;
        self.out.flush().map_err(Failure::fatal)?;

        if let Some(phrase) = self.config.speak_mode.decide(&quote, self.state) {
            debug!(%phrase, "announcing");
            self.speaker.speak(&phrase).await?;
            self.state = self.state.after_speaking(&quote);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::VecDeque,
        time::Duration,
    };

    use anyhow::anyhow;
    use serde_json::json;
    use ticker::{Fields, SpeakMode};
    use tokio::time::Instant;

    use super::*;

    #[derive(Default)]
    struct Scripted {
        replies: RefCell<VecDeque<Result<Option<Fields>>>>,
        fetched_at: RefCell<Vec<Instant>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Option<Fields>>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.fetched_at.borrow().len()
        }
    }

    impl QuoteSource for Scripted {
        async fn fetch_fields(&self, _ticker: &str, _columns: &[String]) -> Result<Option<Fields>> {
            self.fetched_at.borrow_mut().push(Instant::now());
            self.replies.borrow_mut().pop_front().unwrap_or(Ok(None))
        }
    }

    #[derive(Default)]
    struct Recorder {
        spoken: Vec<String>,
        broken: bool,
    }

    impl Speaker for Recorder {
        async fn speak(&mut self, text: &str) -> Result<()> {
            if self.broken {
                return Err(anyhow!("voice engine unavailable"));
            }
            self.spoken.push(text.to_string());
            Ok(())
        }
    }

    fn ltc(close: f64) -> Result<Option<Fields>> {
        Ok(Some(Fields::from([
            ("name", json!("LTCUSD")),
            ("close", json!(close)),
            ("change", json!(1.23)),
            ("change_abs", json!(1.1)),
            ("volume", json!(500000)),
        ])))
    }

    fn poller(
        mode: SpeakMode,
        replies: Vec<Result<Option<Fields>>>,
    ) -> Poller<Scripted, Recorder, Vec<u8>> {
        let config = Config {
            speak_mode: mode,
            ..Config::default()
        };
        Poller::new(config, Scripted::new(replies), Recorder::default(), Vec::new())
    }

    fn printed<S, V>(p: &Poller<S, V, Vec<u8>>) -> String {
        String::from_utf8(p.out.clone()).unwrap()
    }

    #[tokio::test]
    async fn cycle_prints_and_speaks_quote() {
        let mut p = poller(SpeakMode::Always, vec![ltc(91.234)]);

        p.cycle().await.unwrap();

        let out = printed(&p);
        assert!(out.ends_with("LTCUSD: 91.234  (1.23%, 1.1, vol 500000)\n"), "{out}");
        assert!(out.starts_with('['));
        assert!(out.contains(" UTC] "));
        assert_eq!(p.speaker.spoken, ["LTCUSD price 91.23. Change 1.23 percent."]);
        assert_eq!(p.state().last_spoken_price, Some(91.234));
    }

    #[tokio::test]
    async fn no_data_skips_format_and_speech() {
        let mut p = poller(SpeakMode::Always, vec![Ok(None)]);

        p.cycle().await.unwrap();

        assert_eq!(
            printed(&p),
            "No data returned (check ticker like 'BINANCE:BTCUSDT').\n"
        );
        assert!(p.speaker.spoken.is_empty());
        assert_eq!(p.state(), SpeakState::default());
    }

    #[tokio::test]
    async fn speech_failure_is_transient_and_keeps_state() {
        let mut p = poller(
            SpeakMode::OnChange { threshold_pct: 0.01 },
            vec![ltc(91.0)],
        );
        p.speaker.broken = true;

        let res = p.cycle().await;

        assert!(matches!(res, Err(Failure::Transient(_))));
        assert_eq!(p.state(), SpeakState::default());
    }

    #[tokio::test]
    async fn fetch_failure_is_transient() {
        let mut p = poller(SpeakMode::Always, vec![Err(anyhow!("timed out"))]);
        assert!(matches!(p.cycle().await, Err(Failure::Transient(_))));
        assert!(printed(&p).is_empty());
    }

    struct ClosedConsole;

    impl Write for ClosedConsole {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn closed_console_is_fatal() {
        let config = Config::default();
        let mut p = Poller::new(config, Scripted::new(vec![ltc(91.0)]), Recorder::default(), ClosedConsole);

        let failure = p.cycle().await.unwrap_err();
        assert!(failure.is_fatal());
        assert!(p.speaker.spoken.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn error_backs_off_then_resumes() {
        let mut p = poller(
            SpeakMode::Always,
            vec![Err(anyhow!("connection reset")), ltc(91.234)],
        );

        p.run(sleep(Duration::from_secs(6))).await.unwrap();

        let out = printed(&p);
        assert!(
            out.contains("Error: connection reset. Retrying in 5s\u{2026}\n"),
            "{out}"
        );
        assert!(out.contains("LTCUSD: 91.234"));
        assert!(out.ends_with("\nStopped.\n"));

        let times = p.source.fetched_at.borrow();
        assert_eq!(times.len(), 2);
        assert_eq!(times[1] - times[0], Duration::from_secs(5));
        assert_eq!(p.speaker.spoken.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_during_sleep_stops_fetching() {
        let mut p = poller(SpeakMode::Muted, vec![ltc(91.0), ltc(92.0), ltc(93.0)]);

        // fetches at 0s and 3s, interrupt lands in the second sleep
        p.run(sleep(Duration::from_secs(4))).await.unwrap();

        assert_eq!(p.source.calls(), 2);
        let out = printed(&p);
        assert!(out.starts_with("Polling TradingView for BINANCE:LTCUSDT every 3s. Ctrl+C to stop.\n"));
        assert!(out.ends_with("\nStopped.\n"));
        assert!(p.speaker.spoken.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn always_mode_speaks_every_cycle() {
        let mut p = poller(SpeakMode::Always, vec![ltc(91.0), ltc(91.0), ltc(91.0)]);

        // cycles at 0s, 3s, 6s
        p.run(sleep(Duration::from_millis(7500))).await.unwrap();

        assert_eq!(p.speaker.spoken.len(), 3);
    }
}
