use anyhow::Result;
use announcer::{Config, Failure, Poller};
use ticker::{CommandSpeaker, ScanClient};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::load().map_err(Failure::into_inner)?;

    let client = ScanClient::new(config.scan_url.clone(), config.request_timeout)?;
    let speaker = CommandSpeaker::for_platform(config.voice_rate_wpm);
    info!(
        engine = ?speaker.engine(),
        rate_wpm = config.voice_rate_wpm,
        "voice engine selected"
    );

    let mut poller = Poller::new(config, client, speaker, std::io::stdout());
    poller.run(shutdown_signal()).await?;

    info!("Shutdown complete.");
    Ok(())
}

fn init_tracing() {
    // Quote lines own stdout; diagnostics go to stderr and stay quiet unless asked for.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv()  => {},
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = ?e, "failed to install unix signal handlers, using ctrl_c");
            }
        }
    }

    let _ = tokio::signal::ctrl_c().await;
}
