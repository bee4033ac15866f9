use std::io::ErrorKind;

use anyhow::{Context, Result, anyhow, bail};
use tokio::process::Command;
use tracing::{debug, warn};

pub const DEFAULT_RATE_WPM: u32 = 180;

/// Blocking text-to-speech: `speak` returns once the sentence has been said.
#[allow(async_fn_in_trait)]
pub trait Speaker {
    async fn speak(&mut self, text: &str) -> Result<()>;
}

/// Platform voice engine driven through its command line tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    /// `espeak-ng`, or classic `espeak` when ng isn't installed.
    Espeak,
    /// macOS `say`.
    Say,
    /// Windows SAPI through PowerShell's System.Speech.
    Sapi,
}

impl Engine {
    pub fn for_platform() -> Self {
        if cfg!(target_os = "macos") {
            Engine::Say
        } else if cfg!(windows) {
            Engine::Sapi
        } else {
            Engine::Espeak
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: &'static str,
    pub args: Vec<String>,
    pub env: Option<(&'static str, String)>,
}

const SAPI_TEXT_VAR: &str = "ANNOUNCER_TTS_TEXT";

#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    engine: Engine,
    rate_wpm: u32,
}

impl CommandSpeaker {
    pub fn new(engine: Engine, rate_wpm: u32) -> Self {
        Self { engine, rate_wpm }
    }

    pub fn for_platform(rate_wpm: u32) -> Self {
        Self::new(Engine::for_platform(), rate_wpm)
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Commands to try, in order, until one of them exists.
    pub fn invocations(&self, text: &str) -> Vec<Invocation> {
        let rate = self.rate_wpm.to_string();
        match self.engine {
            Engine::Espeak => ["espeak-ng", "espeak"]
                .into_iter()
                .map(|program| Invocation {
                    program,
                    args: vec!["-s".into(), rate.clone(), "--".into(), text.to_string()],
                    env: None,
                })
                .collect(),
            Engine::Say => vec![Invocation {
                program: "say",
                args: vec!["-r".into(), rate, "--".into(), text.to_string()],
                env: None,
            }],
            Engine::Sapi => vec![Invocation {
                program: "powershell",
                args: vec![
                    "-NoProfile".into(),
                    "-NonInteractive".into(),
                    "-Command".into(),
                    format!(
                        "Add-Type -AssemblyName System.Speech; \
                         $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
                         $s.Rate = {}; $s.Speak($env:{SAPI_TEXT_VAR})",
                        sapi_rate(self.rate_wpm)
                    ),
                ],
                // Keeps the sentence out of the script so nothing needs quoting.
                env: Some((SAPI_TEXT_VAR, text.to_string())),
            }],
        }
    }
}

/// SAPI's rate runs -10..=10 around a ~180 wpm default.
pub fn sapi_rate(rate_wpm: u32) -> i32 {
    ((rate_wpm as i32 - 180) / 20).clamp(-10, 10)
}

impl Speaker for CommandSpeaker {
    async fn speak(&mut self, text: &str) -> Result<()> {
        for inv in self.invocations(text) {
            let mut cmd = Command::new(inv.program);
            cmd.args(&inv.args).kill_on_drop(true);
            if let Some((key, value)) = &inv.env {
                cmd.env(key, value);
            }

            debug!(program = inv.program, rate_wpm = self.rate_wpm, "speaking");
            let status = match cmd.status().await {
                Ok(status) => status,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(program = inv.program, "voice engine not installed");
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to run {}", inv.program));
                }
            };

            if !status.success() {
                warn!(program = inv.program, %status, "voice engine failed");
                bail!("{} exited with {status}", inv.program);
            }
            return Ok(());
        }

        Err(anyhow!("no voice engine found for {:?}", self.engine))
    }
}
