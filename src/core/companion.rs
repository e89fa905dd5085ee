//! The Anki desktop application that serves AnkiConnect.
//!
//! When configured, it is started as a child process with its output sent
//! to a log file. Readiness is established by polling `deckNames` with
//! exponential backoff instead of sleeping for a fixed time.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::adapters::AnkiClient;

/// Longest pause between two readiness checks
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A running companion process; killed on `stop` or when dropped
pub struct Companion {
    child: Child,
    program: String,
}

impl Companion {
    /// Start `command` (program followed by whitespace-separated arguments)
    pub fn launch(command: &str, log_path: &Path) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .context("Companion launch command is empty")?
            .to_string();

        let log = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create companion log: {}", log_path.display()))?;
        let log_err = log
            .try_clone()
            .context("Failed to duplicate companion log handle")?;

        let child = Command::new(&program)
            .args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start '{}'", program))?;

        info!(%program, pid = child.id(), log = %log_path.display(), "Started companion application");
        Ok(Self { child, program })
    }

    /// Kill the process and reap it
    pub async fn stop(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(program = %self.program, error = %e, "Failed to stop companion application");
        } else {
            debug!(program = %self.program, "Stopped companion application");
        }
    }
}

/// Next pause in the backoff sequence
pub fn next_interval(current: Duration) -> Duration {
    (current * 2).min(MAX_POLL_INTERVAL)
}

/// Poll AnkiConnect until it answers `deckNames` or `timeout` elapses.
///
/// Returns the number of attempts it took.
pub async fn wait_until_ready(
    anki: &AnkiClient,
    timeout: Duration,
    initial_interval: Duration,
) -> Result<u32> {
    let deadline = Instant::now() + timeout;
    let mut interval = initial_interval;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        // A request that hangs counts as a failed attempt once the deadline passes
        let remaining = deadline.saturating_duration_since(Instant::now());
        let err = match tokio::time::timeout(remaining, anki.deck_names()).await {
            Ok(Ok(_)) => {
                info!(attempts, "AnkiConnect is ready");
                return Ok(attempts);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("deckNames gave no answer within {:?}", remaining),
        };

        let now = Instant::now();
        if now >= deadline {
            anyhow::bail!(
                "AnkiConnect did not become ready within {:?} ({} attempts): {}",
                timeout,
                attempts,
                err
            );
        }

        debug!(attempts, error = %err, delay_ms = interval.as_millis() as u64, "AnkiConnect not ready yet");
        tokio::time::sleep(interval.min(deadline - now)).await;
        interval = next_interval(interval);
    }
}
