//! Runs the Bitwarden CLI as a child process.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use inheritor_core::{AppError, AppResult, SessionKey};
use serde::de::DeserializeOwned;
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::debug;

use crate::bitwarden_wire::{mentions_auth_failure, mentions_not_found};

mod session;


/// Handle on a `bw` executable plus the session key passed to every child.
pub struct BwCli {
    executable: PathBuf,
    command_timeout: Duration,
    session: RwLock<Option<SessionKey>>,
}

impl BwCli {
    /// Creates a runner; the executable is resolved through `PATH` when it
    /// has no directory component.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>, command_timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            command_timeout,
            session: RwLock::new(None),
        }
    }

    /// Returns the configured executable.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Replaces the session key used by subsequent commands.
    pub async fn set_session(&self, session: SessionKey) {
        *self.session.write().await = Some(session);
    }

    /// Returns the current session key, if any.
    pub async fn session(&self) -> Option<SessionKey> {
        self.session.read().await.clone()
    }

    pub(crate) async fn run(&self, args: &[&str]) -> AppResult<String> {
        self.run_with_env(args, &[]).await
    }

    pub(crate) async fn run_json<T>(&self, args: &[&str]) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let stdout = self.run(args).await?;
        serde_json::from_str(stdout.trim()).map_err(|error| {
            AppError::Transport(format!(
                "bw {} returned unreadable JSON: {error}",
                subcommand_label(args)
            ))
        })
    }

    /// Runs one `bw` command and returns its stdout.
    ///
    /// The child never prompts; a non-zero exit is classified from its
    /// stderr (or stdout when stderr is empty).
    pub(crate) async fn run_with_env(
        &self,
        args: &[&str],
        envs: &[(&str, &str)],
    ) -> AppResult<String> {
        let label = subcommand_label(args);
        let mut command = Command::new(&self.executable);
        command
            .args(args)
            .env("BW_NOINTERACTION", "true")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in envs {
            command.env(key, value);
        }
        if let Some(session) = self.session.read().await.as_ref() {
            command.env("BW_SESSION", session.expose());
        }

        debug!(command = %label, "running bw");
        let output = tokio::time::timeout(self.command_timeout, command.output())
            .await
            .map_err(|_| {
                AppError::Transport(format!(
                    "bw {label} timed out after {}s",
                    self.command_timeout.as_secs()
                ))
            })?
            .map_err(|error| {
                AppError::Transport(format!(
                    "failed to run '{}': {error}",
                    self.executable.display()
                ))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };
        Err(classify_failure(args.first().copied().unwrap_or_default(), &label, message))
    }
}

fn subcommand_label(args: &[&str]) -> String {
    args.iter().take(2).copied().collect::<Vec<_>>().join(" ")
}

/// Maps a failed `bw` invocation onto the error kinds the engine reacts to.
pub(crate) fn classify_failure(subcommand: &str, label: &str, message: &str) -> AppError {
    let detail = format!("bw {label} failed: {message}");
    if mentions_auth_failure(message) {
        AppError::Auth(detail)
    } else if mentions_not_found(message) {
        AppError::NotFound(detail)
    } else if subcommand == "edit" {
        AppError::Validation(detail)
    } else {
        AppError::Transport(detail)
    }
}
