// # Command Reloader
//
// Reloads the forwarder by running a service-manager command, by default
// `sudo systemctl reload dnsmasq`.
//
// ## Behavior
//
// - Single attempt, no retry
// - Success is exit status 0; anything else is `Error::ReloadFailed`
// - Captured stderr is included in the error message
// - Optional timeout; on expiry the child is killed

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::Error;
use crate::config::ReloadConfig;
use crate::traits::Reloader;

/// Reloader that runs an external command
#[derive(Debug, Clone)]
pub struct CommandReloader {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandReloader {
    /// Create a reloader running `program` with `args`
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: None,
        }
    }

    /// Create a reloader from configuration
    pub fn from_config(config: &ReloadConfig) -> Result<Self, Error> {
        config.validate()?;

        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| Error::config("Reload command cannot be empty"))?;

        let reloader = Self::new(program.as_str(), args.iter().map(String::as_str));
        Ok(match config.timeout_secs {
            Some(secs) => reloader.with_timeout(Duration::from_secs(secs)),
            None => reloader,
        })
    }

    /// Bound the command's run time
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The command line, for logging
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn run(&self) -> Result<(), Error> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::reload_failed(format!("failed to run `{}`: {}", self.command_line(), e))
            })?;

        let output = child.wait_with_output().await.map_err(|e| {
            Error::reload_failed(format!("failed to wait for `{}`: {}", self.command_line(), e))
        })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            Err(Error::reload_failed(format!(
                "`{}` {}",
                self.command_line(),
                output.status
            )))
        } else {
            Err(Error::reload_failed(format!(
                "`{}` {}: {}",
                self.command_line(),
                output.status,
                stderr
            )))
        }
    }
}

impl Default for CommandReloader {
    fn default() -> Self {
        let config = ReloadConfig::default();
        let (program, args) = config
            .command
            .split_first()
            .map(|(program, args)| (program.clone(), args.to_vec()))
            .unwrap_or_default();
        Self::new(program, args)
    }
}

#[async_trait]
impl Reloader for CommandReloader {
    async fn reload(&self) -> Result<(), Error> {
        debug!("Running reload command: {}", self.command_line());

        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.run())
                .await
                .map_err(|_| {
                    Error::reload_failed(format!(
                        "`{}` timed out after {:?}",
                        self.command_line(),
                        timeout
                    ))
                })??,
            None => self.run().await?,
        }

        info!("Reloaded dnsmasq via `{}`", self.command_line());
        Ok(())
    }

    fn reloader_name(&self) -> &'static str {
        "command"
    }
}
