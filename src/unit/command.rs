// src/unit/command.rs

//! Test unit backed by a shell command.
//!
//! A `CommandUnit` runs its command through the platform shell and passes if
//! the process exits successfully. When `wait_for` is set, the unit then polls
//! for that path to exist, using the run's default timeout unless the unit
//! carries its own.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::TestConfig;

use super::{TestUnit, UnitContext, UnitFuture};

#[derive(Debug, Clone)]
pub struct CommandUnit {
    name: String,
    cmd: String,
    platforms: Vec<String>,
    current_platform: String,
    focused: bool,
    workdir: Option<PathBuf>,
    wait_for: Option<PathBuf>,
    wait_timeout: Option<Duration>,
}

impl CommandUnit {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            platforms: Vec::new(),
            current_platform: crate::types::host_platform(),
            focused: false,
            workdir: None,
            wait_for: None,
            wait_timeout: None,
        }
    }

    /// Build a unit from a `[test.<name>]` section.
    ///
    /// Relative `wait_for` paths and the working directory resolve against
    /// `root_dir` (the directory holding the suite file).
    pub fn from_config(name: &str, cfg: &TestConfig, platform: &str, root_dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            cmd: cfg.cmd.clone(),
            platforms: cfg.platforms.clone(),
            current_platform: platform.to_string(),
            focused: cfg.focus,
            workdir: Some(root_dir.to_path_buf()),
            wait_for: cfg.wait_for.as_ref().map(|p| root_dir.join(p)),
            wait_timeout: cfg.timeout(),
        }
    }

    pub fn platforms(mut self, platforms: &[&str]) -> Self {
        self.platforms = platforms.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn current_platform(mut self, platform: &str) -> Self {
        self.current_platform = platform.to_string();
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn wait_for(mut self, path: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        self.wait_for = Some(path.into());
        self.wait_timeout = timeout;
        self
    }

    async fn execute(&self, ctx: &UnitContext) -> Result<()> {
        info!(unit = %self.name, run_id = ctx.run_id(), cmd = %self.cmd, "starting unit command");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        if let Some(ref dir) = self.workdir {
            cmd.current_dir(dir);
        }

        cmd.env("TESTCTL_RUN_ID", ctx.run_id().to_string())
            .env("TESTCTL_UNIT", &self.name)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for unit '{}'", self.name))?;

        // Drain both pipes so the child never blocks on a full buffer.
        if let Some(stdout) = child.stdout.take() {
            let unit = self.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(unit = %unit, "stdout: {}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let unit = self.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(unit = %unit, "stderr: {}", line);
                }
            });
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of unit '{}'", self.name))?;

        let code = status.code().unwrap_or(-1);
        info!(
            unit = %self.name,
            run_id = ctx.run_id(),
            exit_code = code,
            success = status.success(),
            "unit command exited"
        );

        if !status.success() {
            bail!("command `{}` exited with code {code}", self.cmd);
        }

        if let Some(ref path) = self.wait_for {
            let mut poller = ctx.poller();
            if let Some(timeout) = self.wait_timeout {
                poller = poller.with_timeout(timeout);
            }
            poller
                .until(|| path.try_exists())
                .await
                .with_context(|| format!("waiting for {} to appear", path.display()))?;
        }

        Ok(())
    }
}

impl TestUnit for CommandUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_current_platform(&self) -> bool {
        self.platforms.is_empty()
            || self
                .platforms
                .iter()
                .any(|p| p.eq_ignore_ascii_case(&self.current_platform))
    }

    fn is_focused(&self) -> bool {
        self.focused
    }

    fn run<'a>(&'a self, ctx: &'a UnitContext) -> UnitFuture<'a> {
        Box::pin(self.execute(ctx))
    }
}
