//! # agent — run the Claude Code CLI once per tick
//!
//! ```text
//! claude --print --output-format text --dangerously-skip-permissions \
//!        [--mcp-config /app/mcp-config.json] -p "<prompt>"
//! ```
//!
//! A non-zero exit is only a warning: whatever reached stdout still goes to the
//! parser.  A timeout or a missing executable fails the tick.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::TickError;
use crate::parser::truncate_chars;

/// Hard ceiling on one agent run.
pub const AGENT_TIMEOUT: Duration = Duration::from_secs(300);

const STDERR_LOG_LIMIT: usize = 1000;

/// What a finished agent run left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutput {
    pub stdout:    String,
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
}

/// The decision-making process the tick hands its prompt to.
#[allow(async_fn_in_trait)]
pub trait Agent {
    async fn run(&self, prompt: &str) -> Result<AgentOutput, TickError>;
}

// ─── Claude Code CLI ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ClaudeCli {
    bin:        String,
    mcp_config: PathBuf,
    workdir:    PathBuf,
    api_key:    String,
    timeout:    Duration,
}

impl ClaudeCli {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bin:        config.agent_bin.clone(),
            mcp_config: config.mcp_config.clone(),
            workdir:    config.agent_workdir.clone(),
            api_key:    config.anthropic_api_key.clone(),
            timeout:    AGENT_TIMEOUT,
        }
    }

    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments after the executable name.  The prompt is always last.
    pub fn command_args(&self, prompt: &str) -> Vec<String> {
        let mut args: Vec<String> = ["--print", "--output-format", "text", "--dangerously-skip-permissions"]
            .into_iter()
            .map(String::from)
            .collect();

        if self.mcp_config.is_file() {
            args.push("--mcp-config".to_string());
            args.push(self.mcp_config.display().to_string());
        } else {
            debug!(path = %self.mcp_config.display(), "No MCP config — running without MCP servers");
        }

        args.push("-p".to_string());
        args.push(prompt.to_string());
        args
    }
}

impl Agent for ClaudeCli {
    async fn run(&self, prompt: &str) -> Result<AgentOutput, TickError> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(self.command_args(prompt))
            .env("ANTHROPIC_API_KEY", &self.api_key)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if self.workdir.is_dir() {
            cmd.current_dir(&self.workdir);
        }

        info!(bin = %self.bin, prompt_chars = prompt.len(), "🤖 Executing Claude Code...");

        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TickError::AgentNotFound(self.bin.clone()),
            _ => TickError::AgentProcess(e),
        })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| TickError::AgentTimeout(self.timeout))?
            .map_err(TickError::AgentProcess)?;

        let exit_code = output.status.code();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                code   = ?exit_code,
                stderr = %truncate_chars(stderr.trim(), STDERR_LOG_LIMIT),
                "⚠️ Claude Code exited with non-zero status"
            );
        }

        Ok(AgentOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            exit_code,
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
