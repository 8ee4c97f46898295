//! # tick-runner — one scheduled trading tick
//!
//! ```text
//!  cron / scheduler
//!        │  tick-runner [--analysis-only]
//!        ▼
//!  ┌──────────────┐  prompt   ┌──────────────────┐
//!  │  TickRunner  │ ────────▶ │  claude (CLI)    │──▶ broker / market data via MCP
//!  │              │ ◀──────── │                  │
//!  └──────────────┘  stdout   └──────────────────┘
//!        │
//!        ├─▶ STATE_DIR/state.json, plan.md, strategy.md
//!        ├─▶ STATE_DIR/logs/actions.ndjson, errors.ndjson
//!        └─▶ Slack webhook (summary / alert)
//! ```
//!
//! ## Environment Variables
//!
//! | Variable                 | Default                | Description                      |
//! |--------------------------|------------------------|----------------------------------|
//! | `STATE_DIR`              | `/data/alpaca-bot`     | Persisted state and logs         |
//! | `SLACK_WEBHOOK_URL`      | —                      | Notifications off when unset     |
//! | `TZ`                     | `America/New_York`     | Timezone label in the prompt     |
//! | `ENABLE_STOCK_TRADING`   | `true`                 | Stocks asset class               |
//! | `ENABLE_CRYPTO_TRADING`  | `false`                | Crypto asset class               |
//! | `ENABLE_OPTIONS_TRADING` | `false`                | Options asset class              |
//! | `CLAUDE_BIN`             | `claude`               | Agent executable                 |
//! | `MCP_CONFIG`             | `/app/mcp-config.json` | MCP servers, if the file exists  |
//! | `AGENT_WORKDIR`          | `/app`                 | Agent working directory          |
//! | `ANTHROPIC_API_KEY`      | —                      | Forwarded to the agent           |
//! | `RUST_LOG`               | `tick_runner=info`     | Tracing filter                   |

use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod agent;
mod config;
mod error;
mod models;
mod notify;
mod parser;
mod prompt;
mod reconcile;
mod store;
mod tick;

use agent::ClaudeCli;
use config::Config;
use notify::Notifier;
use tick::TickRunner;

#[derive(Debug, Parser)]
#[command(name = "tick-runner", version, about = "Run one trading tick through the Claude Code agent")]
struct Cli {
    /// Research and update plan/strategy only; the agent is told not to trade
    #[arg(long)]
    analysis_only: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // ── 1. Load .env ──────────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("tick_runner=info".parse()?))
        .init();

    info!(
        r#"

  ╔═══════════════════════════════════════════════╗
  ║        TICK RUNNER — Claude Code Trader       ║
  ║        state · prompt · agent · Slack         ║
  ╚═══════════════════════════════════════════════╝"#
    );

    // ── 3. Configuration ──────────────────────────────────────────────────────
    let config = Config::from_env();
    info!(
        state_dir = %config.state_dir.display(),
        slack     = config.slack_webhook_url.is_some(),
        disabled  = %config.asset_types.disabled_names().join(", "),
        "⚙️ Configuration loaded"
    );

    // ── 4. Collaborators ──────────────────────────────────────────────────────
    let notifier = Notifier::new(reqwest::Client::new(), &config);
    let agent = ClaudeCli::from_config(&config);

    // ── 5. One tick ───────────────────────────────────────────────────────────
    let outcome = TickRunner::new(&config, &agent, &notifier, cli.analysis_only)
        .run()
        .await;

    Ok(outcome.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flag() {
        assert!(!Cli::parse_from(["tick-runner"]).analysis_only);
        assert!(Cli::parse_from(["tick-runner", "--analysis-only"]).analysis_only);
    }
}
