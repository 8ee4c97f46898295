//! # store — files under `STATE_DIR`
//!
//! ```text
//! STATE_DIR/
//!   state.json          TickState, whole-file overwrite once per tick
//!   plan.md             free text, seeded once, then owned by agent + operator
//!   strategy.md         free text, seeded once, then owned by agent + operator
//!   logs/actions.ndjson one line per tick: {"ts", ...parsed response}
//!   logs/errors.ndjson  one line per failed tick: {"ts", "error", "type"}
//! ```
//!
//! Every initializer is idempotent: an existing file is returned verbatim and
//! never rewritten.  A `state.json` that fails to decode is a hard error.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::TickError;
use crate::models::{AgentResponse, TickState};

pub const PLAN_TEMPLATE: &str = r#"# Trading Plan

## Current Objectives
- Evaluate market conditions each tick
- Look for news-driven opportunities
- Manage existing positions

## Recent Observations
(Bot will update this section)

## Next Actions
(Bot will update this section)
"#;

pub const STRATEGY_TEMPLATE: &str = r#"# Trading Strategy

## Approach
- Event-driven trading focused on news catalysts
- Monitor political developments (executive orders, policy changes, key tweets)
- Look for asymmetric risk/reward setups
- React quickly to market-moving news

## Current Market Context
- High volatility environment due to political uncertainty
- Policy changes can cause rapid sector rotations
- Social media (especially tweets from key figures) can move markets

## Position Management
- No fixed position count limit
- Size positions based on conviction and volatility
- Consider correlation between positions
- Manage overall portfolio heat, not individual position limits

## Decision Framework
1. What is the catalyst? (news, earnings, policy, sentiment shift)
2. What is the expected move? (direction, magnitude, timeframe)
3. What invalidates the thesis?
4. Risk/reward ratio assessment

## Entry Criteria
- Clear catalyst identified
- Favorable risk/reward (target > 2:1 when possible)
- Sufficient liquidity
- Not chasing extended moves

## Exit Criteria
- Target reached
- Thesis invalidated
- Better opportunity elsewhere
- Risk management (trailing stops, time stops)

## Evolution Log
This strategy will evolve based on what works. Document learnings below:

---
(Bot will append learnings here)
"#;

// ─── StateStore ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StateStore {
    state_dir:   PathBuf,
    log_dir:     PathBuf,
    state_json:  PathBuf,
    plan_md:     PathBuf,
    strategy_md: PathBuf,
    actions_log: PathBuf,
    errors_log:  PathBuf,
}

impl StateStore {
    pub fn new(config: &Config) -> Self {
        Self {
            state_dir:   config.state_dir.clone(),
            log_dir:     config.log_dir(),
            state_json:  config.state_json(),
            plan_md:     config.plan_md(),
            strategy_md: config.strategy_md(),
            actions_log: config.actions_log(),
            errors_log:  config.errors_log(),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_json
    }

    /// `mkdir -p` for the state and log directories.
    pub async fn ensure_directories(&self) -> Result<(), TickError> {
        for dir in [&self.state_dir, &self.log_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| TickError::io(dir, e))?;
        }
        Ok(())
    }

    /// Loads `state.json`, writing the default skeleton first if it is absent.
    pub async fn load_or_init_state(&self) -> Result<TickState, TickError> {
        if !exists(&self.state_json).await? {
            info!(path = %self.state_json.display(), "📄 No state file — writing initial state");
            self.save_state(&TickState::default()).await?;
        }
        self.read_state().await
    }

    /// Reads `state.json` without initializing anything.
    pub async fn read_state(&self) -> Result<TickState, TickError> {
        let raw = tokio::fs::read_to_string(&self.state_json)
            .await
            .map_err(|e| TickError::io(&self.state_json, e))?;
        serde_json::from_str(&raw).map_err(|source| TickError::StateDecode {
            path: self.state_json.clone(),
            source,
        })
    }

    pub async fn load_or_init_plan(&self) -> Result<String, TickError> {
        load_or_init_text(&self.plan_md, PLAN_TEMPLATE).await
    }

    pub async fn load_or_init_strategy(&self) -> Result<String, TickError> {
        load_or_init_text(&self.strategy_md, STRATEGY_TEMPLATE).await
    }

    /// Writes `state.json` via a sibling temp file and a rename, so a reader
    /// sees either the old record or the new one, never a partial write.
    pub async fn save_state(&self, state: &TickState) -> Result<(), TickError> {
        let body = serde_json::to_string_pretty(state).map_err(TickError::StateEncode)?;
        let tmp = self.state_json.with_extension("json.tmp");

        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| TickError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.state_json)
            .await
            .map_err(|e| TickError::io(&self.state_json, e))?;

        debug!(path = %self.state_json.display(), "State saved");
        Ok(())
    }

    // ─── Append-only logs ─────────────────────────────────────────────────────

    /// `{"ts": ..., <every key of the response>}` to `actions.ndjson`.
    pub async fn append_action(&self, tick_time: DateTime<FixedOffset>, response: &AgentResponse) {
        append_line(&self.actions_log, &action_line(tick_time, response)).await;
    }

    /// `{"ts", "error", "type"}` to `errors.ndjson`.
    pub async fn append_error(&self, tick_time: DateTime<FixedOffset>, error: &TickError) {
        let line = json!({
            "ts":    tick_time.to_rfc3339(),
            "error": error.to_string(),
            "type":  error.kind(),
        });
        append_line(&self.errors_log, &line).await;
    }
}

pub fn action_line(tick_time: DateTime<FixedOffset>, response: &AgentResponse) -> Value {
    let mut line = serde_json::Map::new();
    line.insert("ts".into(), Value::String(tick_time.to_rfc3339()));
    for (key, value) in response.as_map() {
        line.insert(key.clone(), value.clone());
    }
    Value::Object(line)
}

async fn exists(path: &Path) -> Result<bool, TickError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| TickError::io(path, e))
}

async fn load_or_init_text(path: &Path, template: &str) -> Result<String, TickError> {
    if !exists(path).await? {
        info!(path = %path.display(), "📄 Seeding from template");
        tokio::fs::write(path, template)
            .await
            .map_err(|e| TickError::io(path, e))?;
    }
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| TickError::io(path, e))
}

/// Log lines are an audit trail, not part of the tick's outcome: a failed
/// append is reported and otherwise ignored.
async fn append_line(path: &Path, line: &Value) {
    let result = async {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Log append failed");
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
