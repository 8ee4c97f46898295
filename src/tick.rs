//! # tick — one end-to-end run
//!
//! ```text
//! ensure dirs → load state / plan / strategy → build prompt → run agent
//!   → parse → append actions.ndjson → reconcile + save state → Slack summary
//! ```
//!
//! Any `TickError` before the state is saved short-circuits to
//! [`handle_failure`]: append to `errors.ndjson`, best-effort Slack alert,
//! exit code 1.  A response that fails to parse is *not* a failure.

use std::process::ExitCode;

use chrono::{DateTime, FixedOffset, Local};
use tracing::{debug, error, info, warn};

use crate::agent::Agent;
use crate::config::Config;
use crate::error::TickError;
use crate::models::AgentResponse;
use crate::notify::Notifier;
use crate::parser::{parse_response, truncate_chars};
use crate::prompt::{build_prompt, PromptInput};
use crate::reconcile;
use crate::store::StateStore;

/// How the tick ended, as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Includes ticks whose agent output could not be parsed.
    Completed,
    Failed,
}

impl From<TickOutcome> for ExitCode {
    fn from(outcome: TickOutcome) -> Self {
        match outcome {
            TickOutcome::Completed => ExitCode::SUCCESS,
            TickOutcome::Failed    => ExitCode::from(1),
        }
    }
}

/// Per-tick context threaded through every stage.
pub struct TickRunner<'a, A> {
    pub config:        &'a Config,
    pub agent:         &'a A,
    pub notifier:      &'a Notifier,
    pub store:         StateStore,
    pub analysis_only: bool,
    pub tick_time:     DateTime<FixedOffset>,
}

/// Tick timestamp: local wall-clock time, captured once.
pub fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

impl<'a, A: Agent> TickRunner<'a, A> {
    pub fn new(config: &'a Config, agent: &'a A, notifier: &'a Notifier, analysis_only: bool) -> Self {
        Self {
            config,
            agent,
            notifier,
            store: StateStore::new(config),
            analysis_only,
            tick_time: now(),
        }
    }

    pub async fn run(&self) -> TickOutcome {
        info!(
            tick_time     = %self.tick_time.to_rfc3339(),
            analysis_only = self.analysis_only,
            assets        = %self.config.asset_types.enabled_names().join(", "),
            "⏱️ Starting tick..."
        );

        match self.execute().await {
            Ok(response) => {
                self.notifier
                    .send_summary(self.tick_time, &response, self.analysis_only)
                    .await;
                TickOutcome::Completed
            }
            Err(e) => {
                self.handle_failure(&e).await;
                TickOutcome::Failed
            }
        }
    }

    async fn execute(&self) -> Result<AgentResponse, TickError> {
        self.store.ensure_directories().await?;
        let state = self.store.load_or_init_state().await?;
        let plan = self.store.load_or_init_plan().await?;
        let strategy = self.store.load_or_init_strategy().await?;

        let prompt = build_prompt(&PromptInput {
            state:         &state,
            plan:          &plan,
            strategy:      &strategy,
            analysis_only: self.analysis_only,
            asset_types:   self.config.asset_types,
            now:           self.tick_time,
            tz:            &self.config.tz,
        });

        let output = self.agent.run(&prompt).await?;
        debug!(exit_code = ?output.exit_code, stdout_chars = output.stdout.len(), "Agent finished");
        let response = parse_response(&output.stdout);

        self.store.append_action(self.tick_time, &response).await;
        reconcile::apply(&self.store, state, &response, self.tick_time).await?;

        if response.is_parse_error() {
            warn!("⚠️ Could not parse Claude response as JSON");
        }
        log_tick_summary(&response);

        Ok(response)
    }

    /// Top-level failure path.  Never fails itself.
    async fn handle_failure(&self, err: &TickError) {
        error!(error = %err, kind = err.kind(), "❌ Tick failed");

        self.store.append_error(self.tick_time, err).await;

        // Reading state here may fail for the same reason the tick did.
        let last_action = match self.store.read_state().await {
            Ok(state) => state.last_action().cloned(),
            Err(e) => {
                warn!(error = %e, "Could not read state for alert context");
                None
            }
        };

        self.notifier
            .send_alert(&err.to_string(), self.tick_time, last_action.as_ref())
            .await;
    }
}

fn log_tick_summary(response: &AgentResponse) {
    let decisions = response.decisions();
    info!(
        decisions        = response.raw_decisions().len(),
        plan_updated     = response.plan_updated(),
        strategy_updated = response.strategy_updated(),
        "✅ Tick complete"
    );

    for d in &decisions {
        info!(
            action    = %d.action.as_ref().map(|a| a.to_string()).unwrap_or_else(|| "unknown".to_string()),
            symbol    = d.symbol.as_deref().unwrap_or("?"),
            qty       = ?d.qty,
            order     = ?d.order_type,
            limit     = ?d.limit_price,
            reasoning = %truncate_chars(d.reasoning.as_deref().unwrap_or(""), 50),
            "  decision"
        );
    }

    if let Some(notes) = response.notes().filter(|n| !n.is_empty()) {
        info!(notes = %truncate_chars(&notes, 100), "  notes");
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
