//! # notify — Slack webhook messages
//!
//! Two payloads in Slack's legacy attachment shape:
//! * **alert** — sent from the failure path only
//! * **summary** — sent after a completed tick
//!
//! Delivery is best-effort.  Without `SLACK_WEBHOOK_URL` both are no-ops, and a
//! failed POST is logged and dropped: it never changes the tick's outcome.

use std::cmp::Ordering;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, FixedOffset};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::models::{ActionEntry, AgentResponse, Position};
use crate::parser::truncate_chars;

pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

const ERROR_LIMIT: usize = 500;
const LAST_ACTION_LIMIT: usize = 200;
const NOTES_LIMIT: usize = 300;
const MAX_TRADE_LINES: usize = 5;
const MAX_TOP_POSITIONS: usize = 3;

// ─── Portfolio totals ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioTotals {
    pub total_value: f64,
    pub total_pl:    f64,
    /// P/L relative to cost basis (`value - pl`); `0.0` when the basis is not positive.
    pub pl_pct:      f64,
}

impl PortfolioTotals {
    pub fn from_positions(positions: &[Position]) -> Self {
        // fold from +0.0: an empty f64 `sum()` is -0.0 and would print as "$-0.00"
        let total_value = positions.iter().fold(0.0, |acc, p| acc + p.market_value);
        let total_pl = positions.iter().fold(0.0, |acc, p| acc + p.unrealized_pl);
        let cost_basis = total_value - total_pl;
        let pl_pct = if cost_basis > 0.0 { total_pl / cost_basis * 100.0 } else { 0.0 };

        Self { total_value, total_pl, pl_pct }
    }

    /// Slack attachment color by P/L sign.
    pub fn color(&self) -> &'static str {
        if self.total_pl > 0.0 {
            "good"
        } else if self.total_pl < 0.0 {
            "danger"
        } else {
            "warning"
        }
    }

    /// `$1000.00 (+$50.00 / +5.3%)`
    pub fn headline(&self) -> String {
        let sign = if self.total_pl >= 0.0 { "+" } else { "" };
        format!(
            "${:.2} ({sign}${:.2} / {sign}{:.1}%)",
            self.total_value, self.total_pl, self.pl_pct
        )
    }
}

// ─── Payloads ─────────────────────────────────────────────────────────────────

pub fn alert_payload(error: &str, tick_time: DateTime<FixedOffset>, last_action: Option<&ActionEntry>) -> Value {
    let last_action = last_action
        .and_then(|entry| serde_json::to_string(entry).ok())
        .map(|raw| truncate_chars(&raw, LAST_ACTION_LIMIT))
        .unwrap_or_else(|| "None".to_string());

    json!({
        "text": ":x: Alpaca Trading Bot Error",
        "attachments": [{
            "color": "danger",
            "fields": [
                {"title": "Error",       "value": truncate_chars(error, ERROR_LIMIT), "short": false},
                {"title": "Tick Time",   "value": tick_time.to_rfc3339(),             "short": true},
                {"title": "Last Action", "value": last_action,                        "short": true},
            ]
        }]
    })
}

fn trades_text(response: &AgentResponse) -> String {
    let lines: Vec<String> = response
        .decisions()
        .iter()
        .filter(|d| d.is_trade())
        .take(MAX_TRADE_LINES)
        .map(|d| d.short_line())
        .collect();

    if lines.is_empty() {
        "No trades executed".to_string()
    } else {
        lines.join("\n")
    }
}

/// Largest absolute unrealized P/L first.
pub fn top_positions(positions: &[Position], count: usize) -> Vec<&Position> {
    let mut sorted: Vec<&Position> = positions.iter().collect();
    sorted.sort_by(|a, b| {
        b.unrealized_pl
            .abs()
            .partial_cmp(&a.unrealized_pl.abs())
            .unwrap_or(Ordering::Equal)
    });
    sorted.truncate(count);
    sorted
}

fn positions_text(positions: &[Position]) -> String {
    let lines: Vec<String> = top_positions(positions, MAX_TOP_POSITIONS)
        .into_iter()
        .map(|p| {
            let sign = if p.unrealized_pl >= 0.0 { "+" } else { "" };
            format!("{}: {sign}${:.2}", p.symbol_or_placeholder(), p.unrealized_pl)
        })
        .collect();

    if lines.is_empty() {
        "No positions".to_string()
    } else {
        lines.join(" | ")
    }
}

pub fn summary_payload(tick_time: DateTime<FixedOffset>, response: &AgentResponse, analysis_only: bool) -> Value {
    let positions = response.positions_snapshot().unwrap_or_default();
    let totals = PortfolioTotals::from_positions(&positions);
    let buying_power = response.buying_power().flatten().unwrap_or(0.0);

    let market_status = if response.market_open() == Some(true) {
        ":chart_with_upwards_trend: Market Open"
    } else {
        ":moon: Market Closed"
    };
    let mode = if analysis_only { " (Analysis Only)" } else { "" };
    let notes = response.notes().unwrap_or_else(|| "No notes".to_string());

    json!({
        "text": format!(":robot_face: Trading Bot Tick Complete{mode}"),
        "attachments": [{
            "color": totals.color(),
            "fields": [
                {"title": "Portfolio",     "value": totals.headline(),                   "short": true},
                {"title": "Buying Power",  "value": format!("${buying_power:.2}"),        "short": true},
                {"title": "Trades",        "value": trades_text(response),               "short": true},
                {"title": "Status",        "value": market_status,                       "short": true},
                {"title": "Top Positions", "value": positions_text(&positions),          "short": false},
                {"title": "Notes",         "value": truncate_chars(&notes, NOTES_LIMIT), "short": false},
            ],
            "footer": format!("Tick: {}", tick_time.to_rfc3339()),
            "ts": tick_time.timestamp(),
        }]
    })
}

// ─── Notifier ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Notifier {
    client:      reqwest::Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self { client, webhook_url: config.slack_webhook_url.clone() }
    }

    pub async fn send_alert(
        &self,
        error: &str,
        tick_time: DateTime<FixedOffset>,
        last_action: Option<&ActionEntry>,
    ) {
        let Some(url) = &self.webhook_url else {
            warn!("No SLACK_WEBHOOK_URL configured, skipping alert");
            return;
        };

        match self.post(url, &alert_payload(error, tick_time, last_action)).await {
            Ok(()) => info!("📣 Slack alert sent"),
            Err(e) => error!(error = %format!("{e:#}"), "Failed to send Slack alert"),
        }
    }

    pub async fn send_summary(
        &self,
        tick_time: DateTime<FixedOffset>,
        response: &AgentResponse,
        analysis_only: bool,
    ) {
        let Some(url) = &self.webhook_url else {
            debug!("No SLACK_WEBHOOK_URL configured, skipping summary");
            return;
        };

        match self.post(url, &summary_payload(tick_time, response, analysis_only)).await {
            Ok(()) => info!("📣 Slack summary sent"),
            Err(e) => error!(error = %format!("{e:#}"), "Failed to send Slack summary"),
        }
    }

    async fn post(&self, url: &str, payload: &Value) -> anyhow::Result<()> {
        let resp = self
            .client
            .post(url)
            .json(payload)
            .timeout(WEBHOOK_TIMEOUT)
            .send()
            .await
            .context("Slack webhook unreachable")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Slack rejected message: HTTP {status}: {body}");
        }

        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
