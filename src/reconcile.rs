//! # reconcile — fold the agent's response into the persisted state
//!
//! One pure merge function per top-level key, so the retain-vs-replace rule
//! for each field can be checked on its own:
//!
//! | key                  | rule                                              |
//! |----------------------|---------------------------------------------------|
//! | `last_tick_iso`      | always set to the tick time                       |
//! | `positions_snapshot` | replaced wholesale if the key is present          |
//! | `buying_power`       | replaced if the key is present (`null` included)  |
//! | `actions_history`    | one entry appended, then trimmed to the newest 50 |
//! | `notes`              | untouched (operator-owned)                        |
//! | any other key        | untouched                                         |

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::error::TickError;
use crate::models::{ActionEntry, AgentResponse, Position, TickState, HISTORY_LIMIT};
use crate::store::StateStore;

pub fn merge_positions(old: Vec<Position>, reported: Option<Vec<Position>>) -> Vec<Position> {
    reported.unwrap_or(old)
}

pub fn merge_buying_power(old: Option<f64>, reported: Option<Option<f64>>) -> Option<f64> {
    reported.unwrap_or(old)
}

/// Appends `entry` and drops the oldest rows beyond [`HISTORY_LIMIT`].
pub fn append_history(mut history: Vec<ActionEntry>, entry: ActionEntry) -> Vec<ActionEntry> {
    history.push(entry);
    if history.len() > HISTORY_LIMIT {
        let excess = history.len() - HISTORY_LIMIT;
        history.drain(..excess);
    }
    history
}

pub fn action_entry(response: &AgentResponse, tick_time: DateTime<FixedOffset>) -> ActionEntry {
    ActionEntry {
        timestamp:   tick_time,
        decisions:   response.raw_decisions(),
        market_open: response.market_open(),
        notes:       response.notes().unwrap_or_default(),
    }
}

pub fn reconcile(old: TickState, response: &AgentResponse, tick_time: DateTime<FixedOffset>) -> TickState {
    TickState {
        last_tick_timestamp: Some(tick_time),
        positions_snapshot:  merge_positions(old.positions_snapshot, response.positions_snapshot()),
        buying_power:        merge_buying_power(old.buying_power, response.buying_power()),
        actions_history:     append_history(old.actions_history, action_entry(response, tick_time)),
        notes:               old.notes,
        extra:               old.extra,
    }
}

/// Reconcile and write the result as the new `state.json`.
pub async fn apply(
    store: &StateStore,
    old: TickState,
    response: &AgentResponse,
    tick_time: DateTime<FixedOffset>,
) -> Result<TickState, TickError> {
    let state = reconcile(old, response, tick_time);
    store.save_state(&state).await?;
    debug!(
        path      = %store.state_path().display(),
        history   = state.actions_history.len(),
        positions = state.positions_snapshot.len(),
        "State reconciled"
    );
    Ok(state)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn tick_time() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-01-06T10:15:00-05:00").unwrap()
    }

    fn response(value: Value) -> AgentResponse {
        match value {
            Value::Object(map) => AgentResponse::from(map),
            other => panic!("not an object: {other}"),
        }
    }

    fn position(symbol: &str, value: f64, pl: f64) -> Position {
        Position {
            symbol:        Some(symbol.to_string()),
            quantity:      1.0,
            market_value:  value,
            unrealized_pl: pl,
            ..Default::default()
        }
    }

    fn entry(notes: &str) -> ActionEntry {
        ActionEntry { timestamp: tick_time(), decisions: vec![], market_open: None, notes: notes.into() }
    }

    fn seeded_state() -> TickState {
        TickState {
            positions_snapshot: vec![position("NVDA", 1000.0, 50.0)],
            buying_power: Some(5000.0),
            notes: "operator".into(),
            ..TickState::default()
        }
    }

    #[test]
    fn test_history_stays_capped_at_fifty() {
        let history: Vec<ActionEntry> = (0..50).map(|i| entry(&format!("old-{i}"))).collect();
        let history = append_history(history, entry("new"));
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].notes, "old-1");
        assert_eq!(history[49].notes, "new");
    }

    #[test]
    fn test_history_below_cap_just_appends() {
        let history = append_history(vec![entry("a")], entry("b"));
        assert_eq!(history.iter().map(|e| e.notes.as_str()).collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn test_absent_keys_retain_prior_values() {
        let old = seeded_state();
        let new = reconcile(old.clone(), &response(json!({"decisions": []})), tick_time());
        assert_eq!(new.positions_snapshot, old.positions_snapshot);
        assert_eq!(new.buying_power, Some(5000.0));
        assert_eq!(new.notes, "operator");
        assert_eq!(new.last_tick_timestamp, Some(tick_time()));
    }

    #[test]
    fn test_operator_keys_pass_through() {
        let mut old = seeded_state();
        old.extra.insert("watchlist".into(), json!(["AAPL", "MSFT"]));

        let new = reconcile(old, &response(json!({"positions_snapshot": [], "notes": "agent"})), tick_time());
        assert_eq!(new.extra.get("watchlist"), Some(&json!(["AAPL", "MSFT"])));
        assert_eq!(new.notes, "operator");
    }

    #[test]
    fn test_explicit_empty_positions_overwrite() {
        let new = reconcile(seeded_state(), &response(json!({"positions_snapshot": []})), tick_time());
        assert!(new.positions_snapshot.is_empty());
    }

    #[test]
    fn test_explicit_null_overwrites() {
        let new = reconcile(
            seeded_state(),
            &response(json!({"positions_snapshot": null, "buying_power": null})),
            tick_time(),
        );
        assert!(new.positions_snapshot.is_empty());
        assert_eq!(new.buying_power, None);
    }

    #[test]
    fn test_reported_values_replace_wholesale() {
        let new = reconcile(
            seeded_state(),
            &response(json!({
                "positions_snapshot": [{"symbol": "TSLA", "qty": 3, "market_value": 750, "unrealized_pl": -20}],
                "buying_power": 4200.5
            })),
            tick_time(),
        );
        assert_eq!(new.positions_snapshot.len(), 1);
        assert_eq!(new.positions_snapshot[0].symbol.as_deref(), Some("TSLA"));
        assert_eq!(new.buying_power, Some(4200.5));
    }

    #[test]
    fn test_action_entry_defaults() {
        let e = action_entry(&response(json!({})), tick_time());
        assert!(e.decisions.is_empty());
        assert_eq!(e.market_open, None);
        assert_eq!(e.notes, "");

        let e = action_entry(
            &response(json!({"decisions": [{"action": "buy", "symbol": "AAPL"}], "market_open": true, "notes": "bought"})),
            tick_time(),
        );
        assert_eq!(e.decisions, vec![json!({"action": "buy", "symbol": "AAPL"})]);
        assert_eq!(e.market_open, Some(true));
        assert_eq!(e.notes, "bought");
    }

    #[test]
    fn test_fallback_response_still_records_tick() {
        let resp = AgentResponse::fallback("Could not parse JSON from response", "...");
        let new = reconcile(seeded_state(), &resp, tick_time());
        assert_eq!(new.actions_history.len(), 1);
        assert_eq!(new.actions_history[0].notes, "Could not parse JSON from response");
        assert_eq!(new.buying_power, Some(5000.0));
    }
}
