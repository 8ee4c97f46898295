//! # models::response
//!
//! What the agent hands back at the end of a tick.
//!
//! [`AgentResponse`] wraps the decoded JSON object as-is: the prompt asks for
//! a fixed set of keys, but nothing is validated beyond "it is an object".
//! Every accessor has a default so a missing key never fails a tick, and the
//! replace-if-present accessors report key *presence* separately from value.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{lenient, Position};

// ─── Decision ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum DecisionAction {
    Buy,
    Sell,
    Close,
    None,
    /// Anything else the agent came up with, kept for the log line.
    Other(String),
}

impl From<String> for DecisionAction {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "buy"   => DecisionAction::Buy,
            "sell"  => DecisionAction::Sell,
            "close" => DecisionAction::Close,
            "none"  => DecisionAction::None,
            _       => DecisionAction::Other(raw),
        }
    }
}

impl From<DecisionAction> for String {
    fn from(action: DecisionAction) -> Self {
        match action {
            DecisionAction::Buy      => "buy".to_string(),
            DecisionAction::Sell     => "sell".to_string(),
            DecisionAction::Close    => "close".to_string(),
            DecisionAction::None     => "none".to_string(),
            DecisionAction::Other(s) => s,
        }
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionAction::Other(s) => write!(f, "{s}"),
            other => write!(f, "{}", String::from(other.clone())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// One trading decision reported by the agent.  Logged, never persisted as a
/// typed value.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Decision {
    #[serde(default)]
    pub action: Option<DecisionAction>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub qty: Option<f64>,
    #[serde(rename = "type", default, deserialize_with = "order_type")]
    pub order_type: Option<OrderType>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub limit_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub reasoning: Option<String>,
}

fn order_type<'de, D>(deserializer: D) -> Result<Option<OrderType>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

impl Decision {
    /// `true` for anything other than `none` or a missing action.
    pub fn is_trade(&self) -> bool {
        !matches!(self.action, None | Some(DecisionAction::None))
    }

    /// `BUY 10x NVDA`
    pub fn short_line(&self) -> String {
        let action = self
            .action
            .as_ref()
            .map(|a| a.to_string().to_uppercase())
            .unwrap_or_else(|| "?".to_string());
        let qty = self.qty.map(|q| q.to_string()).unwrap_or_else(|| "?".to_string());
        format!("{action} {qty}x {}", self.symbol.as_deref().unwrap_or("?"))
    }
}

// ─── AgentResponse ────────────────────────────────────────────────────────────

/// Decoded agent output, or the fallback object when decoding failed.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct AgentResponse(Map<String, Value>);

impl From<Map<String, Value>> for AgentResponse {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl AgentResponse {
    /// Stand-in used when no JSON object could be recovered from the output.
    pub fn fallback(note: impl Into<String>, raw_output: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("decisions".into(), Value::Array(Vec::new()));
        map.insert("notes".into(), Value::String(note.into()));
        map.insert("raw_output".into(), Value::String(raw_output.into()));
        map.insert("parse_error".into(), Value::Bool(true));
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_parse_error(&self) -> bool {
        self.0.get("parse_error").and_then(Value::as_bool).unwrap_or(false)
    }

    /// `decisions` exactly as the agent wrote them; empty if absent or not a list.
    pub fn raw_decisions(&self) -> Vec<Value> {
        match self.0.get("decisions") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Decisions that decode as objects; anything else is skipped.
    pub fn decisions(&self) -> Vec<Decision> {
        self.raw_decisions()
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()
    }

    /// `None` when the key is absent.  `null` or a non-list reads as an
    /// explicit empty snapshot; list items that are not objects are dropped.
    pub fn positions_snapshot(&self) -> Option<Vec<Position>> {
        let value = self.0.get("positions_snapshot")?;
        let positions = match value {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        };
        Some(positions)
    }

    /// `None` when the key is absent; `Some(None)` for an explicit `null`.
    pub fn buying_power(&self) -> Option<Option<f64>> {
        self.0.get("buying_power").map(lenient::as_f64)
    }

    pub fn market_open(&self) -> Option<bool> {
        self.0.get("market_open").and_then(lenient::as_bool)
    }

    pub fn notes(&self) -> Option<String> {
        self.0.get("notes").and_then(lenient::as_text)
    }

    pub fn plan_updated(&self) -> bool {
        self.0.get("plan_updated").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn strategy_updated(&self) -> bool {
        self.0.get("strategy_updated").and_then(Value::as_bool).unwrap_or(false)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> AgentResponse {
        match value {
            Value::Object(map) => AgentResponse::from(map),
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_decision_decodes_prompt_shape() {
        let resp = response(json!({
            "decisions": [
                {"action": "buy", "symbol": "NVDA", "qty": 10, "type": "limit", "limit_price": 131.5, "reasoning": "earnings beat"},
                {"action": "NONE", "symbol": null, "qty": null, "type": "market", "limit_price": null, "reasoning": "nothing"},
                "not an object"
            ]
        }));

        let decisions = resp.decisions();
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].action, Some(DecisionAction::Buy));
        assert_eq!(decisions[0].order_type, Some(OrderType::Limit));
        assert_eq!(decisions[0].limit_price, Some(131.5));
        assert!(decisions[0].is_trade());
        assert_eq!(decisions[1].action, Some(DecisionAction::None));
        assert!(!decisions[1].is_trade());
        assert_eq!(resp.raw_decisions().len(), 3);
    }

    #[test]
    fn test_unknown_order_type_does_not_drop_decision() {
        let resp = response(json!({"decisions": [{"action": "sell", "symbol": "TSLA", "qty": "5", "type": "stop"}]}));
        let d = &resp.decisions()[0];
        assert_eq!(d.order_type, None);
        assert_eq!(d.qty, Some(5.0));
        assert_eq!(d.short_line(), "SELL 5x TSLA");
    }

    #[test]
    fn test_short_line_placeholders() {
        let d = Decision { action: Some(DecisionAction::Close), ..Default::default() };
        assert_eq!(d.short_line(), "CLOSE ?x ?");
        let d = Decision { action: Some(DecisionAction::from("Hold".to_string())), qty: Some(0.5), symbol: Some("BTC/USD".into()), ..Default::default() };
        assert_eq!(d.short_line(), "HOLD 0.5x BTC/USD");
    }

    #[test]
    fn test_presence_is_distinct_from_value() {
        let resp = response(json!({"notes": "x"}));
        assert_eq!(resp.positions_snapshot(), None);
        assert_eq!(resp.buying_power(), None);

        let resp = response(json!({"positions_snapshot": null, "buying_power": null}));
        assert_eq!(resp.positions_snapshot(), Some(vec![]));
        assert_eq!(resp.buying_power(), Some(None));

        let resp = response(json!({"positions_snapshot": [{"symbol": "AAPL", "qty": 1, "market_value": 200, "unrealized_pl": 3}], "buying_power": 500.25}));
        assert_eq!(resp.positions_snapshot().unwrap()[0].market_value, 200.0);
        assert_eq!(resp.buying_power(), Some(Some(500.25)));
    }

    #[test]
    fn test_fallback_shape() {
        let resp = AgentResponse::fallback("Could not parse JSON from response", "raw");
        assert!(resp.is_parse_error());
        assert!(resp.decisions().is_empty());
        assert_eq!(resp.notes().as_deref(), Some("Could not parse JSON from response"));
        assert_eq!(resp.as_map()["raw_output"], json!("raw"));
    }

    #[test]
    fn test_flags_default_to_false() {
        let resp = response(json!({"plan_updated": true}));
        assert!(resp.plan_updated());
        assert!(!resp.strategy_updated());
        assert_eq!(resp.market_open(), None);
    }
}
