//! # models::state
//!
//! Defines [`TickState`], the record persisted to `state.json` between ticks,
//! plus the [`Position`] and [`ActionEntry`] rows it carries.
//!
//! The JSON keys (`last_tick_iso`, `ts`, `qty`) are what the agent sees in the
//! prompt and what existing state files already contain, so the Rust field
//! names are mapped onto them rather than the other way round.  Scalars are
//! decoded leniently and unknown top-level keys are kept, so a file edited by
//! hand or written by the old script never takes the bot down.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

/// Maximum number of [`ActionEntry`] rows kept in `actions_history`.
pub const HISTORY_LIMIT: usize = 50;

pub const INITIAL_NOTES: &str = "Initial state. Human can add notes here.";

// ─── TickState ────────────────────────────────────────────────────────────────

/// Whole-file record.  Read once at tick start, overwritten once at tick end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickState {
    /// When the last completed tick started.  `null` before the first one.
    #[serde(rename = "last_tick_iso", default, with = "timestamp::option")]
    pub last_tick_timestamp: Option<DateTime<FixedOffset>>,

    /// Account positions as last reported by the agent.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub positions_snapshot: Vec<Position>,

    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub buying_power: Option<f64>,

    /// Oldest first, at most [`HISTORY_LIMIT`] entries.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub actions_history: Vec<ActionEntry>,

    /// Free text shared by the operator and the agent.
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub notes: String,

    /// Keys added by hand; written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for TickState {
    fn default() -> Self {
        Self {
            last_tick_timestamp: None,
            positions_snapshot:  Vec::new(),
            buying_power:        None,
            actions_history:     Vec::new(),
            notes:               INITIAL_NOTES.to_string(),
            extra:               Map::new(),
        }
    }
}

impl TickState {
    /// The newest `count` history entries, oldest first.
    pub fn recent_actions(&self, count: usize) -> &[ActionEntry] {
        let start = self.actions_history.len().saturating_sub(count);
        &self.actions_history[start..]
    }

    pub fn last_action(&self) -> Option<&ActionEntry> {
        self.actions_history.last()
    }
}

// ─── Position ─────────────────────────────────────────────────────────────────

/// One holding as reported by the agent.
///
/// Numeric fields decode leniently; unknown keys are carried through untouched
/// so nothing the agent reported is lost on the next write.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub symbol: Option<String>,
    #[serde(rename = "qty", default, deserialize_with = "lenient::f64_or_zero")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub market_value: f64,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub unrealized_pl: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Position {
    pub fn symbol_or_placeholder(&self) -> &str {
        self.symbol.as_deref().unwrap_or("?")
    }
}

// ─── ActionEntry ──────────────────────────────────────────────────────────────

/// Compact audit row appended to `actions_history` once per tick.
///
/// `decisions` keeps the agent's objects verbatim; the full raw response goes
/// to `actions.ndjson` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry {
    #[serde(rename = "ts", with = "timestamp")]
    pub timestamp: DateTime<FixedOffset>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub decisions: Vec<Value>,
    /// `None` when the agent did not say.
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub market_open: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub notes: String,
}

// ─── Timestamp encoding ───────────────────────────────────────────────────────

/// RFC 3339 on write.  On read, offset-less ISO timestamps (as written by the
/// previous cron script) are accepted and interpreted in local time.
pub mod timestamp {
    use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<FixedOffset>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts);
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        Local.from_local_datetime(&naive).earliest().map(|ts| ts.fixed_offset())
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<FixedOffset>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    pub mod option {
        use chrono::{DateTime, FixedOffset};
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            ts: &Option<DateTime<FixedOffset>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => super::serialize(ts, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<FixedOffset>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                None => Ok(None),
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'"))),
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
