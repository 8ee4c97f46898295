//! # config — read Config from Environment Variables
//!
//! Everything is resolved once at tick start into a [`Config`] value that is
//! passed down the pipeline.  Nothing downstream touches `std::env`.

use std::path::PathBuf;

const DEFAULT_STATE_DIR: &str = "/data/alpaca-bot";
const DEFAULT_TZ: &str = "America/New_York";
const DEFAULT_AGENT_BIN: &str = "claude";
const DEFAULT_MCP_CONFIG: &str = "/app/mcp-config.json";
const DEFAULT_AGENT_WORKDIR: &str = "/app";

/// Values that switch a trading toggle off.  Anything else that is set,
/// including an empty string, switches it on.
// NOTE: fail-open. A typo such as ENABLE_OPTIONS_TRADING=flase enables
// options trading. Candidate for a strict allow-list.
const FALSY_TOKENS: [&str; 4] = ["false", "0", "no", "off"];

// ─── Asset Types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetType {
    Stocks,
    Crypto,
    Options,
}

impl AssetType {
    pub const ALL: [AssetType; 3] = [AssetType::Stocks, AssetType::Crypto, AssetType::Options];

    pub fn name(self) -> &'static str {
        match self {
            AssetType::Stocks  => "stocks",
            AssetType::Crypto  => "crypto",
            AssetType::Options => "options",
        }
    }
}

/// Which asset classes the agent may trade this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetTypeConfig {
    pub stocks:  bool,
    pub crypto:  bool,
    pub options: bool,
}

impl Default for AssetTypeConfig {
    fn default() -> Self {
        Self { stocks: true, crypto: false, options: false }
    }
}

impl AssetTypeConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            stocks:  is_enabled(lookup("ENABLE_STOCK_TRADING"), defaults.stocks),
            crypto:  is_enabled(lookup("ENABLE_CRYPTO_TRADING"), defaults.crypto),
            options: is_enabled(lookup("ENABLE_OPTIONS_TRADING"), defaults.options),
        }
    }

    pub fn is_enabled(&self, asset: AssetType) -> bool {
        match asset {
            AssetType::Stocks  => self.stocks,
            AssetType::Crypto  => self.crypto,
            AssetType::Options => self.options,
        }
    }

    pub fn enabled_names(&self) -> Vec<&'static str> {
        AssetType::ALL.into_iter().filter(|a| self.is_enabled(*a)).map(AssetType::name).collect()
    }

    pub fn disabled_names(&self) -> Vec<&'static str> {
        AssetType::ALL.into_iter().filter(|a| !self.is_enabled(*a)).map(AssetType::name).collect()
    }
}

/// Missing ⇒ `default`; present ⇒ enabled unless it is one of [`FALSY_TOKENS`].
pub fn is_enabled(value: Option<String>, default: bool) -> bool {
    match value {
        None => default,
        Some(v) => !FALSY_TOKENS.contains(&v.to_lowercase().as_str()),
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────

/// Everything one tick needs, resolved up front.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for state.json, plan.md, strategy.md and logs/
    pub state_dir:         PathBuf,
    /// Slack incoming webhook; `None` disables notifications
    pub slack_webhook_url: Option<String>,
    /// Timezone label shown to the agent next to the current time
    pub tz:                String,
    pub asset_types:       AssetTypeConfig,
    /// Agent CLI executable
    pub agent_bin:         String,
    /// MCP server config, attached only if the file exists
    pub mcp_config:        PathBuf,
    /// Working directory for the agent, used only if it exists
    pub agent_workdir:     PathBuf,
    /// Forwarded to the agent as ANTHROPIC_API_KEY
    pub anthropic_api_key: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let state_dir = lookup("STATE_DIR").unwrap_or_else(|| DEFAULT_STATE_DIR.to_string());

        Self {
            state_dir:         PathBuf::from(state_dir),
            slack_webhook_url: lookup("SLACK_WEBHOOK_URL").filter(|url| !url.trim().is_empty()),
            tz:                lookup("TZ").unwrap_or_else(|| DEFAULT_TZ.to_string()),
            asset_types:       AssetTypeConfig::from_lookup(&lookup),
            agent_bin:         lookup("CLAUDE_BIN").unwrap_or_else(|| DEFAULT_AGENT_BIN.to_string()),
            mcp_config:        lookup("MCP_CONFIG").unwrap_or_else(|| DEFAULT_MCP_CONFIG.to_string()).into(),
            agent_workdir:     lookup("AGENT_WORKDIR").unwrap_or_else(|| DEFAULT_AGENT_WORKDIR.to_string()).into(),
            anthropic_api_key: lookup("ANTHROPIC_API_KEY").unwrap_or_default(),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    pub fn state_json(&self) -> PathBuf {
        self.state_dir.join("state.json")
    }

    pub fn plan_md(&self) -> PathBuf {
        self.state_dir.join("plan.md")
    }

    pub fn strategy_md(&self) -> PathBuf {
        self.state_dir.join("strategy.md")
    }

    pub fn actions_log(&self) -> PathBuf {
        self.log_dir().join("actions.ndjson")
    }

    pub fn errors_log(&self) -> PathBuf {
        self.log_dir().join("errors.ndjson")
    }

    /// Test helper: defaults rooted at `dir`, notifications off.
    #[cfg(test)]
    pub fn for_dir(dir: &std::path::Path) -> Self {
        let dir = dir.to_string_lossy().into_owned();
        Self::from_lookup(move |key| (key == "STATE_DIR").then(|| dir.clone()))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
