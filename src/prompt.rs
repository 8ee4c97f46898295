//! # prompt — build the instruction text handed to the agent
//!
//! The prompt is the only control channel into the agent: the phase list,
//! tool names and the JSON output contract at the bottom are what the agent
//! (and the MCP tools it drives) key off.  Treat wording changes here as
//! interface changes.

use chrono::{DateTime, FixedOffset};

use crate::config::{AssetType, AssetTypeConfig};
use crate::models::TickState;

/// How many history entries are quoted back to the agent.
pub const RECENT_ACTIONS: usize = 10;

/// Number of the first PHASE 5 step; phases 1–4 use 1..=12.
pub const EXECUTION_STEP_BASE: usize = 13;

const ANALYSIS_ONLY_BLOCK: &str = r#"
NOTE: This is an ANALYSIS-ONLY tick (market is likely closed).
- Do NOT place any orders
- Review positions and P/L
- Update plan.md with observations
- Prepare for next trading session
"#;

const CLOSING_STEPS: [&str; 3] = [
    "Use market orders for Tier 1 urgency, limit orders otherwise",
    "Update plan.md with your observations and next actions",
    "If your approach evolves, update strategy.md (append to Evolution Log)",
];

/// Everything the prompt is assembled from.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub state:         &'a TickState,
    pub plan:          &'a str,
    pub strategy:      &'a str,
    pub analysis_only: bool,
    pub asset_types:   AssetTypeConfig,
    pub now:           DateTime<FixedOffset>,
    pub tz:            &'a str,
}

// ─── Asset type section ───────────────────────────────────────────────────────

fn permission_line(asset: AssetType, enabled: bool) -> &'static str {
    match (asset, enabled) {
        (AssetType::Stocks, true)   => "- STOCKS: You may use place_stock_order and stock data tools.",
        (AssetType::Stocks, false)  => "- STOCKS: DO NOT use place_stock_order or any stock trading tools.",
        (AssetType::Crypto, true)   => "- CRYPTO: You may use place_crypto_order. Crypto trades 24/7.",
        (AssetType::Crypto, false)  => "- CRYPTO: DO NOT use place_crypto_order or any crypto trading tools.",
        (AssetType::Options, true)  => "- OPTIONS: You may use place_option_market_order and options tools.",
        (AssetType::Options, false) => "- OPTIONS: DO NOT use place_option_market_order or any options tools.",
    }
}

fn execution_step(asset: AssetType) -> &'static str {
    match asset {
        AssetType::Stocks  => "STOCKS: Execute trades using place_stock_order when you have conviction",
        AssetType::Crypto  => "CRYPTO: Execute trades using place_crypto_order - crypto trades 24/7",
        AssetType::Options => "OPTIONS: Execute trades using place_option_market_order with proper sizing",
    }
}

fn name_list(names: &[&str]) -> String {
    if names.is_empty() {
        "None".to_string()
    } else {
        names.join(", ")
    }
}

pub fn asset_type_section(assets: &AssetTypeConfig) -> String {
    let mut lines = vec![
        "ASSET TYPE CONFIGURATION:".to_string(),
        format!("- ENABLED: {}", name_list(&assets.enabled_names())),
        format!("- DISABLED: {}", name_list(&assets.disabled_names())),
        String::new(),
        "CRITICAL: You may ONLY trade the enabled asset types listed above.".to_string(),
        String::new(),
    ];
    lines.extend(
        AssetType::ALL
            .into_iter()
            .map(|asset| permission_line(asset, assets.is_enabled(asset)).to_string()),
    );
    lines.join("\n")
}

/// PHASE 5 lines: one per enabled asset class (stocks, crypto, options), then
/// the fixed closing steps, numbered contiguously from [`EXECUTION_STEP_BASE`].
pub fn execution_steps(assets: &AssetTypeConfig) -> String {
    AssetType::ALL
        .into_iter()
        .filter(|asset| assets.is_enabled(*asset))
        .map(execution_step)
        .chain(CLOSING_STEPS)
        .enumerate()
        .map(|(i, step)| format!("{}. {step}", EXECUTION_STEP_BASE + i))
        .collect::<Vec<_>>()
        .join("\n")
}

// ─── Prompt ───────────────────────────────────────────────────────────────────

pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let state_json = serde_json::to_string_pretty(input.state)
        .unwrap_or_else(|_| "{}".to_string());
    let recent_json = serde_json::to_string_pretty(input.state.recent_actions(RECENT_ACTIONS))
        .unwrap_or_else(|_| "[]".to_string());

    let now = input.now.to_rfc3339();
    let tz = input.tz;
    let plan = input.plan;
    let strategy = input.strategy;
    let mode_instruction = if input.analysis_only { ANALYSIS_ONLY_BLOCK } else { "" };
    let asset_instruction = asset_type_section(&input.asset_types);
    let execution_instructions = execution_steps(&input.asset_types);

    format!(r#"CURRENT STATE:
{state_json}

TRADING PLAN:
{plan}

STRATEGY:
{strategy}

RECENT ACTIONS (last {RECENT_ACTIONS}):
{recent_json}

CURRENT TIME: {now} ({tz})
{mode_instruction}

{asset_instruction}

INSTRUCTIONS:
You are an autonomous trading bot with full control of this Alpaca account.

**PHASE 1: Market & Account Status**
1. Call get_market_clock to check if market is open
2. Call get_account_info and get_positions to understand current state

**PHASE 2: News Gathering (POLYGON MCP)**
3. For EACH position you hold, call list_ticker_news to check for news
4. Check news for watchlist tickers: AAPL, MSFT, NVDA, TSLA, COIN, MARA
5. Check sector ETF news: SPY, QQQ, XLF, XLE, XLK for macro moves
6. Pay attention to news timestamps - prioritize news < 4 hours old

**PHASE 3: Twitter/Social Monitoring (WebSearch Primary, Twitter API Sparingly)**
7. PRIMARY - Use WebSearch (no rate limits):
   - Search "Trump tweet today site:twitter.com" for recent Trump posts
   - Search "Elon Musk tweet today site:twitter.com" for Musk posts
   - Search "TICKER twitter" for sentiment on stocks you're considering
8. SPARINGLY - Use Twitter MCP search_tweets only for breaking news:
   - Free tier = ~100 reads/month, save for urgent situations
   - Only use if WebSearch finds something market-moving that needs verification
9. Tweets from Trump/Musk within last 2 hours = potential Tier 1 catalyst
10. Look for: tariffs, regulations, Fed comments, company mentions, crypto

**PHASE 4: Analysis & Decision**
10. Score each news/tweet per the strategy (-3 to +3 sentiment)
11. Identify Tier 1/2/3 catalysts per the strategy
12. Apply the decision framework: Catalyst, Magnitude, Timeframe, Invalidation, R/R

**PHASE 5: Execution**
{execution_instructions}

If market is closed, perform analysis only - do not place orders. Still gather news and update plan.

After completing your analysis and any trades, respond with a JSON block in this format:
```json
{{
  "decisions": [
    {{"action": "buy|sell|close|none", "symbol": "TICKER", "qty": 10, "type": "market|limit", "limit_price": null, "reasoning": "why"}}
  ],
  "positions_snapshot": [
    {{"symbol": "TICKER", "qty": 10, "market_value": 1000.00, "unrealized_pl": 50.00}}
  ],
  "buying_power": 10000.00,
  "market_open": true,
  "notes": "brief summary of this tick",
  "plan_updated": false,
  "strategy_updated": false
}}
```
"#)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionEntry;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-01-06T10:15:00-05:00").unwrap()
    }

    fn assets(stocks: bool, crypto: bool, options: bool) -> AssetTypeConfig {
        AssetTypeConfig { stocks, crypto, options }
    }

    fn prompt_for(state: &TickState, analysis_only: bool, asset_types: AssetTypeConfig) -> String {
        build_prompt(&PromptInput {
            state,
            plan: "# Trading Plan\nwatch NVDA",
            strategy: "# Trading Strategy\nbe patient",
            analysis_only,
            asset_types,
            now: now(),
            tz: "America/New_York",
        })
    }

    fn history(n: usize) -> Vec<ActionEntry> {
        (0..n)
            .map(|i| ActionEntry {
                timestamp:   now(),
                decisions:   vec![],
                market_open: Some(true),
                notes:       format!("entry-{i:02}"),
            })
            .collect()
    }

    #[test]
    fn test_stocks_only_steps() {
        let steps = execution_steps(&assets(true, false, false));
        assert_eq!(
            steps,
            "13. STOCKS: Execute trades using place_stock_order when you have conviction\n\
             14. Use market orders for Tier 1 urgency, limit orders otherwise\n\
             15. Update plan.md with your observations and next actions\n\
             16. If your approach evolves, update strategy.md (append to Evolution Log)"
        );
    }

    #[test]
    fn test_steps_stay_contiguous_when_classes_skipped() {
        let steps = execution_steps(&assets(false, false, true));
        let lines: Vec<&str> = steps.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("13. OPTIONS:"));
        assert!(lines[1].starts_with("14. Use market orders"));

        let none = execution_steps(&assets(false, false, false));
        assert!(none.starts_with("13. Use market orders"));
        assert_eq!(none.lines().count(), 3);

        let all = execution_steps(&assets(true, true, true));
        let numbers: Vec<usize> = all
            .lines()
            .map(|l| l.split('.').next().unwrap().parse().unwrap())
            .collect();
        assert_eq!(numbers, (13..=18).collect::<Vec<_>>());
        assert!(all.lines().nth(1).unwrap().starts_with("14. CRYPTO:"));
    }

    #[test]
    fn test_asset_section_lists_enabled_and_disabled() {
        let section = asset_type_section(&assets(true, true, false));
        assert!(section.contains("- ENABLED: stocks, crypto"));
        assert!(section.contains("- DISABLED: options"));
        assert!(section.contains("- STOCKS: You may use place_stock_order"));
        assert!(section.contains("- CRYPTO: You may use place_crypto_order"));
        assert!(section.contains("- OPTIONS: DO NOT use place_option_market_order"));

        let none = asset_type_section(&assets(false, false, false));
        assert!(none.contains("- ENABLED: None"));
        assert!(none.contains("- DISABLED: stocks, crypto, options"));
    }

    #[test]
    fn test_prompt_embeds_state_plan_strategy_and_time() {
        let mut state = TickState::default();
        state.buying_power = Some(1234.5);
        let prompt = prompt_for(&state, false, AssetTypeConfig::default());

        assert!(prompt.starts_with("CURRENT STATE:\n{"));
        assert!(prompt.contains("\"buying_power\": 1234.5"));
        assert!(prompt.contains("TRADING PLAN:\n# Trading Plan\nwatch NVDA"));
        assert!(prompt.contains("STRATEGY:\n# Trading Strategy\nbe patient"));
        assert!(prompt.contains("CURRENT TIME: 2025-01-06T10:15:00-05:00 (America/New_York)"));
        assert!(prompt.contains("RECENT ACTIONS (last 10):\n[]"));
        assert!(!prompt.contains("ANALYSIS-ONLY"));
    }

    #[test]
    fn test_analysis_only_block() {
        let prompt = prompt_for(&TickState::default(), true, AssetTypeConfig::default());
        assert!(prompt.contains("NOTE: This is an ANALYSIS-ONLY tick (market is likely closed)."));
        assert!(prompt.contains("- Do NOT place any orders"));
    }

    #[test]
    fn test_recent_actions_are_last_ten() {
        let mut state = TickState::default();
        state.actions_history = history(14);
        let prompt = prompt_for(&state, false, AssetTypeConfig::default());

        let recent = prompt
            .split("RECENT ACTIONS (last 10):\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nCURRENT TIME").next())
            .unwrap();
        let recent: Vec<ActionEntry> = serde_json::from_str(recent).unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].notes, "entry-04");
        assert_eq!(recent[9].notes, "entry-13");
    }

    #[test]
    fn test_output_contract_keys_present() {
        let prompt = prompt_for(&TickState::default(), false, AssetTypeConfig::default());
        let contract = prompt.split("```json\n").nth(1).unwrap().split("\n```").next().unwrap();
        let value: serde_json::Value = serde_json::from_str(contract).unwrap();
        for key in [
            "decisions",
            "positions_snapshot",
            "buying_power",
            "market_open",
            "notes",
            "plan_updated",
            "strategy_updated",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        let decision = &value["decisions"][0];
        for key in ["action", "symbol", "qty", "type", "limit_price", "reasoning"] {
            assert!(decision.get(key).is_some(), "decision missing {key}");
        }
    }
}
