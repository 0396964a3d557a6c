use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowpilotConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub selectors: SelectorPolicy,
    #[serde(default)]
    pub browser: BrowserSettings,
}

impl RowpilotConfig {
    /// Self-healing asks the user to click the element again, which a
    /// headless browser cannot offer. Returns true when visibility was
    /// switched on.
    pub fn ensure_pickable(&mut self) -> bool {
        if self.execution.self_heal && !self.browser.visible {
            self.browser.visible = true;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,
    #[serde(default = "default_stop_on_error")]
    pub stop_on_error: bool,
    #[serde(default)]
    pub self_heal: bool,
    /// How long self-healing waits for the user to pick a replacement.
    #[serde(default = "default_pick_timeout_ms")]
    pub pick_timeout_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            action_timeout_ms: default_action_timeout_ms(),
            stop_on_error: default_stop_on_error(),
            self_heal: false,
            pick_timeout_ms: default_pick_timeout_ms(),
        }
    }
}

fn default_action_timeout_ms() -> u64 {
    5000
}

fn default_pick_timeout_ms() -> u64 {
    60_000
}

fn default_stop_on_error() -> bool {
    true
}

/// Heuristics used by selector generation.
///
/// None of these numbers has an empirical basis beyond "works on the sites we
/// tried", so all of them can be overridden from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorPolicy {
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Hex-only values at least this long are treated as generated.
    #[serde(default = "default_min_hex_run")]
    pub min_hex_run: usize,
    #[serde(default = "default_framework_prefixes")]
    pub framework_prefixes: Vec<String>,
    #[serde(default = "default_testing_attributes")]
    pub testing_attributes: Vec<String>,
    #[serde(default = "default_semantic_attributes")]
    pub semantic_attributes: Vec<String>,
    #[serde(default = "default_text_tags")]
    pub text_tags: Vec<String>,
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
    #[serde(default = "default_max_widening_depth")]
    pub max_widening_depth: usize,
}

impl Default for SelectorPolicy {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            min_hex_run: default_min_hex_run(),
            framework_prefixes: default_framework_prefixes(),
            testing_attributes: default_testing_attributes(),
            semantic_attributes: default_semantic_attributes(),
            text_tags: default_text_tags(),
            max_text_length: default_max_text_length(),
            max_widening_depth: default_max_widening_depth(),
        }
    }
}

fn default_min_length() -> usize {
    2
}

fn default_max_length() -> usize {
    30
}

fn default_min_hex_run() -> usize {
    8
}

fn default_framework_prefixes() -> Vec<String> {
    [
        "ember", "ext-gen", "gwt-", "yui_", "react-", "radix-", "headlessui-", "mui-", "css-",
        "sc-", "jsx-", "ng-", "vue-",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_testing_attributes() -> Vec<String> {
    ["data-testid", "data-cy", "data-test", "data-automation", "data-qa"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_semantic_attributes() -> Vec<String> {
    ["id", "name", "type", "role", "aria-label"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_text_tags() -> Vec<String> {
    vec!["button".to_string(), "a".to_string()]
}

fn default_max_text_length() -> usize {
    50
}

fn default_max_widening_depth() -> usize {
    3
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserSettings {
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub chrome_bin: Option<PathBuf>,
}
