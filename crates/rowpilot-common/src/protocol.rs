use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Alias used when an action does not name a browser.
pub const DEFAULT_BROWSER_ALIAS: &str = "main";

/// Every action type a workflow file may contain.
pub const ACTION_TYPES: &[&str] = &[
    "click",
    "fill_field",
    "navigate",
    "type_text",
    "press_key",
    "wait_for_element",
    "wait_seconds",
];

/// Empty or whitespace-only strings in optional fields count as absent.
fn deserialize_optional_trimmed<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Accepts `"42"`, `42`, `4.2` or `true` for free-text fields such as `value`.
fn deserialize_string_or_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or scalar, got {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Chromium,
    Edge,
    Firefox,
    Webkit,
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Chromium => "chromium",
            BrowserKind::Edge => "edge",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub browser_type: BrowserKind,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_trimmed",
        skip_serializing_if = "Option::is_none"
    )]
    pub starting_url: Option<String>,
}

/// The four action lists of a workflow, named as in the file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Section {
    #[serde(rename = "initialization")]
    Initialization,
    #[serde(rename = "pre_loop_actions")]
    PreLoop,
    #[serde(rename = "loop_actions")]
    Loop,
    #[serde(rename = "post_loop_actions")]
    PostLoop,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Initialization => "initialization",
            Section::PreLoop => "pre_loop_actions",
            Section::Loop => "loop_actions",
            Section::PostLoop => "post_loop_actions",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    #[error("Failed to parse workflow: {0}")]
    Parse(String),

    #[error(
        "{section}[{index}]: unknown action type '{action_type}' (expected one of: {})",
        ACTION_TYPES.join(", ")
    )]
    UnknownActionType {
        section: Section,
        index: usize,
        action_type: String,
    },

    #[error("{section}[{index}]: '{action_type}' action requires field '{field}'")]
    MissingField {
        section: Section,
        index: usize,
        action_type: String,
        field: &'static str,
    },

    #[error("{section}[{index}]: invalid '{field}': {reason}")]
    InvalidField {
        section: Section,
        index: usize,
        field: &'static str,
        reason: String,
    },
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::Parse(err.to_string())
    }
}

/// An action exactly as stored on disk, before its type is checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_trimmed",
        skip_serializing_if = "Option::is_none"
    )]
    pub selector: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_string_or_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_trimmed",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_trimmed",
        skip_serializing_if = "Option::is_none"
    )]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_trimmed",
        skip_serializing_if = "Option::is_none"
    )]
    pub browser_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The closed action vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Click {
        selector: String,
    },
    FillField {
        selector: String,
        value: String,
    },
    Navigate {
        url: String,
    },
    TypeText {
        selector: String,
        value: String,
    },
    PressKey {
        key: String,
    },
    WaitForElement {
        selector: String,
        timeout: Option<Duration>,
    },
    WaitSeconds {
        duration: Duration,
    },
}

impl ActionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ActionKind::Click { .. } => "click",
            ActionKind::FillField { .. } => "fill_field",
            ActionKind::Navigate { .. } => "navigate",
            ActionKind::TypeText { .. } => "type_text",
            ActionKind::PressKey { .. } => "press_key",
            ActionKind::WaitForElement { .. } => "wait_for_element",
            ActionKind::WaitSeconds { .. } => "wait_seconds",
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            ActionKind::Click { selector }
            | ActionKind::FillField { selector, .. }
            | ActionKind::TypeText { selector, .. }
            | ActionKind::WaitForElement { selector, .. } => Some(selector),
            ActionKind::Navigate { .. }
            | ActionKind::PressKey { .. }
            | ActionKind::WaitSeconds { .. } => None,
        }
    }

    /// Fields that may contain `{{col(...)}}` expressions, by field name.
    ///
    /// Key names and durations are never templated.
    pub fn template_fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            ActionKind::Click { selector } | ActionKind::WaitForElement { selector, .. } => {
                vec![("selector", selector.as_str())]
            }
            ActionKind::FillField { selector, value }
            | ActionKind::TypeText { selector, value } => {
                vec![("selector", selector.as_str()), ("value", value.as_str())]
            }
            ActionKind::Navigate { url } => vec![("url", url.as_str())],
            ActionKind::PressKey { .. } | ActionKind::WaitSeconds { .. } => Vec::new(),
        }
    }

    /// Rebuild the action with every template-eligible field passed through `f`.
    pub fn map_template_fields<E, F>(&self, mut f: F) -> Result<ActionKind, E>
    where
        F: FnMut(&'static str, &str) -> Result<String, E>,
    {
        Ok(match self {
            ActionKind::Click { selector } => ActionKind::Click {
                selector: f("selector", selector)?,
            },
            ActionKind::FillField { selector, value } => ActionKind::FillField {
                selector: f("selector", selector)?,
                value: f("value", value)?,
            },
            ActionKind::Navigate { url } => ActionKind::Navigate {
                url: f("url", url)?,
            },
            ActionKind::TypeText { selector, value } => ActionKind::TypeText {
                selector: f("selector", selector)?,
                value: f("value", value)?,
            },
            ActionKind::WaitForElement { selector, timeout } => ActionKind::WaitForElement {
                selector: f("selector", selector)?,
                timeout: *timeout,
            },
            ActionKind::PressKey { .. } | ActionKind::WaitSeconds { .. } => self.clone(),
        })
    }

    /// Copy of this action targeting a different element.
    pub fn with_selector(&self, new_selector: &str) -> ActionKind {
        let mut updated = self.clone();
        match &mut updated {
            ActionKind::Click { selector }
            | ActionKind::FillField { selector, .. }
            | ActionKind::TypeText { selector, .. }
            | ActionKind::WaitForElement { selector, .. } => *selector = new_selector.to_string(),
            ActionKind::Navigate { .. }
            | ActionKind::PressKey { .. }
            | ActionKind::WaitSeconds { .. } => {}
        }
        updated
    }
}

/// A validated action together with the browser it runs against.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionStep {
    pub kind: ActionKind,
    pub browser_alias: String,
    pub description: Option<String>,
}

impl ActionStep {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            browser_alias: DEFAULT_BROWSER_ALIAS.to_string(),
            description: None,
        }
    }

    pub fn on(mut self, alias: impl Into<String>) -> Self {
        self.browser_alias = alias.into();
        self
    }

    /// Label used in logs and reports.
    pub fn label(&self) -> String {
        match &self.description {
            Some(d) if !d.trim().is_empty() => d.clone(),
            _ => self.kind.type_name().to_string(),
        }
    }

    /// Validate a stored action.
    pub fn from_raw(raw: RawAction, section: Section, index: usize) -> Result<Self, WorkflowError> {
        let action_type = raw.action_type.trim().to_string();
        let missing = |field: &'static str| WorkflowError::MissingField {
            section,
            index,
            action_type: action_type.clone(),
            field,
        };
        let seconds = |field: &'static str, secs: f64| -> Result<Duration, WorkflowError> {
            Duration::try_from_secs_f64(secs).map_err(|e| WorkflowError::InvalidField {
                section,
                index,
                field,
                reason: e.to_string(),
            })
        };

        let kind = match action_type.as_str() {
            "click" => ActionKind::Click {
                selector: raw.selector.ok_or_else(|| missing("selector"))?,
            },
            "fill_field" => ActionKind::FillField {
                selector: raw.selector.ok_or_else(|| missing("selector"))?,
                value: raw.value.ok_or_else(|| missing("value"))?,
            },
            "navigate" => ActionKind::Navigate {
                url: raw.url.ok_or_else(|| missing("url"))?,
            },
            "type_text" => ActionKind::TypeText {
                selector: raw.selector.ok_or_else(|| missing("selector"))?,
                value: raw.value.ok_or_else(|| missing("value"))?,
            },
            "press_key" => ActionKind::PressKey {
                key: raw.key.ok_or_else(|| missing("key"))?,
            },
            "wait_for_element" => ActionKind::WaitForElement {
                selector: raw.selector.ok_or_else(|| missing("selector"))?,
                timeout: raw.timeout.map(|t| seconds("timeout", t)).transpose()?,
            },
            "wait_seconds" => {
                // Older files store the duration in `value`.
                let secs = match (raw.timeout, raw.value.as_deref()) {
                    (Some(t), _) => t,
                    (None, Some(v)) => {
                        v.trim()
                            .parse::<f64>()
                            .map_err(|e| WorkflowError::InvalidField {
                                section,
                                index,
                                field: "value",
                                reason: e.to_string(),
                            })?
                    }
                    (None, None) => return Err(missing("timeout")),
                };
                ActionKind::WaitSeconds {
                    duration: seconds("timeout", secs)?,
                }
            }
            _ => {
                return Err(WorkflowError::UnknownActionType {
                    section,
                    index,
                    action_type: action_type.clone(),
                });
            }
        };

        Ok(Self {
            kind,
            browser_alias: raw
                .browser_alias
                .unwrap_or_else(|| DEFAULT_BROWSER_ALIAS.to_string()),
            description: raw.description,
        })
    }

    pub fn to_raw(&self) -> RawAction {
        let mut raw = RawAction {
            action_type: self.kind.type_name().to_string(),
            browser_alias: Some(self.browser_alias.clone()),
            description: self.description.clone(),
            ..Default::default()
        };
        match &self.kind {
            ActionKind::Click { selector } => raw.selector = Some(selector.clone()),
            ActionKind::FillField { selector, value }
            | ActionKind::TypeText { selector, value } => {
                raw.selector = Some(selector.clone());
                raw.value = Some(value.clone());
            }
            ActionKind::Navigate { url } => raw.url = Some(url.clone()),
            ActionKind::PressKey { key } => raw.key = Some(key.clone()),
            ActionKind::WaitForElement { selector, timeout } => {
                raw.selector = Some(selector.clone());
                raw.timeout = timeout.map(|d| d.as_secs_f64());
            }
            ActionKind::WaitSeconds { duration } => raw.timeout = Some(duration.as_secs_f64()),
        }
        raw
    }
}

/// Workflow file layout as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Keeps file order, which is also launch order.
    #[serde(default)]
    pub browsers: IndexMap<String, BrowserConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initialization: Vec<RawAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_loop_actions: Vec<RawAction>,
    #[serde(default, alias = "actions")]
    pub loop_actions: Vec<RawAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_loop_actions: Vec<RawAction>,
    /// Unrecognised top-level keys (`created_at`, `modified_at`, ...).
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workflow {
    pub name: Option<String>,
    pub browsers: IndexMap<String, BrowserConfig>,
    pub initialization: Vec<ActionStep>,
    pub pre_loop_actions: Vec<ActionStep>,
    pub loop_actions: Vec<ActionStep>,
    pub post_loop_actions: Vec<ActionStep>,
    pub metadata: BTreeMap<String, Value>,
}

impl Workflow {
    /// A new workflow with a single `main` browser and no actions.
    pub fn new(name: impl Into<String>, kind: BrowserKind, starting_url: Option<String>) -> Self {
        let mut browsers = IndexMap::new();
        browsers.insert(
            DEFAULT_BROWSER_ALIAS.to_string(),
            BrowserConfig {
                browser_type: kind,
                starting_url: starting_url.filter(|u| !u.trim().is_empty()),
            },
        );
        Self {
            name: Some(name.into()),
            browsers,
            ..Default::default()
        }
    }

    pub fn from_json(content: &str) -> Result<Self, WorkflowError> {
        let definition: WorkflowDefinition = serde_json::from_str(content)?;
        Self::try_from(definition)
    }

    pub fn to_json_pretty(&self) -> Result<String, WorkflowError> {
        Ok(serde_json::to_string_pretty(&self.to_definition())?)
    }

    pub fn to_definition(&self) -> WorkflowDefinition {
        let raw = |steps: &[ActionStep]| steps.iter().map(ActionStep::to_raw).collect();
        WorkflowDefinition {
            name: self.name.clone(),
            browsers: self.browsers.clone(),
            initialization: raw(&self.initialization),
            pre_loop_actions: raw(&self.pre_loop_actions),
            loop_actions: raw(&self.loop_actions),
            post_loop_actions: raw(&self.post_loop_actions),
            metadata: self.metadata.clone(),
        }
    }

    pub fn section(&self, section: Section) -> &[ActionStep] {
        match section {
            Section::Initialization => &self.initialization,
            Section::PreLoop => &self.pre_loop_actions,
            Section::Loop => &self.loop_actions,
            Section::PostLoop => &self.post_loop_actions,
        }
    }

    pub fn section_mut(&mut self, section: Section) -> &mut Vec<ActionStep> {
        match section {
            Section::Initialization => &mut self.initialization,
            Section::PreLoop => &mut self.pre_loop_actions,
            Section::Loop => &mut self.loop_actions,
            Section::PostLoop => &mut self.post_loop_actions,
        }
    }

    /// Every action with its section and index, in execution order.
    pub fn all_actions(&self) -> impl Iterator<Item = (Section, usize, &ActionStep)> {
        [
            Section::Initialization,
            Section::PreLoop,
            Section::Loop,
            Section::PostLoop,
        ]
        .into_iter()
        .flat_map(move |section| {
            self.section(section)
                .iter()
                .enumerate()
                .map(move |(i, step)| (section, i, step))
        })
    }

    /// Aliases used by actions but absent from the browser mapping.
    pub fn undeclared_aliases(&self) -> BTreeSet<&str> {
        self.all_actions()
            .map(|(_, _, step)| step.browser_alias.as_str())
            .filter(|alias| !self.browsers.contains_key(*alias))
            .collect()
    }
}

impl TryFrom<WorkflowDefinition> for Workflow {
    type Error = WorkflowError;

    fn try_from(def: WorkflowDefinition) -> Result<Self, Self::Error> {
        let convert = |raws: Vec<RawAction>, section: Section| {
            raws.into_iter()
                .enumerate()
                .map(|(i, raw)| ActionStep::from_raw(raw, section, i))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            name: def.name,
            browsers: def.browsers,
            initialization: convert(def.initialization, Section::Initialization)?,
            pre_loop_actions: convert(def.pre_loop_actions, Section::PreLoop)?,
            loop_actions: convert(def.loop_actions, Section::Loop)?,
            post_loop_actions: convert(def.post_loop_actions, Section::PostLoop)?,
            metadata: def.metadata,
        })
    }
}
