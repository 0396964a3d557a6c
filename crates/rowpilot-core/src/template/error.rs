use rowpilot_common::protocol::Section;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error(
        "Column '{name}' not found in row{}",
        .suggestion.as_ref().map(|s| format!(" (did you mean '{}'?)", s)).unwrap_or_default()
    )]
    MissingColumn {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Column index {index} is out of range for a row with {len} columns")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Malformed template '{expression}': {reason}")]
    MalformedTemplate { expression: String, reason: String },
}

impl TemplateError {
    pub(crate) fn malformed(expression: &str, reason: impl Into<String>) -> Self {
        TemplateError::MalformedTemplate {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// A template problem tied to the action field it came from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{section}[{index}].{field}: {source}")]
pub struct ActionTemplateError {
    pub section: Section,
    pub index: usize,
    pub field: &'static str,
    #[source]
    pub source: TemplateError,
}
