//! Running a single action against a page.

use rowpilot_common::error::BackendError;
use rowpilot_common::protocol::ActionKind;
use rowpilot_common::row::RowData;
use rowpilot_core::template::{TemplateError, resolve_optional};
use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::backend::Backend;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{action} timed out after {}ms", timeout.as_millis())]
    Timeout {
        action: &'static str,
        timeout: Duration,
    },

    #[error("{action} failed: {source}")]
    Failed {
        action: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl ActionError {
    /// True when the page no longer has an element for the action's selector.
    pub fn is_locator_failure(&self) -> bool {
        matches!(self, ActionError::Failed { source, .. } if source.is_locator_failure())
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ActionError::Failed { source, .. } => Some(source.recovery_hint()),
            ActionError::Timeout { .. } => {
                Some("Increase the action timeout or add a wait step")
            }
            ActionError::InvalidUrl { .. } | ActionError::Template(_) => None,
        }
    }
}

/// Substitute row values into the action's template-eligible fields.
///
/// Outside the row loop `row` is `None` and fields are kept verbatim.
pub fn resolve_action(
    kind: &ActionKind,
    row: Option<&RowData>,
) -> Result<ActionKind, TemplateError> {
    kind.map_template_fields(|_, value| resolve_optional(value, row).map(Cow::into_owned))
}

/// Add `https://` to scheme-less URLs and check that the result parses.
pub fn normalize_url(url: &str) -> Result<String, ActionError> {
    let trimmed = url.trim();
    let candidate = if has_scheme(trimmed) {
        Cow::Borrowed(trimmed)
    } else {
        Cow::Owned(format!("https://{}", trimmed))
    };

    Url::parse(&candidate)
        .map(String::from)
        .map_err(|e| ActionError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
}

fn has_scheme(url: &str) -> bool {
    if url.contains("://") {
        return true;
    }
    ["about:", "data:", "file:", "javascript:"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

/// Run one resolved action, bounded by `timeout`.
///
/// `wait_for_element` uses its own timeout when it has one. `wait_seconds`
/// is a deliberate pause and is not bounded.
pub async fn dispatch<B: Backend + ?Sized>(
    backend: &mut B,
    kind: &ActionKind,
    timeout: Duration,
) -> Result<(), ActionError> {
    let action = kind.type_name();
    let limit = match kind {
        ActionKind::WaitSeconds { duration } => {
            debug!(seconds = duration.as_secs_f64(), "Waiting");
            tokio::time::sleep(*duration).await;
            return Ok(());
        }
        ActionKind::WaitForElement {
            timeout: Some(own), ..
        } => *own,
        _ => timeout,
    };

    match tokio::time::timeout(limit, perform(backend, kind, limit)).await {
        Ok(result) => result,
        Err(_) => Err(ActionError::Timeout {
            action,
            timeout: limit,
        }),
    }
}

async fn perform<B: Backend + ?Sized>(
    backend: &mut B,
    kind: &ActionKind,
    limit: Duration,
) -> Result<(), ActionError> {
    let action = kind.type_name();
    let result = match kind {
        ActionKind::Click { selector } => backend.click(selector).await,
        ActionKind::FillField { selector, value } => backend.fill(selector, value).await,
        ActionKind::Navigate { url } => {
            let url = normalize_url(url)?;
            backend.navigate(&url).await.map(|nav| {
                debug!(url = %nav.url, title = %nav.title, "Navigated");
            })
        }
        ActionKind::TypeText { selector, value } => backend.type_text(selector, value).await,
        ActionKind::PressKey { key } => backend.press_key(key).await,
        ActionKind::WaitForElement { selector, .. } => {
            backend.wait_for_element(selector, limit).await
        }
        ActionKind::WaitSeconds { duration } => {
            tokio::time::sleep(*duration).await;
            Ok(())
        }
    };

    result.map_err(|source| match source {
        BackendError::Timeout { .. } => ActionError::Timeout {
            action,
            timeout: limit,
        },
        source => ActionError::Failed { action, source },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_without_scheme_get_https() {
        assert_eq!(normalize_url("example.com/login").unwrap(), "https://example.com/login");
        assert_eq!(normalize_url(" http://a.test ").unwrap(), "http://a.test/");
        assert_eq!(normalize_url("about:blank").unwrap(), "about:blank");
        assert!(matches!(
            normalize_url("http://exa mple.com"),
            Err(ActionError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn row_values_fill_templates() {
        let row = RowData::from_pairs([("Email", "a@x.com")]);
        let kind = ActionKind::FillField {
            selector: "//input[@id=\"email\"]".into(),
            value: "{{col('Email')}}".into(),
        };
        assert_eq!(
            resolve_action(&kind, Some(&row)).unwrap(),
            ActionKind::FillField {
                selector: "//input[@id=\"email\"]".into(),
                value: "a@x.com".into(),
            }
        );
        assert_eq!(resolve_action(&kind, None).unwrap(), kind);
    }
}
