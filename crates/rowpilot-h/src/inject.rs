use chromiumoxide::Page;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use rowpilot_common::error::BackendError;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

const HELPER_JS: &str = include_str!("helper.js");

/// Upper bound for a single helper call. A JavaScript dialog blocks the
/// page thread, and this keeps the run from hanging on one.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum retries for context errors during page navigation.
const MAX_CONTEXT_RETRIES: u32 = 10;

const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Check if an error indicates the page context is unavailable (e.g., during navigation).
fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

/// Retry an async operation that may fail while the page is navigating.
/// Non-context errors are returned immediately.
async fn retry_on_context_error<T, F, Fut>(
    operation_name: &str,
    mut operation: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EvalError>>,
{
    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(EvalError::Context(err)) => {
                tracing::debug!(
                    "{} context error (attempt {}/{}), retrying...",
                    operation_name,
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(EvalError::Timeout) => {
                return Err(BackendError::Timeout {
                    operation: format!(
                        "during {} (possibly blocked by a dialog)",
                        operation_name.to_lowercase()
                    ),
                });
            }
            Err(EvalError::Other(err)) => return Err(BackendError::ScriptError(err)),
        }
    }

    Err(BackendError::ScriptError(last_error.unwrap_or_else(|| {
        format!("{} failed after retries", operation_name)
    })))
}

enum EvalError {
    Timeout,
    Context(String),
    Other(String),
}

impl EvalError {
    fn from_cdp(err: impl std::fmt::Display) -> Self {
        let err = err.to_string();
        if is_context_error(&err) {
            EvalError::Context(err)
        } else {
            EvalError::Other(err)
        }
    }
}

/// Result object returned by every helper function.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperReply {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub includes_target: bool,
}

impl HelperReply {
    /// Turn an error reply into the matching `BackendError`.
    pub fn into_result(self, selector: &str) -> Result<Self, BackendError> {
        let Some(error) = self.error.as_deref() else {
            return Ok(self);
        };
        let reason = self.reason.clone().unwrap_or_default();
        Err(match error {
            "invalid" => BackendError::SelectorInvalid {
                selector: selector.to_string(),
            },
            "not_found" => BackendError::ElementNotFound {
                selector: selector.to_string(),
            },
            "not_interactable" => BackendError::ElementNotInteractable {
                selector: selector.to_string(),
                reason,
            },
            other => BackendError::ScriptError(format!("{}: {}", other, reason)),
        })
    }
}

/// Build `window.__rowpilot.<function>(args...)` with JSON-encoded arguments.
pub fn helper_call(function: &str, args: &[&str]) -> Result<String, BackendError> {
    let encoded = args
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("window.__rowpilot.{}({})", function, encoded.join(", ")))
}

async fn try_inject_helper(page: &Page) -> Result<(), EvalError> {
    let is_loaded: bool = page
        .evaluate("typeof window.__rowpilot !== 'undefined'")
        .await
        .map_err(EvalError::from_cdp)?
        .into_value()
        .map_err(|e| EvalError::Other(format!("Failed to get bool value: {}", e)))?;

    if !is_loaded {
        page.evaluate(HELPER_JS).await.map_err(EvalError::from_cdp)?;
    }
    Ok(())
}

async fn evaluate(
    page: &Page,
    expression: &str,
    limit: Option<Duration>,
) -> Result<Value, EvalError> {
    try_inject_helper(page).await?;

    let params = EvaluateParams::builder()
        .expression(expression)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(EvalError::Other)?;

    let evaluation = page.evaluate_expression(params);
    let remote_object = match limit {
        Some(limit) => tokio::time::timeout(limit, evaluation)
            .await
            .map_err(|_| EvalError::Timeout)?,
        None => evaluation.await,
    }
    .map_err(EvalError::from_cdp)?;

    Ok(remote_object.into_value::<Value>().unwrap_or(Value::Null))
}

/// Run a helper call, injecting the helper first when the page lost it.
pub async fn call_helper(page: &Page, expression: &str) -> Result<HelperReply, BackendError> {
    let value = retry_on_context_error("Helper call", || {
        evaluate(page, expression, Some(EVAL_TIMEOUT))
    })
    .await?;
    tracing::debug!(%expression, reply = %value, "Helper call");
    Ok(serde_json::from_value(value)?)
}

/// Wait for the user to click an element. Resolves to the snapshot chain
/// JSON, or `null` when the user pressed Escape.
pub async fn await_pick(page: &Page) -> Result<Value, BackendError> {
    retry_on_context_error("Element pick", || {
        evaluate(page, "window.__rowpilot.pick()", None)
    })
    .await
}
