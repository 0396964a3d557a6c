//! Errors reported by page capabilities.
//!
//! Every concrete browser backend maps its driver failures onto these
//! variants so the execution loop can tell a per-row failure from a fatal
//! abort without knowing which driver produced them.

/// Failure of a single page-level operation.
#[derive(thiserror::Error, Debug, Clone)]
pub enum BackendError {
    #[error("Could not load page: {0}")]
    Navigation(String),

    /// Nothing on the page matches the selector.
    #[error("No element matches selector {selector}")]
    ElementNotFound { selector: String },

    /// The element exists but is disabled, hidden or detached.
    #[error("Element {selector} cannot be used: {reason}")]
    ElementNotInteractable { selector: String, reason: String },

    #[error("Selector is not valid XPath: {selector}")]
    SelectorInvalid { selector: String },

    #[error("Page script failed: {0}")]
    ScriptError(String),

    #[error("Timed out {operation}")]
    Timeout { operation: String },

    #[error("Element picking was cancelled")]
    PickCancelled,

    #[error("Could not start browser: {0}")]
    LaunchFailed(String),

    /// The page was used before launch or after close.
    #[error("Browser page is not open")]
    NotReady,

    #[error("Malformed reply from page: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),

    #[error("{0} is not supported by this browser backend")]
    NotSupported(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}

impl BackendError {
    /// True when the failure means a saved locator no longer matches the page.
    pub fn is_locator_failure(&self) -> bool {
        matches!(self, BackendError::ElementNotFound { .. })
    }

    /// Short hint shown next to the error in run reports.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            BackendError::ElementNotFound { .. } => "Re-pick the element or enable self-healing",
            BackendError::ElementNotInteractable { .. } => {
                "Wait for the element to become visible and enabled"
            }
            BackendError::Timeout { .. } => "Increase the action timeout or add a wait step",
            BackendError::SelectorInvalid { .. } => "Fix the selector syntax",
            BackendError::Navigation(_) => "Check the URL and network connectivity",
            BackendError::LaunchFailed(_) => "Check that the browser is installed",
            _ => "Check the action parameters",
        }
    }
}
