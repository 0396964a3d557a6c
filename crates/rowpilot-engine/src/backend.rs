use async_trait::async_trait;
pub use rowpilot_common::error::BackendError;
use rowpilot_common::protocol::BrowserKind;
use rowpilot_core::selector::{MatchSet, SnapshotChain};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
}

/// One live page. Every browser driver implements this.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Navigate to a specific URL.
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError>;

    async fn click(&mut self, selector: &str) -> Result<(), BackendError>;

    /// Replace the value of an input.
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BackendError>;

    /// Focus an element and send key events for `text`.
    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), BackendError>;

    /// Press a single key on whatever has focus.
    async fn press_key(&mut self, key: &str) -> Result<(), BackendError>;

    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BackendError>;

    /// Count the elements matching `selector` and report whether the
    /// most recently picked element is among them.
    async fn query(&mut self, selector: &str) -> Result<MatchSet, BackendError>;

    /// Let the user click an element and capture it with its ancestors.
    async fn pick_element(&mut self) -> Result<SnapshotChain, BackendError> {
        Err(BackendError::NotSupported("pick_element".into()))
    }

    /// URL of the page currently loaded.
    async fn current_url(&mut self) -> Result<String, BackendError> {
        Err(BackendError::NotSupported("current_url".into()))
    }

    /// Close the page and release driver resources.
    async fn close(&mut self) -> Result<(), BackendError>;
}

/// Starts browsers on demand for aliases that have no live page yet.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, alias: &str, kind: BrowserKind)
    -> Result<Box<dyn Backend>, BackendError>;
}

/// Live pages keyed by workflow browser alias.
#[derive(Default)]
pub struct BrowserPool {
    handles: BTreeMap<String, Box<dyn Backend>>,
}

impl BrowserPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: impl Into<String>, backend: Box<dyn Backend>) {
        self.handles.insert(alias.into(), backend);
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.handles.contains_key(alias)
    }

    /// Page handle for `alias`. Never falls back to another alias.
    pub fn get(&mut self, alias: &str) -> Option<&mut (dyn Backend + 'static)> {
        self.handles.get_mut(alias).map(|b| b.as_mut())
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Close every page. Failures are logged and do not stop the others.
    pub async fn close_all(&mut self) {
        for (alias, mut backend) in std::mem::take(&mut self.handles) {
            match backend.close().await {
                Ok(()) => debug!(alias = %alias, "Browser closed"),
                Err(e) => warn!(alias = %alias, error = %e, "Failed to close browser"),
            }
        }
    }
}
