use crate::backend::HeadlessBackend;
use crate::cdp::LaunchOptions;
use async_trait::async_trait;
use rowpilot_common::protocol::BrowserKind;
use rowpilot_engine::backend::{Backend, BackendError, BrowserLauncher};
use tracing::info;

/// Starts one Chromium process per workflow browser alias.
#[derive(Debug, Clone, Default)]
pub struct HeadlessLauncher {
    options: LaunchOptions,
}

impl HeadlessLauncher {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    pub fn supports(kind: BrowserKind) -> bool {
        matches!(
            kind,
            BrowserKind::Chrome | BrowserKind::Chromium | BrowserKind::Edge
        )
    }
}

#[async_trait]
impl BrowserLauncher for HeadlessLauncher {
    async fn launch(
        &self,
        alias: &str,
        kind: BrowserKind,
    ) -> Result<Box<dyn Backend>, BackendError> {
        if !Self::supports(kind) {
            return Err(BackendError::LaunchFailed(format!(
                "{} is not supported by the Chromium backend (browser '{}')",
                kind, alias
            )));
        }
        info!(alias = %alias, kind = %kind, "Starting browser");
        let backend = HeadlessBackend::launch(&self.options).await?;
        Ok(Box::new(backend))
    }
}
