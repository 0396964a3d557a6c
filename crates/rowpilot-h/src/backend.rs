use crate::cdp::{CdpClient, LaunchOptions};
use crate::inject::{await_pick, call_helper, helper_call};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use rowpilot_core::selector::{MatchSet, SnapshotChain};
use rowpilot_engine::backend::{Backend, BackendError, NavigationResult};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A single Chromium page.
pub struct HeadlessBackend {
    client: Option<CdpClient>,
}

impl HeadlessBackend {
    pub async fn launch(options: &LaunchOptions) -> Result<Self, BackendError> {
        info!("Launching headless backend (Chromium)...");
        let client = CdpClient::launch(options)
            .await
            .map_err(|e| BackendError::LaunchFailed(e.to_string()))?;
        Ok(Self {
            client: Some(client),
        })
    }

    fn page(&self) -> Result<&chromiumoxide::Page, BackendError> {
        self.client
            .as_ref()
            .map(|c| &c.page)
            .ok_or(BackendError::NotReady)
    }

    async fn navigation_result(&self) -> Result<NavigationResult, BackendError> {
        let page = self.page()?;
        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult { url, title })
    }

    async fn helper(
        &self,
        function: &str,
        selector: &str,
        args: &[&str],
    ) -> Result<(), BackendError> {
        let mut all = vec![selector];
        all.extend_from_slice(args);
        let expression = helper_call(function, &all)?;
        call_helper(self.page()?, &expression)
            .await?
            .into_result(selector)
            .map(|_| ())
    }

    async fn key_event(
        &self,
        kind: DispatchKeyEventType,
        key: &str,
        text: Option<&str>,
    ) -> Result<(), BackendError> {
        let mut builder = DispatchKeyEventParams::builder().r#type(kind).key(key);
        if let Some(text) = text {
            builder = builder.text(text);
        }
        let event = builder
            .build()
            .map_err(|e| BackendError::Other(format!("Failed to build key event: {:?}", e)))?;

        self.page()?
            .execute(event)
            .await
            .map_err(|e| BackendError::Other(format!("Key event failed: {}", e)))?;
        Ok(())
    }
}

/// Text a key produces, for keys that insert something.
fn key_text(key: &str) -> Option<&str> {
    match key {
        "Enter" => Some("\r"),
        "Tab" => Some("\t"),
        k if k.chars().count() == 1 => Some(k),
        _ => None,
    }
}

#[async_trait]
impl Backend for HeadlessBackend {
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        info!("Navigating to: {}", url);
        self.page()?
            .goto(url)
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?;
        self.navigation_result().await
    }

    async fn click(&mut self, selector: &str) -> Result<(), BackendError> {
        self.helper("click", selector, &[]).await
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BackendError> {
        self.helper("fill", selector, &[value]).await
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), BackendError> {
        self.helper("focus", selector, &[]).await?;
        let mut buf = [0u8; 4];
        for c in text.chars() {
            let s: &str = c.encode_utf8(&mut buf);
            self.key_event(DispatchKeyEventType::KeyDown, s, Some(s)).await?;
            self.key_event(DispatchKeyEventType::KeyUp, s, None).await?;
        }
        Ok(())
    }

    async fn press_key(&mut self, key: &str) -> Result<(), BackendError> {
        self.key_event(DispatchKeyEventType::KeyDown, key, key_text(key))
            .await?;
        self.key_event(DispatchKeyEventType::KeyUp, key, None).await
    }

    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BackendError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.query(selector).await?.count > 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BackendError::Timeout {
                    operation: format!("waiting for {}", selector),
                });
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn query(&mut self, selector: &str) -> Result<MatchSet, BackendError> {
        let expression = helper_call("count", &[selector])?;
        let reply = call_helper(self.page()?, &expression)
            .await?
            .into_result(selector)?;
        Ok(MatchSet::new(reply.count, reply.includes_target))
    }

    async fn pick_element(&mut self) -> Result<SnapshotChain, BackendError> {
        info!("Click the element to use (Escape cancels)");
        match await_pick(self.page()?).await? {
            Value::Null => Err(BackendError::PickCancelled),
            chain => Ok(serde_json::from_value(chain)?),
        }
    }

    async fn current_url(&mut self) -> Result<String, BackendError> {
        Ok(self.navigation_result().await?.url)
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| BackendError::Other(e.to_string()))?;
        }
        Ok(())
    }
}
