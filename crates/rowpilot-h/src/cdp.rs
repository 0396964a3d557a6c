use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type CdpResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Launch options for a single Chromium process.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub visible: bool,
    /// Browser binary. `CHROME_BIN` takes precedence when set.
    pub chrome_bin: Option<PathBuf>,
}

/// Profile directory handed to Chromium.
struct Profile {
    path: PathBuf,
    /// Removed on close when we created it.
    owned: bool,
}

impl Profile {
    fn resolve() -> CdpResult<Self> {
        if let Ok(dir) = std::env::var("ROWPILOT_USER_DATA_DIR") {
            let path = PathBuf::from(dir);
            std::fs::create_dir_all(&path)?;
            info!(path = %path.display(), "Using profile from ROWPILOT_USER_DATA_DIR");
            return Ok(Self { path, owned: false });
        }

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| format!("System clock error: {}", e))?
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "rowpilot-profile-{}-{}",
            std::process::id(),
            nanos
        ));
        std::fs::create_dir_all(&path)?;
        debug!(path = %path.display(), "Using throwaway profile");
        Ok(Self { path, owned: true })
    }

    fn cleanup(&self) {
        if self.owned
            && let Err(e) = std::fs::remove_dir_all(&self.path)
        {
            debug!(path = %self.path.display(), error = %e, "Failed to remove profile");
        }
    }
}

/// One Chromium process with a single page.
pub struct CdpClient {
    pub browser: Browser,
    pub page: Page,
    handler_task: JoinHandle<()>,
    profile: Profile,
}

impl CdpClient {
    pub async fn launch(options: &LaunchOptions) -> CdpResult<Self> {
        let profile = Profile::resolve()?;
        let config = browser_config(options, &profile)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| format!("Failed to launch browser: {}", e))?;

        // The handler stream drives the CDP connection and must be polled
        // for the whole browser lifetime.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler error");
                }
            }
            debug!("Browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| format!("Failed to open page: {}", e))?;
        forward_console(&page).await?;
        accept_dialogs(&page).await?;

        Ok(Self {
            browser,
            page,
            handler_task,
            profile,
        })
    }

    pub async fn close(mut self) -> CdpResult<()> {
        self.browser
            .close()
            .await
            .map_err(|e| format!("Error closing browser: {}", e))?;
        self.handler_task
            .await
            .map_err(|e| format!("Error awaiting handler: {}", e))?;
        self.profile.cleanup();
        Ok(())
    }
}

fn browser_config(options: &LaunchOptions, profile: &Profile) -> CdpResult<BrowserConfig> {
    // Sandboxing fails in most containers and CI runners.
    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .user_data_dir(&profile.path);

    if options.visible {
        info!("Launching browser in visible mode");
        builder = builder.with_head();
    } else {
        info!("Launching browser in headless mode");
    }

    let binary = std::env::var("CHROME_BIN")
        .ok()
        .map(PathBuf::from)
        .or_else(|| options.chrome_bin.clone());
    if let Some(binary) = binary {
        info!(path = %binary.display(), "Using custom browser binary");
        builder = builder.chrome_executable(binary);
    }

    Ok(builder
        .build()
        .map_err(|e| format!("Invalid browser config: {}", e))?)
}

async fn forward_console(page: &Page) -> CdpResult<()> {
    let mut events = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(|e| format!("Failed to subscribe to console events: {}", e))?;

    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let args: Vec<String> = event
                .args
                .iter()
                .filter_map(|arg| arg.description.clone())
                .collect();
            debug!(kind = ?event.r#type, "Page console: {}", args.join(" "));
        }
    });
    Ok(())
}

/// A pending alert blocks script evaluation, so every dialog is accepted.
async fn accept_dialogs(page: &Page) -> CdpResult<()> {
    let mut events = page
        .event_listener::<EventJavascriptDialogOpening>()
        .await
        .map_err(|e| format!("Failed to subscribe to dialog events: {}", e))?;

    let page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            info!(kind = ?event.r#type, message = %event.message, "Accepting page dialog");
            if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(true)).await {
                warn!(error = %e, "Failed to accept dialog");
            }
        }
    });
    Ok(())
}
