use anyhow::{Context, bail};
use rowpilot_core::RowpilotConfig;
use rowpilot_core::selector::Blacklist;
use rowpilot_core::template::{check_workflow_syntax, validate_templates};
use rowpilot_engine::backend::{Backend, BrowserLauncher, BrowserPool};
use rowpilot_engine::config;
use rowpilot_engine::dispatch::normalize_url;
use rowpilot_engine::executor::{
    CancellationToken, ExecutionEvent, ExecutorOptions, WorkflowExecutor,
};
use rowpilot_engine::formatter::{format_report, format_selector, format_template_report};
use rowpilot_engine::picker::pick_selector;
use rowpilot_engine::protocol::BrowserKind;
use rowpilot_engine::rows::load_rows;
use rowpilot_engine::workflow::{load_workflow, save_workflow};
use rowpilot_h::HeadlessLauncher;
use rowpilot_h::cdp::LaunchOptions;
use std::path::Path;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub async fn load_config(path: Option<&Path>) -> anyhow::Result<RowpilotConfig> {
    let (config, source) = config::load_config(path)
        .await
        .context("Failed to load configuration")?;
    debug!(source = %source, "Configuration ready");
    Ok(config)
}

fn launcher(config: &RowpilotConfig) -> HeadlessLauncher {
    HeadlessLauncher::new(LaunchOptions {
        visible: config.browser.visible,
        chrome_bin: config.browser.chrome_bin.clone(),
    })
}

pub async fn run(
    workflow_path: &Path,
    data_path: &Path,
    config: &RowpilotConfig,
) -> anyhow::Result<ExitCode> {
    let mut workflow = load_workflow(workflow_path)
        .await
        .with_context(|| format!("Failed to load workflow {}", workflow_path.display()))?;
    let rows = load_rows(data_path)
        .await
        .with_context(|| format!("Failed to load data {}", data_path.display()))?;
    info!(rows = rows.len(), "Data loaded");

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; stopping the run");
                cancel.cancel();
            }
        })
    };

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let progress = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                ExecutionEvent::RowStarted { index, total } => {
                    info!("Row {} of {}", index + 1, total)
                }
                ExecutionEvent::RowFinished { index, success: false } => {
                    warn!("Row {} failed", index + 1)
                }
                ExecutionEvent::SelectorHealed(healed) => {
                    info!(selector = %healed.selector, "Selector healed")
                }
                _ => {}
            }
        }
    });

    let launcher = launcher(config);
    let mut pool = BrowserPool::new();
    let result = WorkflowExecutor::new(&mut pool, &launcher)
        .with_options(ExecutorOptions::from(&config.execution))
        .with_policy(config.selectors.clone())
        .with_cancellation(cancel)
        .with_events(events_tx)
        .run(&workflow, &rows)
        .await;

    pool.close_all().await;
    ctrl_c.abort();
    progress.await.ok();

    let report = result?;
    println!("{}", format_report(&report));

    if !report.healed.is_empty() {
        let applied = report
            .healed
            .iter()
            .filter(|healed| healed.apply(&mut workflow))
            .count();
        save_workflow(workflow_path, &workflow)
            .await
            .context("Failed to save healed selectors")?;
        info!(applied, "Healed selectors written back to the workflow");
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub async fn validate(
    workflow_path: &Path,
    data_path: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let workflow = load_workflow(workflow_path)
        .await
        .with_context(|| format!("Failed to load workflow {}", workflow_path.display()))?;
    check_workflow_syntax(&workflow)?;

    let undeclared = workflow.undeclared_aliases();
    if !undeclared.is_empty() {
        let aliases: Vec<&str> = undeclared.into_iter().collect();
        bail!("Actions use undeclared browsers: {}", aliases.join(", "));
    }

    let columns: Vec<String> = match data_path {
        Some(path) => {
            let rows = load_rows(path)
                .await
                .with_context(|| format!("Failed to load data {}", path.display()))?;
            rows.first()
                .map(|row| row.column_names().map(str::to_string).collect())
                .unwrap_or_default()
        }
        None => Vec::new(),
    };

    let report = validate_templates(&workflow, &columns)?;
    println!("{}", format_template_report(&report));

    Ok(if data_path.is_none() || report.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub async fn pick(url: &str, alias: &str, config: &RowpilotConfig) -> anyhow::Result<ExitCode> {
    let url = normalize_url(url)?;
    let mut config = config.clone();
    // Picking needs a window to click in.
    config.browser.visible = true;

    let mut backend = launcher(&config).launch(alias, BrowserKind::Chromium).await?;
    backend.navigate(&url).await?;

    let picked = pick_selector(&mut *backend, &config.selectors, &Blacklist::new()).await;
    if let Err(e) = backend.close().await {
        warn!(error = %e, "Failed to close browser");
    }

    println!("{}", format_selector(&picked?));
    Ok(ExitCode::SUCCESS)
}
