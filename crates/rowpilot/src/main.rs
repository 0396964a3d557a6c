mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rowpilot",
    version,
    about = "Replay recorded browser workflows once per data row"
)]
struct Args {
    /// Config file (defaults to $ROWPILOT_CONFIG, ./rowpilot.yaml, then ~/.rowpilot/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a workflow for every row of a data file
    Run {
        #[arg(long)]
        workflow: PathBuf,
        /// JSON, YAML or CSV row data
        #[arg(long)]
        data: PathBuf,
        /// Record failing rows and keep going
        #[arg(long)]
        continue_on_error: bool,
        /// Per-action timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Launch browsers in visible mode (not headless)
        #[arg(long)]
        visible: bool,
        /// Re-pick elements whose selectors stopped matching (implies --visible)
        #[arg(long)]
        self_heal: bool,
    },
    /// Check templates and column coverage without running anything
    ///
    /// Malformed `{{` placeholders are rejected in every section, including
    /// pre-loop and post-loop actions whose values are otherwise sent
    /// verbatim. Column names are only checked when --data is given.
    Validate {
        #[arg(long)]
        workflow: PathBuf,
        /// JSON, YAML or CSV row data to check column names against
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Open a page and generate a selector for the element you click
    Pick {
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "main")]
        alias: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr; stdout carries the reports.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = commands::load_config(args.config.as_deref()).await?;

    match args.command {
        Command::Run {
            workflow,
            data,
            continue_on_error,
            timeout_ms,
            visible,
            self_heal,
        } => {
            let mut config = config;
            if continue_on_error {
                config.execution.stop_on_error = false;
            }
            if let Some(ms) = timeout_ms {
                config.execution.action_timeout_ms = ms;
            }
            config.browser.visible |= visible;
            config.execution.self_heal |= self_heal;
            if config.ensure_pickable() {
                info!("Self-healing needs a window to re-pick elements; launching visible");
            }
            commands::run(&workflow, &data, &config).await
        }
        Command::Validate { workflow, data } => {
            commands::validate(&workflow, data.as_deref()).await
        }
        Command::Pick { url, alias } => commands::pick(&url, &alias, &config).await,
    }
}
