//! Workflow files on disk.

use rowpilot_common::protocol::{BrowserKind, Workflow, WorkflowError};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum WorkflowFileError {
    #[error("Failed to access workflow file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// A workflow with a single `main` browser and empty action lists.
pub fn new_workflow(
    name: impl Into<String>,
    kind: BrowserKind,
    starting_url: Option<String>,
) -> Workflow {
    Workflow::new(name, kind, starting_url)
}

pub async fn load_workflow(path: &Path) -> Result<Workflow, WorkflowFileError> {
    let content = tokio::fs::read_to_string(path).await?;
    let workflow = Workflow::from_json(&content)?;
    debug!(
        path = %path.display(),
        browsers = workflow.browsers.len(),
        loop_actions = workflow.loop_actions.len(),
        "Workflow loaded"
    );
    Ok(workflow)
}

/// Write `workflow` as pretty-printed JSON. Unknown top-level fields read
/// from the original file are written back unchanged.
pub async fn save_workflow(path: &Path, workflow: &Workflow) -> Result<(), WorkflowFileError> {
    let content = workflow.to_json_pretty()?;
    tokio::fs::write(path, content).await?;
    info!(path = %path.display(), "Workflow saved");
    Ok(())
}
