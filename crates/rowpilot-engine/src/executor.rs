//! Workflow execution loop.
//!
//! A run moves through `Init -> PreLoop -> Loop -> PostLoop -> Done`, and
//! can end in `Failed` from any phase. Everything that can be checked
//! without touching a browser is checked before the first launch.

use rowpilot_common::error::BackendError;
use rowpilot_common::protocol::{ActionKind, Section, Workflow};
use rowpilot_common::row::RowData;
use rowpilot_core::selector::{Blacklist, Reliability};
use rowpilot_core::template::{
    ActionTemplateError, TemplateError, check_workflow_syntax, is_template, validate_templates,
};
use rowpilot_core::{ExecutionConfig, SelectorPolicy};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::backend::{BrowserLauncher, BrowserPool};
use crate::dispatch::{ActionError, dispatch, normalize_url, resolve_action};
use crate::recovery::recover;

/// Stop signal shared with the caller. Rows check it at their boundaries,
/// and waits that can outlast an action timeout race against it.
pub use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Browser '{alias}' is not initialized (declared: {})", declared.join(", "))]
    BrowserNotInitialized { alias: String, declared: Vec<String> },

    #[error("Template error in {0}")]
    Template(#[from] ActionTemplateError),

    #[error("Loop actions reference a column missing from the data: {0}")]
    MissingColumn(TemplateError),

    #[error("Failed to start browser '{alias}': {source}")]
    Launch {
        alias: String,
        #[source]
        source: BackendError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    PreLoop,
    Loop,
    PostLoop,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowFailurePolicy {
    /// Abort the run at the first failing row.
    #[default]
    StopOnFirstError,
    /// Record the failure, skip the rest of that row and carry on.
    ContinueOnError,
}

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub failure_policy: RowFailurePolicy,
    pub action_timeout: Duration,
    pub self_heal: bool,
    /// Upper bound on waiting for the user to re-pick a broken element.
    pub pick_timeout: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from(&ExecutionConfig::default())
    }
}

impl From<&ExecutionConfig> for ExecutorOptions {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            failure_policy: if config.stop_on_error {
                RowFailurePolicy::StopOnFirstError
            } else {
                RowFailurePolicy::ContinueOnError
            },
            action_timeout: Duration::from_millis(config.action_timeout_ms),
            self_heal: config.self_heal,
            pick_timeout: Duration::from_millis(config.pick_timeout_ms),
        }
    }
}

/// Progress notifications for a UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    PhaseChanged(Phase),
    RowStarted {
        index: usize,
        total: usize,
    },
    RowFinished {
        index: usize,
        success: bool,
    },
    ActionCompleted {
        section: Section,
        row: Option<usize>,
        index: usize,
        action: String,
    },
    SelectorHealed(HealedSelector),
}

/// Where and why a run step failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepFailure {
    pub section: Section,
    pub row: Option<usize>,
    pub action_index: usize,
    pub action: String,
    pub message: String,
    pub hint: Option<&'static str>,
}

impl StepFailure {
    fn new(
        section: Section,
        row: Option<usize>,
        action_index: usize,
        action: String,
        err: &ActionError,
    ) -> Self {
        Self {
            section,
            row,
            action_index,
            action,
            message: err.to_string(),
            hint: err.hint(),
        }
    }
}

/// A selector replaced by self-healing during the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealedSelector {
    pub section: Section,
    pub index: usize,
    pub previous: String,
    pub selector: String,
    pub reliability: Reliability,
}

impl HealedSelector {
    /// Write the new selector into `workflow`. Returns false when the
    /// action no longer exists.
    pub fn apply(&self, workflow: &mut Workflow) -> bool {
        match workflow.section_mut(self.section).get_mut(self.index) {
            Some(step) => {
                step.kind = step.kind.with_selector(&self.selector);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowOutcome {
    pub index: usize,
    pub status: RowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub phase: Phase,
    pub total_rows: usize,
    pub completed_rows: usize,
    pub failed_rows: usize,
    pub cancelled: bool,
    pub rows: Vec<RowOutcome>,
    pub first_error: Option<StepFailure>,
    pub healed: Vec<HealedSelector>,
}

impl RunReport {
    fn new(total_rows: usize) -> Self {
        Self {
            phase: Phase::Init,
            total_rows,
            completed_rows: 0,
            failed_rows: 0,
            cancelled: false,
            rows: Vec::new(),
            first_error: None,
            healed: Vec::new(),
        }
    }

    /// Finished every phase with no failed row.
    pub fn is_success(&self) -> bool {
        self.phase == Phase::Done && self.failed_rows == 0
    }

    fn record_failure(&mut self, failure: StepFailure) {
        if self.first_error.is_none() {
            self.first_error = Some(failure);
        }
    }
}

enum SectionError {
    Fatal(ExecutorError),
    Step(StepFailure),
    /// The stop signal fired while an action was waiting.
    Cancelled,
}

impl From<ExecutorError> for SectionError {
    fn from(err: ExecutorError) -> Self {
        SectionError::Fatal(err)
    }
}

fn emit(events: &Option<UnboundedSender<ExecutionEvent>>, event: ExecutionEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is watching.
        let _ = tx.send(event);
    }
}

pub struct WorkflowExecutor<'a> {
    pool: &'a mut BrowserPool,
    launcher: &'a dyn BrowserLauncher,
    options: ExecutorOptions,
    policy: SelectorPolicy,
    cancel: CancellationToken,
    events: Option<UnboundedSender<ExecutionEvent>>,
    blacklist: Blacklist,
    overrides: HashMap<(Section, usize), String>,
    healed: Vec<HealedSelector>,
    phase: Phase,
}

impl<'a> WorkflowExecutor<'a> {
    pub fn new(pool: &'a mut BrowserPool, launcher: &'a dyn BrowserLauncher) -> Self {
        Self {
            pool,
            launcher,
            options: ExecutorOptions::default(),
            policy: SelectorPolicy::default(),
            cancel: CancellationToken::new(),
            events: None,
            blacklist: Blacklist::new(),
            overrides: HashMap::new(),
            healed: Vec::new(),
            phase: Phase::Init,
        }
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    /// Selector policy used when self-healing derives a new selector.
    pub fn with_policy(mut self, policy: SelectorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<ExecutionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    fn enter(&mut self, phase: Phase) {
        debug!(?phase, "Entering phase");
        self.phase = phase;
        emit(&self.events, ExecutionEvent::PhaseChanged(phase));
    }

    fn finish(&mut self, mut report: RunReport, phase: Phase) -> RunReport {
        self.enter(phase);
        report.phase = phase;
        report.healed = std::mem::take(&mut self.healed);
        report
    }

    fn cancelled(&mut self, mut report: RunReport) -> RunReport {
        warn!(
            completed = report.completed_rows,
            total = report.total_rows,
            "Run cancelled"
        );
        report.cancelled = true;
        self.finish(report, Phase::Failed)
    }

    /// Run `workflow` once per row.
    ///
    /// `Err` is returned only for problems that make the whole run
    /// meaningless (undeclared browsers, broken templates, missing columns,
    /// browsers that cannot start). Action failures are reported in the
    /// returned [`RunReport`].
    pub async fn run(
        &mut self,
        workflow: &Workflow,
        rows: &[RowData],
    ) -> Result<RunReport, ExecutorError> {
        let mut report = RunReport::new(rows.len());
        self.overrides.clear();
        self.healed.clear();

        self.enter(Phase::Init);
        if let Err(e) = self.preflight(workflow, rows) {
            self.enter(Phase::Failed);
            return Err(e);
        }
        if let Err(e) = self.launch_browsers(workflow).await {
            self.enter(Phase::Failed);
            return Err(e);
        }

        for (phase, section) in [
            (Phase::Init, Section::Initialization),
            (Phase::PreLoop, Section::PreLoop),
        ] {
            if phase != self.phase {
                self.enter(phase);
            }
            match self.run_section(workflow, section, None).await {
                Ok(()) => {}
                Err(SectionError::Fatal(e)) => {
                    self.enter(Phase::Failed);
                    return Err(e);
                }
                Err(SectionError::Step(failure)) => {
                    error!(
                        section = %section,
                        action = %failure.action,
                        error = %failure.message,
                        "Setup action failed"
                    );
                    report.record_failure(failure);
                    return Ok(self.finish(report, Phase::Failed));
                }
                Err(SectionError::Cancelled) => return Ok(self.cancelled(report)),
            }
        }

        self.enter(Phase::Loop);
        let total = rows.len();
        for (index, row) in rows.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Ok(self.cancelled(report));
            }

            info!(row = index + 1, total, "Processing row");
            emit(&self.events, ExecutionEvent::RowStarted { index, total });

            match self.run_section(workflow, Section::Loop, Some((index, row))).await {
                Ok(()) => {
                    report.completed_rows += 1;
                    report.rows.push(RowOutcome {
                        index,
                        status: RowStatus::Succeeded,
                        error: None,
                    });
                    emit(&self.events, ExecutionEvent::RowFinished { index, success: true });
                }
                Err(SectionError::Fatal(e)) => {
                    self.enter(Phase::Failed);
                    return Err(e);
                }
                Err(SectionError::Cancelled) => return Ok(self.cancelled(report)),
                Err(SectionError::Step(failure)) => {
                    error!(
                        row = index + 1,
                        action = %failure.action,
                        error = %failure.message,
                        "Row failed"
                    );
                    report.failed_rows += 1;
                    report.rows.push(RowOutcome {
                        index,
                        status: RowStatus::Failed,
                        error: Some(failure.clone()),
                    });
                    report.record_failure(failure);
                    emit(&self.events, ExecutionEvent::RowFinished { index, success: false });

                    if self.options.failure_policy == RowFailurePolicy::StopOnFirstError {
                        return Ok(self.finish(report, Phase::Failed));
                    }
                }
            }
        }

        self.enter(Phase::PostLoop);
        match self.run_section(workflow, Section::PostLoop, None).await {
            Ok(()) => {}
            Err(SectionError::Fatal(e)) => {
                self.enter(Phase::Failed);
                return Err(e);
            }
            Err(SectionError::Step(failure)) => {
                error!(
                    action = %failure.action,
                    error = %failure.message,
                    "Post-loop action failed"
                );
                report.record_failure(failure);
                return Ok(self.finish(report, Phase::Failed));
            }
            Err(SectionError::Cancelled) => return Ok(self.cancelled(report)),
        }

        info!(
            completed = report.completed_rows,
            failed = report.failed_rows,
            total,
            "Run finished"
        );
        Ok(self.finish(report, Phase::Done))
    }

    fn preflight(&self, workflow: &Workflow, rows: &[RowData]) -> Result<(), ExecutorError> {
        if let Some(alias) = workflow.undeclared_aliases().into_iter().next() {
            return Err(ExecutorError::BrowserNotInitialized {
                alias: alias.to_string(),
                declared: workflow.browsers.keys().cloned().collect(),
            });
        }

        check_workflow_syntax(workflow)?;

        if let Some(first) = rows.first() {
            let available: Vec<String> = first.column_names().map(String::from).collect();
            let report = validate_templates(workflow, &available)?;
            if let Some(missing) = report.missing_columns.into_iter().next() {
                return Err(ExecutorError::MissingColumn(TemplateError::MissingColumn {
                    name: missing.name,
                    suggestion: missing.suggestion,
                }));
            }
        }
        Ok(())
    }

    async fn launch_browsers(&mut self, workflow: &Workflow) -> Result<(), ExecutorError> {
        for (alias, config) in &workflow.browsers {
            if self.pool.contains(alias) {
                debug!(alias = %alias, "Reusing live browser");
                continue;
            }

            info!(alias = %alias, browser = %config.browser_type, "Launching browser");
            let backend = self
                .launcher
                .launch(alias, config.browser_type)
                .await
                .map_err(|source| ExecutorError::Launch {
                    alias: alias.clone(),
                    source,
                })?;
            self.pool.insert(alias.clone(), backend);

            if let Some(url) = &config.starting_url {
                let launch_error = |reason: String| ExecutorError::Launch {
                    alias: alias.clone(),
                    source: BackendError::Navigation(reason),
                };
                let url = normalize_url(url).map_err(|e| launch_error(e.to_string()))?;
                if let Some(backend) = self.pool.get(alias) {
                    backend
                        .navigate(&url)
                        .await
                        .map_err(|e| launch_error(e.to_string()))?;
                }
            }
        }
        Ok(())
    }

    async fn run_section(
        &mut self,
        workflow: &Workflow,
        section: Section,
        row: Option<(usize, &RowData)>,
    ) -> Result<(), SectionError> {
        let row_index = row.map(|(i, _)| i);
        let timeout = self.options.action_timeout;
        let pick_timeout = self.options.pick_timeout;
        let cancel = self.cancel.clone();

        for (index, step) in workflow.section(section).iter().enumerate() {
            let label = step.label();
            let Some(backend) = self.pool.get(&step.browser_alias) else {
                return Err(ExecutorError::BrowserNotInitialized {
                    alias: step.browser_alias.clone(),
                    declared: workflow.browsers.keys().cloned().collect(),
                }
                .into());
            };

            let base: Cow<'_, ActionKind> = match self.overrides.get(&(section, index)) {
                Some(selector) => Cow::Owned(step.kind.with_selector(selector)),
                None => Cow::Borrowed(&step.kind),
            };
            let fail = |err: &ActionError| {
                SectionError::Step(StepFailure::new(section, row_index, index, label.clone(), err))
            };

            let kind = resolve_action(&base, row.map(|(_, r)| r))
                .map_err(|e| fail(&ActionError::Template(e)))?;

            debug!(
                section = %section,
                index,
                action = kind.type_name(),
                alias = %step.browser_alias,
                "Dispatching action"
            );
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SectionError::Cancelled),
                result = dispatch(backend, &kind, timeout) => result,
            };

            match result {
                Ok(()) => {}
                Err(err)
                    if self.options.self_heal
                        && err.is_locator_failure()
                        && base.selector().is_some_and(|s| !is_template(s)) =>
                {
                    let previous = base.selector().unwrap_or_default().to_string();
                    warn!(
                        selector = %previous,
                        error = %err,
                        "Selector no longer matches, starting recovery"
                    );

                    let pick = tokio::time::timeout(
                        pick_timeout,
                        recover(backend, &previous, &self.policy, &mut self.blacklist),
                    );
                    let recovery = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(SectionError::Cancelled),
                        outcome = pick => match outcome {
                            Ok(Ok(recovery)) => recovery,
                            Ok(Err(e)) => {
                                warn!(error = %e, "Recovery failed");
                                return Err(fail(&err));
                            }
                            Err(_) => {
                                warn!(
                                    timeout_ms = pick_timeout.as_millis() as u64,
                                    "No replacement element picked in time"
                                );
                                return Err(fail(&err));
                            }
                        },
                    };

                    let healed_kind = kind.with_selector(&recovery.resolved.selector);
                    dispatch(backend, &healed_kind, timeout)
                        .await
                        .map_err(|e| fail(&e))?;

                    let healed = HealedSelector {
                        section,
                        index,
                        previous,
                        selector: recovery.resolved.selector.clone(),
                        reliability: recovery.resolved.reliability(),
                    };
                    info!(selector = %healed.selector, "Selector healed");
                    self.overrides.insert((section, index), healed.selector.clone());
                    emit(&self.events, ExecutionEvent::SelectorHealed(healed.clone()));
                    self.healed.push(healed);
                }
                Err(err) => return Err(fail(&err)),
            }

            emit(
                &self.events,
                ExecutionEvent::ActionCompleted {
                    section,
                    row: row_index,
                    index,
                    action: label,
                },
            );
        }
        Ok(())
    }
}
