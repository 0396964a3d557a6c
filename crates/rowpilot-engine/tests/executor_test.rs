use async_trait::async_trait;
use rowpilot_common::protocol::{ActionKind, ActionStep, BrowserConfig, BrowserKind, Workflow};
use rowpilot_common::row::RowData;
use rowpilot_core::selector::{ElementNode, MatchSet, SnapshotChain};
use rowpilot_engine::backend::{
    Backend, BackendError, BrowserLauncher, BrowserPool, NavigationResult,
};
use rowpilot_engine::executor::{
    CancellationToken, ExecutionEvent, ExecutorError, ExecutorOptions, Phase, RowFailurePolicy,
    RowStatus, WorkflowExecutor,
};
use rowpilot_engine::formatter::format_report;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Navigate(String, String),
    Click(String, String),
    Fill(String, String, String),
    PressKey(String, String),
    Pick(String),
}

/// Behaviour shared by every page the launcher hands out.
#[derive(Clone, Default)]
struct Script {
    log: Arc<Mutex<Vec<Call>>>,
    /// `fill` fails for these values.
    rejected_values: Vec<String>,
    /// `click` reports these selectors as gone.
    missing_selectors: Vec<String>,
    /// `click` on these selectors never completes.
    hanging_selectors: Vec<String>,
    matches: HashMap<String, MatchSet>,
    picked: Option<SnapshotChain>,
    /// `pick_element` waits for a user who never answers.
    hanging_pick: bool,
    /// Fire the token once this value has been filled.
    cancel_after_fill: Option<(String, CancellationToken)>,
}

impl Script {
    fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    fn fills(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Fill(_, _, value) => Some(value),
                _ => None,
            })
            .collect()
    }
}

struct MockBackend {
    alias: String,
    script: Script,
}

impl MockBackend {
    fn record(&self, call: Call) {
        self.script.log.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        self.record(Call::Navigate(self.alias.clone(), url.to_string()));
        Ok(NavigationResult {
            url: url.to_string(),
            title: "Mock".into(),
        })
    }

    async fn click(&mut self, selector: &str) -> Result<(), BackendError> {
        if self.script.hanging_selectors.iter().any(|s| s == selector) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.script.missing_selectors.iter().any(|s| s == selector) {
            return Err(BackendError::ElementNotFound {
                selector: selector.to_string(),
            });
        }
        self.record(Call::Click(self.alias.clone(), selector.to_string()));
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BackendError> {
        if self.script.rejected_values.iter().any(|v| v == value) {
            return Err(BackendError::ElementNotInteractable {
                selector: selector.to_string(),
                reason: "disabled".into(),
            });
        }
        self.record(Call::Fill(
            self.alias.clone(),
            selector.to_string(),
            value.to_string(),
        ));
        if let Some((trigger, token)) = &self.script.cancel_after_fill
            && trigger == value
        {
            token.cancel();
        }
        Ok(())
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), BackendError> {
        self.fill(selector, text).await
    }

    async fn press_key(&mut self, key: &str) -> Result<(), BackendError> {
        self.record(Call::PressKey(self.alias.clone(), key.to_string()));
        Ok(())
    }

    async fn wait_for_element(
        &mut self,
        _selector: &str,
        _timeout: Duration,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn query(&mut self, selector: &str) -> Result<MatchSet, BackendError> {
        Ok(self.script.matches.get(selector).copied().unwrap_or_default())
    }

    async fn pick_element(&mut self) -> Result<SnapshotChain, BackendError> {
        self.record(Call::Pick(self.alias.clone()));
        if self.script.hanging_pick {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.script.picked.clone().ok_or(BackendError::PickCancelled)
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[derive(Default)]
struct MockLauncher {
    script: Script,
    launched: Mutex<Vec<String>>,
}

impl MockLauncher {
    fn new(script: Script) -> Self {
        Self {
            script,
            launched: Mutex::new(Vec::new()),
        }
    }

    fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(
        &self,
        alias: &str,
        _kind: BrowserKind,
    ) -> Result<Box<dyn Backend>, BackendError> {
        self.launched.lock().unwrap().push(alias.to_string());
        Ok(Box::new(MockBackend {
            alias: alias.to_string(),
            script: self.script.clone(),
        }))
    }
}

fn fill_email_workflow() -> Workflow {
    let mut workflow = Workflow::new("signup", BrowserKind::Chrome, None);
    workflow.loop_actions.push(ActionStep::new(ActionKind::FillField {
        selector: "#email".into(),
        value: "{{col('Email')}}".into(),
    }));
    workflow
}

fn email_rows(emails: &[&str]) -> Vec<RowData> {
    emails
        .iter()
        .map(|e| RowData::from_pairs([("Email", *e)]))
        .collect()
}

#[tokio::test]
async fn test_fill_runs_once_per_row() {
    let script = Script::default();
    let launcher = MockLauncher::new(script.clone());
    let mut pool = BrowserPool::new();

    let report = WorkflowExecutor::new(&mut pool, &launcher)
        .run(&fill_email_workflow(), &email_rows(&["a@x.com", "b@x.com"]))
        .await
        .unwrap();

    assert_eq!(script.fills(), vec!["a@x.com", "b@x.com"]);
    assert_eq!(report.phase, Phase::Done);
    assert_eq!(report.completed_rows, 2);
    assert!(report.is_success());
    assert_eq!(launcher.launched(), vec!["main"]);
}

#[tokio::test]
async fn test_undeclared_alias_aborts_before_dispatch() {
    let mut workflow = fill_email_workflow();
    workflow.loop_actions.push(
        ActionStep::new(ActionKind::Click {
            selector: "#go".into(),
        })
        .on("secondary"),
    );
    let script = Script::default();
    let launcher = MockLauncher::new(script.clone());
    let mut pool = BrowserPool::new();

    let mut executor = WorkflowExecutor::new(&mut pool, &launcher);
    let err = executor
        .run(&workflow, &email_rows(&["a@x.com"]))
        .await
        .unwrap_err();

    match err {
        ExecutorError::BrowserNotInitialized { alias, declared } => {
            assert_eq!(alias, "secondary");
            assert_eq!(declared, vec!["main"]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(executor.phase(), Phase::Failed);
    assert!(script.calls().is_empty());
    assert!(launcher.launched().is_empty());
}

#[tokio::test]
async fn test_stop_on_first_error() {
    let script = Script {
        rejected_values: vec!["c@x.com".into()],
        ..Default::default()
    };
    let launcher = MockLauncher::new(script.clone());
    let mut pool = BrowserPool::new();
    let rows = email_rows(&["a@x.com", "b@x.com", "c@x.com", "d@x.com", "e@x.com"]);

    let report = WorkflowExecutor::new(&mut pool, &launcher)
        .run(&fill_email_workflow(), &rows)
        .await
        .unwrap();

    assert_eq!(script.fills(), vec!["a@x.com", "b@x.com"]);
    assert_eq!(report.phase, Phase::Failed);
    assert_eq!(report.completed_rows, 2);
    assert_eq!(report.total_rows, 5);
    let first = report.first_error.as_ref().unwrap();
    assert_eq!(first.row, Some(2));
    assert!(first.message.contains("fill_field failed"));
    assert!(format_report(&report).starts_with("2 of 5 rows completed, 1 failed"));
}

#[tokio::test]
async fn test_continue_on_error_records_each_row() {
    let script = Script {
        rejected_values: vec!["c@x.com".into()],
        ..Default::default()
    };
    let launcher = MockLauncher::new(script.clone());
    let mut pool = BrowserPool::new();
    let rows = email_rows(&["a@x.com", "b@x.com", "c@x.com", "d@x.com", "e@x.com"]);
    let mut workflow = fill_email_workflow();
    workflow.loop_actions.push(ActionStep::new(ActionKind::PressKey {
        key: "Enter".into(),
    }));

    let report = WorkflowExecutor::new(&mut pool, &launcher)
        .with_options(ExecutorOptions {
            failure_policy: RowFailurePolicy::ContinueOnError,
            ..Default::default()
        })
        .run(&workflow, &rows)
        .await
        .unwrap();

    assert_eq!(script.fills(), vec!["a@x.com", "b@x.com", "d@x.com", "e@x.com"]);
    let presses = script
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::PressKey(..)))
        .count();
    assert_eq!(presses, 4, "the failing row's remaining actions are skipped");
    assert_eq!(report.phase, Phase::Done);
    assert_eq!(report.completed_rows, 4);
    assert_eq!(report.failed_rows, 1);
    assert_eq!(report.rows[2].status, RowStatus::Failed);
    assert!(!report.is_success());
}

#[tokio::test]
async fn test_setup_sections_run_once_without_row() {
    let mut workflow = fill_email_workflow();
    workflow.pre_loop_actions.push(ActionStep::new(ActionKind::Click {
        selector: "//a[@id=\"{{col(0)}}\"]".into(),
    }));
    workflow.post_loop_actions.push(ActionStep::new(ActionKind::Click {
        selector: "#logout".into(),
    }));
    let script = Script::default();
    let launcher = MockLauncher::new(script.clone());
    let mut pool = BrowserPool::new();

    WorkflowExecutor::new(&mut pool, &launcher)
        .run(&workflow, &email_rows(&["a@x.com", "b@x.com"]))
        .await
        .unwrap();

    let calls = script.calls();
    assert_eq!(
        calls.first(),
        Some(&Call::Click("main".into(), "//a[@id=\"{{col(0)}}\"]".into()))
    );
    assert_eq!(
        calls.last(),
        Some(&Call::Click("main".into(), "#logout".into()))
    );
    assert_eq!(calls.len(), 4);
}

#[tokio::test]
async fn test_missing_column_fails_preflight() {
    let script = Script::default();
    let launcher = MockLauncher::new(script.clone());
    let mut pool = BrowserPool::new();
    let rows = vec![RowData::from_pairs([("email", "a@x.com")])];

    let err = WorkflowExecutor::new(&mut pool, &launcher)
        .run(&fill_email_workflow(), &rows)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutorError::MissingColumn(_)));
    assert!(err.to_string().contains("did you mean 'email'"));
    assert!(launcher.launched().is_empty());
}

#[tokio::test]
async fn test_index_out_of_range_fails_the_row() {
    let mut workflow = Workflow::new("w", BrowserKind::Chrome, None);
    workflow.loop_actions.push(ActionStep::new(ActionKind::FillField {
        selector: "#x".into(),
        value: "{{col(5)}}".into(),
    }));
    let launcher = MockLauncher::default();
    let mut pool = BrowserPool::new();
    let rows = vec![RowData::from_pairs([("a", 1i64), ("b", 2i64), ("c", 3i64)])];

    let report = WorkflowExecutor::new(&mut pool, &launcher)
        .run(&workflow, &rows)
        .await
        .unwrap();

    assert_eq!(report.phase, Phase::Failed);
    let message = &report.first_error.unwrap().message;
    assert!(message.contains("out of range"), "{}", message);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_action_times_out() {
    let mut workflow = Workflow::new("w", BrowserKind::Chrome, None);
    workflow.loop_actions.push(ActionStep::new(ActionKind::Click {
        selector: "#spinner".into(),
    }));
    let script = Script {
        hanging_selectors: vec!["#spinner".into()],
        ..Default::default()
    };
    let launcher = MockLauncher::new(script);
    let mut pool = BrowserPool::new();

    let report = WorkflowExecutor::new(&mut pool, &launcher)
        .with_options(ExecutorOptions {
            action_timeout: Duration::from_millis(250),
            ..Default::default()
        })
        .run(&workflow, &[RowData::new()])
        .await
        .unwrap();

    let failure = report.first_error.unwrap();
    assert_eq!(failure.message, "click timed out after 250ms");
    assert_eq!(report.completed_rows, 0);
}

#[tokio::test]
async fn test_cancelled_run_stops_at_row_boundary() {
    let launcher = MockLauncher::default();
    let mut pool = BrowserPool::new();
    let token = CancellationToken::new();
    token.cancel();

    let report = WorkflowExecutor::new(&mut pool, &launcher)
        .with_cancellation(token)
        .run(&fill_email_workflow(), &email_rows(&["a@x.com", "b@x.com"]))
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.phase, Phase::Failed);
    assert_eq!(report.completed_rows, 0);
    assert!(format_report(&report).contains("Status: cancelled"));
}

#[tokio::test]
async fn test_cancel_during_row_finishes_that_row_only() {
    let token = CancellationToken::new();
    let script = Script {
        cancel_after_fill: Some(("a@x.com".into(), token.clone())),
        ..Default::default()
    };
    let launcher = MockLauncher::new(script.clone());
    let mut pool = BrowserPool::new();
    let mut workflow = fill_email_workflow();
    workflow.post_loop_actions.push(ActionStep::new(ActionKind::Click {
        selector: "#logout".into(),
    }));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let report = WorkflowExecutor::new(&mut pool, &launcher)
        .with_cancellation(token)
        .with_events(tx)
        .run(&workflow, &email_rows(&["a@x.com", "b@x.com", "c@x.com"]))
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.phase, Phase::Failed);
    assert_eq!(report.completed_rows, 1);
    assert_eq!(report.failed_rows, 0);
    assert_eq!(script.fills(), vec!["a@x.com"]);
    assert!(!script.calls().iter().any(|c| matches!(c, Call::Click(..))));

    let mut phases = Vec::new();
    let mut started = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            ExecutionEvent::PhaseChanged(phase) => phases.push(phase),
            ExecutionEvent::RowStarted { index, .. } => started.push(index),
            _ => {}
        }
    }
    assert_eq!(started, vec![0]);
    assert!(!phases.contains(&Phase::PostLoop));
    assert_eq!(phases.last(), Some(&Phase::Failed));
}

const GONE: &str = "//button[@id=\"gone\"]";

#[tokio::test(start_paused = true)]
async fn test_unanswered_pick_fails_row_after_pick_timeout() {
    let mut workflow = Workflow::new("w", BrowserKind::Chrome, None);
    workflow.loop_actions.push(ActionStep::new(ActionKind::Click {
        selector: GONE.into(),
    }));
    let script = Script {
        missing_selectors: vec![GONE.into()],
        hanging_pick: true,
        ..Default::default()
    };
    let launcher = MockLauncher::new(script.clone());
    let mut pool = BrowserPool::new();

    let report = WorkflowExecutor::new(&mut pool, &launcher)
        .with_options(ExecutorOptions {
            self_heal: true,
            pick_timeout: Duration::from_secs(30),
            failure_policy: RowFailurePolicy::ContinueOnError,
            ..Default::default()
        })
        .run(&workflow, &[RowData::new(), RowData::new()])
        .await
        .unwrap();

    assert_eq!(report.phase, Phase::Done);
    assert_eq!(report.failed_rows, 2);
    assert!(report.healed.is_empty());
    let picks = script
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Pick(_)))
        .count();
    assert_eq!(picks, 2);
    let message = &report.first_error.unwrap().message;
    assert!(message.contains("No element matches selector"), "{}", message);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_pending_pick() {
    let mut workflow = Workflow::new("w", BrowserKind::Chrome, None);
    workflow.loop_actions.push(ActionStep::new(ActionKind::Click {
        selector: GONE.into(),
    }));
    let script = Script {
        missing_selectors: vec![GONE.into()],
        hanging_pick: true,
        ..Default::default()
    };
    let launcher = MockLauncher::new(script);
    let mut pool = BrowserPool::new();
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let report = WorkflowExecutor::new(&mut pool, &launcher)
        .with_options(ExecutorOptions {
            self_heal: true,
            pick_timeout: Duration::from_secs(600),
            ..Default::default()
        })
        .with_cancellation(token)
        .run(&workflow, &[RowData::new(), RowData::new()])
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.phase, Phase::Failed);
    assert_eq!(report.completed_rows, 0);
    assert_eq!(report.failed_rows, 0);
    assert!(report.first_error.is_none());
}

#[tokio::test]
async fn test_browsers_launch_once_and_open_starting_url() {
    let mut workflow = fill_email_workflow();
    workflow.browsers.insert(
        "admin".into(),
        BrowserConfig {
            browser_type: BrowserKind::Chromium,
            starting_url: Some("admin.example.com".into()),
        },
    );
    workflow.loop_actions.push(
        ActionStep::new(ActionKind::Click {
            selector: "#approve".into(),
        })
        .on("admin"),
    );
    let script = Script::default();
    let launcher = MockLauncher::new(script.clone());
    let mut pool = BrowserPool::new();
    pool.insert(
        "main",
        Box::new(MockBackend {
            alias: "main".into(),
            script: script.clone(),
        }),
    );

    WorkflowExecutor::new(&mut pool, &launcher)
        .run(&workflow, &email_rows(&["a@x.com"]))
        .await
        .unwrap();

    assert_eq!(launcher.launched(), vec!["admin"]);
    assert_eq!(
        script.calls(),
        vec![
            Call::Navigate("admin".into(), "https://admin.example.com/".into()),
            Call::Fill("main".into(), "#email".into(), "a@x.com".into()),
            Call::Click("admin".into(), "#approve".into()),
        ]
    );
}

#[tokio::test]
async fn test_browsers_launch_in_declaration_order() {
    let mut workflow = fill_email_workflow();
    for alias in ["zeta", "admin"] {
        workflow.browsers.insert(
            alias.into(),
            BrowserConfig {
                browser_type: BrowserKind::Chrome,
                starting_url: None,
            },
        );
    }
    workflow.loop_actions.push(
        ActionStep::new(ActionKind::Click {
            selector: "#go".into(),
        })
        .on("audit"),
    );
    let launcher = MockLauncher::default();
    let mut pool = BrowserPool::new();

    let err = WorkflowExecutor::new(&mut pool, &launcher)
        .run(&workflow, &email_rows(&["a@x.com"]))
        .await
        .unwrap_err();
    match err {
        ExecutorError::BrowserNotInitialized { declared, .. } => {
            assert_eq!(declared, vec!["main", "zeta", "admin"]);
        }
        other => panic!("unexpected error: {}", other),
    }

    workflow.loop_actions.pop();
    WorkflowExecutor::new(&mut pool, &launcher)
        .run(&workflow, &email_rows(&["a@x.com"]))
        .await
        .unwrap();
    assert_eq!(launcher.launched(), vec!["main", "zeta", "admin"]);
}

#[tokio::test]
async fn test_self_heal_repicks_and_reuses_selector() {
    let old = "//button[@id=\"submit\"]";
    let new = "//button[@data-testid=\"send\"]";
    let mut workflow = Workflow::new("w", BrowserKind::Chrome, None);
    workflow.loop_actions.push(ActionStep::new(ActionKind::Click {
        selector: old.into(),
    }));

    let mut matches = HashMap::new();
    matches.insert(new.to_string(), MatchSet::new(1, true));
    let script = Script {
        missing_selectors: vec![old.into()],
        matches,
        picked: Some(SnapshotChain::new(
            ElementNode::new("button").attr("data-testid", "send"),
        )),
        ..Default::default()
    };
    let launcher = MockLauncher::new(script.clone());
    let mut pool = BrowserPool::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let mut executor = WorkflowExecutor::new(&mut pool, &launcher)
        .with_options(ExecutorOptions {
            self_heal: true,
            ..Default::default()
        })
        .with_events(tx);
    let report = executor
        .run(&workflow, &[RowData::new(), RowData::new()])
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(executor.blacklist().contains("button", "id", "submit"));
    assert_eq!(report.healed.len(), 1);
    assert_eq!(report.healed[0].selector, new);
    assert_eq!(
        script.calls(),
        vec![
            Call::Pick("main".into()),
            Call::Click("main".into(), new.into()),
            Call::Click("main".into(), new.into()),
        ]
    );

    let mut healed_events = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, ExecutionEvent::SelectorHealed(_)) {
            healed_events += 1;
        }
    }
    assert_eq!(healed_events, 1);

    let mut saved = workflow.clone();
    assert!(report.healed[0].apply(&mut saved));
    assert_eq!(saved.loop_actions[0].kind.selector(), Some(new));
}

#[tokio::test]
async fn test_locator_failure_without_self_heal_fails_row() {
    let mut workflow = Workflow::new("w", BrowserKind::Chrome, None);
    workflow.loop_actions.push(ActionStep::new(ActionKind::Click {
        selector: "#gone".into(),
    }));
    let script = Script {
        missing_selectors: vec!["#gone".into()],
        ..Default::default()
    };
    let launcher = MockLauncher::new(script.clone());
    let mut pool = BrowserPool::new();

    let report = WorkflowExecutor::new(&mut pool, &launcher)
        .run(&workflow, &[RowData::new()])
        .await
        .unwrap();

    assert_eq!(report.phase, Phase::Failed);
    assert!(!script.calls().iter().any(|c| matches!(c, Call::Pick(_))));
    assert_eq!(
        report.first_error.unwrap().hint,
        Some("Re-pick the element or enable self-healing")
    );
}

#[tokio::test]
async fn test_phase_events_in_order() {
    let launcher = MockLauncher::default();
    let mut pool = BrowserPool::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    WorkflowExecutor::new(&mut pool, &launcher)
        .with_events(tx)
        .run(&fill_email_workflow(), &email_rows(&["a@x.com"]))
        .await
        .unwrap();

    let mut phases = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ExecutionEvent::PhaseChanged(phase) = event {
            phases.push(phase);
        }
    }
    assert_eq!(
        phases,
        vec![
            Phase::Init,
            Phase::PreLoop,
            Phase::Loop,
            Phase::PostLoop,
            Phase::Done
        ]
    );
}
