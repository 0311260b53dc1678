use crate::api::{CommandApi, MethodologyApi};
use crate::config::Settings;
use crate::engine::cancel::{sleep_with_cancel, CancelToken};
use crate::engine::error::EngineError;
use crate::engine::exec::{ExecClient, ExecOutcome};
use crate::engine::gate::ManualGate;
use crate::engine::terminal::{EntryStatus, TerminalLog};
use crate::history::HistoryStore;
use crate::model::{Methodology, Project, Step, StepKind};
use crate::shared::ids::generate_run_id;
use crate::shared::logging::append_diagnostics_line;
use crate::shared::time::now_secs;
use std::path::PathBuf;
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const STOPPED_COMMAND: &str = "Execution stopped by user";
pub const STOPPED_OUTPUT: &str = "Process was manually stopped";
pub const STOP_SIGNAL_COMMAND: &str = "STOP SIGNAL SENT";
pub const STOP_SIGNAL_OUTPUT: &str = "Stopping execution after current step completes...";
pub const MANUAL_WAITING_OUTPUT: &str = "Waiting for manual completion...";
pub const MANUAL_COMPLETED_OUTPUT: &str = "Manual step evidence uploaded";
pub const MANUAL_CANCELLED_OUTPUT: &str = "Execution was stopped";

/// Snapshot of the run loop the UI observes. Exists only while a run is
/// active; reset to defaults when the run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionState {
    pub is_running: bool,
    pub current_step_index: usize,
    pub should_stop: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    Completed,
    Cancelled,
}

impl RunEnd {
    fn as_str(self) -> &'static str {
        match self {
            RunEnd::Completed => "completed",
            RunEnd::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: String,
    pub end: RunEnd,
    pub steps_run: u32,
}

/// Best-effort progress notifications; delivery never blocks the run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    RunStarted { run_id: String },
    StepStarted { index: usize, step_id: String },
    ManualStepPrompt { step: Step },
    ManualStepDismissed { step_id: String },
    RunFinished { run_id: String, end: RunEnd },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    pub step_delay: Duration,
    pub manual_poll: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(500),
            manual_poll: Duration::from_millis(1000),
        }
    }
}

impl RunnerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            step_delay: Duration::from_millis(settings.step_delay_ms),
            manual_poll: Duration::from_millis(settings.manual_poll_ms),
        }
    }
}

/// Sequences the steps of the selected methodology against the selected
/// project: command steps go through the execution client, manual steps
/// suspend until the completion signal or cancellation. `stop()` and
/// `record_manual_completion()` may be called from other threads through
/// clones of the runner.
#[derive(Debug, Clone)]
pub struct StepRunner<C, P> {
    exec: ExecClient<C>,
    persist: P,
    config: RunnerConfig,
    state_root: PathBuf,
    terminal: TerminalLog,
    cancel: CancelToken,
    gate: Arc<ManualGate>,
    state: Arc<Mutex<ExecutionState>>,
    project: Arc<Mutex<Option<Project>>>,
    methodology: Arc<Mutex<Option<Methodology>>>,
    events: Option<SyncSender<RunnerEvent>>,
}

impl<C: CommandApi, P: MethodologyApi> StepRunner<C, P> {
    pub fn new(api: C, persist: P, settings: &Settings) -> Self {
        let terminal = TerminalLog::new();
        let history = HistoryStore::new(settings.history_path());
        let exec = ExecClient::new(
            api,
            terminal.clone(),
            history,
            settings.state_root.clone(),
            settings.exec_timeout_secs,
        );
        Self {
            exec,
            persist,
            config: RunnerConfig::from_settings(settings),
            state_root: settings.state_root.clone(),
            terminal,
            cancel: CancelToken::new(),
            gate: Arc::new(ManualGate::new()),
            state: Arc::new(Mutex::new(ExecutionState::default())),
            project: Arc::new(Mutex::new(None)),
            methodology: Arc::new(Mutex::new(None)),
            events: None,
        }
    }

    pub fn with_events(mut self, events: SyncSender<RunnerEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn select_project(&self, project: Project) {
        *self.project_guard() = Some(project);
    }

    pub fn selected_project(&self) -> Option<Project> {
        self.project_guard().clone()
    }

    pub fn select_methodology(&self, methodology: Methodology) -> Result<(), EngineError> {
        methodology
            .validate()
            .map_err(EngineError::InvalidMethodology)?;
        *self.methodology_guard() = Some(methodology);
        Ok(())
    }

    pub fn methodology_snapshot(&self) -> Option<Methodology> {
        self.methodology_guard().clone()
    }

    pub fn terminal(&self) -> TerminalLog {
        self.terminal.clone()
    }

    pub fn execution_state(&self) -> ExecutionState {
        *self.state_guard()
    }

    /// One-off run of a single command outside a methodology run (the
    /// dashboard's per-command Run button). Requires a selected project;
    /// the terminal entry resolves by command text.
    pub fn run_single(&self, command: &str) -> Result<ExecOutcome, EngineError> {
        let project = self
            .project_guard()
            .clone()
            .ok_or(EngineError::NoProjectSelected)?;
        let methodology_id = self.methodology_guard().as_ref().map(|m| m.id);
        Ok(self.exec.run(command, &project, methodology_id, None))
    }

    /// Run every step of the selected methodology in order. Blocks the
    /// calling thread until the run completes or cancellation lands at a
    /// checkpoint. Precondition failures leave all state untouched.
    pub fn run_all(&self) -> Result<RunOutcome, EngineError> {
        let project = self
            .project_guard()
            .clone()
            .ok_or(EngineError::NoProjectSelected)?;
        let (methodology_id, steps) = {
            let guard = self.methodology_guard();
            let methodology = guard.as_ref().ok_or(EngineError::NoMethodologySelected)?;
            (methodology.id, methodology.steps.clone())
        };
        {
            let mut state = self.state_guard();
            if state.is_running {
                return Err(EngineError::AlreadyRunning);
            }
            *state = ExecutionState {
                is_running: true,
                current_step_index: 0,
                should_stop: false,
            };
        }
        self.cancel.reset();
        self.terminal.clear();

        let run_id = generate_run_id(now_secs());
        self.diag(&format!(
            "run_id={run_id} methodology_id={methodology_id} state=running steps={}",
            steps.len()
        ));
        self.emit(RunnerEvent::RunStarted {
            run_id: run_id.clone(),
        });

        let mut end = RunEnd::Completed;
        let mut steps_run = 0u32;

        for (index, step) in steps.iter().enumerate() {
            if self.cancel.is_requested() {
                self.terminal
                    .push_resolved(STOPPED_COMMAND, STOPPED_OUTPUT, EntryStatus::Failed);
                end = RunEnd::Cancelled;
                break;
            }
            self.state_guard().current_step_index = index;
            self.emit(RunnerEvent::StepStarted {
                index,
                step_id: step.id.clone(),
            });

            match step.kind {
                StepKind::Manual => {
                    self.terminal.push_step_running(
                        &step.id,
                        format!("MANUAL STEP: {}", step.content),
                        MANUAL_WAITING_OUTPUT,
                    );
                    self.emit(RunnerEvent::ManualStepPrompt { step: step.clone() });
                    let confirmed = self.wait_for_manual(&step.id, &run_id);
                    self.emit(RunnerEvent::ManualStepDismissed {
                        step_id: step.id.clone(),
                    });
                    if !confirmed {
                        self.terminal.resolve_step(
                            &step.id,
                            format!("MANUAL STEP CANCELLED: {}", step.content),
                            MANUAL_CANCELLED_OUTPUT,
                            EntryStatus::Failed,
                        );
                        end = RunEnd::Cancelled;
                        break;
                    }
                    self.terminal.resolve_step(
                        &step.id,
                        format!("MANUAL STEP COMPLETED: {}", step.content),
                        MANUAL_COMPLETED_OUTPUT,
                        EntryStatus::Success,
                    );
                }
                StepKind::Command => {
                    // A failed command resolves in the log and the run
                    // continues; only cancellation ends the run early.
                    let _ = self.exec.run(
                        &step.content,
                        &project,
                        Some(methodology_id),
                        Some(step.id.as_str()),
                    );
                }
            }

            steps_run += 1;
            if self.cancel.is_requested() {
                end = RunEnd::Cancelled;
                break;
            }
            sleep_with_cancel(&self.cancel, self.config.step_delay);
        }

        *self.state_guard() = ExecutionState::default();
        self.cancel.reset();
        self.diag(&format!(
            "run_id={run_id} state={} steps_run={steps_run}",
            end.as_str()
        ));
        self.emit(RunnerEvent::RunFinished {
            run_id: run_id.clone(),
            end,
        });
        Ok(RunOutcome {
            run_id,
            end,
            steps_run,
        })
    }

    /// Request cancellation. Takes effect at the loop's next checkpoint;
    /// `is_running` flips immediately for UI responsiveness.
    pub fn stop(&self) {
        self.cancel.request();
        {
            let mut state = self.state_guard();
            state.should_stop = true;
            state.is_running = false;
        }
        self.terminal.push_resolved(
            STOP_SIGNAL_COMMAND,
            STOP_SIGNAL_OUTPUT,
            EntryStatus::Failed,
        );
        self.gate.notify();
        self.diag("stop signal sent");
    }

    /// Applied by the embedding app after the evidence collaborator
    /// succeeds for a manual step: flips `completed`, appends the
    /// evidence path, persists the methodology (failure logged only),
    /// and wakes the waiting run loop. Returns false when the step is
    /// not part of the selected methodology.
    pub fn record_manual_completion(&self, step_id: &str, evidence_path: &str) -> bool {
        let updated = {
            let mut guard = self.methodology_guard();
            let Some(methodology) = guard.as_mut() else {
                return false;
            };
            let Some(step) = methodology.step_mut(step_id) else {
                return false;
            };
            step.completed = true;
            step.evidence.push(evidence_path.to_string());
            methodology.clone()
        };
        if let Err(err) = self.persist.update_methodology(&updated) {
            self.diag(&format!(
                "methodology update failed for step {step_id}: {err}"
            ));
        }
        self.gate.notify();
        true
    }

    fn wait_for_manual(&self, step_id: &str, run_id: &str) -> bool {
        loop {
            if self.cancel.is_requested() {
                return false;
            }
            match self.manual_step_completed(step_id) {
                Some(true) => return true,
                Some(false) => {}
                None => {
                    // The step was edited away mid-run; it can never be
                    // confirmed, so proceed rather than wedge the run.
                    self.diag(&format!(
                        "run_id={run_id} step_id={step_id} manual step missing; treating as confirmed"
                    ));
                    return true;
                }
            }
            self.gate.wait_for(self.config.manual_poll);
        }
    }

    // Completion is re-read from the live methodology every check;
    // manual confirmation happens out-of-band of the run loop.
    fn manual_step_completed(&self, step_id: &str) -> Option<bool> {
        let guard = self.methodology_guard();
        let methodology = guard.as_ref()?;
        methodology.step(step_id).map(|step| step.completed)
    }

    fn emit(&self, event: RunnerEvent) {
        if let Some(events) = &self.events {
            let _ = events.try_send(event);
        }
    }

    fn diag(&self, line: &str) {
        let _ = append_diagnostics_line(&self.state_root, line);
    }

    fn state_guard(&self) -> MutexGuard<'_, ExecutionState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn project_guard(&self) -> MutexGuard<'_, Option<Project>> {
        self.project.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn methodology_guard(&self) -> MutexGuard<'_, Option<Methodology>> {
        self.methodology
            .lock()
            .unwrap_or_else(|err| err.into_inner())
    }
}
