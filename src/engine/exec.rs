use crate::api::{CommandApi, CommandRequest};
use crate::engine::substitute::substitute_variables;
use crate::engine::terminal::{EntryStatus, TerminalLog, RUNNING_OUTPUT};
use crate::history::{ExecutionRecord, HistoryStore, RecordStatus};
use crate::model::Project;
use crate::shared::logging::append_diagnostics_line;
use chrono::Utc;
use std::path::PathBuf;

pub const NO_OUTPUT_PLACEHOLDER: &str = "[no output]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    pub returncode: i64,
    pub stdout: String,
}

/// Runs one command through the external runner service and records the
/// outcome in the terminal log and the history store. Failures resolve
/// the log entry; they are never returned as errors — the caller decides
/// whether to continue.
#[derive(Debug, Clone)]
pub struct ExecClient<C> {
    api: C,
    terminal: TerminalLog,
    history: HistoryStore,
    state_root: PathBuf,
    timeout_sec: u64,
}

impl<C: CommandApi> ExecClient<C> {
    pub fn new(
        api: C,
        terminal: TerminalLog,
        history: HistoryStore,
        state_root: PathBuf,
        timeout_sec: u64,
    ) -> Self {
        Self {
            api,
            terminal,
            history,
            state_root,
            timeout_sec,
        }
    }

    pub fn terminal(&self) -> &TerminalLog {
        &self.terminal
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Execute one command. `step_id` keys the terminal entry to the
    /// methodology step when known; one-off runs resolve by command text.
    pub fn run(
        &self,
        raw_command: &str,
        project: &Project,
        methodology_id: Option<i64>,
        step_id: Option<&str>,
    ) -> ExecOutcome {
        let command = substitute_variables(raw_command, Some(project));
        match step_id {
            Some(id) => self
                .terminal
                .push_step_running(id, command.clone(), RUNNING_OUTPUT),
            None => self.terminal.push_running(command.clone()),
        }

        let request = CommandRequest {
            command: command.clone(),
            timeout_sec: self.timeout_sec,
            project_id: Some(project.id),
            methodology_id,
        };

        match self.api.exec(&request) {
            Ok(response) => {
                let status = if response.returncode == 0 {
                    EntryStatus::Success
                } else {
                    EntryStatus::Failed
                };
                let output = if response.stdout.is_empty() {
                    NO_OUTPUT_PLACEHOLDER.to_string()
                } else {
                    response.stdout.clone()
                };
                self.resolve(step_id, &command, output.clone(), status);
                self.record(&command, &output, status, response.returncode, project, methodology_id);
                ExecOutcome {
                    returncode: response.returncode,
                    stdout: response.stdout,
                }
            }
            Err(err) => {
                let output = format!("[ERROR] {err}");
                self.resolve(step_id, &command, output.clone(), EntryStatus::Failed);
                self.record(&command, &output, EntryStatus::Failed, -1, project, methodology_id);
                ExecOutcome {
                    returncode: -1,
                    stdout: String::new(),
                }
            }
        }
    }

    fn resolve(&self, step_id: Option<&str>, command: &str, output: String, status: EntryStatus) {
        match step_id {
            Some(id) => self.terminal.resolve_step(id, command, output, status),
            None => self.terminal.resolve_first_running(command, output, status),
        }
    }

    fn record(
        &self,
        command: &str,
        output: &str,
        status: EntryStatus,
        returncode: i64,
        project: &Project,
        methodology_id: Option<i64>,
    ) {
        let record = ExecutionRecord {
            command: command.to_string(),
            output: output.to_string(),
            status: if status == EntryStatus::Success {
                RecordStatus::Success
            } else {
                RecordStatus::Failed
            },
            returncode,
            timestamp: Utc::now().to_rfc3339(),
            project_id: Some(project.id),
            methodology_id,
        };
        // Fire-and-forget: a history failure must never block the run.
        if let Err(err) = self.history.append(&record) {
            let _ = append_diagnostics_line(
                &self.state_root,
                &format!("history append failed: {err}"),
            );
        }
    }
}
