use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

pub const RUNNING_OUTPUT: &str = "Running...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Success,
    Failed,
    Running,
}

impl EntryStatus {
    pub fn is_resolved(self) -> bool {
        !matches!(self, EntryStatus::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalEntry {
    pub command: String,
    pub output: String,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
}

/// Ordered run log shared between the runner, the execution client, and
/// the observing UI. Append-only, except that running entries are
/// resolved in place.
#[derive(Debug, Clone, Default)]
pub struct TerminalLog {
    entries: Arc<Mutex<Vec<TerminalEntry>>>,
}

impl TerminalLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<TerminalEntry>> {
        self.entries.lock().unwrap_or_else(|err| err.into_inner())
    }

    pub fn push_running(&self, command: impl Into<String>) {
        self.entries().push(TerminalEntry {
            command: command.into(),
            output: RUNNING_OUTPUT.to_string(),
            status: EntryStatus::Running,
            step_id: None,
        });
    }

    pub fn push_step_running(
        &self,
        step_id: &str,
        command: impl Into<String>,
        output: impl Into<String>,
    ) {
        self.entries().push(TerminalEntry {
            command: command.into(),
            output: output.into(),
            status: EntryStatus::Running,
            step_id: Some(step_id.to_string()),
        });
    }

    /// Append an already-resolved run-level entry (stop notices and the
    /// like), bypassing the running state.
    pub fn push_resolved(
        &self,
        command: impl Into<String>,
        output: impl Into<String>,
        status: EntryStatus,
    ) {
        self.entries().push(TerminalEntry {
            command: command.into(),
            output: output.into(),
            status,
            step_id: None,
        });
    }

    /// Resolve the first running entry whose command text matches;
    /// append a resolved entry when none does.
    pub fn resolve_first_running(
        &self,
        command: &str,
        output: impl Into<String>,
        status: EntryStatus,
    ) {
        let mut entries = self.entries();
        match entries
            .iter_mut()
            .find(|entry| entry.command == command && entry.status == EntryStatus::Running)
        {
            Some(entry) => {
                entry.output = output.into();
                entry.status = status;
            }
            None => entries.push(TerminalEntry {
                command: command.to_string(),
                output: output.into(),
                status,
                step_id: None,
            }),
        }
    }

    /// Resolve the running entry belonging to `step_id`, rewriting its
    /// command text so manual entries surface their terminal wording.
    /// Appends when the step has no running entry, mirroring the
    /// command-text rule's fallback.
    pub fn resolve_step(
        &self,
        step_id: &str,
        command: impl Into<String>,
        output: impl Into<String>,
        status: EntryStatus,
    ) {
        let mut entries = self.entries();
        match entries.iter_mut().find(|entry| {
            entry.step_id.as_deref() == Some(step_id) && entry.status == EntryStatus::Running
        }) {
            Some(entry) => {
                entry.command = command.into();
                entry.output = output.into();
                entry.status = status;
            }
            None => entries.push(TerminalEntry {
                command: command.into(),
                output: output.into(),
                status,
                step_id: Some(step_id.to_string()),
            }),
        }
    }

    pub fn snapshot(&self) -> Vec<TerminalEntry> {
        self.entries().clone()
    }

    pub fn resolved(&self) -> Vec<TerminalEntry> {
        self.entries()
            .iter()
            .filter(|entry| entry.status.is_resolved())
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_commands_resolve_first_running_only() {
        let log = TerminalLog::new();
        log.push_running("ls");
        log.push_running("ls");

        log.resolve_first_running("ls", "bin etc usr", EntryStatus::Success);

        let entries = log.snapshot();
        assert_eq!(entries[0].status, EntryStatus::Success);
        assert_eq!(entries[0].output, "bin etc usr");
        assert_eq!(entries[1].status, EntryStatus::Running);
        assert_eq!(entries[1].output, RUNNING_OUTPUT);
    }

    #[test]
    fn resolve_without_match_appends() {
        let log = TerminalLog::new();
        log.resolve_first_running("whoami", "root", EntryStatus::Success);

        let entries = log.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].command, "whoami");
        assert_eq!(entries[0].status, EntryStatus::Success);
    }

    #[test]
    fn step_resolution_ignores_command_text_collisions() {
        let log = TerminalLog::new();
        log.push_step_running("step-a", "ls", RUNNING_OUTPUT);
        log.push_step_running("step-b", "ls", RUNNING_OUTPUT);

        log.resolve_step("step-b", "ls", "from b", EntryStatus::Failed);

        let entries = log.snapshot();
        assert_eq!(entries[0].status, EntryStatus::Running);
        assert_eq!(entries[1].status, EntryStatus::Failed);
        assert_eq!(entries[1].output, "from b");
    }

    #[test]
    fn step_resolution_rewrites_the_command_text() {
        let log = TerminalLog::new();
        log.push_step_running("step-1", "MANUAL STEP: verify", "Waiting for manual completion...");
        log.resolve_step(
            "step-1",
            "MANUAL STEP COMPLETED: verify",
            "Manual step evidence uploaded",
            EntryStatus::Success,
        );

        let entries = log.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].command, "MANUAL STEP COMPLETED: verify");
        assert_eq!(entries[0].status, EntryStatus::Success);
    }

    #[test]
    fn clear_empties_the_log() {
        let log = TerminalLog::new();
        log.push_running("ls");
        assert_eq!(log.len(), 1);
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn clones_observe_the_same_entries() {
        let log = TerminalLog::new();
        let observer = log.clone();
        log.push_running("nmap");
        assert_eq!(observer.len(), 1);
    }
}
