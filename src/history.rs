use crate::shared::fs_atomic::write_atomic;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("failed to read history file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid history file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write history file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode history records: {0}")]
    Encode(serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Success,
    Failed,
}

/// Finalized command execution, as the reporting view consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub command: String,
    pub output: String,
    pub status: RecordStatus,
    pub returncode: i64,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methodology_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Append-only store of finalized command records, backed by a JSON
/// array file. The surrounding system may swap the backing store; the
/// engine only depends on append.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<ExecutionRecord>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(|source| HistoryError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| HistoryError::Parse {
            path: self.path.display().to_string(),
            source,
        })
    }

    pub fn append(&self, record: &ExecutionRecord) -> Result<(), HistoryError> {
        let mut records = self.load()?;
        records.push(record.clone());
        let encoded = serde_json::to_vec_pretty(&records).map_err(HistoryError::Encode)?;
        write_atomic(&self.path, &encoded).map_err(|source| HistoryError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }

    pub fn for_project(&self, project_id: i64) -> Result<Vec<ExecutionRecord>, HistoryError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|record| record.project_id == Some(project_id))
            .collect())
    }

    pub fn summary(&self) -> Result<ExecutionSummary, HistoryError> {
        let records = self.load()?;
        let succeeded = records
            .iter()
            .filter(|record| record.status == RecordStatus::Success)
            .count();
        Ok(ExecutionSummary {
            total: records.len(),
            succeeded,
            failed: records.len() - succeeded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(command: &str, status: RecordStatus, project_id: Option<i64>) -> ExecutionRecord {
        ExecutionRecord {
            command: command.to_string(),
            output: "ok".to_string(),
            status,
            returncode: if status == RecordStatus::Success { 0 } else { 1 },
            timestamp: "2024-05-01T10:00:00+00:00".to_string(),
            project_id,
            methodology_id: Some(1),
        }
    }

    #[test]
    fn append_grows_the_array_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::new(temp.path().join("history.json"));

        store
            .append(&record("nmap a", RecordStatus::Success, Some(1)))
            .expect("first");
        store
            .append(&record("nmap b", RecordStatus::Failed, Some(2)))
            .expect("second");

        let records = store.load().expect("load");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].command, "nmap a");
        assert_eq!(records[1].command, "nmap b");
    }

    #[test]
    fn load_of_missing_file_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::new(temp.path().join("nope.json"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn corrupt_file_surfaces_a_parse_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("history.json");
        fs::write(&path, "not json").expect("write");

        let err = HistoryStore::new(&path).load().expect_err("parse error");
        assert!(matches!(err, HistoryError::Parse { .. }));
    }

    #[test]
    fn project_filter_and_summary_count_correctly() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::new(temp.path().join("history.json"));
        store
            .append(&record("a", RecordStatus::Success, Some(1)))
            .expect("a");
        store
            .append(&record("b", RecordStatus::Failed, Some(1)))
            .expect("b");
        store
            .append(&record("c", RecordStatus::Success, Some(2)))
            .expect("c");

        assert_eq!(store.for_project(1).expect("filter").len(), 2);
        assert_eq!(
            store.summary().expect("summary"),
            ExecutionSummary {
                total: 3,
                succeeded: 2,
                failed: 1
            }
        );
    }

    #[test]
    fn record_status_uses_lowercase_wire_names() {
        let value = serde_json::to_value(RecordStatus::Failed).expect("serialize");
        assert_eq!(value, "failed");
    }
}
