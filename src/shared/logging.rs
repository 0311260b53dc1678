use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn diagnostics_log_path(state_root: &Path) -> PathBuf {
    state_root.join("logs/engine.log")
}

/// Append one timestamped line to the diagnostics log. Callers treat
/// failures as non-fatal; nothing else in the crate writes to stderr.
pub fn append_diagnostics_line(state_root: &Path, line: &str) -> std::io::Result<()> {
    let path = diagnostics_log_path(state_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    writeln!(file, "{} {line}", Utc::now().to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_timestamped_lines_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        append_diagnostics_line(temp.path(), "first").expect("first");
        append_diagnostics_line(temp.path(), "second").expect("second");

        let contents =
            fs::read_to_string(diagnostics_log_path(temp.path())).expect("read log");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("first"));
        assert!(lines[1].ends_with("second"));
    }
}
