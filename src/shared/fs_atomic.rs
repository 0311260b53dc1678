use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Replace `path` atomically: write a sibling temp file, fsync, rename.
/// Missing parent directories are created.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let file_name = path
        .file_name()
        .and_then(|v| v.to_str())
        .unwrap_or("record");
    let tmp_path = parent.join(format!(".{file_name}.tmp.{}", std::process::id()));
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    sync_dir(&parent)
}

#[cfg(unix)]
fn sync_dir(parent: &Path) -> std::io::Result<()> {
    fs::File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_parent: &Path) -> std::io::Result<()> {
    Ok(())
}
