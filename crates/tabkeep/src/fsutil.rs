use crate::error::{Result, TabkeepError};
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Writes `content` to `path` through a sibling temp file and a rename, so a
/// crash mid-write leaves the previous file intact.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| TabkeepError::Store(format!("no parent for {}", path.display())))?;
    ensure_dir(dir)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{}-{}.tmp", name, Uuid::new_v4()));
    fs::write(&tmp_path, content).map_err(TabkeepError::Io)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(TabkeepError::Io(e));
    }
    Ok(())
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(TabkeepError::Io)?;
    }
    Ok(())
}
