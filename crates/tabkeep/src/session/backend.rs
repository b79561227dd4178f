use crate::error::{Result, TabkeepError};
use crate::fsutil::atomic_write;
use crate::model::{DocumentId, DocumentRecord};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const SESSIONS_DIR: &str = "Sessions";
pub const SESSION_FILENAME: &str = "session.json";

/// Raw storage for the session snapshot and per-document content snapshots.
/// The coordinator decides what to write; the backend only knows how.
pub trait SessionBackend {
    /// Load the session records. Returns Ok(None) when no session was saved yet.
    fn load_session(&self) -> Result<Option<Vec<DocumentRecord>>>;

    /// Replace the session file with `records`.
    /// MUST be atomic so a crash mid-write keeps the previous snapshot.
    fn save_session(&self, records: &[DocumentRecord]) -> Result<()>;

    /// Read a content snapshot. Ok(None) if it does not exist.
    fn read_snapshot(&self, id: &DocumentId) -> Result<Option<String>>;

    fn write_snapshot(&self, id: &DocumentId, content: &str) -> Result<()>;

    fn has_snapshot(&self, id: &DocumentId) -> bool;

    /// Delete a content snapshot. Missing snapshots are not an error.
    fn delete_snapshot(&self, id: &DocumentId) -> Result<()>;

    fn list_snapshot_ids(&self) -> Result<Vec<DocumentId>>;

    /// Location recorded as `contentFilePath` in session records.
    fn snapshot_path(&self, id: &DocumentId) -> PathBuf;

    /// Read content from a legacy `contentFilePath`. Ok(None) if it does not exist.
    fn read_content_file(&self, path: &Path) -> Result<Option<String>>;
}

/// Stores the session under `<data_dir>/Sessions/`.
pub struct FsSessionBackend {
    dir: PathBuf,
}

impl FsSessionBackend {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join(SESSIONS_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILENAME)
    }

    fn read_optional(path: &Path) -> Result<Option<String>> {
        match fs::read(path) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| TabkeepError::Encoding(path.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TabkeepError::from_io(e, path)),
        }
    }
}

impl SessionBackend for FsSessionBackend {
    fn load_session(&self) -> Result<Option<Vec<DocumentRecord>>> {
        let Some(raw) = Self::read_optional(&self.session_path())? else {
            return Ok(None);
        };
        let records: Vec<DocumentRecord> = serde_json::from_str(&raw)?;
        Ok(Some(records))
    }

    fn save_session(&self, records: &[DocumentRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        atomic_write(&self.session_path(), json.as_bytes())
    }

    fn read_snapshot(&self, id: &DocumentId) -> Result<Option<String>> {
        Self::read_optional(&self.snapshot_path(id))
    }

    fn write_snapshot(&self, id: &DocumentId, content: &str) -> Result<()> {
        atomic_write(&self.snapshot_path(id), content.as_bytes())
    }

    fn has_snapshot(&self, id: &DocumentId) -> bool {
        self.snapshot_path(id).exists()
    }

    fn delete_snapshot(&self, id: &DocumentId) -> Result<()> {
        let path = self.snapshot_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TabkeepError::from_io(e, path)),
        }
    }

    fn list_snapshot_ids(&self) -> Result<Vec<DocumentId>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(TabkeepError::Io)? {
            let path = entry.map_err(TabkeepError::Io)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn snapshot_path(&self, id: &DocumentId) -> PathBuf {
        self.dir.join(format!("{}.txt", id))
    }

    fn read_content_file(&self, path: &Path) -> Result<Option<String>> {
        Self::read_optional(path)
    }
}

/// In-memory session storage for tests.
///
/// Keeps the session as raw JSON so corrupt files can be simulated, and counts
/// writes so tests can check what a save actually touched.
#[derive(Default)]
pub struct MemSessionBackend {
    session: RefCell<Option<String>>,
    snapshots: RefCell<HashMap<DocumentId, String>>,
    session_writes: Cell<u32>,
    snapshot_writes: Cell<u32>,
    simulate_write_error: Cell<bool>,
}

impl MemSessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.set(simulate);
    }

    pub fn set_raw_session(&self, raw: &str) {
        *self.session.borrow_mut() = Some(raw.to_string());
    }

    pub fn raw_session(&self) -> Option<String> {
        self.session.borrow().clone()
    }

    pub fn session_writes(&self) -> u32 {
        self.session_writes.get()
    }

    pub fn snapshot_writes(&self) -> u32 {
        self.snapshot_writes.get()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.borrow().len()
    }

    fn check_writable(&self) -> Result<()> {
        if self.simulate_write_error.get() {
            return Err(TabkeepError::Store("Simulated write error".to_string()));
        }
        Ok(())
    }
}

impl SessionBackend for MemSessionBackend {
    fn load_session(&self) -> Result<Option<Vec<DocumentRecord>>> {
        match self.session.borrow().as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn save_session(&self, records: &[DocumentRecord]) -> Result<()> {
        self.check_writable()?;
        let json = serde_json::to_string(records)?;
        *self.session.borrow_mut() = Some(json);
        self.session_writes.set(self.session_writes.get() + 1);
        Ok(())
    }

    fn read_snapshot(&self, id: &DocumentId) -> Result<Option<String>> {
        Ok(self.snapshots.borrow().get(id).cloned())
    }

    fn write_snapshot(&self, id: &DocumentId, content: &str) -> Result<()> {
        self.check_writable()?;
        self.snapshots.borrow_mut().insert(*id, content.to_string());
        self.snapshot_writes.set(self.snapshot_writes.get() + 1);
        Ok(())
    }

    fn has_snapshot(&self, id: &DocumentId) -> bool {
        self.snapshots.borrow().contains_key(id)
    }

    fn delete_snapshot(&self, id: &DocumentId) -> Result<()> {
        self.snapshots.borrow_mut().remove(id);
        Ok(())
    }

    fn list_snapshot_ids(&self) -> Result<Vec<DocumentId>> {
        Ok(self.snapshots.borrow().keys().copied().collect())
    }

    fn snapshot_path(&self, id: &DocumentId) -> PathBuf {
        PathBuf::from(format!("memory://{}.txt", id))
    }

    fn read_content_file(&self, path: &Path) -> Result<Option<String>> {
        let id = path
            .to_str()
            .and_then(|p| p.strip_prefix("memory://"))
            .and_then(|p| p.strip_suffix(".txt"))
            .and_then(|p| Uuid::parse_str(p).ok());
        match id {
            Some(id) => self.read_snapshot(&id),
            None => Ok(None),
        }
    }
}
