//! # Working Directory Accessor
//!
//! The working directory is a single user-chosen folder that acts as the
//! canonical home of the open tabs: every tab is mirrored by one record file
//! in it (see [`crate::model::DocumentRecord`]).
//!
//! ## Access Discipline
//!
//! The folder is treated as sandboxed. Every list, read, write, rename and
//! delete against it happens inside a bracket from [`access::ScopedAccess`];
//! operations that call each other share the outermost bracket.
//!
//! ## Naming
//!
//! New and renamed files never overwrite anything. A name that is taken gets
//! a numeric suffix before the extension:
//!
//! ```text
//! Note.txt  →  Note 2.txt  →  Note 3.txt  …
//! ```
//!
//! ## Layout
//!
//! ```text
//! <working dir>/
//! ├── 20250906212332123.json   # record of a local document (inline content)
//! ├── report.json              # wrapper around an external file (path + bookmark)
//! └── scratch.txt              # plain files are shown as externally backed tabs
//! ```

use crate::error::{Result, TabkeepError};
use crate::fsutil::atomic_write;
use crate::model::{Document, DocumentKind, DocumentRecord, Provenance};
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub mod access;
pub mod bookmark;

use access::{AccessGuard, ScopedAccess, SecurityScope};
use bookmark::{Bookmark, DirectoryReference};

const MAX_NAME_ATTEMPTS: usize = 10_000;

/// Asks the user for a folder. Returns `None` when the prompt is cancelled.
pub trait DirectoryPicker {
    fn pick_directory(&mut self) -> Option<PathBuf>;
}

/// Result of building tabs from the folder's contents.
#[derive(Debug, Default)]
pub struct SeedOutcome {
    pub documents: Vec<Document>,
    /// Whitespace-only files that were deleted instead of loaded.
    pub pruned: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, TabkeepError)>,
}

pub struct WorkingDirectory {
    root: Option<PathBuf>,
    access: ScopedAccess,
    record_ext: String,
}

impl WorkingDirectory {
    pub fn new(scope: Box<dyn SecurityScope>, record_ext: &str) -> Self {
        Self {
            root: None,
            access: ScopedAccess::new(scope),
            record_ext: record_ext.trim_start_matches('.').to_string(),
        }
    }

    pub fn with_root(mut self, root: Option<PathBuf>) -> Self {
        self.root = root;
        self
    }

    pub fn directory(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn is_configured(&self) -> bool {
        self.root.is_some()
    }

    pub fn record_ext(&self) -> &str {
        &self.record_ext
    }

    pub fn access(&self) -> &ScopedAccess {
        &self.access
    }

    pub fn set_directory(&mut self, root: Option<PathBuf>) {
        tracing::info!(dir = ?root, "working directory set");
        self.root = root;
    }

    /// Prompts for a folder and switches to it. Persisting the returned
    /// reference is the caller's job.
    pub fn choose_directory(
        &mut self,
        picker: &mut dyn DirectoryPicker,
    ) -> Result<Option<DirectoryReference>> {
        let Some(picked) = picker.pick_directory() else {
            return Ok(None);
        };
        if !picked.is_dir() {
            return Err(TabkeepError::NotFound(picked));
        }
        let reference = DirectoryReference::capture(&picked)?;
        self.set_directory(Some(reference.path.clone()));
        Ok(Some(reference))
    }

    fn bracket(&self) -> Result<(AccessGuard<'_>, &Path)> {
        let root = self
            .root
            .as_deref()
            .ok_or(TabkeepError::DirectoryNotConfigured)?;
        Ok((self.access.begin(root)?, root))
    }

    /// Brackets when a directory is configured; runs unbracketed otherwise.
    /// Holding the guard lets a batch of operations share one bracket.
    pub fn hold_access(&self) -> Result<Option<AccessGuard<'_>>> {
        match self.root.as_deref() {
            Some(root) => Ok(Some(self.access.begin(root)?)),
            None => Ok(None),
        }
    }

    /// Regular, non-hidden files sorted by creation time, oldest first.
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        let (_guard, root) = self.bracket()?;

        let mut files = Vec::new();
        for entry in fs::read_dir(root).map_err(|e| TabkeepError::from_io(e, root))? {
            let entry = entry.map_err(TabkeepError::Io)?;
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden || !path.is_file() {
                continue;
            }
            let created = entry
                .metadata()
                .ok()
                .and_then(|m| m.created().or_else(|_| m.modified()).ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((created, path));
        }
        files.sort();
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    /// Creates a new record file for an empty local document and returns its path.
    pub fn create_empty_file(&self, base_name: Option<&str>, ext: &str) -> Result<PathBuf> {
        let (_guard, root) = self.bracket()?;
        let base = base_name
            .map(sanitize_base)
            .filter(|b| !b.is_empty())
            .unwrap_or_else(timestamp_name);

        let record = DocumentRecord::empty_local(base.clone());
        let json = serde_json::to_string_pretty(&record)?;
        let path = create_new_unique(root, &base, ext, json.as_bytes())?;
        tracing::debug!(path = %path.display(), "created empty file");
        Ok(path)
    }

    /// Moves `path` to `<new_base>.<ext>` in the working directory, avoiding
    /// collisions. Path separators and dot components in `new_base` are
    /// dropped; a name left empty is rejected and returns `path` unchanged.
    pub fn rename_file(&self, path: &Path, new_base: &str, ext: &str) -> Result<PathBuf> {
        let (_guard, root) = self.bracket()?;
        let new_base = sanitize_base(new_base);
        if new_base.is_empty() {
            tracing::debug!(path = %path.display(), "rejected rename to empty name");
            return Ok(path.to_path_buf());
        }
        if !path.exists() {
            return Err(TabkeepError::NotFound(path.to_path_buf()));
        }

        let dest = (1..=MAX_NAME_ATTEMPTS)
            .map(|n| root.join(candidate_name(&new_base, ext, n)))
            .find(|candidate| candidate == path || !candidate.exists())
            .ok_or_else(|| TabkeepError::NameCollisionExhausted(new_base.clone()))?;
        if dest.parent() != Some(root) {
            return Err(TabkeepError::PermissionDenied(dest));
        }
        if dest == path {
            return Ok(dest);
        }

        fs::rename(path, &dest).map_err(|e| TabkeepError::from_io(e, path))?;
        tracing::debug!(from = %path.display(), to = %dest.display(), "renamed file");
        Ok(dest)
    }

    /// Deletes `path`. Deleting an entry that is already gone is not an error.
    pub fn delete_file(&self, path: &Path) -> Result<()> {
        let _guard = self.bracket()?;
        match fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "deleted file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TabkeepError::from_io(e, path)),
        }
    }

    /// True for empty files and files holding only whitespace. Content that is
    /// not valid UTF-8, or cannot be read, is never whitespace-only.
    pub fn is_whitespace_only(&self, path: &Path) -> Result<bool> {
        let _guard = self.bracket()?;
        if fs::metadata(path).map(|m| m.len() == 0).unwrap_or(false) {
            return Ok(true);
        }
        let Ok(bytes) = fs::read(path) else {
            return Ok(false);
        };
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text.trim().is_empty(),
            Err(_) => false,
        })
    }

    /// Creates `<stem>.<record ext>` in the working directory wrapping the
    /// external file at `external`: its path, a bookmark, and a content snapshot.
    pub fn wrap_external_file(&self, external: &Path) -> Result<PathBuf> {
        let (_guard, root) = self.bracket()?;
        let stem = external
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(timestamp_name);
        let title = external
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| stem.clone());

        let snapshot = match read_text(external) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(path = %external.display(), error = %e, "wrapping file without content snapshot");
                None
            }
        };
        let bookmark = Bookmark::capture(external).ok().map(|b| b.token().to_string());
        let absolute = fs::canonicalize(external).unwrap_or_else(|_| external.to_path_buf());

        let doc = Document::new(
            title,
            String::new(),
            Provenance::ExternallyBacked { path: absolute },
        );
        let ext = self.record_ext.clone();
        // The record path is only known once a free name is found.
        let mut written = None;
        for n in 1..=MAX_NAME_ATTEMPTS {
            let candidate = root.join(candidate_name(&stem, &ext, n));
            let mut record = doc.to_directory_record(&candidate, bookmark.clone());
            record.content = snapshot.clone();
            let json = serde_json::to_string_pretty(&record)?;
            if try_create_new(&candidate, json.as_bytes())? {
                written = Some(candidate);
                break;
            }
        }
        let path = written.ok_or(TabkeepError::NameCollisionExhausted(stem))?;
        tracing::debug!(external = %external.display(), wrapper = %path.display(), "wrapped external file");
        Ok(path)
    }

    /// Loads a record file into a document whose `record_path` is `path`.
    pub fn load_record(&self, path: &Path) -> Result<Document> {
        let _guard = self.hold_access()?;
        let raw = fs::read_to_string(path).map_err(|e| TabkeepError::from_io(e, path))?;
        if !DocumentRecord::looks_like_record(&raw) {
            return Err(TabkeepError::Store(format!(
                "not a document record: {}",
                path.display()
            )));
        }
        let record: DocumentRecord = serde_json::from_str(&raw)?;

        let content = match record.kind {
            DocumentKind::Local => record.content.clone().unwrap_or_default(),
            DocumentKind::Opened => resolve_opened_content(&record),
        };

        let mut doc = Document::from_record(&record, content);
        if doc.title.is_empty() {
            doc.title = file_stem(path);
        }
        if let (DocumentKind::Opened, Some(resolved)) = (record.kind, resolved_external(&record)) {
            doc.provenance = Provenance::ExternallyBacked { path: resolved };
        }
        doc.record_path = Some(path.to_path_buf());
        Ok(doc)
    }

    /// Writes `doc` as a record file at `path`.
    pub fn save_record(&self, doc: &Document, path: &Path) -> Result<()> {
        let _guard = self.hold_access()?;
        let bookmark = doc
            .provenance
            .external_path()
            .and_then(|p| Bookmark::capture(p).ok())
            .map(|b| b.token().to_string());
        let mut record = doc.to_directory_record(path, bookmark);
        // Wrappers keep the last known content as their snapshot.
        record.content = Some(doc.content.clone());
        let json = serde_json::to_string_pretty(&record)?;
        atomic_write(path, json.as_bytes())
    }

    /// Writes content back to an externally backed file. The file is rewritten
    /// in place so its identity (and any bookmark to it) survives.
    pub fn write_external(&self, path: &Path, content: &str) -> Result<()> {
        let _guard = self.hold_access()?;
        fs::write(path, content).map_err(|e| TabkeepError::from_io(e, path))
    }

    /// Reads a plain text file for a tab, bracketed when a directory is set.
    pub fn read_text(&self, path: &Path) -> Result<String> {
        let _guard = self.hold_access()?;
        read_text(path)
    }

    /// Builds tabs from the folder: whitespace-only files are deleted, record
    /// files are loaded, anything else opens as an externally backed text tab.
    pub fn seed_documents(&self) -> Result<SeedOutcome> {
        let _guard = self.bracket()?;
        let mut outcome = SeedOutcome::default();

        for path in self.list_files()? {
            if self.is_whitespace_only(&path)? {
                match self.delete_file(&path) {
                    Ok(()) => outcome.pruned.push(path),
                    Err(e) => outcome.failures.push((path, e)),
                }
                continue;
            }
            let loaded = if self.is_record_file(&path) {
                self.load_record(&path)
            } else {
                self.read_text(&path).map(|content| {
                    Document::new(
                        file_name(&path),
                        content,
                        Provenance::ExternallyBacked { path: path.clone() },
                    )
                })
            };
            match loaded {
                Ok(doc) => outcome.documents.push(doc),
                Err(e) => outcome.failures.push((path, e)),
            }
        }

        tracing::info!(
            documents = outcome.documents.len(),
            pruned = outcome.pruned.len(),
            "seeded documents from working directory"
        );
        Ok(outcome)
    }

    pub fn is_record(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().eq_ignore_ascii_case(&self.record_ext))
            .unwrap_or(false)
    }

    /// True when `path` has the record extension and its content carries a
    /// record's identifying fields. Any other file with that extension, such
    /// as a project's `package.json`, is user content.
    pub fn is_record_file(&self, path: &Path) -> bool {
        if !self.is_record(path) {
            return false;
        }
        let Ok(_guard) = self.hold_access() else {
            return false;
        };
        fs::read_to_string(path)
            .map(|raw| DocumentRecord::looks_like_record(&raw))
            .unwrap_or(false)
    }
}

fn resolved_external(record: &DocumentRecord) -> Option<PathBuf> {
    record
        .security_bookmark
        .as_deref()
        .and_then(|token| Bookmark::from_token(token).resolve().ok())
        .map(|r| r.path)
}

/// Content of a wrapped external file: live file first, then the snapshot
/// stored in the wrapper, then empty.
fn resolve_opened_content(record: &DocumentRecord) -> String {
    let target = resolved_external(record).or_else(|| record.path.as_deref().map(PathBuf::from));
    if let Some(target) = target {
        match read_text(&target) {
            Ok(text) => return text,
            Err(e) => {
                tracing::warn!(path = %target.display(), error = %e, "external file unreadable, using snapshot");
            }
        }
    }
    record.content.clone().unwrap_or_default()
}

pub(crate) fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| TabkeepError::from_io(e, path))?;
    String::from_utf8(bytes).map_err(|_| TabkeepError::Encoding(path.to_path_buf()))
}

fn candidate_name(base: &str, ext: &str, n: usize) -> String {
    let stem = if n <= 1 {
        base.to_string()
    } else {
        format!("{} {}", base, n)
    };
    if ext.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, ext.trim_start_matches('.'))
    }
}

/// Creates `path` only if nothing is there yet. Returns false when taken.
fn try_create_new(path: &Path, content: &[u8]) -> Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(content).map_err(TabkeepError::Io)?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(TabkeepError::from_io(e, path)),
    }
}

/// Reduces a user-supplied title to a single file-name component: separators
/// split it, `.`/`..` and empty pieces are dropped, and leading dots go so the
/// result is never hidden.
fn sanitize_base(name: &str) -> String {
    name.split(['/', '\\'])
        .map(str::trim)
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect::<Vec<_>>()
        .join("-")
        .trim_start_matches('.')
        .trim()
        .to_string()
}

fn create_new_unique(root: &Path, base: &str, ext: &str, content: &[u8]) -> Result<PathBuf> {
    for n in 1..=MAX_NAME_ATTEMPTS {
        let candidate = root.join(candidate_name(base, ext, n));
        if try_create_new(&candidate, content)? {
            return Ok(candidate);
        }
    }
    Err(TabkeepError::NameCollisionExhausted(base.to_string()))
}

/// `20250906212332123`: local time down to milliseconds, no separators.
fn timestamp_name() -> String {
    Local::now().format("%Y%m%d%H%M%S%3f").to_string()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
