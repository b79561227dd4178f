//! # Domain Model: Documents and Their Persisted Records
//!
//! This module defines [`Document`], the unit of editing, and [`DocumentRecord`],
//! the JSON shape used both for entries of the session snapshot and for the
//! per-tab record files kept in the working directory.
//!
//! ## Provenance
//!
//! Every document is one of:
//! - **Freestanding**: no external file. Its content lives in the session snapshot
//!   (inline `content` plus a `<uuid>.txt` content snapshot), and in its
//!   working-directory record when it has one.
//! - **Externally backed**: the canonical content lives at an external path. The
//!   session snapshot only references that path; the content snapshot is a
//!   fallback for when the path has vanished.
//!
//! ## Record Format
//!
//! ```text
//! {
//!   "id": "…uuid…",
//!   "title": "2025-09-06 21:23:32",
//!   "type": "local_document" | "opened_document",
//!   "content": "…" | null,          // local documents
//!   "path": "/abs/path" | null,      // opened documents
//!   "createdAt": "…", "lastModified": "…",
//!   "fontSize": 14,
//!   "contentFilePath": …, "filePath": …, "isUntitled": …,   // legacy fields
//!   "securityBookmark": "…"          // working-directory wrappers only
//! }
//! ```
//!
//! The format carries no version field, so readers must tolerate missing fields.
//! [`DocumentRecord`] deserializes through a lenient helper: a record without
//! `type` derives it from the legacy `isUntitled`/`filePath` pair, missing
//! timestamps default to now and a missing font size to [`DEFAULT_FONT_SIZE`].

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub type DocumentId = Uuid;

pub const MIN_FONT_SIZE: f64 = 8.0;
pub const MAX_FONT_SIZE: f64 = 64.0;
pub const DEFAULT_FONT_SIZE: f64 = 14.0;

pub fn clamp_font_size(size: f64) -> f64 {
    if size.is_nan() {
        return DEFAULT_FONT_SIZE;
    }
    size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

/// Title given to new untitled documents, e.g. `2025-09-06 21:23:32`.
pub fn untitled_title() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    Freestanding,
    ExternallyBacked { path: PathBuf },
}

impl Provenance {
    pub fn external_path(&self) -> Option<&Path> {
        match self {
            Provenance::Freestanding => None,
            Provenance::ExternallyBacked { path } => Some(path),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            Provenance::Freestanding => DocumentKind::Local,
            Provenance::ExternallyBacked { .. } => DocumentKind::Opened,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub content: String,
    pub font_size: f64,
    pub is_dirty: bool,
    pub provenance: Provenance,
    /// Record file in the working directory mirroring this tab, if any.
    pub record_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Document {
    pub fn new(title: String, content: String, provenance: Provenance) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            content,
            font_size: DEFAULT_FONT_SIZE,
            is_dirty: false,
            provenance,
            record_path: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn untitled() -> Self {
        Self::new(untitled_title(), String::new(), Provenance::Freestanding)
    }

    pub fn is_freestanding(&self) -> bool {
        matches!(self.provenance, Provenance::Freestanding)
    }

    /// True when the content holds nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Legacy notion of "untitled": nothing on disk besides the session.
    pub fn is_untitled(&self) -> bool {
        self.file_path().is_none()
    }

    /// The file the document is shown for: its working-directory record, or the
    /// external file when it was opened without one.
    pub fn file_path(&self) -> Option<&Path> {
        self.record_path
            .as_deref()
            .or_else(|| self.provenance.external_path())
    }

    /// Replaces the content. Returns false (and leaves the dirty flag alone)
    /// when the content is unchanged.
    pub fn set_content(&mut self, content: String) -> bool {
        if self.content == content {
            return false;
        }
        self.content = content;
        self.is_dirty = true;
        self.modified_at = Utc::now();
        true
    }

    /// Sets the font size clamped into range. Returns false when unchanged.
    pub fn set_font_size(&mut self, size: f64) -> bool {
        let clamped = clamp_font_size(size);
        if clamped == self.font_size {
            return false;
        }
        self.font_size = clamped;
        true
    }

    /// Session snapshot entry for this document.
    pub fn to_session_record(&self, content_file: Option<&Path>) -> DocumentRecord {
        let is_untitled = self.is_untitled();
        DocumentRecord {
            id: self.id,
            title: self.title.clone(),
            kind: self.provenance.kind(),
            content: self.is_freestanding().then(|| self.content.clone()),
            path: self
                .provenance
                .external_path()
                .map(|p| p.to_string_lossy().into_owned()),
            created_at: self.created_at,
            last_modified: self.modified_at,
            font_size: self.font_size,
            content_file_path: if is_untitled {
                content_file.map(|p| p.to_string_lossy().into_owned())
            } else {
                None
            },
            file_path: self.file_path().map(|p| p.to_string_lossy().into_owned()),
            is_untitled,
            security_bookmark: None,
        }
    }

    /// Working-directory record for this document, written at `record_path`.
    pub fn to_directory_record(&self, record_path: &Path, bookmark: Option<String>) -> DocumentRecord {
        let mut record = self.to_session_record(None);
        record.file_path = Some(record_path.to_string_lossy().into_owned());
        record.is_untitled = false;
        record.security_bookmark = bookmark;
        record
    }

    /// Rebuilds a document from a record once its content has been resolved.
    pub fn from_record(record: &DocumentRecord, content: String) -> Self {
        let provenance = match (record.kind, record.path.as_deref()) {
            (DocumentKind::Opened, Some(path)) => Provenance::ExternallyBacked {
                path: PathBuf::from(path),
            },
            _ => Provenance::Freestanding,
        };
        let record_path = record
            .file_path
            .as_deref()
            .filter(|file| Some(*file) != record.path.as_deref())
            .map(PathBuf::from);
        Self {
            id: record.id,
            title: record.title.clone(),
            content,
            font_size: clamp_font_size(record.font_size),
            is_dirty: false,
            provenance,
            record_path,
            created_at: record.created_at,
            modified_at: record.last_modified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    #[serde(rename = "local_document")]
    Local,
    #[serde(rename = "opened_document")]
    Opened,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub content: Option<String>,
    pub path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub font_size: f64,
    pub content_file_path: Option<String>,
    pub file_path: Option<String>,
    pub is_untitled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_bookmark: Option<String>,
}

impl DocumentRecord {
    /// True when `raw` is a JSON object carrying a record's identifying fields:
    /// a valid `id` plus either `type` or the legacy `isUntitled`. Other JSON
    /// files are user content and must never be parsed (or rewritten) as records.
    pub fn looks_like_record(raw: &str) -> bool {
        let Ok(serde_json::Value::Object(map)) = serde_json::from_str(raw) else {
            return false;
        };
        let has_id = map
            .get("id")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|id| Uuid::parse_str(id).is_ok());
        let typed = map
            .get("type")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|t| t == "local_document" || t == "opened_document");
        let legacy = map.get("isUntitled").is_some_and(serde_json::Value::is_boolean);
        has_id && (typed || legacy)
    }

    /// The minimal record written for a fresh, empty working-directory file.
    pub fn empty_local(title: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            kind: DocumentKind::Local,
            content: Some(String::new()),
            path: None,
            created_at: now,
            last_modified: now,
            font_size: DEFAULT_FONT_SIZE,
            content_file_path: None,
            file_path: None,
            is_untitled: true,
            security_bookmark: None,
        }
    }
}

impl<'de> Deserialize<'de> for DocumentRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let helper = RecordHelper::deserialize(deserializer)?;
        let now = Utc::now();

        // Records written before `type` existed only carry the legacy pair.
        let kind = helper.kind.unwrap_or_else(|| {
            let named = helper.is_untitled == Some(false);
            if named && (helper.path.is_some() || helper.file_path.is_some()) {
                DocumentKind::Opened
            } else {
                DocumentKind::Local
            }
        });
        let path = match kind {
            DocumentKind::Opened => helper.path.or_else(|| helper.file_path.clone()),
            DocumentKind::Local => helper.path,
        };
        let is_untitled = helper.is_untitled.unwrap_or(helper.file_path.is_none());

        Ok(DocumentRecord {
            id: helper.id.unwrap_or_else(Uuid::new_v4),
            title: helper.title.unwrap_or_default(),
            kind,
            content: helper.content,
            path,
            created_at: helper.created_at.unwrap_or(now),
            last_modified: helper.last_modified.unwrap_or(now),
            font_size: helper.font_size.unwrap_or(DEFAULT_FONT_SIZE),
            content_file_path: helper.content_file_path,
            file_path: helper.file_path,
            is_untitled,
            security_bookmark: helper.security_bookmark,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordHelper {
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<DocumentKind>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    font_size: Option<f64>,
    #[serde(default)]
    content_file_path: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    is_untitled: Option<bool>,
    #[serde(default)]
    security_bookmark: Option<String>,
}
