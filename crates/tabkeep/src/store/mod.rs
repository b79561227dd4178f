//! # Document Stores
//!
//! A [`DocumentStore`] is the ordered set of documents shown by one window plus
//! the current selection. Insertion order is tab order.
//!
//! Stores are created per window and shared through the [`registry`]: the
//! window keeps the [`registry::RegisteredStore`], the session coordinator
//! enumerates live stores through [`registry::StoreRegistry::live`] and never
//! holds one longer than a call.
//!
//! ## Selection
//!
//! A selection always names a document in the sequence. Closing the selected
//! document moves the selection to the new last document; emptying the store
//! clears it.

use crate::error::{Result, TabkeepError};
use crate::events::{CoreEvent, EventSender};
use crate::model::{clamp_font_size, Document, DocumentId, Provenance, DEFAULT_FONT_SIZE};
use crate::workdir::WorkingDirectory;
use std::path::Path;

pub mod registry;

/// Where a store stands in startup fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilityState {
    #[default]
    AwaitingAssignment,
    /// Holds documents it opened itself or claimed from the restore queue.
    Assigned,
    /// The restore queue was exhausted; a fresh empty document was created.
    EmptyCreated,
}

pub struct DocumentStore {
    documents: Vec<Document>,
    selected: Option<DocumentId>,
    events: EventSender,
    default_font_size: f64,
    pub(crate) visibility: VisibilityState,
}

impl DocumentStore {
    pub fn new(events: EventSender) -> Self {
        Self {
            documents: Vec::new(),
            selected: None,
            events,
            default_font_size: DEFAULT_FONT_SIZE,
            visibility: VisibilityState::default(),
        }
    }

    pub fn with_default_font_size(mut self, size: f64) -> Self {
        self.default_font_size = clamp_font_size(size);
        self
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub(crate) fn documents_mut(&mut self) -> &mut [Document] {
        &mut self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn visibility(&self) -> VisibilityState {
        self.visibility
    }

    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    fn get_mut(&mut self, id: DocumentId) -> Result<&mut Document> {
        self.documents
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| TabkeepError::Store(format!("Document not found: {}", id)))
    }

    /// Appends `doc` and selects it.
    pub fn insert(&mut self, mut doc: Document) -> DocumentId {
        doc.font_size = clamp_font_size(doc.font_size);
        let id = doc.id;
        self.documents.push(doc);
        self.selected = Some(id);
        id
    }

    pub fn create_untitled(&mut self) -> DocumentId {
        let mut doc = Document::untitled();
        doc.font_size = self.default_font_size;
        let id = self.insert(doc);
        tracing::debug!(document_id = %id, "created untitled document");
        id
    }

    /// Opens `path` as a new tab and selects it.
    ///
    /// Record files (see [`WorkingDirectory::is_record_file`]) are loaded as
    /// records. Other files, including JSON that only shares the record
    /// extension, are wrapped into the
    /// working directory when one is configured. When neither works the file
    /// is read directly as an externally backed document; unreadable content
    /// opens empty and the failure is published.
    pub fn open(&mut self, path: &Path, workdir: &WorkingDirectory) -> DocumentId {
        if let Some(existing) = self
            .documents
            .iter()
            .find(|d| d.file_path() == Some(path) || d.provenance.external_path() == Some(path))
            .map(|d| d.id)
        {
            self.selected = Some(existing);
            return existing;
        }

        let loaded = if workdir.is_record_file(path) {
            workdir.load_record(path)
        } else if workdir.is_configured() {
            workdir
                .wrap_external_file(path)
                .and_then(|wrapper| workdir.load_record(&wrapper))
        } else {
            Err(TabkeepError::DirectoryNotConfigured)
        };

        let doc = match loaded {
            Ok(doc) => doc,
            Err(e) => {
                if !matches!(e, TabkeepError::DirectoryNotConfigured) {
                    self.events.failure("open", &e);
                }
                let content = workdir.read_text(path).unwrap_or_else(|e| {
                    self.events.failure("open", &e);
                    String::new()
                });
                let title = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let mut doc = Document::new(
                    title,
                    content,
                    Provenance::ExternallyBacked {
                        path: path.to_path_buf(),
                    },
                );
                doc.font_size = self.default_font_size;
                doc
            }
        };

        let id = self.insert(doc);
        tracing::debug!(document_id = %id, path = %path.display(), "opened document");
        id
    }

    /// Removes a document. When it was selected, the new last document is
    /// selected instead.
    pub fn close(&mut self, id: DocumentId) -> Option<Document> {
        let index = self.documents.iter().position(|d| d.id == id)?;
        let removed = self.documents.remove(index);
        if self.selected == Some(id) {
            self.selected = self.documents.last().map(|d| d.id);
        }
        tracing::debug!(document_id = %id, "closed document");
        Some(removed)
    }

    /// Selects `id`. Returns false and keeps the selection when `id` is unknown.
    pub fn select(&mut self, id: DocumentId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.selected = Some(id);
        true
    }

    pub fn selected_id(&self) -> Option<DocumentId> {
        self.selected_document().map(|d| d.id)
    }

    pub fn selected_document(&self) -> Option<&Document> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Changes the selected document's font size by `delta`, clamped into
    /// range. Returns false when nothing changed.
    pub fn adjust_font_size(&mut self, delta: f64) -> bool {
        let Some(id) = self.selected else {
            return false;
        };
        let Ok(doc) = self.get_mut(id) else {
            return false;
        };
        let changed = doc.set_font_size(doc.font_size + delta);
        if changed {
            self.events.send(CoreEvent::DocumentChanged { document: id });
        }
        changed
    }

    pub fn reset_font_size(&mut self) -> bool {
        let Some(id) = self.selected else {
            return false;
        };
        let size = self.default_font_size;
        let Ok(doc) = self.get_mut(id) else {
            return false;
        };
        let changed = doc.set_font_size(size);
        if changed {
            self.events.send(CoreEvent::DocumentChanged { document: id });
        }
        changed
    }

    /// Replaces a document's content. Returns false when the content is unchanged.
    pub fn edit(&mut self, id: DocumentId, content: impl Into<String>) -> Result<bool> {
        let changed = self.get_mut(id)?.set_content(content.into());
        if changed {
            self.events.send(CoreEvent::DocumentChanged { document: id });
        }
        Ok(changed)
    }

    /// Retitles a document and renames its working-directory record to match.
    /// Empty titles are ignored. A failed file rename keeps the old record path
    /// and is published as a failure.
    pub fn rename(&mut self, id: DocumentId, title: &str, workdir: &WorkingDirectory) -> Result<bool> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(false);
        }
        let events = self.events.clone();
        let doc = self.get_mut(id)?;
        if doc.title == title {
            return Ok(false);
        }
        doc.title = title.to_string();
        doc.is_dirty = true;

        if let Some(record) = doc.record_path.clone() {
            let stem = record
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if stem != title {
                match workdir.rename_file(&record, title, workdir.record_ext()) {
                    Ok(renamed) => doc.record_path = Some(renamed),
                    Err(e) => events.failure("rename", &e),
                }
            }
        }

        tracing::debug!(document_id = %id, title, "renamed document");
        events.send(CoreEvent::TitleChanged {
            document: id,
            title: title.to_string(),
        });
        Ok(true)
    }

    /// Replaces every document, selecting the first.
    pub fn replace_all(&mut self, documents: Vec<Document>) {
        self.documents = documents;
        self.selected = self.documents.first().map(|d| d.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{self, EventReceiver};
    use crate::model::{MAX_FONT_SIZE, MIN_FONT_SIZE};
    use crate::workdir::access::FilesystemScope;
    use std::fs;
    use tempfile::TempDir;

    fn make_store() -> (DocumentStore, EventReceiver) {
        let (tx, rx) = events::channel();
        (DocumentStore::new(tx), rx)
    }

    fn no_workdir() -> WorkingDirectory {
        WorkingDirectory::new(Box::new(FilesystemScope), "json")
    }

    fn workdir_at(dir: &Path) -> WorkingDirectory {
        no_workdir().with_root(Some(dir.to_path_buf()))
    }

    #[test]
    fn test_create_untitled_selects_it() {
        let (mut store, _rx) = make_store();
        let id = store.create_untitled();

        let doc = store.selected_document().unwrap();
        assert_eq!(doc.id, id);
        assert!(doc.is_freestanding());
        assert_eq!(doc.title.len(), "2025-09-06 21:23:32".len());
    }

    #[test]
    fn test_close_selects_last() {
        let (mut store, _rx) = make_store();
        let a = store.create_untitled();
        let b = store.create_untitled();
        let c = store.create_untitled();

        store.select(b);
        store.close(b);
        assert_eq!(store.selected_id(), Some(c));

        store.select(a);
        store.close(c);
        assert_eq!(store.selected_id(), Some(a), "non-selected close keeps selection");

        store.close(a);
        assert_eq!(store.selected_id(), None);
        assert!(store.close(a).is_none());
    }

    #[test]
    fn test_select_unknown_keeps_selection() {
        let (mut store, _rx) = make_store();
        let a = store.create_untitled();
        assert!(!store.select(uuid::Uuid::new_v4()));
        assert_eq!(store.selected_id(), Some(a));
    }

    #[test]
    fn test_adjust_font_size_clamps_and_reports_noop() {
        let (mut store, rx) = make_store();
        let id = store.create_untitled();

        assert!(store.adjust_font_size(100.0));
        assert_eq!(store.get(id).unwrap().font_size, MAX_FONT_SIZE);
        assert!(!store.adjust_font_size(1.0));

        assert!(store.adjust_font_size(-100.0));
        assert_eq!(store.get(id).unwrap().font_size, MIN_FONT_SIZE);

        assert!(store.reset_font_size());
        assert_eq!(store.get(id).unwrap().font_size, DEFAULT_FONT_SIZE);
        assert!(!store.reset_font_size());

        assert_eq!(rx.drain().len(), 3);
    }

    #[test]
    fn test_adjust_font_size_without_selection() {
        let (mut store, rx) = make_store();
        assert!(!store.adjust_font_size(2.0));
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn test_edit_marks_dirty_and_notifies() {
        let (mut store, rx) = make_store();
        let id = store.create_untitled();

        assert!(store.edit(id, "hello").unwrap());
        assert!(!store.edit(id, "hello").unwrap());
        assert!(store.get(id).unwrap().is_dirty);
        assert_eq!(rx.drain(), vec![CoreEvent::DocumentChanged { document: id }]);

        assert!(store.edit(uuid::Uuid::new_v4(), "x").is_err());
    }

    #[test]
    fn test_rename_without_record() {
        let (mut store, rx) = make_store();
        let id = store.create_untitled();

        assert!(store.rename(id, "Groceries", &no_workdir()).unwrap());
        assert_eq!(store.get(id).unwrap().title, "Groceries");
        assert!(!store.rename(id, "  ", &no_workdir()).unwrap());
        assert_eq!(store.get(id).unwrap().title, "Groceries");
        assert_eq!(
            rx.drain(),
            vec![CoreEvent::TitleChanged {
                document: id,
                title: "Groceries".into()
            }]
        );
    }

    #[test]
    fn test_rename_moves_record_file() {
        let dir = TempDir::new().unwrap();
        let wd = workdir_at(dir.path());
        let (mut store, _rx) = make_store();
        let record = wd.create_empty_file(Some("draft"), "json").unwrap();
        let id = store.open(&record, &wd);

        store.rename(id, "Plans", &wd).unwrap();
        let doc = store.get(id).unwrap();
        assert_eq!(doc.record_path, Some(dir.path().join("Plans.json")));
        assert!(!record.exists());
        assert!(dir.path().join("Plans.json").exists());
    }

    #[test]
    fn test_failed_record_rename_keeps_old_path() {
        let dir = TempDir::new().unwrap();
        let wd = workdir_at(dir.path());
        let (mut store, rx) = make_store();
        let record = wd.create_empty_file(Some("draft"), "json").unwrap();
        let id = store.open(&record, &wd);
        fs::remove_file(&record).unwrap();

        assert!(store.rename(id, "Plans", &wd).unwrap());
        let doc = store.get(id).unwrap();
        assert_eq!(doc.title, "Plans");
        assert_eq!(doc.record_path, Some(record));
        assert!(rx
            .drain()
            .iter()
            .any(|e| matches!(e, CoreEvent::Failure(n) if n.operation == "rename")));
    }

    #[test]
    fn test_open_raw_file_without_workdir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "hello").unwrap();
        let (mut store, rx) = make_store();

        let id = store.open(&path, &no_workdir());
        let doc = store.get(id).unwrap();
        assert_eq!(doc.title, "notes.txt");
        assert_eq!(doc.content, "hello");
        assert_eq!(doc.provenance.external_path(), Some(path.as_path()));
        assert!(rx.drain().is_empty());

        // Opening again selects the existing tab
        store.create_untitled();
        assert_eq!(store.open(&path, &no_workdir()), id);
        assert_eq!(store.len(), 2);
        assert_eq!(store.selected_id(), Some(id));
    }

    #[test]
    fn test_open_foreign_json_is_not_a_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("package.json");
        fs::write(&path, r#"{"name":"app","version":"1.0.0"}"#).unwrap();
        let (mut store, rx) = make_store();

        let id = store.open(&path, &no_workdir());
        let doc = store.get(id).unwrap();
        assert_eq!(doc.title, "package.json");
        assert_eq!(doc.content, r#"{"name":"app","version":"1.0.0"}"#);
        assert_eq!(doc.record_path, None);
        assert_eq!(doc.provenance.external_path(), Some(path.as_path()));
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn test_open_wraps_into_workdir() {
        let wd_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let path = outside.path().join("todo.md");
        fs::write(&path, "- milk").unwrap();
        let wd = workdir_at(wd_dir.path());
        let (mut store, _rx) = make_store();

        let id = store.open(&path, &wd);
        let doc = store.get(id).unwrap();
        assert_eq!(doc.content, "- milk");
        assert_eq!(doc.record_path, Some(wd_dir.path().join("todo.json")));
        assert!(doc.provenance.external_path().is_some());
    }

    #[test]
    fn test_open_unreadable_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        let (mut store, rx) = make_store();

        let id = store.open(&path, &no_workdir());
        assert_eq!(store.get(id).unwrap().content, "");
        assert!(rx
            .drain()
            .iter()
            .any(|e| matches!(e, CoreEvent::Failure(n) if n.operation == "open")));
    }

    #[test]
    fn test_replace_all_selects_first() {
        let (mut store, _rx) = make_store();
        store.create_untitled();
        let a = Document::untitled();
        let b = Document::untitled();
        let a_id = a.id;

        store.replace_all(vec![a, b]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.selected_id(), Some(a_id));

        store.replace_all(Vec::new());
        assert_eq!(store.selected_id(), None);
    }
}
