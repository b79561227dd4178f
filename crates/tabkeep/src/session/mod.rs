//! # Session Coordination
//!
//! [`SessionCoordinator`] keeps the documents of every open window durable
//! across restarts, without any window knowing about the others.
//!
//! ## Saving
//!
//! A save walks the [`StoreRegistry`] and writes one snapshot of the union of
//! all live stores:
//!
//! 1. [`SessionCoordinator::flush_external`] writes dirty externally backed
//!    documents to their files and refreshes working-directory records.
//! 2. [`SessionCoordinator::save_all`] writes a content snapshot
//!    (`Sessions/<uuid>.txt`) for each document that is dirty or has none yet,
//!    clears the dirty flags, replaces `Sessions/session.json` atomically, and
//!    prunes snapshots no record references anymore.
//!
//! Flushing must come first because saving clears the dirty flags. Blank
//! freestanding documents are never persisted.
//!
//! ## Restoring: Fan-Out
//!
//! On startup the restored documents are spread one per window. Each store
//! moves through a small state machine the first time it becomes visible:
//!
//! ```text
//! AwaitingAssignment ──has documents──────────────▶ Assigned
//!        │
//!        ├──first store: seed, claim first entry──▶ Assigned   (+ spawn requests)
//!        ├──queue entry left: claim it────────────▶ Assigned
//!        └──queue exhausted: new empty document───▶ EmptyCreated
//! ```
//!
//! The coordinator cannot open windows itself. It counts pending spawns and
//! [`SessionCoordinator::pump_fan_out`] asks a [`WindowHost`] for them. Until
//! the host has a base window, attempts are retried on a fixed delay; when
//! the retry budget runs out the unclaimed documents are abandoned and
//! reported through [`CoreEvent::FanOutAbandoned`].
//!
//! ## Timing
//!
//! Nothing here blocks or spawns threads. The autosave timer and the fan-out
//! retries are driven by [`SessionCoordinator::tick`] and
//! [`SessionCoordinator::pump_fan_out`] with instants supplied by the host.

use crate::config::{Preferences, TabkeepConfig};
use crate::error::{Result, TabkeepError};
use crate::events::{CoreEvent, EventSender};
use crate::model::{Document, DocumentId, DocumentKind, DocumentRecord};
use crate::store::registry::{RegisteredStore, SharedStore, StoreRegistry};
use crate::store::{DocumentStore, VisibilityState};
use crate::workdir::bookmark::DirectoryReference;
use crate::workdir::{DirectoryPicker, WorkingDirectory};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

pub mod autosave;
pub mod backend;
pub mod fanout;
pub mod host;

use autosave::AutoSaveTimer;
use backend::SessionBackend;
use fanout::{FanOutQueue, RetryBudget};

/// Opens windows on the coordinator's behalf.
pub trait WindowHost {
    /// True once a window exists that new windows can be attached to.
    fn has_base_window(&self) -> bool;

    /// Opens one new window. The host reports it through
    /// [`SessionCoordinator::on_store_visible`] once it is shown.
    fn spawn_window(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// The store holds a document: its own, or one claimed from the queue.
    Assigned(Option<DocumentId>),
    /// Nothing was left to claim; a fresh empty document was created.
    EmptyCreated(DocumentId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityOutcome {
    pub assignment: Assignment,
    /// Additional windows requested for the remaining restored documents.
    pub spawn_requests: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanOutStatus {
    Idle,
    Waiting,
    Spawned(usize),
    Abandoned(Vec<DocumentId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseIntent {
    Keep,
    /// Delete the selected document's working-directory record.
    DeleteCurrent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub records: usize,
    pub snapshots_written: usize,
    pub skipped_empty: usize,
    pub pruned_snapshots: usize,
}

pub struct SessionCoordinator<B: SessionBackend> {
    backend: B,
    workdir: WorkingDirectory,
    registry: Rc<StoreRegistry>,
    config: TabkeepConfig,
    preferences: Preferences,
    preferences_dir: Option<PathBuf>,
    events: EventSender,
    queue: FanOutQueue,
    pending_spawns: usize,
    retry: RetryBudget,
    timer: AutoSaveTimer,
    restored: bool,
    terminating: bool,
}

impl<B: SessionBackend> SessionCoordinator<B> {
    pub fn new(
        backend: B,
        workdir: WorkingDirectory,
        config: TabkeepConfig,
        events: EventSender,
    ) -> Self {
        Self {
            backend,
            workdir,
            registry: StoreRegistry::new(),
            retry: RetryBudget::new(config.fan_out_attempts, config.fan_out_delay()),
            timer: AutoSaveTimer::new(config.autosave_interval()),
            config,
            preferences: Preferences::default(),
            preferences_dir: None,
            events,
            queue: FanOutQueue::default(),
            pending_spawns: 0,
            restored: false,
            terminating: false,
        }
    }

    /// Uses `preferences`, persisting changes into `dir` when given.
    pub fn with_preferences(mut self, preferences: Preferences, dir: Option<PathBuf>) -> Self {
        self.preferences = preferences;
        self.preferences_dir = dir;
        self
    }

    pub fn registry(&self) -> &Rc<StoreRegistry> {
        &self.registry
    }

    pub fn workdir(&self) -> &WorkingDirectory {
        &self.workdir
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &TabkeepConfig {
        &self.config
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating
    }

    pub fn pending_spawns(&self) -> usize {
        self.pending_spawns
    }

    pub fn queued(&self) -> usize {
        self.queue.remaining()
    }

    /// Creates and registers a store for a new window.
    pub fn new_store(&self) -> RegisteredStore {
        let store = DocumentStore::new(self.events.clone())
            .with_default_font_size(self.config.default_font_size);
        self.registry.register(store)
    }

    // --- Fan-out ---

    /// Assigns documents to a store the first time it becomes visible.
    /// Later calls for the same store change nothing.
    pub fn on_store_visible(&mut self, store: &SharedStore) -> VisibilityOutcome {
        let (state, populated, selected) = {
            let current = store.borrow();
            (current.visibility(), !current.is_empty(), current.selected_id())
        };
        match state {
            VisibilityState::Assigned => return outcome(Assignment::Assigned(selected), 0),
            VisibilityState::EmptyCreated => {
                let assignment = match selected {
                    Some(id) => Assignment::EmptyCreated(id),
                    None => Assignment::Assigned(None),
                };
                return outcome(assignment, 0);
            }
            VisibilityState::AwaitingAssignment if populated => {
                store.borrow_mut().visibility = VisibilityState::Assigned;
                return outcome(Assignment::Assigned(selected), 0);
            }
            VisibilityState::AwaitingAssignment => {}
        }

        if !self.restored && self.is_first_store() {
            self.restored = true;
            let documents = self.startup_documents();
            tracing::info!(count = documents.len(), "startup documents ready for fan-out");
            self.queue.fill(documents);
            if let Some(first) = self.queue.claim_next() {
                let spawn_requests = self.queue.remaining();
                self.pending_spawns += spawn_requests;
                self.retry.reset();
                return self.assign(store, first, spawn_requests);
            }
        }

        match self.queue.claim_next() {
            Some(doc) => self.assign(store, doc, 0),
            None => {
                let id = self.create_empty_document(&mut store.borrow_mut());
                store.borrow_mut().visibility = VisibilityState::EmptyCreated;
                tracing::debug!(document_id = %id, "fan-out queue exhausted, created empty document");
                outcome(Assignment::EmptyCreated(id), 0)
            }
        }
    }

    fn assign(&self, store: &SharedStore, doc: Document, spawn_requests: usize) -> VisibilityOutcome {
        let mut store = store.borrow_mut();
        let id = store.insert(doc);
        store.visibility = VisibilityState::Assigned;
        tracing::debug!(document_id = %id, "claimed restored document");
        outcome(Assignment::Assigned(Some(id)), spawn_requests)
    }

    fn is_first_store(&self) -> bool {
        let live = self.registry.live();
        live.len() <= 1 && live.iter().all(|(_, s)| s.borrow().is_empty())
    }

    /// Documents for the first window: seeded from the working directory when
    /// one is configured, otherwise restored from the session file. With a
    /// working directory, session documents that have no file in it (untitled
    /// tabs, files opened elsewhere) are appended after the seeded ones.
    fn startup_documents(&self) -> Vec<Document> {
        if !self.workdir.is_configured() {
            return self.restore_session();
        }
        let mut documents = match self.workdir.seed_documents() {
            Ok(outcome) => {
                for (path, err) in &outcome.failures {
                    tracing::warn!(path = %path.display(), error = %err, "skipped unreadable file");
                    self.events.failure("seed", err);
                }
                outcome.documents
            }
            Err(e) => {
                self.events.failure("seed", &e);
                Vec::new()
            }
        };

        let mut ids: HashSet<DocumentId> = documents.iter().map(|d| d.id).collect();
        let mut paths: HashSet<PathBuf> = documents
            .iter()
            .filter_map(|d| d.file_path().map(Path::to_path_buf))
            .collect();
        let seeded = documents.len();
        for doc in self.restore_session() {
            if doc.record_path.is_some() {
                continue;
            }
            if let Some(path) = doc.file_path() {
                if !paths.insert(path.to_path_buf()) {
                    continue;
                }
            }
            if ids.insert(doc.id) {
                documents.push(doc);
            }
        }
        if documents.len() > seeded {
            tracing::info!(
                count = documents.len() - seeded,
                "kept session documents outside the working directory"
            );
        }
        documents
    }

    fn create_empty_document(&self, store: &mut DocumentStore) -> DocumentId {
        if self.workdir.is_configured() {
            let created = self
                .workdir
                .create_empty_file(None, self.workdir.record_ext())
                .and_then(|path| self.workdir.load_record(&path));
            match created {
                Ok(doc) => return store.insert(doc),
                Err(e) => self.events.failure("create", &e),
            }
        }
        store.create_untitled()
    }

    /// Opens pending fan-out windows through `host`. Call repeatedly until it
    /// stops returning [`FanOutStatus::Waiting`].
    pub fn pump_fan_out(&mut self, host: &mut dyn WindowHost, now: Instant) -> FanOutStatus {
        self.pending_spawns = self.pending_spawns.min(self.queue.remaining());
        if self.pending_spawns == 0 {
            return FanOutStatus::Idle;
        }
        if !self.retry.is_due(now) {
            return FanOutStatus::Waiting;
        }

        if host.has_base_window() {
            let mut spawned = 0;
            while self.pending_spawns > 0 {
                match host.spawn_window() {
                    Ok(()) => {
                        self.pending_spawns -= 1;
                        spawned += 1;
                    }
                    Err(e) => {
                        self.events.failure("fan-out", &e);
                        break;
                    }
                }
            }
            if self.pending_spawns == 0 {
                self.retry.reset();
                tracing::debug!(spawned, "fan-out windows requested");
                return FanOutStatus::Spawned(spawned);
            }
        }

        if self.retry.record_failure(now) {
            return FanOutStatus::Waiting;
        }

        let remaining = self.queue.remaining_ids();
        tracing::warn!(
            attempts = self.retry.attempts(),
            abandoned = remaining.len(),
            "no window became available, abandoning restored documents"
        );
        self.queue.clear();
        self.pending_spawns = 0;
        self.retry.reset();
        self.events.send(CoreEvent::FanOutAbandoned {
            remaining: remaining.clone(),
        });
        FanOutStatus::Abandoned(remaining)
    }

    // --- Persistence ---

    /// Reads the session file back into documents, in saved order. Nothing is
    /// assigned to a store. A missing or corrupt file restores nothing.
    pub fn restore_session(&self) -> Vec<Document> {
        let records = match self.backend.load_session() {
            Ok(Some(records)) => records,
            Ok(None) => return Vec::new(),
            Err(e) => {
                self.events.failure("restore", &e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let documents: Vec<Document> = records
            .iter()
            .filter(|r| seen.insert(r.id))
            .map(|record| Document::from_record(record, self.restore_content(record)))
            .collect();
        tracing::info!(count = documents.len(), "restored session");
        documents
    }

    fn restore_content(&self, record: &DocumentRecord) -> String {
        match record.kind {
            DocumentKind::Local => {
                if let Some(content) = &record.content {
                    return content.clone();
                }
                let from_file = record
                    .content_file_path
                    .as_deref()
                    .map(|p| self.backend.read_content_file(Path::new(p)));
                match from_file {
                    Some(Ok(Some(content))) => content,
                    Some(Err(e)) => {
                        self.events.failure("restore", &e);
                        self.snapshot_or_empty(&record.id)
                    }
                    _ => self.snapshot_or_empty(&record.id),
                }
            }
            DocumentKind::Opened => {
                let live = record
                    .path
                    .as_deref()
                    .map(|p| self.workdir.read_text(Path::new(p)));
                match live {
                    Some(Ok(content)) => content,
                    Some(Err(e)) => {
                        tracing::warn!(document_id = %record.id, error = %e, "external file unreadable, using snapshot");
                        self.backend
                            .read_snapshot(&record.id)
                            .ok()
                            .flatten()
                            .or_else(|| record.content.clone())
                            .unwrap_or_else(|| {
                                self.events.failure("restore", &e);
                                String::new()
                            })
                    }
                    None => self.snapshot_or_empty(&record.id),
                }
            }
        }
    }

    fn snapshot_or_empty(&self, id: &DocumentId) -> String {
        match self.backend.read_snapshot(id) {
            Ok(content) => content.unwrap_or_default(),
            Err(e) => {
                self.events.failure("restore", &e);
                String::new()
            }
        }
    }

    /// Writes dirty externally backed documents to their files and refreshes
    /// the working-directory record of every dirty document that has one.
    /// Failures are published and skipped. Returns the number of files written.
    pub fn flush_external(&self) -> usize {
        let _guard = match self.workdir.hold_access() {
            Ok(guard) => guard,
            Err(e) => {
                self.events.failure("flush", &e);
                None
            }
        };

        let mut written = 0;
        for (_, store) in self.registry.live() {
            let store = store.borrow();
            for doc in store.documents().iter().filter(|d| d.is_dirty) {
                if let Some(path) = doc.provenance.external_path() {
                    match self.workdir.write_external(path, &doc.content) {
                        Ok(()) => written += 1,
                        Err(e) => self.events.failure("flush", &e),
                    }
                }
                if let Some(record) = &doc.record_path {
                    match self.workdir.save_record(doc, record) {
                        Ok(()) => written += 1,
                        Err(e) => self.events.failure("flush", &e),
                    }
                }
            }
        }
        if written > 0 {
            tracing::debug!(written, "flushed external files");
        }
        written
    }

    /// Snapshots every live store into the session file.
    pub fn save_all(&mut self) -> Result<SaveReport> {
        let mut report = SaveReport::default();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut kept = HashSet::new();

        for (_, store) in self.registry.live() {
            let mut store = store.borrow_mut();
            for doc in store.documents_mut() {
                if !seen.insert(doc.id) {
                    continue;
                }
                if doc.is_freestanding() && doc.is_blank() {
                    report.skipped_empty += 1;
                    continue;
                }
                if doc.is_dirty || !self.backend.has_snapshot(&doc.id) {
                    self.backend.write_snapshot(&doc.id, &doc.content)?;
                    report.snapshots_written += 1;
                }
                doc.is_dirty = false;
                kept.insert(doc.id);
                let snapshot = self.backend.snapshot_path(&doc.id);
                records.push(doc.to_session_record(Some(&snapshot)));
            }
        }

        self.backend.save_session(&records)?;
        report.records = records.len();

        for id in self.backend.list_snapshot_ids()? {
            if !kept.contains(&id) {
                self.backend.delete_snapshot(&id)?;
                report.pruned_snapshots += 1;
            }
        }

        tracing::debug!(
            records = report.records,
            snapshots = report.snapshots_written,
            skipped = report.skipped_empty,
            pruned = report.pruned_snapshots,
            "session saved"
        );
        Ok(report)
    }

    /// Explicit save: flush external files, then snapshot the session.
    pub fn save(&mut self) -> Result<SaveReport> {
        self.flush_external();
        self.save_all()
    }

    // --- Autosave ---

    /// Starts the autosave timer, replacing any running one.
    pub fn start_auto_save(&mut self, now: Instant) {
        self.timer.start(now);
        tracing::debug!(interval_ms = self.timer.interval().as_millis() as u64, "autosave started");
    }

    pub fn stop_auto_save(&mut self) {
        self.timer.stop();
    }

    pub fn is_auto_save_running(&self) -> bool {
        self.timer.is_running()
    }

    /// Advances the autosave timer. Returns the report when a save ran.
    pub fn tick(&mut self, now: Instant) -> Option<SaveReport> {
        if !self.timer.poll(now) || !self.preferences.enable_auto_save {
            return None;
        }
        match self.save() {
            Ok(report) => Some(report),
            Err(e) => {
                self.events.failure("autosave", &e);
                None
            }
        }
    }

    pub fn set_auto_save_enabled(&mut self, enabled: bool) -> Result<()> {
        self.preferences.enable_auto_save = enabled;
        self.save_preferences()
    }

    // --- Lifecycle ---

    /// Final save before the process exits. Delete-on-close is suppressed from
    /// here on.
    pub fn terminate(&mut self) -> Result<SaveReport> {
        self.terminating = true;
        tracing::info!("terminating session");
        let result = self.save();
        self.timer.stop();
        result
    }

    /// Handles a window about to close. With [`CloseIntent::DeleteCurrent`] the
    /// selected document is removed and its working-directory record deleted;
    /// an external file is never deleted. Returns the removed document's id.
    pub fn on_window_closing(
        &mut self,
        store: &SharedStore,
        intent: CloseIntent,
    ) -> Result<Option<DocumentId>> {
        if self.terminating {
            tracing::debug!("window closing during termination, keeping documents");
            return Ok(None);
        }
        if intent == CloseIntent::Keep {
            return Ok(None);
        }

        let mut store = store.borrow_mut();
        let Some(doc) = store.selected_document() else {
            return Ok(None);
        };
        let id = doc.id;
        if let Some(record) = doc.record_path.clone() {
            match self.workdir.delete_file(&record) {
                Ok(()) => {}
                Err(TabkeepError::DirectoryNotConfigured) => {
                    tracing::warn!(path = %record.display(), "working directory cleared, record kept");
                    self.events
                        .failure("delete", &TabkeepError::DirectoryNotConfigured);
                }
                Err(e) => return Err(e),
            }
        }
        store.close(id);
        tracing::debug!(document_id = %id, "deleted current document on close");
        Ok(Some(id))
    }

    pub fn rename_document(&self, store: &SharedStore, id: DocumentId, title: &str) -> Result<bool> {
        store.borrow_mut().rename(id, title, &self.workdir)
    }

    pub fn open_document(&self, store: &SharedStore, path: &Path) -> DocumentId {
        store.borrow_mut().open(path, &self.workdir)
    }

    // --- Working directory ---

    /// Lets the user pick a new working directory. Returns the new folder, or
    /// `None` when the prompt was cancelled.
    pub fn choose_working_directory(
        &mut self,
        picker: &mut dyn DirectoryPicker,
    ) -> Result<Option<PathBuf>> {
        let Some(reference) = self.workdir.choose_directory(picker)? else {
            return Ok(None);
        };
        self.adopt_directory(Some(reference))
            .map(|_| self.workdir.directory().map(Path::to_path_buf))
    }

    /// Sets (or with `None`, clears) the working directory without prompting.
    pub fn set_working_directory(&mut self, path: Option<&Path>) -> Result<()> {
        let reference = match path {
            Some(path) if !path.is_dir() => return Err(TabkeepError::NotFound(path.to_path_buf())),
            Some(path) => Some(DirectoryReference::capture(path)?),
            None => None,
        };
        self.workdir
            .set_directory(reference.as_ref().map(|r| r.path.clone()));
        self.adopt_directory(reference)
    }

    fn adopt_directory(&mut self, reference: Option<DirectoryReference>) -> Result<()> {
        let path = reference.as_ref().map(|r| r.path.clone());
        self.preferences.working_directory_path = path.clone();
        self.preferences.working_directory_bookmark = reference.and_then(|r| r.bookmark);
        self.save_preferences()?;
        self.events
            .send(CoreEvent::WorkingDirectoryChanged { path });
        Ok(())
    }

    /// Replaces the store's documents with one fresh record in the new folder.
    pub fn handle_working_directory_changed(&self, store: &SharedStore) -> Result<DocumentId> {
        if !self.workdir.is_configured() {
            return Err(TabkeepError::DirectoryNotConfigured);
        }
        let path = self
            .workdir
            .create_empty_file(None, self.workdir.record_ext())?;
        let doc = self.workdir.load_record(&path)?;
        let id = doc.id;
        let mut store = store.borrow_mut();
        store.replace_all(vec![doc]);
        store.visibility = VisibilityState::Assigned;
        tracing::info!(document_id = %id, "store re-seeded from new working directory");
        Ok(id)
    }

    fn save_preferences(&self) -> Result<()> {
        match &self.preferences_dir {
            Some(dir) => self.preferences.save(dir),
            None => Ok(()),
        }
    }
}

fn outcome(assignment: Assignment, spawn_requests: usize) -> VisibilityOutcome {
    VisibilityOutcome {
        assignment,
        spawn_requests,
    }
}

#[cfg(test)]
mod tests {
    use super::backend::MemSessionBackend;
    use super::host::HeadlessHost;
    use super::*;
    use crate::events::{self, EventReceiver};
    use crate::model::Provenance;
    use crate::workdir::access::FilesystemScope;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    type Coordinator = SessionCoordinator<MemSessionBackend>;

    fn coordinator_with(backend: MemSessionBackend) -> (Coordinator, EventReceiver) {
        let (tx, rx) = events::channel();
        let workdir = WorkingDirectory::new(Box::new(FilesystemScope), "json");
        (
            SessionCoordinator::new(backend, workdir, TabkeepConfig::default(), tx),
            rx,
        )
    }

    fn coordinator() -> (Coordinator, EventReceiver) {
        coordinator_with(MemSessionBackend::new())
    }

    fn with_docs(coord: &Coordinator, contents: &[&str]) -> RegisteredStore {
        let store = coord.new_store();
        for content in contents {
            let id = store.borrow_mut().create_untitled();
            store.borrow_mut().edit(id, *content).unwrap();
        }
        store
    }

    /// Moves the persisted session of `old` into a fresh coordinator.
    fn restart(old: Coordinator) -> (Coordinator, EventReceiver) {
        let backend = MemSessionBackend::new();
        if let Some(raw) = old.backend().raw_session() {
            backend.set_raw_session(&raw);
        }
        coordinator_with(backend)
    }

    #[test]
    fn test_save_skips_blank_freestanding_documents() {
        let (mut coord, _rx) = coordinator();
        let _a = with_docs(&coord, &["hello", "world"]);
        let _b = with_docs(&coord, &[""]);

        let report = coord.save_all().unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.skipped_empty, 1);
        assert_eq!(report.snapshots_written, 2);
    }

    #[test]
    fn test_second_save_writes_no_snapshots() {
        let (mut coord, _rx) = coordinator();
        let store = with_docs(&coord, &["hello"]);

        coord.save_all().unwrap();
        assert!(!store.borrow().documents()[0].is_dirty);
        let report = coord.save_all().unwrap();

        assert_eq!(report.snapshots_written, 0);
        assert_eq!(coord.backend().snapshot_writes(), 1);
        assert_eq!(coord.backend().session_writes(), 2);
    }

    #[test]
    fn test_save_prunes_closed_document_snapshots() {
        let (mut coord, _rx) = coordinator();
        let store = with_docs(&coord, &["keep", "drop"]);
        coord.save_all().unwrap();
        assert_eq!(coord.backend().snapshot_count(), 2);

        let dropped = store.borrow().documents()[1].id;
        store.borrow_mut().close(dropped);
        let report = coord.save_all().unwrap();

        assert_eq!(report.pruned_snapshots, 1);
        assert_eq!(coord.backend().snapshot_count(), 1);
    }

    #[test]
    fn test_save_propagates_write_errors() {
        let (mut coord, _rx) = coordinator();
        let _store = with_docs(&coord, &["hello"]);
        coord.backend().set_simulate_write_error(true);

        assert!(coord.save_all().is_err());
    }

    #[test]
    fn test_restore_missing_session_is_empty() {
        let (coord, rx) = coordinator();
        assert!(coord.restore_session().is_empty());
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn test_restore_corrupt_session_reports_failure() {
        let backend = MemSessionBackend::new();
        backend.set_raw_session("[{ nope");
        let (coord, rx) = coordinator_with(backend);

        assert!(coord.restore_session().is_empty());
        assert!(rx
            .drain()
            .iter()
            .any(|e| matches!(e, CoreEvent::Failure(n) if n.operation == "restore")));
    }

    #[test]
    fn test_restore_reads_legacy_content_file() {
        let backend = MemSessionBackend::new();
        let id = uuid::Uuid::new_v4();
        backend.write_snapshot(&id, "from file").unwrap();
        let raw = format!(
            r#"[{{"id":"{id}","title":"Old","isUntitled":true,"contentFilePath":"memory://{id}.txt"}}]"#
        );
        backend.set_raw_session(&raw);
        let (coord, _rx) = coordinator_with(backend);

        let docs = coord.restore_session();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
        assert_eq!(docs[0].content, "from file");
    }

    #[test]
    fn test_restore_external_falls_back_to_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "on disk").unwrap();

        let (mut coord, _rx) = coordinator();
        let store = coord.new_store();
        let id = coord.open_document(store.shared(), &path);
        coord.save_all().unwrap();

        let (coord, _rx) = restart(coord);
        // restart() only carries the session file; seed the snapshot again
        coord.backend().write_snapshot(&id, "snapshot").unwrap();
        assert_eq!(coord.restore_session()[0].content, "on disk");

        fs::remove_file(&path).unwrap();
        let docs = coord.restore_session();
        assert_eq!(docs[0].content, "snapshot");
        assert_eq!(docs[0].provenance.external_path(), Some(path.as_path()));
    }

    #[test]
    fn test_scenario_save_and_fan_out() {
        let (mut coord, _rx) = coordinator();
        let a = with_docs(&coord, &["hello", "world"]);
        let b = with_docs(&coord, &[""]);
        let x = a.borrow().documents()[0].id;
        let y = a.borrow().documents()[1].id;
        coord.save_all().unwrap();
        drop(a);
        drop(b);

        let (mut coord, _rx) = restart(coord);
        let (tx, _host_rx) = events::channel();
        let mut host = HeadlessHost::new(coord.registry().clone(), tx, 14.0);
        let first = host.open_window();

        let result = coord.on_store_visible(host.window(first).unwrap().shared());
        assert_eq!(result.assignment, Assignment::Assigned(Some(x)));
        assert_eq!(result.spawn_requests, 1);

        assert_eq!(
            coord.pump_fan_out(&mut host, Instant::now()),
            FanOutStatus::Spawned(1)
        );
        let spawned = host.take_spawned();
        let second = coord.on_store_visible(host.window(spawned[0]).unwrap().shared());
        assert_eq!(second.assignment, Assignment::Assigned(Some(y)));

        let third_index = host.open_window();
        let third = coord.on_store_visible(host.window(third_index).unwrap().shared());
        assert!(matches!(third.assignment, Assignment::EmptyCreated(_)));

        let window = host.window(spawned[0]).unwrap();
        assert_eq!(window.borrow().documents()[0].content, "world");
    }

    #[test]
    fn test_visibility_is_idempotent() {
        let (mut coord, _rx) = coordinator();
        let store = coord.new_store();

        let first = coord.on_store_visible(store.shared());
        let again = coord.on_store_visible(store.shared());
        assert_eq!(first, again);
        assert_eq!(store.borrow().len(), 1);
    }

    #[test]
    fn test_populated_store_is_assigned_trivially() {
        let (mut coord, _rx) = coordinator();
        let store = with_docs(&coord, &["mine"]);

        let result = coord.on_store_visible(store.shared());
        assert!(matches!(result.assignment, Assignment::Assigned(Some(_))));
        assert_eq!(result.spawn_requests, 0);
        assert_eq!(store.borrow().len(), 1);
    }

    #[test]
    fn test_fan_out_abandons_after_retry_budget() {
        let (mut coord, rx) = coordinator();
        let a = with_docs(&coord, &["one", "two", "three"]);
        coord.save_all().unwrap();
        drop(a);

        let (mut coord, rx2) = restart(coord);
        drop(rx);
        let lone = coord.new_store();
        assert_eq!(coord.on_store_visible(lone.shared()).spawn_requests, 2);

        struct NoBase;
        impl WindowHost for NoBase {
            fn has_base_window(&self) -> bool {
                false
            }
            fn spawn_window(&mut self) -> Result<()> {
                Ok(())
            }
        }

        let start = Instant::now();
        let delay = Duration::from_millis(50);
        let mut status = FanOutStatus::Idle;
        for attempt in 0..30u32 {
            status = coord.pump_fan_out(&mut NoBase, start + delay * attempt);
        }
        match status {
            FanOutStatus::Abandoned(ids) => assert_eq!(ids.len(), 2),
            other => panic!("expected abandonment, got {:?}", other),
        }
        assert_eq!(coord.pending_spawns(), 0);
        assert!(rx2
            .drain()
            .iter()
            .any(|e| matches!(e, CoreEvent::FanOutAbandoned { remaining } if remaining.len() == 2)));
    }

    #[test]
    fn test_fan_out_waits_between_attempts() {
        let (mut coord, _rx) = coordinator();
        let a = with_docs(&coord, &["one", "two"]);
        coord.save_all().unwrap();
        drop(a);

        let (mut coord, _rx) = restart(coord);
        let (tx, _host_rx) = events::channel();
        let mut host = HeadlessHost::new(coord.registry().clone(), tx, 14.0);
        let lone = coord.new_store();
        coord.on_store_visible(lone.shared());

        let start = Instant::now();
        // Host has no windows of its own yet
        assert_eq!(coord.pump_fan_out(&mut host, start), FanOutStatus::Waiting);
        assert_eq!(
            coord.pump_fan_out(&mut host, start + Duration::from_millis(10)),
            FanOutStatus::Waiting
        );
        host.open_window();
        assert_eq!(
            coord.pump_fan_out(&mut host, start + Duration::from_millis(60)),
            FanOutStatus::Spawned(1)
        );
        assert_eq!(
            coord.pump_fan_out(&mut host, start + Duration::from_millis(120)),
            FanOutStatus::Idle
        );
    }

    #[test]
    fn test_flush_writes_dirty_external_documents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "old").unwrap();

        let (mut coord, _rx) = coordinator();
        let store = coord.new_store();
        let id = coord.open_document(store.shared(), &path);
        store.borrow_mut().edit(id, "new").unwrap();

        assert_eq!(coord.flush_external(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");

        coord.save_all().unwrap();
        assert_eq!(coord.flush_external(), 0, "save clears dirty");
    }

    #[test]
    fn test_tick_saves_when_due_and_enabled() {
        let (mut coord, _rx) = coordinator();
        let _store = with_docs(&coord, &["hello"]);
        let start = Instant::now();

        assert!(coord.tick(start + Duration::from_secs(5)).is_none(), "not started");
        coord.start_auto_save(start);
        assert!(coord.tick(start + Duration::from_secs(1)).is_none());
        assert!(coord.tick(start + Duration::from_secs(2)).is_some());

        coord.set_auto_save_enabled(false).unwrap();
        assert!(coord.tick(start + Duration::from_secs(4)).is_none());
        assert_eq!(coord.backend().session_writes(), 1);
    }

    #[test]
    fn test_terminate_saves_and_stops_timer() {
        let (mut coord, _rx) = coordinator();
        let _store = with_docs(&coord, &["bye"]);
        coord.start_auto_save(Instant::now());

        let report = coord.terminate().unwrap();
        assert_eq!(report.records, 1);
        assert!(coord.is_terminating());
        assert!(!coord.is_auto_save_running());
    }

    #[test]
    fn test_delete_on_close_removes_record_only() {
        let wd = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let external = outside.path().join("keep.txt");
        fs::write(&external, "precious").unwrap();

        let (mut coord, _rx) = coordinator();
        coord.set_working_directory(Some(wd.path())).unwrap();
        let store = coord.new_store();
        let id = coord.open_document(store.shared(), &external);
        let record = store.borrow().get(id).unwrap().record_path.clone().unwrap();
        assert!(record.exists());

        let removed = coord
            .on_window_closing(store.shared(), CloseIntent::DeleteCurrent)
            .unwrap();
        assert_eq!(removed, Some(id));
        assert!(!record.exists());
        assert!(external.exists());
        assert!(store.borrow().is_empty());
    }

    #[test]
    fn test_delete_on_close_after_directory_cleared() {
        let wd = TempDir::new().unwrap();
        let (mut coord, rx) = coordinator();
        coord.set_working_directory(Some(wd.path())).unwrap();
        let store = coord.new_store();
        coord.on_store_visible(store.shared());
        let id = store.borrow().documents()[0].id;
        let record = store.borrow().get(id).unwrap().record_path.clone().unwrap();

        coord.set_working_directory(None).unwrap();
        rx.drain();
        let removed = coord
            .on_window_closing(store.shared(), CloseIntent::DeleteCurrent)
            .unwrap();
        assert_eq!(removed, Some(id));
        assert!(store.borrow().is_empty());
        assert!(record.exists());
        assert!(rx
            .drain()
            .iter()
            .any(|e| matches!(e, CoreEvent::Failure(n) if n.operation == "delete")));
    }

    #[test]
    fn test_saving_foreign_json_keeps_its_bytes() {
        let dir = TempDir::new().unwrap();
        let package = dir.path().join("package.json");
        let original = "{\n  \"name\": \"app\",\n  \"version\": \"1.0.0\"\n}\n";
        fs::write(&package, original).unwrap();

        let (mut coord, _rx) = coordinator();
        let store = coord.new_store();
        let id = coord.open_document(store.shared(), &package);
        store.borrow_mut().select(id);
        store.borrow_mut().adjust_font_size(2.0);
        coord.save().unwrap();
        assert_eq!(fs::read_to_string(&package).unwrap(), original);

        let edited = original.replace("1.0.0", "1.0.1");
        store.borrow_mut().edit(id, edited.clone()).unwrap();
        coord.save().unwrap();
        assert_eq!(fs::read_to_string(&package).unwrap(), edited);
    }

    #[test]
    fn test_rename_cannot_leave_working_directory() {
        let parent = TempDir::new().unwrap();
        let wd = parent.path().join("notes");
        fs::create_dir(&wd).unwrap();
        let (mut coord, _rx) = coordinator();
        coord.set_working_directory(Some(&wd)).unwrap();
        let store = coord.new_store();
        coord.on_store_visible(store.shared());
        let id = store.borrow().documents()[0].id;

        coord.rename_document(store.shared(), id, "../escaped").unwrap();
        let record = store.borrow().get(id).unwrap().record_path.clone().unwrap();
        assert_eq!(record.parent(), Some(wd.canonicalize().unwrap().as_path()));
        assert!(!parent.path().join("escaped.json").exists());
    }

    #[test]
    fn test_terminating_suppresses_delete_on_close() {
        let wd = TempDir::new().unwrap();
        let (mut coord, _rx) = coordinator();
        coord.set_working_directory(Some(wd.path())).unwrap();
        let store = coord.new_store();
        coord.on_store_visible(store.shared());
        let record = store.borrow().documents()[0].record_path.clone().unwrap();

        coord.terminate().unwrap();
        let removed = coord
            .on_window_closing(store.shared(), CloseIntent::DeleteCurrent)
            .unwrap();
        assert_eq!(removed, None);
        assert!(record.exists());
    }

    #[test]
    fn test_first_store_seeds_from_working_directory() {
        let wd = TempDir::new().unwrap();
        fs::write(wd.path().join("a.txt"), "alpha").unwrap();
        fs::write(wd.path().join("blank.txt"), "\n\n").unwrap();

        let (mut coord, _rx) = coordinator();
        coord.set_working_directory(Some(wd.path())).unwrap();
        let store = coord.new_store();
        let result = coord.on_store_visible(store.shared());

        assert_eq!(result.spawn_requests, 0);
        assert_eq!(store.borrow().documents()[0].content, "alpha");
        assert!(!wd.path().join("blank.txt").exists());
    }

    #[test]
    fn test_empty_document_created_in_working_directory() {
        let wd = TempDir::new().unwrap();
        let (mut coord, _rx) = coordinator();
        coord.set_working_directory(Some(wd.path())).unwrap();
        let store = coord.new_store();

        let result = coord.on_store_visible(store.shared());
        assert!(matches!(result.assignment, Assignment::EmptyCreated(_)));
        let record = store.borrow().documents()[0].record_path.clone().unwrap();
        assert!(record.starts_with(coord.workdir().directory().unwrap()));
        assert!(coord.workdir().access().is_balanced());
    }

    #[test]
    fn test_working_directory_change_reseeds_store() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let (mut coord, rx) = coordinator();
        coord.set_working_directory(Some(first.path())).unwrap();
        let store = with_docs(&coord, &["old"]);

        assert!(matches!(
            coord.set_working_directory(Some(second.path().join("missing").as_path())),
            Err(TabkeepError::NotFound(_))
        ));
        coord.set_working_directory(Some(second.path())).unwrap();
        let id = coord.handle_working_directory_changed(store.shared()).unwrap();

        let store = store.borrow();
        assert_eq!(store.len(), 1);
        assert_eq!(store.selected_id(), Some(id));
        assert!(store.documents()[0]
            .record_path
            .as_ref()
            .unwrap()
            .starts_with(coord.workdir().directory().unwrap()));
        let changes = rx
            .drain()
            .into_iter()
            .filter(|e| matches!(e, CoreEvent::WorkingDirectoryChanged { .. }))
            .count();
        assert_eq!(changes, 2);
    }

    struct Picker(Option<PathBuf>);

    impl DirectoryPicker for Picker {
        fn pick_directory(&mut self) -> Option<PathBuf> {
            self.0.take()
        }
    }

    #[test]
    fn test_choose_working_directory_persists_preferences() {
        let wd = TempDir::new().unwrap();
        let prefs_dir = TempDir::new().unwrap();
        let (coord, _rx) = coordinator();
        let mut coord =
            coord.with_preferences(Preferences::default(), Some(prefs_dir.path().to_path_buf()));

        assert_eq!(coord.choose_working_directory(&mut Picker(None)).unwrap(), None);
        let chosen = coord
            .choose_working_directory(&mut Picker(Some(wd.path().to_path_buf())))
            .unwrap()
            .unwrap();

        let saved = Preferences::load(prefs_dir.path()).unwrap();
        assert_eq!(saved.working_directory_path, Some(chosen));
        assert!(saved.working_directory_bookmark.is_some());
    }

    #[test]
    fn test_rename_document_renames_record() {
        let wd = TempDir::new().unwrap();
        let (mut coord, _rx) = coordinator();
        coord.set_working_directory(Some(wd.path())).unwrap();
        let store = coord.new_store();
        coord.on_store_visible(store.shared());
        let id = store.borrow().documents()[0].id;

        assert!(coord.rename_document(store.shared(), id, "Shopping").unwrap());
        let record = store.borrow().get(id).unwrap().record_path.clone().unwrap();
        assert_eq!(record.file_name().unwrap(), "Shopping.json");
        assert!(!coord.rename_document(store.shared(), id, "").unwrap());
    }

    #[test]
    fn test_documents_are_not_duplicated_across_stores() {
        let (mut coord, _rx) = coordinator();
        let a = with_docs(&coord, &["shared"]);
        let doc = a.borrow().documents()[0].clone();
        let b = coord.new_store();
        b.borrow_mut().insert(Document {
            provenance: Provenance::Freestanding,
            ..doc
        });

        assert_eq!(coord.save_all().unwrap().records, 1);
    }
}
