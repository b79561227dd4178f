//! Command handlers. Each one works on an [`AppSession`] and returns the text
//! to print; nothing here writes to the terminal.

use super::render::{self, ListRow};
use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tabkeep::events::{CoreEvent, EventReceiver};
use tabkeep::init::{initialize, AppPaths};
use tabkeep::model::DocumentId;
use tabkeep::session::backend::FsSessionBackend;
use tabkeep::session::host::HeadlessHost;
use tabkeep::session::{CloseIntent, FanOutStatus, SessionCoordinator};
use tabkeep::store::registry::SharedStore;

/// One launch of the editor: a restored session laid out over headless windows.
pub struct AppSession {
    coordinator: SessionCoordinator<FsSessionBackend>,
    host: HeadlessHost,
    events: EventReceiver,
    paths: AppPaths,
}

impl AppSession {
    /// Restores the session: the first window claims the first document and
    /// fan-out opens one more window per remaining document.
    pub fn open(data: Option<PathBuf>) -> Result<Self> {
        let ctx = initialize(data).context("could not initialize tabkeep")?;
        let mut coordinator = ctx.coordinator;
        let mut host = HeadlessHost::new(
            coordinator.registry().clone(),
            coordinator.events().clone(),
            coordinator.config().default_font_size,
        );

        let first = host.open_window();
        show(&mut coordinator, &host, first);
        loop {
            match coordinator.pump_fan_out(&mut host, Instant::now()) {
                FanOutStatus::Spawned(_) => {
                    for index in host.take_spawned() {
                        show(&mut coordinator, &host, index);
                    }
                }
                FanOutStatus::Waiting => std::thread::sleep(coordinator.config().fan_out_delay()),
                FanOutStatus::Idle | FanOutStatus::Abandoned(_) => break,
            }
        }
        tracing::debug!(windows = host.windows().len(), "session laid out");

        Ok(Self {
            coordinator,
            host,
            events: ctx.events,
            paths: ctx.paths,
        })
    }

    /// Saves on the way out and hands back every event published meanwhile.
    pub fn finish(mut self) -> Result<Vec<CoreEvent>> {
        let result = self.coordinator.terminate();
        let events = self.events.drain();
        result.context("could not save the session")?;
        Ok(events)
    }

    fn open_window(&mut self) -> SharedStore {
        let index = self.host.open_window();
        show(&mut self.coordinator, &self.host, index);
        self.window(index)
    }

    fn window(&self, index: usize) -> SharedStore {
        self.host.windows()[index].shared().clone()
    }

    /// Resolves a 1-based list index to its window and document.
    fn locate(&self, index: usize) -> Result<(SharedStore, DocumentId)> {
        let mut n = 0;
        for window in self.host.windows() {
            for doc in window.borrow().documents() {
                n += 1;
                if n == index {
                    return Ok((window.shared().clone(), doc.id));
                }
            }
        }
        Err(anyhow!("No document at index {} (there are {})", index, n))
    }
}

fn show(coordinator: &mut SessionCoordinator<FsSessionBackend>, host: &HeadlessHost, index: usize) {
    if let Some(window) = host.window(index) {
        coordinator.on_store_visible(window.shared());
    }
}

pub fn list(session: &AppSession) -> Result<String> {
    let windows: Vec<_> = session.host.windows().iter().map(|w| w.borrow()).collect();
    let mut rows = Vec::new();
    for (window, store) in windows.iter().enumerate() {
        for document in store.documents() {
            rows.push(ListRow {
                index: rows.len() + 1,
                window,
                document,
            });
        }
    }
    Ok(render::render_list(&rows))
}

pub fn new(session: &mut AppSession, title: Option<String>, text: Vec<String>) -> Result<String> {
    let store = session.open_window();
    let id = store
        .borrow()
        .selected_id()
        .ok_or_else(|| anyhow!("new window has no document"))?;

    let content = text.join(" ");
    if !content.is_empty() {
        store.borrow_mut().edit(id, content)?;
    }
    if let Some(title) = title {
        session.coordinator.rename_document(&store, id, &title)?;
    }

    let title = store
        .borrow()
        .get(id)
        .map(|d| d.title.clone())
        .unwrap_or_default();
    Ok(render::render_success(&format!("Created \"{}\"", title)))
}

pub fn open(session: &mut AppSession, path: &Path) -> Result<String> {
    let path = std::fs::canonicalize(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let store = session.open_window();
    let id = session.coordinator.open_document(&store, &path);

    // The window's placeholder document gives way to the opened file
    let placeholder = store
        .borrow()
        .documents()
        .iter()
        .find(|d| d.id != id && d.is_freestanding() && d.is_blank())
        .map(|d| d.id);
    if let Some(stale) = placeholder {
        store.borrow_mut().select(stale);
        session
            .coordinator
            .on_window_closing(&store, CloseIntent::DeleteCurrent)?;
    }
    store.borrow_mut().select(id);

    Ok(render::render_success(&format!("Opened {}", path.display())))
}

pub fn edit(session: &mut AppSession, index: usize, text: Vec<String>) -> Result<String> {
    let (store, id) = session.locate(index)?;
    let changed = store.borrow_mut().edit(id, text.join(" "))?;
    Ok(if changed {
        render::render_success("Updated")
    } else {
        render::render_success("Unchanged")
    })
}

pub fn rename(session: &mut AppSession, index: usize, title: Vec<String>) -> Result<String> {
    let (store, id) = session.locate(index)?;
    let title = title.join(" ");
    let title = title.trim();
    if title.is_empty() {
        bail!("Title must not be empty");
    }
    session.coordinator.rename_document(&store, id, title)?;
    Ok(render::render_success(&format!("Renamed to \"{}\"", title)))
}

pub fn close(session: &mut AppSession, index: usize, delete: bool) -> Result<String> {
    let (store, id) = session.locate(index)?;
    store.borrow_mut().select(id);

    let intent = if delete {
        CloseIntent::DeleteCurrent
    } else {
        CloseIntent::Keep
    };
    if session.coordinator.on_window_closing(&store, intent)?.is_none() {
        store.borrow_mut().close(id);
    }
    Ok(render::render_success(if delete {
        "Closed and deleted"
    } else {
        "Closed"
    }))
}

pub fn font(session: &mut AppSession, index: usize, delta: f64) -> Result<String> {
    let (store, id) = session.locate(index)?;
    let mut store = store.borrow_mut();
    store.select(id);
    if delta == 0.0 {
        store.reset_font_size();
    } else {
        store.adjust_font_size(delta);
    }
    let size = store.get(id).map(|d| d.font_size).unwrap_or_default();
    Ok(render::render_success(&format!("Font size {}", size)))
}

pub fn show_document(session: &AppSession, index: usize) -> Result<String> {
    let (store, id) = session.locate(index)?;
    let store = store.borrow();
    let doc = store
        .get(id)
        .ok_or_else(|| anyhow!("No document at index {}", index))?;
    Ok(render::render_document(index, doc))
}

pub fn save(session: &mut AppSession) -> Result<String> {
    let report = session.coordinator.save()?;
    Ok(render::render_save_report(&report))
}

pub fn workdir_show(session: &AppSession) -> Result<String> {
    Ok(match session.coordinator.workdir().directory() {
        Some(dir) => format!("{}\n", dir.display()),
        None => render::render_success("No working directory"),
    })
}

pub fn workdir_set(session: &mut AppSession, path: &Path) -> Result<String> {
    session.coordinator.set_working_directory(Some(path))?;
    let dir = session
        .coordinator
        .workdir()
        .directory()
        .map(|d| d.display().to_string())
        .unwrap_or_default();
    Ok(render::render_success(&format!("Working directory set to {}", dir)))
}

pub fn workdir_clear(session: &mut AppSession) -> Result<String> {
    session.coordinator.set_working_directory(None)?;
    Ok(render::render_success("Working directory cleared"))
}

pub fn workdir_ls(session: &AppSession) -> Result<String> {
    let files = session.coordinator.workdir().list_files()?;
    Ok(render::render_paths(&files))
}

/// Deletes whitespace-only files that no open document is backed by.
pub fn workdir_prune(session: &AppSession) -> Result<String> {
    let workdir = session.coordinator.workdir();
    let in_use: Vec<PathBuf> = session
        .host
        .windows()
        .iter()
        .flat_map(|w| {
            w.borrow()
                .documents()
                .iter()
                .filter_map(|d| d.record_path.clone().or_else(|| d.file_path().map(Path::to_path_buf)))
                .collect::<Vec<_>>()
        })
        .collect();

    let mut removed = Vec::new();
    for path in workdir.list_files()? {
        if in_use.contains(&path) || !workdir.is_whitespace_only(&path)? {
            continue;
        }
        workdir.delete_file(&path)?;
        removed.push(path);
    }
    Ok(format!(
        "{}{}",
        render::render_paths(&removed),
        render::render_success(&format!("Removed {} file(s)", removed.len()))
    ))
}

pub fn config(session: &mut AppSession, autosave: Option<bool>) -> Result<String> {
    if let Some(enabled) = autosave {
        session.coordinator.set_auto_save_enabled(enabled)?;
    }
    let config = session.coordinator.config();
    let prefs = session.coordinator.preferences();
    Ok(format!(
        "data_dir = {}\nconfig_dir = {}\nautosave = {}\nautosave_interval_ms = {}\nfan_out_attempts = {}\nfan_out_delay_ms = {}\ndefault_font_size = {}\nrecord_ext = {}\n",
        session.paths.data_dir.display(),
        session.paths.config_dir.display(),
        prefs.enable_auto_save,
        config.autosave_interval_ms,
        config.fan_out_attempts,
        config.fan_out_delay_ms,
        config.default_font_size,
        config.record_ext(),
    ))
}
