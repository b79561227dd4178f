use super::WindowHost;
use crate::error::Result;
use crate::events::EventSender;
use crate::store::registry::{RegisteredStore, StoreRegistry};
use crate::store::DocumentStore;
use std::rc::Rc;

/// A window host without any UI: every window is just a registered store.
///
/// The first window opened with [`HeadlessHost::open_window`] becomes the base
/// window; fan-out spawns are accepted only once it exists. Windows created by
/// fan-out are parked until [`HeadlessHost::take_spawned`] hands them to the
/// caller, which reports them visible to the coordinator.
pub struct HeadlessHost {
    registry: Rc<StoreRegistry>,
    events: EventSender,
    default_font_size: f64,
    windows: Vec<RegisteredStore>,
    spawned: Vec<usize>,
}

impl HeadlessHost {
    pub fn new(registry: Rc<StoreRegistry>, events: EventSender, default_font_size: f64) -> Self {
        Self {
            registry,
            events,
            default_font_size,
            windows: Vec::new(),
            spawned: Vec::new(),
        }
    }

    fn make_window(&mut self) -> usize {
        let store = DocumentStore::new(self.events.clone())
            .with_default_font_size(self.default_font_size);
        self.windows.push(self.registry.register(store));
        self.windows.len() - 1
    }

    /// Opens a window directly, as a user would. Returns its index.
    pub fn open_window(&mut self) -> usize {
        self.make_window()
    }

    /// Indexes of windows opened by fan-out since the last call.
    pub fn take_spawned(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.spawned)
    }

    pub fn window(&self, index: usize) -> Option<&RegisteredStore> {
        self.windows.get(index)
    }

    pub fn windows(&self) -> &[RegisteredStore] {
        &self.windows
    }

    /// Closes a window, dropping (and deregistering) its store.
    pub fn close_window(&mut self, index: usize) -> Option<RegisteredStore> {
        if index >= self.windows.len() {
            return None;
        }
        self.spawned.retain(|i| *i != index);
        for i in self.spawned.iter_mut().filter(|i| **i > index) {
            *i -= 1;
        }
        Some(self.windows.remove(index))
    }
}

impl WindowHost for HeadlessHost {
    fn has_base_window(&self) -> bool {
        !self.windows.is_empty()
    }

    fn spawn_window(&mut self) -> Result<()> {
        let index = self.make_window();
        self.spawned.push(index);
        Ok(())
    }
}
