//! Process-wide table of live document stores.
//!
//! The registry never owns a store. Each slot holds a `Weak` reference, and the
//! [`RegisteredStore`] returned by [`StoreRegistry::register`] removes its slot
//! when dropped, so enumeration only ever sees stores that are still alive.

use super::DocumentStore;
use std::cell::{Cell, RefCell};
use std::ops::Deref;
use std::rc::{Rc, Weak};

pub type SharedStore = Rc<RefCell<DocumentStore>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreHandle(u64);

impl std::fmt::Display for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "store-{}", self.0)
    }
}

#[derive(Default)]
pub struct StoreRegistry {
    slots: RefCell<Vec<(StoreHandle, Weak<RefCell<DocumentStore>>)>>,
    next: Cell<u64>,
}

impl StoreRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Wraps `store` for sharing and adds it to the table.
    pub fn register(self: &Rc<Self>, store: DocumentStore) -> RegisteredStore {
        let handle = StoreHandle(self.next.get());
        self.next.set(self.next.get() + 1);

        let store = Rc::new(RefCell::new(store));
        self.slots
            .borrow_mut()
            .push((handle, Rc::downgrade(&store)));
        tracing::debug!(%handle, "store registered");

        RegisteredStore {
            handle,
            store,
            registry: Rc::downgrade(self),
        }
    }

    fn deregister(&self, handle: StoreHandle) {
        self.slots.borrow_mut().retain(|(h, _)| *h != handle);
        tracing::debug!(%handle, "store deregistered");
    }

    /// Live stores in registration order.
    pub fn live(&self) -> Vec<(StoreHandle, SharedStore)> {
        self.slots
            .borrow()
            .iter()
            .filter_map(|(handle, weak)| weak.upgrade().map(|store| (*handle, store)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, handle: StoreHandle) -> Option<SharedStore> {
        self.slots
            .borrow()
            .iter()
            .find(|(h, _)| *h == handle)
            .and_then(|(_, weak)| weak.upgrade())
    }
}

/// Owning handle of one window's store. Dropping it deregisters the store.
pub struct RegisteredStore {
    handle: StoreHandle,
    store: SharedStore,
    registry: Weak<StoreRegistry>,
}

impl RegisteredStore {
    pub fn handle(&self) -> StoreHandle {
        self.handle
    }

    pub fn shared(&self) -> &SharedStore {
        &self.store
    }
}

impl Deref for RegisteredStore {
    type Target = RefCell<DocumentStore>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl Drop for RegisteredStore {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.deregister(self.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;

    fn store() -> DocumentStore {
        let (tx, _rx) = events::channel();
        DocumentStore::new(tx)
    }

    #[test]
    fn test_register_and_enumerate_in_order() {
        let registry = StoreRegistry::new();
        let a = registry.register(store());
        let b = registry.register(store());

        let handles: Vec<_> = registry.live().into_iter().map(|(h, _)| h).collect();
        assert_eq!(handles, vec![a.handle(), b.handle()]);
    }

    #[test]
    fn test_drop_deregisters() {
        let registry = StoreRegistry::new();
        let a = registry.register(store());
        let b = registry.register(store());
        let a_handle = a.handle();

        drop(a);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(a_handle).is_none());
        assert!(registry.get(b.handle()).is_some());
    }

    #[test]
    fn test_registry_does_not_keep_stores_alive() {
        let registry = StoreRegistry::new();
        let a = registry.register(store());
        let weak = Rc::downgrade(a.shared());

        drop(a);
        assert!(weak.upgrade().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_store_outliving_registry_drops_cleanly() {
        let registry = StoreRegistry::new();
        let a = registry.register(store());
        drop(registry);
        drop(a);
    }

    #[test]
    fn test_handles_are_unique() {
        let registry = StoreRegistry::new();
        let a = registry.register(store());
        let a_handle = a.handle();
        drop(a);
        let b = registry.register(store());
        assert_ne!(a_handle, b.handle());
    }
}
