//! # Tabkeep Architecture
//!
//! Tabkeep is the **UI-agnostic core of a multi-window text editor**: it keeps
//! the documents of every open window durable across restarts and mediates all
//! access to an optional user-chosen folder. Windows, text views and menus are
//! someone else's job; they reach the core only to ask for the document to
//! show, to report edits, and to create, rename or close documents.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Host (a GUI, or the `tabkeep` CLI)                         │
//! │  - Owns windows, drains CoreEvents, drives tick()/pump      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Session (session/)                                         │
//! │  - SessionCoordinator: save, restore, fan-out, autosave     │
//! │  - SessionBackend: FsSessionBackend, MemSessionBackend      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Stores (store/)                                            │
//! │  - One DocumentStore per window                             │
//! │  - StoreRegistry: weak handle table of live stores          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Working directory (workdir/)                               │
//! │  - Bracketed file operations, bookmarks, record files       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Principle: One Thread, No Blocking
//!
//! Everything runs on the host's thread. Shared state uses `Rc`/`RefCell`, so
//! the core is `!Send` on purpose. Nothing sleeps or spawns: time only moves
//! when the host calls [`session::SessionCoordinator::tick`] or
//! [`session::SessionCoordinator::pump_fan_out`] with the current instant.
//!
//! ## Invariants
//!
//! - No document is lost: every non-blank document of a live store is in the
//!   next session snapshot.
//! - No document is duplicated: restored documents are claimed once each.
//! - One persisted truth per document: the session snapshot for freestanding
//!   documents, the external file for externally backed ones.
//!
//! ## Errors
//!
//! Operations return [`error::Result`]. Where the core falls back to a safe
//! default instead (restore, seeding, opening, renaming), it also publishes a
//! [`events::CoreEvent::Failure`] so the host can tell the user.

pub mod config;
pub mod error;
pub mod events;
pub mod fsutil;
pub mod init;
pub mod model;
pub mod session;
pub mod store;
pub mod title;
pub mod workdir;
