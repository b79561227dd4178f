//! # CLI Layer
//!
//! One possible host for the tabkeep core; the only place that knows about
//! terminal I/O, exit codes and output formatting.
//!
//! Windows are simulated with [`tabkeep::session::host::HeadlessHost`]. Document
//! indexes are 1-based and run across windows in window order, so
//! `tabkeep list` shows exactly what `edit`, `show` and friends accept.

mod commands;
mod handlers;
mod render;
pub mod setup;
mod styles;

pub use commands::run;
