//! # tabkeep
//!
//! A headless host for the tabkeep core. Every invocation behaves like one
//! launch of the editor: the session is restored and fanned out into windows,
//! the command runs against those windows, and the session is saved again on
//! the way out.
//!
//! ```text
//! tabkeep new -t Groceries eggs, milk    # one more window, one more document
//! tabkeep list                           # documents of every window, 1-based
//! tabkeep edit 1 eggs, milk, bread
//! tabkeep workdir set ~/Notes            # mirror tabs as files in ~/Notes
//! ```
//!
//! Data lives in the OS data directory unless `--data` or `TABKEEP_DATA` says
//! otherwise. Diagnostics go to stderr; `-v` raises the level and
//! `TABKEEP_LOG` takes a full filter directive.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
