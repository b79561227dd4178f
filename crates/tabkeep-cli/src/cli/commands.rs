//! # Dispatch
//!
//! `run` parses the arguments, sets up logging, restores the session, routes
//! the command to its handler and saves on the way out. Core events collected
//! during the run are reported on stderr; failures the core recovered from do
//! not change the exit code.

use super::handlers::{self, AppSession};
use super::render;
use super::setup::{Cli, Commands, WorkdirAction};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "TABKEEP_LOG";

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut session = AppSession::open(cli.data.clone())?;
    let outcome = dispatch(&mut session, cli.command.unwrap_or(Commands::List));
    let events = session.finish();

    for event in events.iter().flatten() {
        if let Some(line) = render::render_event(event) {
            eprintln!("{}", line);
        }
    }

    print!("{}", outcome?);
    events.map(|_| ())
}

fn dispatch(session: &mut AppSession, command: Commands) -> Result<String> {
    match command {
        Commands::List => handlers::list(session),
        Commands::New { title, text } => handlers::new(session, title, text),
        Commands::Open { path } => handlers::open(session, &path),
        Commands::Edit { index, text } => handlers::edit(session, index, text),
        Commands::Rename { index, title } => handlers::rename(session, index, title),
        Commands::Close { index, delete } => handlers::close(session, index, delete),
        Commands::Font { index, delta } => handlers::font(session, index, delta),
        Commands::Show { index } => handlers::show_document(session, index),
        Commands::Save => handlers::save(session),
        Commands::Workdir { action } => match action.unwrap_or(WorkdirAction::Show) {
            WorkdirAction::Show => handlers::workdir_show(session),
            WorkdirAction::Set { path } => handlers::workdir_set(session, &path),
            WorkdirAction::Clear => handlers::workdir_clear(session),
            WorkdirAction::Ls => handlers::workdir_ls(session),
            WorkdirAction::Prune => handlers::workdir_prune(session),
        },
        Commands::Config { autosave } => handlers::config(session, autosave),
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "error",
            1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
