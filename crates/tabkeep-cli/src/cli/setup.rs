use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tabkeep",
    bin_name = "tabkeep",
    version,
    disable_help_subcommand = true
)]
#[command(about = "Headless host for tabkeep document sessions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Data directory (overrides TABKEEP_DATA and the OS default)
    #[arg(long, global = true, help_heading = "Options")]
    pub data: Option<PathBuf>,

    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, help_heading = "Options")]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List open documents across all windows
    #[command(alias = "ls", display_order = 1)]
    List,

    /// Open a new window with a fresh document
    #[command(alias = "n", display_order = 2)]
    New {
        /// Document title
        #[arg(long, short)]
        title: Option<String>,

        /// Initial content (words are joined with spaces)
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Open a file in a new window
    #[command(alias = "o", display_order = 3)]
    Open { path: PathBuf },

    /// Replace a document's content
    #[command(alias = "e", display_order = 4)]
    Edit {
        /// Document index as shown by `list`
        index: usize,

        #[arg(trailing_var_arg = true, required = true)]
        text: Vec<String>,
    },

    /// Retitle a document (renames its working-directory record)
    #[command(alias = "mv", display_order = 5)]
    Rename {
        index: usize,

        #[arg(trailing_var_arg = true, required = true)]
        title: Vec<String>,
    },

    /// Close a document
    #[command(alias = "rm", display_order = 6)]
    Close {
        index: usize,

        /// Also delete its working-directory record
        #[arg(long)]
        delete: bool,
    },

    /// Change a document's font size by DELTA points (0 resets it)
    #[command(display_order = 7)]
    Font {
        index: usize,

        #[arg(allow_negative_numbers = true)]
        delta: f64,
    },

    /// Print a document
    #[command(alias = "v", display_order = 8)]
    Show { index: usize },

    /// Save the session now and report what was written
    #[command(display_order = 9)]
    Save,

    /// Manage the working directory
    #[command(display_order = 20)]
    Workdir {
        #[command(subcommand)]
        action: Option<WorkdirAction>,
    },

    /// Show configuration and preferences
    #[command(display_order = 21)]
    Config {
        /// Turn autosave on or off
        #[arg(long)]
        autosave: Option<bool>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum WorkdirAction {
    /// Print the current working directory
    Show,
    /// Use PATH as the working directory
    Set { path: PathBuf },
    /// Stop using a working directory
    Clear,
    /// List the files in the working directory
    Ls,
    /// Delete whitespace-only files from the working directory
    Prune,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_new_with_text() {
        let cli = Cli::try_parse_from(["tabkeep", "new", "-t", "Plans", "buy", "milk"]).unwrap();
        match cli.command {
            Some(Commands::New { title, text }) => {
                assert_eq!(title.as_deref(), Some("Plans"));
                assert_eq!(text, vec!["buy", "milk"]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_negative_font_delta() {
        let cli = Cli::try_parse_from(["tabkeep", "font", "1", "-4"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Font { index: 1, delta }) if delta == -4.0
        ));
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["tabkeep", "-vv", "list", "--data", "/tmp/x"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.data, Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn test_parse_workdir_set() {
        let cli = Cli::try_parse_from(["tabkeep", "workdir", "set", "/notes"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Workdir {
                action: Some(WorkdirAction::Set { .. })
            })
        ));
    }

    #[test]
    fn test_edit_requires_text() {
        assert!(Cli::try_parse_from(["tabkeep", "edit", "1"]).is_err());
    }
}
