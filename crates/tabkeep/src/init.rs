//! # Startup Wiring
//!
//! [`initialize`] builds the single [`SessionCoordinator`] of a process:
//!
//! 1. Resolve the data and config directories ([`AppPaths::resolve`]).
//! 2. Load [`TabkeepConfig`] (env over `tabkeep.toml` over defaults).
//! 3. Load [`Preferences`] and re-open the working directory from its bookmark,
//!    rewriting the bookmark when it went stale.
//! 4. Create the event channel and hand the receiver to the caller.
//!
//! ## Data Directory
//!
//! By default the OS-specific project directories from the `directories` crate
//! are used. Setting `TABKEEP_DATA` (or passing an override) puts everything,
//! config included, into that one folder. Tests rely on this for isolation.

use crate::config::{Preferences, TabkeepConfig};
use crate::error::{Result, TabkeepError};
use crate::events::{self, EventReceiver};
use crate::fsutil::ensure_dir;
use crate::session::backend::FsSessionBackend;
use crate::session::SessionCoordinator;
use crate::workdir::access::FilesystemScope;
use crate::workdir::bookmark::DirectoryReference;
use crate::workdir::WorkingDirectory;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const DATA_ENV: &str = "TABKEEP_DATA";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
}

impl AppPaths {
    pub fn resolve(data_override: Option<PathBuf>) -> Result<Self> {
        let override_dir = data_override.or_else(|| {
            std::env::var_os(DATA_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        });
        if let Some(dir) = override_dir {
            return Ok(Self::single(dir));
        }

        let dirs = ProjectDirs::from("com", "tabkeep", "tabkeep").ok_or_else(|| {
            TabkeepError::Config("could not determine a home directory".to_string())
        })?;
        Ok(Self {
            data_dir: dirs.data_dir().to_path_buf(),
            config_dir: dirs.config_dir().to_path_buf(),
        })
    }

    /// Data and config sharing one folder.
    pub fn single(dir: PathBuf) -> Self {
        Self {
            data_dir: dir.clone(),
            config_dir: dir,
        }
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join(crate::session::backend::SESSIONS_DIR)
    }
}

pub struct TabkeepContext {
    pub coordinator: SessionCoordinator<FsSessionBackend>,
    pub events: EventReceiver,
    pub paths: AppPaths,
}

/// Builds the session coordinator for this process.
pub fn initialize(data_override: Option<PathBuf>) -> Result<TabkeepContext> {
    let paths = AppPaths::resolve(data_override)?;
    ensure_dir(&paths.data_dir)?;

    let config = TabkeepConfig::load(&paths.config_dir)?;
    let mut preferences = Preferences::load(&paths.data_dir)?;
    let root = restore_working_directory(&mut preferences, &paths.data_dir);

    let workdir = WorkingDirectory::new(Box::new(FilesystemScope), config.record_ext())
        .with_root(root);
    let (tx, rx) = events::channel();
    let backend = FsSessionBackend::new(&paths.data_dir);
    let coordinator = SessionCoordinator::new(backend, workdir, config, tx)
        .with_preferences(preferences, Some(paths.data_dir.clone()));

    tracing::debug!(data_dir = %paths.data_dir.display(), "initialized");
    Ok(TabkeepContext {
        coordinator,
        events: rx,
        paths,
    })
}

fn restore_working_directory(preferences: &mut Preferences, data_dir: &Path) -> Option<PathBuf> {
    let (reference, needs_rewrite) = DirectoryReference::restore(
        preferences.working_directory_path.as_deref(),
        preferences.working_directory_bookmark.as_deref(),
    )?;

    if !reference.path.is_dir() {
        tracing::warn!(path = %reference.path.display(), "working directory is gone, ignoring it");
        return None;
    }
    if needs_rewrite {
        preferences.working_directory_path = Some(reference.path.clone());
        preferences.working_directory_bookmark = reference.bookmark.clone();
        if let Err(e) = preferences.save(data_dir) {
            tracing::warn!(error = %e, "could not persist refreshed bookmark");
        }
    }
    Some(reference.path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_override_uses_one_folder() {
        let dir = TempDir::new().unwrap();
        let paths = AppPaths::resolve(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(paths.data_dir, dir.path());
        assert_eq!(paths.config_dir, dir.path());
        assert_eq!(paths.sessions_dir(), dir.path().join("Sessions"));
    }

    #[test]
    fn test_initialize_fresh_data_dir() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        let ctx = initialize(Some(data.clone())).unwrap();

        assert!(data.is_dir());
        assert!(!ctx.coordinator.workdir().is_configured());
        assert!(ctx.coordinator.preferences().enable_auto_save);
    }

    #[test]
    fn test_initialize_restores_working_directory() {
        let dir = TempDir::new().unwrap();
        let wd = TempDir::new().unwrap();
        let reference = DirectoryReference::capture(wd.path()).unwrap();
        Preferences {
            enable_auto_save: true,
            working_directory_path: Some(reference.path.clone()),
            working_directory_bookmark: reference.bookmark.clone(),
        }
        .save(dir.path())
        .unwrap();

        let ctx = initialize(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(ctx.coordinator.workdir().directory(), Some(reference.path.as_path()));
    }

    #[test]
    fn test_initialize_ignores_vanished_working_directory() {
        let dir = TempDir::new().unwrap();
        Preferences {
            enable_auto_save: true,
            working_directory_path: Some(dir.path().join("gone")),
            working_directory_bookmark: None,
        }
        .save(dir.path())
        .unwrap();

        let ctx = initialize(Some(dir.path().to_path_buf())).unwrap();
        assert!(!ctx.coordinator.workdir().is_configured());
    }
}
