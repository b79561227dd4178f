//! Scoped access brackets around the working directory.
//!
//! Every operation against the working directory runs between a begin and an
//! end call on a [`SecurityScope`]. [`ScopedAccess::begin`] returns an
//! [`AccessGuard`]; dropping the guard ends the bracket, so early returns and
//! `?` cannot leak an open grant.
//!
//! Brackets nest: only the outermost `begin` talks to the scope, inner ones
//! just bump a depth counter, and the outermost guard owns the teardown.

use crate::error::{Result, TabkeepError};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

/// Grants and revokes access to a sandboxed folder.
pub trait SecurityScope {
    /// Starts access to `dir`. Fails with `PermissionDenied` when not granted.
    fn start_access(&self, dir: &Path) -> Result<()>;

    fn stop_access(&self, dir: &Path);
}

/// Grants access when the folder exists and can be listed.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemScope;

impl SecurityScope for FilesystemScope {
    fn start_access(&self, dir: &Path) -> Result<()> {
        let meta = fs::metadata(dir).map_err(|e| TabkeepError::from_io(e, dir))?;
        if !meta.is_dir() {
            return Err(TabkeepError::NotFound(dir.to_path_buf()));
        }
        fs::read_dir(dir).map_err(|e| TabkeepError::from_io(e, dir))?;
        Ok(())
    }

    fn stop_access(&self, _dir: &Path) {}
}

pub struct ScopedAccess {
    scope: Box<dyn SecurityScope>,
    depth: Cell<usize>,
    opened: Cell<u64>,
    closed: Cell<u64>,
}

impl ScopedAccess {
    pub fn new(scope: Box<dyn SecurityScope>) -> Self {
        Self {
            scope,
            depth: Cell::new(0),
            opened: Cell::new(0),
            closed: Cell::new(0),
        }
    }

    pub fn begin(&self, dir: &Path) -> Result<AccessGuard<'_>> {
        if self.depth.get() == 0 {
            self.scope.start_access(dir)?;
            self.opened.set(self.opened.get() + 1);
            tracing::trace!(dir = %dir.display(), "access bracket opened");
        }
        self.depth.set(self.depth.get() + 1);
        Ok(AccessGuard {
            access: self,
            dir: dir.to_path_buf(),
        })
    }

    /// Current nesting depth; zero when no bracket is open.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// True when every outermost bracket that was opened has been closed.
    pub fn is_balanced(&self) -> bool {
        self.depth.get() == 0 && self.opened.get() == self.closed.get()
    }

    pub fn brackets_opened(&self) -> u64 {
        self.opened.get()
    }
}

pub struct AccessGuard<'a> {
    access: &'a ScopedAccess,
    dir: PathBuf,
}

impl Drop for AccessGuard<'_> {
    fn drop(&mut self) {
        let depth = self.access.depth.get() - 1;
        self.access.depth.set(depth);
        if depth == 0 {
            self.access.scope.stop_access(&self.dir);
            self.access.closed.set(self.access.closed.get() + 1);
            tracing::trace!(dir = %self.dir.display(), "access bracket closed");
        }
    }
}
