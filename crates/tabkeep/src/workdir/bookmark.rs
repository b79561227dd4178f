//! Durable, re-resolvable references to folders and files.
//!
//! A bookmark token is base64 over a small JSON payload: the canonical path at
//! capture time plus the filesystem identity of the entry (the inode on Unix).
//! Resolving a token reports the entry as stale when the path now points at a
//! different entry, so callers can refresh the token.

use crate::error::{Result, TabkeepError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct BookmarkData {
    path: PathBuf,
    #[serde(default)]
    file_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBookmark {
    pub path: PathBuf,
    pub is_stale: bool,
}

impl Bookmark {
    pub fn capture(path: &Path) -> Result<Self> {
        let canonical = fs::canonicalize(path).map_err(|e| TabkeepError::from_io(e, path))?;
        let meta = fs::metadata(&canonical).map_err(|e| TabkeepError::from_io(e, path))?;
        let data = BookmarkData {
            path: canonical,
            file_id: file_id(&meta),
        };
        let json = serde_json::to_vec(&data)?;
        Ok(Self {
            token: STANDARD.encode(json),
        })
    }

    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn resolve(&self) -> Result<ResolvedBookmark> {
        let bytes = STANDARD
            .decode(self.token.trim())
            .map_err(|e| TabkeepError::Store(format!("malformed bookmark: {}", e)))?;
        let data: BookmarkData = serde_json::from_slice(&bytes)?;
        let meta = fs::metadata(&data.path).map_err(|e| TabkeepError::from_io(e, &data.path))?;
        let is_stale = match (data.file_id, file_id(&meta)) {
            (Some(saved), Some(current)) => saved != current,
            _ => false,
        };
        Ok(ResolvedBookmark {
            path: data.path,
            is_stale,
        })
    }
}

#[cfg(unix)]
fn file_id(meta: &fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn file_id(_meta: &fs::Metadata) -> Option<u64> {
    None
}

/// A working directory location as kept in preferences: the plain path plus
/// its bookmark token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryReference {
    pub path: PathBuf,
    pub bookmark: Option<String>,
}

impl DirectoryReference {
    pub fn capture(path: &Path) -> Result<Self> {
        let bookmark = Bookmark::capture(path)?;
        let path = bookmark.resolve()?.path;
        Ok(Self {
            path,
            bookmark: Some(bookmark.token().to_string()),
        })
    }

    /// Re-opens a stored reference. The bookmark wins when it resolves; a stale
    /// bookmark is re-captured; an unresolvable one falls back to the plain path.
    /// The second value is true when the stored token should be rewritten.
    pub fn restore(path: Option<&Path>, bookmark: Option<&str>) -> Option<(Self, bool)> {
        if let Some(token) = bookmark {
            match Bookmark::from_token(token).resolve() {
                Ok(resolved) if !resolved.is_stale => {
                    return Some((
                        Self {
                            path: resolved.path,
                            bookmark: Some(token.to_string()),
                        },
                        false,
                    ));
                }
                Ok(resolved) => {
                    tracing::info!(path = %resolved.path.display(), "refreshing stale directory bookmark");
                    if let Ok(fresh) = Self::capture(&resolved.path) {
                        return Some((fresh, true));
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "directory bookmark did not resolve, using plain path");
                }
            }
        }
        path.map(|p| {
            (
                Self {
                    path: p.to_path_buf(),
                    bookmark: bookmark.map(str::to_string),
                },
                false,
            )
        })
    }
}
