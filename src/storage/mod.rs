
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::retry::Backoff;
use crate::{NotebookError, Result};

const FALLBACK_FILENAME: &str = "upload";
const MAX_SAVE_ATTEMPTS: usize = 5;

/// Per-notebook upload directories under the data root
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    backoff: Backoff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub stored_filename: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryRemoval {
    Removed,
    NotFound,
}

impl FileStore {
    #[inline]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            backoff: Backoff::default(),
        }
    }

    #[inline]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn notebook_dir(&self, notebook_id: i64) -> PathBuf {
        self.root.join(format!("notebook_{notebook_id}"))
    }

    #[inline]
    pub fn ensure_notebook_dir(&self, notebook_id: i64) -> Result<PathBuf> {
        let dir = self.notebook_dir(notebook_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    #[inline]
    pub fn file_path(&self, notebook_id: i64, stored_filename: &str) -> PathBuf {
        self.notebook_dir(notebook_id).join(stored_filename)
    }

    /// Write an upload without ever overwriting an existing file. A name collision gets
    /// a short random suffix before the extension.
    #[inline]
    pub fn save_upload(
        &self,
        notebook_id: i64,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<StoredFile> {
        let dir = self.ensure_notebook_dir(notebook_id)?;
        let sanitized = sanitize_filename(original_filename);

        let mut candidate = sanitized.clone();
        for _ in 0..MAX_SAVE_ATTEMPTS {
            let path = dir.join(&candidate);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_all()) {
                        drop(file);
                        let _ = fs::remove_file(&path);
                        return Err(e.into());
                    }
                    debug!(
                        "Saved '{}' as {} ({} bytes)",
                        original_filename,
                        path.display(),
                        bytes.len()
                    );
                    return Ok(StoredFile {
                        stored_filename: candidate,
                        path,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = suffixed_filename(&sanitized);
                    debug!("'{}' exists, trying '{}'", path.display(), candidate);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(NotebookError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("Could not find a free name for '{original_filename}'"),
        )))
    }

    /// Remove a single stored file; a missing file is not an error
    #[inline]
    pub fn remove_file(&self, notebook_id: i64, stored_filename: &str) -> Result<()> {
        match fs::remove_file(self.file_path(notebook_id, stored_filename)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a notebook's directory, retrying with backoff and then once more after
    /// clearing read-only permissions. Still failing yields `StorageLock`.
    #[inline]
    pub fn delete_notebook_dir(&self, notebook_id: i64) -> Result<DirectoryRemoval> {
        let dir = self.notebook_dir(notebook_id);
        if !dir.exists() {
            return Ok(DirectoryRemoval::NotFound);
        }

        let label = format!("Removing {}", dir.display());
        let first = self.backoff.retry(&label, || remove_dir(&dir));
        if first.is_ok() {
            info!("Removed storage directory {}", dir.display());
            return Ok(DirectoryRemoval::Removed);
        }

        warn!(
            "Clearing read-only permissions under {} and retrying",
            dir.display()
        );
        if let Err(e) = clear_readonly(&dir) {
            warn!("Failed to clear permissions: {}", e);
        }

        match remove_dir(&dir) {
            Ok(()) => {
                info!("Removed storage directory {}", dir.display());
                Ok(DirectoryRemoval::Removed)
            }
            Err(e) => Err(NotebookError::StorageLock(format!(
                "{} could not be removed ({}); delete it manually",
                dir.display(),
                e
            ))),
        }
    }
}

fn remove_dir(dir: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[expect(
    clippy::permissions_set_readonly_false,
    reason = "only applied to files that are about to be deleted"
)]
fn clear_readonly(path: &Path) -> std::io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.file_type().is_symlink() {
        return Ok(());
    }

    let mut permissions = metadata.permissions();
    if permissions.readonly() {
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)?;
    }

    if metadata.is_dir() {
        for entry in fs::read_dir(path)? {
            clear_readonly(&entry?.path())?;
        }
    }
    Ok(())
}

/// Reduce an uploaded name to a single safe path component
#[inline]
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);

    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*'))
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `<stem>-<8 hex chars>.<ext>`
fn suffixed_filename(filename: &str) -> String {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map_or_else(|| filename.to_string(), |s| s.to_string_lossy().into_owned());
    let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect();

    match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{stem}-{suffix}"),
    }
}
