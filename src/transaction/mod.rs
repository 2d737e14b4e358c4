//! Transaction support for ledger commits
//!
//! A transaction remembers the ledger bytes as they were before a commit and
//! any files the commit created. Unless it is committed, dropping it puts
//! everything back, so a failed write never leaves a half-updated workspace.
//!
//! ## Usage
//!
//! ```ignore
//! let mut transaction = Transaction::new(&workspace.overlay_dir);
//! transaction.backup_ledger()?;
//!
//! // Write the new ledger, the merged schema, the report...
//! transaction.track_file_created(path);
//!
//! // On success:
//! transaction.commit();
//!
//! // On error (automatic via Drop if not committed):
//! // rollback happens automatically
//! ```


use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, fs as fs_error};
use crate::workspace::LEDGER_FILE;

/// Original content of a file the transaction may overwrite
#[derive(Debug, Clone)]
struct FileBackup {
    path: PathBuf,
    content: Vec<u8>,
}

/// A transaction over the workspace directory
#[derive(Debug)]
pub struct Transaction {
    overlay_dir: PathBuf,

    backups: Vec<FileBackup>,

    /// Files that did not exist before the transaction
    created_files: HashSet<PathBuf>,

    committed: bool,
}

impl Transaction {
    pub fn new(overlay_dir: &Path) -> Self {
        Self {
            overlay_dir: overlay_dir.to_path_buf(),
            backups: Vec::new(),
            created_files: HashSet::new(),
            committed: false,
        }
    }

    /// Back up the ledger, or remember to remove it if it does not exist yet
    pub fn backup_ledger(&mut self) -> Result<()> {
        let path = self.overlay_dir.join(LEDGER_FILE);
        self.backup_file(&path)
    }

    /// Back up any file about to be overwritten
    pub fn backup_file(&mut self, path: &Path) -> Result<()> {
        if path.exists() {
            let content = fs::read(path)
                .map_err(|e| fs_error::read_failed(path.display().to_string(), e.to_string()))?;
            self.backups.push(FileBackup {
                path: path.to_path_buf(),
                content,
            });
        } else {
            self.track_file_created(path);
        }
        Ok(())
    }

    /// Track a file that was created during this transaction
    pub fn track_file_created(&mut self, path: impl Into<PathBuf>) {
        self.created_files.insert(path.into());
    }

    /// Commit the transaction (prevent rollback)
    pub fn commit(mut self) {
        self.committed = true;
    }

    /// Restore backups and remove created files
    pub fn rollback(&mut self) {
        if self.committed {
            return;
        }

        for path in &self.created_files {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    warn!(path = %path.display(), "failed to remove file during rollback: {}", e);
                }
            }
        }

        for backup in &self.backups {
            if let Err(e) = fs::write(&backup.path, &backup.content) {
                warn!(path = %backup.path.display(), "failed to restore file: {}", e);
            }
        }

        debug!(
            restored = self.backups.len(),
            removed = self.created_files.len(),
            "transaction rolled back"
        );
        self.committed = true;
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}
