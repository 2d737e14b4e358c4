//! Workspace management for overlay
//!
//! This module handles:
//! - Workspace detection (the directory holding `overlay.yaml`)
//! - Loading and committing the ledger under an advisory lock
//! - Building the upstream source and artifact store from configuration
//!
//! ## Workspace Structure
//!
//! ```text
//! overlay.yaml          # Upstream location, tuning, extension definitions
//! .overlay/
//! ├── overlay.lock      # The ledger
//! ├── .gitignore
//! └── .lock             # Advisory lock file
//! ```


use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fslock::LockFile;
use tracing::{debug, info};

use crate::artifact::{ArtifactStore, DirUpstream, UpstreamSource};
use crate::cache::{self, DiskCache};
use crate::config::{OverlayConfig, SourceKind};
use crate::error::{Result, fs as fs_error, workspace};
use crate::git::GitUpstream;
use crate::ledger::{LedgerHandle, OverlayLedger};
use crate::transaction::Transaction;

/// Workspace state directory name
pub const WORKSPACE_DIR: &str = ".overlay";

/// Configuration filename, at the workspace root
pub const CONFIG_FILE: &str = "overlay.yaml";

/// Ledger filename, inside the state directory
pub const LEDGER_FILE: &str = "overlay.lock";

/// Lock file for workspace locking
pub const LOCK_FILE: &str = ".lock";

/// An extra file written alongside a ledger commit
#[derive(Debug, Clone)]
pub struct Output {
    pub path: PathBuf,
    pub contents: String,
}

/// An overlay workspace
#[derive(Debug)]
pub struct Workspace {
    /// Directory holding overlay.yaml
    pub root: PathBuf,

    /// Path to the .overlay directory
    pub overlay_dir: PathBuf,

    pub config: OverlayConfig,
}

/// RAII guard for workspace locking
///
/// Acquires an advisory file lock on creation and releases it on drop.
/// This serializes ledger commits across processes.
#[derive(Debug)]
pub struct WorkspaceGuard {
    lock: LockFile,
    lock_path: PathBuf,
}

impl Workspace {
    /// Detect if a workspace exists at the given path
    pub fn exists(root: &Path) -> bool {
        root.join(CONFIG_FILE).is_file()
    }

    /// Find a workspace by searching upward from the given path
    pub fn find_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if Self::exists(&current) {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Open the workspace at `explicit`, or the nearest one above the
    /// current directory
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(root) = explicit {
            return Self::open(root);
        }
        let cwd = std::env::current_dir()?;
        let root = Self::find_from(&cwd)
            .ok_or_else(|| workspace::not_found(cwd.display().to_string()))?;
        Self::open(&root)
    }

    /// Open an existing workspace
    pub fn open(root: &Path) -> Result<Self> {
        if !Self::exists(root) {
            return Err(workspace::not_found(root.display().to_string()));
        }

        let config = OverlayConfig::load(&root.join(CONFIG_FILE))?;
        debug!(root = %root.display(), "workspace opened");

        Ok(Self {
            root: root.to_path_buf(),
            overlay_dir: root.join(WORKSPACE_DIR),
            config,
        })
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.overlay_dir.join(LEDGER_FILE)
    }

    pub fn has_ledger(&self) -> bool {
        self.ledger_path().is_file()
    }

    /// Read the committed ledger
    pub fn load_ledger(&self) -> Result<OverlayLedger> {
        let path = self.ledger_path();
        if !path.is_file() {
            return Err(workspace::ledger_missing(path.display().to_string()));
        }
        let json = fs::read_to_string(&path)
            .map_err(|e| fs_error::read_failed(path.display().to_string(), e.to_string()))?;
        OverlayLedger::from_json(&json)
    }

    /// Acquire the workspace lock, creating the state directory if needed
    pub fn lock(&self) -> Result<WorkspaceGuard> {
        fs::create_dir_all(&self.overlay_dir).map_err(|e| {
            fs_error::write_failed(self.overlay_dir.display().to_string(), e.to_string())
        })?;
        if let Some(guard) = WorkspaceGuard::try_acquire(&self.overlay_dir)? {
            return Ok(guard);
        }
        info!("waiting for another overlay process to release the workspace lock");
        WorkspaceGuard::acquire(&self.overlay_dir)
    }

    /// Write the first ledger of this workspace
    pub fn create_ledger(&self, ledger: &OverlayLedger) -> Result<()> {
        let _guard = self.lock()?;
        if self.has_ledger() {
            return Err(workspace::ledger_exists(
                self.ledger_path().display().to_string(),
            ));
        }

        let gitignore = self.overlay_dir.join(".gitignore");
        fs::write(&gitignore, format!("{LOCK_FILE}\n"))
            .map_err(|e| fs_error::write_failed(gitignore.display().to_string(), e.to_string()))?;

        self.write(Some(ledger), &[])?;
        info!(revision = ledger.revision, "ledger created");
        Ok(())
    }

    /// Commit a ledger derived from the committed one at revision `basis`
    ///
    /// Fails with `StaleLedger` when another process committed in between.
    /// `outputs` are written in the same transaction.
    pub fn commit_ledger(
        &self,
        basis: u64,
        ledger: OverlayLedger,
        outputs: &[Output],
    ) -> Result<Arc<OverlayLedger>> {
        let _guard = self.lock()?;
        let handle = LedgerHandle::new(self.load_ledger()?);
        let committed = handle.commit(basis, ledger)?;
        self.write(Some(committed.as_ref()), outputs)?;
        Ok(committed)
    }

    /// Apply one mutation to the committed ledger and write it back
    pub fn update_ledger<T>(&self, f: impl FnOnce(&mut OverlayLedger) -> Result<T>) -> Result<T> {
        let _guard = self.lock()?;
        let handle = LedgerHandle::new(self.load_ledger()?);
        let value = handle.update(f)?;
        self.write(Some(handle.snapshot().as_ref()), &[])?;
        Ok(value)
    }

    /// Write outputs without touching the ledger
    pub fn write_outputs(&self, outputs: &[Output]) -> Result<()> {
        self.write(None, outputs)
    }

    fn write(&self, ledger: Option<&OverlayLedger>, outputs: &[Output]) -> Result<()> {
        let mut transaction = Transaction::new(&self.overlay_dir);

        if let Some(ledger) = ledger {
            transaction.backup_ledger()?;
            write_file(&self.ledger_path(), ledger.to_json()?.as_bytes())?;
        }
        for output in outputs {
            transaction.backup_file(&output.path)?;
            write_file(&output.path, output.contents.as_bytes())?;
        }

        transaction.commit();
        Ok(())
    }

    /// Upstream source described by the configuration
    pub fn upstream(&self) -> Result<Arc<dyn UpstreamSource>> {
        let upstream = &self.config.upstream;
        match upstream.source {
            SourceKind::Dir => Ok(Arc::new(DirUpstream::new(
                self.root.join(&upstream.location),
                &upstream.schema_path,
            ))),
            SourceKind::Git => {
                let disk = DiskCache::open_default()?;
                let url = self.git_location();
                Ok(Arc::new(GitUpstream::in_cache(
                    &url,
                    &upstream.schema_path,
                    &disk,
                )))
            }
        }
    }

    /// Artifact store over the configured upstream, backed by the disk cache
    pub fn store(&self) -> Result<ArtifactStore> {
        let mut options = self.config.store_options();
        options.disk = Some(DiskCache::open_default()?);
        Ok(ArtifactStore::new(self.upstream()?, options))
    }

    /// Relative local repositories resolve against the workspace root
    fn git_location(&self) -> String {
        let location = &self.config.upstream.location;
        let local = self.root.join(location);
        if !location.contains("://") && !location.contains('@') && local.exists() {
            local.display().to_string()
        } else {
            location.clone()
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)
        .map_err(|e| fs_error::write_failed(dir.display().to_string(), e.to_string()))?;
    cache::write_atomic(&dir, path, bytes)
        .map_err(|e| fs_error::write_failed(path.display().to_string(), e.to_string()))
}

impl WorkspaceGuard {
    /// Acquire a lock on the workspace (blocking)
    pub fn acquire(overlay_dir: &Path) -> Result<Self> {
        let lock_path = overlay_dir.join(LOCK_FILE);

        if !overlay_dir.is_dir() {
            return Err(workspace::not_found(overlay_dir.display().to_string()));
        }

        let mut lock = LockFile::open(&lock_path)
            .map_err(|e| workspace::lock_failed(format!("Failed to open lock file: {e}")))?;
        lock.lock()
            .map_err(|e| workspace::lock_failed(format!("Failed to lock: {e}")))?;

        debug!(path = %lock_path.display(), "workspace locked");
        Ok(Self { lock, lock_path })
    }

    /// Try to acquire a lock without blocking
    pub fn try_acquire(overlay_dir: &Path) -> Result<Option<Self>> {
        let lock_path = overlay_dir.join(LOCK_FILE);

        if !overlay_dir.is_dir() {
            return Err(workspace::not_found(overlay_dir.display().to_string()));
        }

        let mut lock = LockFile::open(&lock_path)
            .map_err(|e| workspace::lock_failed(format!("Failed to open lock file: {e}")))?;
        let acquired = lock
            .try_lock()
            .map_err(|e| workspace::lock_failed(format!("Failed to try lock: {e}")))?;

        if acquired {
            Ok(Some(Self { lock, lock_path }))
        } else {
            Ok(None)
        }
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        if let Err(e) = self.lock.unlock() {
            debug!(path = %self.lock_path.display(), "failed to release workspace lock: {}", e);
        }
    }
}
