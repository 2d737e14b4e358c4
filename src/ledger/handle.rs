//! Shared access to the committed ledger
//!
//! Readers take an `Arc` of the last committed ledger and never wait on a
//! writer. Writers are serialized: each one works on a private copy and swaps
//! it in when done.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::{debug, info};

use super::OverlayLedger;
use crate::error::{OverlayError, Result};

/// Single-writer, many-reader holder of the committed ledger
#[derive(Debug)]
pub struct LedgerHandle {
    current: RwLock<Arc<OverlayLedger>>,
    writer: Mutex<()>,
}

impl LedgerHandle {
    pub fn new(ledger: OverlayLedger) -> Self {
        Self {
            current: RwLock::new(Arc::new(ledger)),
            writer: Mutex::new(()),
        }
    }

    /// The last committed ledger
    pub fn snapshot(&self) -> Arc<OverlayLedger> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    pub fn revision(&self) -> u64 {
        self.snapshot().revision
    }

    /// Apply one mutation and commit it
    pub fn update<T>(&self, f: impl FnOnce(&mut OverlayLedger) -> Result<T>) -> Result<T> {
        let _writer = self.lock_writer()?;
        let mut next = (*self.snapshot()).clone();
        let value = f(&mut next)?;
        debug!(revision = next.revision, "ledger updated");
        self.publish(next);
        Ok(value)
    }

    /// Commit a ledger derived from the snapshot at `expected` revision
    ///
    /// Fails with `StaleLedger` when another writer committed since.
    pub fn commit(&self, expected: u64, mut ledger: OverlayLedger) -> Result<Arc<OverlayLedger>> {
        let _writer = self.lock_writer()?;
        let found = self.revision();
        if found != expected {
            return Err(OverlayError::StaleLedger { expected, found });
        }

        ledger.revision = ledger.revision.max(expected + 1);
        info!(revision = ledger.revision, base_tag = ?ledger.base_tag, "ledger committed");
        let committed = Arc::new(ledger);
        self.publish_arc(Arc::clone(&committed));
        Ok(committed)
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, ()>> {
        self.writer.lock().map_err(|_| OverlayError::LedgerLockFailed {
            reason: "ledger writer lock poisoned".to_string(),
        })
    }

    fn publish(&self, ledger: OverlayLedger) {
        self.publish_arc(Arc::new(ledger));
    }

    fn publish_arc(&self, ledger: Arc<OverlayLedger>) {
        match self.current.write() {
            Ok(mut guard) => *guard = ledger,
            Err(poisoned) => *poisoned.into_inner() = ledger,
        }
    }
}
