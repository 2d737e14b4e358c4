//! Caching, retrying front for an [`UpstreamSource`]
//!
//! Lookup order for a tag: memory, then the on-disk cache, then upstream.
//! Each tag owns a slot guarded by its own mutex, so concurrent fetches of the
//! same tag wait for the one in flight while other tags proceed in parallel.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{ArtifactVersion, UpstreamSource};
use crate::cache::{self, DiskCache};
use crate::error::{OverlayError, Result, artifact};

/// Default number of snapshots kept in memory
pub const DEFAULT_CAPACITY: usize = 8;

/// Default number of upstream attempts per fetch
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(200);

/// Tuning for an [`ArtifactStore`]
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// In-memory snapshots retained (least recently used are evicted)
    pub capacity: usize,
    /// Upstream attempts before `FetchFailed` is returned
    pub max_attempts: u32,
    /// Delay before the first retry; doubled after each failure
    pub backoff: Duration,
    /// On-disk cache, `None` to keep everything in memory
    pub disk: Option<DiskCache>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            disk: None,
        }
    }
}

type Slot = Arc<Mutex<Option<Arc<ArtifactVersion>>>>;

#[derive(Default)]
struct StoreState {
    slots: HashMap<String, Slot>,
    /// Tags with a filled slot, least recently used first
    recency: VecDeque<String>,
}

/// Snapshot store over an upstream source
pub struct ArtifactStore {
    source: Arc<dyn UpstreamSource>,
    slug: String,
    options: StoreOptions,
    state: Mutex<StoreState>,
}

impl ArtifactStore {
    pub fn new(source: Arc<dyn UpstreamSource>, options: StoreOptions) -> Self {
        let slug = cache::source_slug(&source.describe());
        Self {
            source,
            slug,
            options,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Available upstream tags
    pub fn list_tags(&self) -> Result<Vec<String>> {
        self.source.list_tags()
    }

    /// Snapshot for `tag`
    pub fn fetch(&self, tag: &str) -> Result<Arc<ArtifactVersion>> {
        let slot = self.slot(tag)?;
        let mut guard = slot.lock().map_err(|_| poisoned(tag))?;

        if let Some(version) = guard.as_ref() {
            debug!(tag, "artifact served from memory");
            let version = Arc::clone(version);
            drop(guard);
            self.touch(tag)?;
            return Ok(version);
        }

        let version = match self.load(tag) {
            Ok(version) => version,
            Err(err) => {
                self.release_slot(tag, &slot)?;
                return Err(err);
            }
        };
        *guard = Some(Arc::clone(&version));
        drop(guard);

        info!(tag, digest = version.digest(), "artifact loaded");
        self.touch(tag)?;
        Ok(version)
    }

    /// Fetch two tags, in parallel when neither is already in memory
    pub fn fetch_pair(
        &self,
        old: &str,
        new: &str,
    ) -> Result<(Arc<ArtifactVersion>, Arc<ArtifactVersion>)> {
        if old == new {
            let version = self.fetch(old)?;
            return Ok((Arc::clone(&version), version));
        }

        thread::scope(|scope| {
            let old_handle = scope.spawn(|| self.fetch(old));
            let new_version = self.fetch(new);
            let old_version = old_handle
                .join()
                .unwrap_or_else(|_| Err(artifact::fetch_failed(old, 0, "fetch thread panicked")));
            Ok((old_version?, new_version?))
        })
    }

    /// Tags currently held in memory, least recently used first
    #[cfg(test)]
    pub fn cached_tags(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.recency.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| crate::error::cache::operation_failed("artifact store state poisoned"))
    }

    fn slot(&self, tag: &str) -> Result<Slot> {
        let mut state = self.lock_state()?;
        Ok(Arc::clone(state.slots.entry(tag.to_string()).or_default()))
    }

    fn load(&self, tag: &str) -> Result<Arc<ArtifactVersion>> {
        let (bytes, from_disk) = match self.lookup_disk(tag)? {
            Some(bytes) => (bytes, true),
            None => (self.fetch_with_retry(tag)?, false),
        };

        let version = Arc::new(ArtifactVersion::from_bytes(tag, &bytes)?);
        if let (Some(disk), false) = (&self.options.disk, from_disk) {
            disk.store(&self.slug, tag, &bytes)?;
        }
        Ok(version)
    }

    /// Drop the empty slot of a failed fetch unless another caller waits on it
    ///
    /// Called with the slot's lock held; the last waiter to fail removes it.
    fn release_slot(&self, tag: &str, slot: &Slot) -> Result<()> {
        let mut state = self.lock_state()?;
        let idle = state
            .slots
            .get(tag)
            .is_some_and(|held| Arc::ptr_eq(held, slot) && Arc::strong_count(slot) == 2);
        if idle {
            state.slots.remove(tag);
        }
        Ok(())
    }

    fn lookup_disk(&self, tag: &str) -> Result<Option<Vec<u8>>> {
        match &self.options.disk {
            Some(disk) => disk.lookup(&self.slug, tag),
            None => Ok(None),
        }
    }

    fn fetch_with_retry(&self, tag: &str) -> Result<Vec<u8>> {
        let max_attempts = self.options.max_attempts.max(1);
        let mut delay = self.options.backoff;
        let mut attempt = 1;

        loop {
            debug!(tag, attempt, source = %self.source.describe(), "fetching upstream artifact");
            match self.source.fetch(tag) {
                Ok(bytes) => return Ok(bytes),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(tag, attempt, "upstream fetch failed, retrying in {:?}: {}", delay, err);
                    thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(OverlayError::FetchFailed { reason, .. }) => {
                    return Err(artifact::fetch_failed(tag, attempt, reason));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Mark `tag` most recently used and evict beyond capacity
    fn touch(&self, tag: &str) -> Result<()> {
        let mut state = self.lock_state()?;
        state.recency.retain(|t| t != tag);
        state.recency.push_back(tag.to_string());

        let capacity = self.options.capacity.max(1);
        while state.recency.len() > capacity {
            if let Some(evicted) = state.recency.pop_front() {
                debug!(tag = %evicted, "evicting artifact from memory");
                state.slots.remove(&evicted);
            }
        }
        Ok(())
    }
}

fn poisoned(tag: &str) -> OverlayError {
    crate::error::cache::operation_failed(format!("artifact slot for '{tag}' poisoned"))
}
