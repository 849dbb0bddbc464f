//! The published index and its two gates.
//!
//! [`IndexStore`] owns the current [`Snapshot`] behind an `RwLock`:
//!
//! ```text
//!            first get()                reload() ok
//! Uninitialized ──────▶ Building ──▶ Published ◀──────┐
//!       ▲                  │             │            │
//!       └── build failed ──┘             └─ Building ─┘
//!                                          (failed: previous snapshot kept)
//! ```
//!
//! - **Init gate** (`init` mutex): serializes first-access builds. Callers
//!   that queued behind a build share its outcome; a failure is not
//!   retained, so a later call retries.
//! - **Publish lock** (`published` write guard): held by every build for
//!   its whole duration (read + parse + construction). Readers arriving
//!   meanwhile block and then see the new snapshot.
//!
//! A reload never depends on the init gate, and a first-access build
//! re-checks the published slot after taking the publish lock, so neither
//! path can overwrite the other.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};
use std::time::Instant;

use thiserror::Error;

use crate::index::{self, Snapshot};
use crate::models::IndexedRecord;
use crate::parse::{DecodeError, RecordParser};

/// Failure to rebuild the snapshot from the dataset file.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("failed to open dataset {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Observable lifecycle of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Nothing published yet.
    Uninitialized,
    /// A build holds the publish lock.
    Building,
    /// A snapshot is being served.
    Published,
}

#[derive(Default)]
struct InitGate {
    last_failure: Option<Arc<ReloadError>>,
}

/// Concurrent lookup index over one dataset file.
pub struct IndexStore {
    source: PathBuf,
    parser: RecordParser,
    published: RwLock<Option<Arc<Snapshot>>>,
    init: Mutex<InitGate>,
    /// First-access builds finished (ok or not), bumped under `init`.
    init_completed: AtomicU64,
    /// Snapshots published so far.
    generation: AtomicU64,
    building: AtomicBool,
}

impl IndexStore {
    /// Creates an empty store over the dataset at `source`. Nothing is read
    /// until the first lookup or reload.
    pub fn new(source: impl Into<PathBuf>, parser: RecordParser) -> Self {
        Self {
            source: source.into(),
            parser,
            published: RwLock::new(None),
            init: Mutex::new(InitGate::default()),
            init_completed: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            building: AtomicBool::new(false),
        }
    }

    /// Path of the dataset file the store builds from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Looks up `rnc`, building the index first if nothing is published yet.
    pub fn get(&self, rnc: &str) -> Result<Option<IndexedRecord>, Arc<ReloadError>> {
        let snapshot = self.ensure_built()?;
        Ok(snapshot.get(rnc).cloned())
    }

    /// Returns the published snapshot, running the first-access build if needed.
    pub fn ensure_built(&self) -> Result<Arc<Snapshot>, Arc<ReloadError>> {
        match self.snapshot() {
            Some(snapshot) => Ok(snapshot),
            None => self.first_build(),
        }
    }

    /// The published snapshot, if any. Never triggers a build.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.read().clone()
    }

    /// Rebuilds from the dataset file and publishes on success.
    ///
    /// On failure the published snapshot (or its absence) is left as it was.
    pub fn reload(&self) -> Result<Arc<Snapshot>, ReloadError> {
        let mut published = self.write();
        match self.build_locked() {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *published = Some(Arc::clone(&snapshot));
                self.generation.fetch_add(1, Ordering::AcqRel);
                tracing::info!(records = snapshot.len(), "index reloaded");
                Ok(snapshot)
            }
            Err(err) => {
                tracing::warn!(error = %err, "index reload failed; keeping previous snapshot");
                Err(err)
            }
        }
    }

    /// Current lifecycle state. Never blocks on an in-flight build.
    pub fn state(&self) -> StoreState {
        if self.building.load(Ordering::Acquire) {
            return StoreState::Building;
        }
        let published = match self.published.try_read() {
            Ok(guard) => guard.is_some(),
            Err(TryLockError::WouldBlock) => return StoreState::Building,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().is_some(),
        };
        if published {
            StoreState::Published
        } else {
            StoreState::Uninitialized
        }
    }

    /// Number of snapshots published over the store's lifetime.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn first_build(&self) -> Result<Arc<Snapshot>, Arc<ReloadError>> {
        let seen = self.init_completed.load(Ordering::Acquire);
        let mut gate = self.init.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot);
        }
        // A build finished while we were queued behind it: share its failure.
        if self.init_completed.load(Ordering::Acquire) > seen {
            if let Some(err) = &gate.last_failure {
                return Err(Arc::clone(err));
            }
        }

        let mut published = self.write();
        // A reload may have published while we waited for the lock.
        if let Some(snapshot) = published.as_ref() {
            return Ok(Arc::clone(snapshot));
        }

        let outcome = match self.build_locked() {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *published = Some(Arc::clone(&snapshot));
                self.generation.fetch_add(1, Ordering::AcqRel);
                gate.last_failure = None;
                Ok(snapshot)
            }
            Err(err) => {
                tracing::error!(error = %err, "initial index build failed");
                let err = Arc::new(err);
                gate.last_failure = Some(Arc::clone(&err));
                Err(err)
            }
        };
        self.init_completed.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// Reads, parses and builds. Callers hold the publish lock.
    fn build_locked(&self) -> Result<Snapshot, ReloadError> {
        let _building = BuildingFlag::raise(&self.building);
        let started = Instant::now();

        let parsed = self
            .parser
            .parse_file(&self.source)
            .map_err(|source| ReloadError::Open {
                path: self.source.clone(),
                source,
            })??;
        let encoding = parsed.encoding;
        let snapshot = index::build(parsed.records);

        tracing::info!(
            records = snapshot.len(),
            %encoding,
            elapsed_ms = started.elapsed().as_millis() as u64,
            path = %self.source.display(),
            "index built"
        );
        Ok(snapshot)
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Arc<Snapshot>>> {
        self.published.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Arc<Snapshot>>> {
        self.published.write().unwrap_or_else(PoisonError::into_inner)
    }
}

struct BuildingFlag<'a>(&'a AtomicBool);

impl<'a> BuildingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for BuildingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
