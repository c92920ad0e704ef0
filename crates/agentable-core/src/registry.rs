//! Run Registry - the process-wide map of runs
//!
//! Each entry is an `Arc<RunHandle>` guarded by its own mutex, so work on
//! one run never waits on another. Removing an entry (history clear) only
//! drops the registry's reference: a driver or subscriber still holding the
//! handle keeps working against it.

use crate::error::{Error, Result};
use crate::event::RunEvent;
use crate::run::{Run, RunId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Live subscriber channel for one run
pub(crate) struct Subscriber {
    pub(crate) id: u64,
    pub(crate) tx: mpsc::UnboundedSender<RunEvent>,
}

/// Run state and its subscriber set, mutated together under one lock
pub(crate) struct RunState {
    pub(crate) run: Run,
    pub(crate) subscribers: Vec<Subscriber>,
}

/// Shared handle to one run
pub struct RunHandle {
    id: RunId,
    seq: u64,
    state: Mutex<RunState>,
}

impl RunHandle {
    fn new(run: Run, seq: u64) -> Self {
        Self {
            id: run.id,
            seq,
            state: Mutex::new(RunState {
                run,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Run identifier
    #[must_use]
    pub fn id(&self) -> RunId {
        self.id
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the current run state
    #[must_use]
    pub fn snapshot(&self) -> Run {
        self.lock().run.clone()
    }

    /// Apply a mutation to the run under its lock
    pub fn update<R>(&self, mutation: impl FnOnce(&mut Run) -> R) -> R {
        mutation(&mut self.lock().run)
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub(crate) fn remove_subscriber(&self, subscriber_id: u64) {
        self.lock().subscribers.retain(|s| s.id != subscriber_id);
    }
}

/// Registry of runs keyed by id
#[derive(Default)]
pub struct RunRegistry {
    runs: DashMap<RunId, Arc<RunHandle>>,
    next_seq: AtomicU64,
}

impl RunRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending run.
    ///
    /// Ids are generated fresh per submission, so a collision is a bug in
    /// the caller and is reported as `DuplicateRun`.
    pub fn create(&self, id: RunId, prompt: impl Into<String>) -> Result<Arc<RunHandle>> {
        match self.runs.entry(id) {
            Entry::Occupied(_) => Err(Error::DuplicateRun(id)),
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                let handle = Arc::new(RunHandle::new(Run::new(id, prompt), seq));
                slot.insert(Arc::clone(&handle));
                debug!(run_id = %id, "Run registered");
                Ok(handle)
            }
        }
    }

    /// Shared handle for a run
    #[must_use]
    pub fn handle(&self, id: &RunId) -> Option<Arc<RunHandle>> {
        self.runs.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of a run
    #[must_use]
    pub fn get(&self, id: &RunId) -> Option<Run> {
        self.handle(id).map(|handle| handle.snapshot())
    }

    /// Apply a mutation to a registered run
    pub fn update<R>(&self, id: &RunId, mutation: impl FnOnce(&mut Run) -> R) -> Result<R> {
        let handle = self.handle(id).ok_or(Error::RunNotFound(*id))?;
        Ok(handle.update(mutation))
    }

    /// Most recent runs first, at most `limit`
    #[must_use]
    pub fn list(&self, limit: usize) -> Vec<Run> {
        let mut handles: Vec<Arc<RunHandle>> = self
            .runs
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        handles.sort_by(|a, b| b.seq.cmp(&a.seq));
        handles
            .into_iter()
            .take(limit)
            .map(|handle| handle.snapshot())
            .collect()
    }

    /// Remove every run; returns how many were removed
    pub fn clear(&self) -> usize {
        let ids: Vec<RunId> = self.runs.iter().map(|entry| *entry.key()).collect();
        let removed = ids
            .iter()
            .filter(|id| self.runs.remove(id).is_some())
            .count();
        info!(removed, "Run history cleared");
        removed
    }

    /// Number of registered runs
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether no runs are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
