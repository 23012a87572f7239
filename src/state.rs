use chrono::{DateTime, FixedOffset};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::LoadingProgress;

#[derive(Debug, Clone)]
struct Inner {
    is_live: bool,
    last_fetch: Option<DateTime<FixedOffset>>,
    status_message: String,
    progress: LoadingProgress,
}

/// Process-wide sync status, written by the scheduler and the backfill coordinator.
#[derive(Debug)]
pub struct SyncState {
    inner: Mutex<Inner>,
    backfill_running: AtomicBool,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                is_live: false,
                last_fetch: None,
                status_message: "Loading...".to_string(),
                progress: LoadingProgress::default(),
            }),
            backfill_running: AtomicBool::new(false),
        }
    }
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_live(&self) -> bool {
        self.lock().is_live
    }

    pub fn set_live(&self, live: bool) {
        self.lock().is_live = live;
    }

    pub fn last_fetch(&self) -> Option<DateTime<FixedOffset>> {
        self.lock().last_fetch
    }

    pub fn mark_fetched(&self, at: DateTime<FixedOffset>) {
        self.lock().last_fetch = Some(at);
    }

    pub fn status_message(&self) -> String {
        self.lock().status_message.clone()
    }

    pub fn set_status(&self, message: impl Into<String>) {
        self.lock().status_message = message.into();
    }

    pub fn progress(&self) -> LoadingProgress {
        self.lock().progress
    }

    pub fn start_progress(&self, total: usize) {
        self.lock().progress = LoadingProgress { loaded: 0, total };
    }

    pub fn set_loaded(&self, loaded: usize) {
        self.lock().progress.loaded = loaded;
    }

    pub fn is_backfill_running(&self) -> bool {
        self.backfill_running.load(Ordering::Acquire)
    }

    /// Claims the backfill slot. `None` if another backfill holds it.
    pub fn try_begin_backfill(&self) -> Option<BackfillGuard<'_>> {
        self.backfill_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BackfillGuard { state: self })
    }
}

/// Releases the backfill slot on drop.
pub struct BackfillGuard<'a> {
    state: &'a SyncState,
}

impl Drop for BackfillGuard<'_> {
    fn drop(&mut self) {
        self.state.backfill_running.store(false, Ordering::Release);
    }
}
