use std::sync::{Arc, Mutex, PoisonError};

use crate::api::Upstream;
use crate::cache::PersistentCache;
use crate::events::{EventBus, EventKind};
use crate::schedule::Clock;
use crate::state::SyncState;
use crate::store::DrawStore;
use crate::types::Draw;

pub const DEFAULT_WINDOW_YEARS: u32 = 5;

/// Everything the scheduler and the backfill coordinator share.
pub struct SyncContext {
    pub store: Arc<DrawStore>,
    pub cache: Arc<PersistentCache>,
    pub upstream: Arc<dyn Upstream>,
    pub state: Arc<SyncState>,
    pub events: EventBus,
    pub clock: Arc<dyn Clock>,
    pub window_years: u32,
    persisting: Mutex<()>,
}

impl SyncContext {
    pub fn new(
        cache: PersistentCache,
        upstream: Arc<dyn Upstream>,
        clock: Arc<dyn Clock>,
        window_years: u32,
    ) -> Self {
        Self {
            store: Arc::new(DrawStore::new()),
            cache: Arc::new(cache),
            upstream,
            state: Arc::new(SyncState::new()),
            events: EventBus::new(),
            clock,
            window_years,
            persisting: Mutex::new(()),
        }
    }

    /// Writes the main window to the persistent cache. The snapshot is taken
    /// under the persist lock so an older window never overwrites a newer one.
    pub fn persist(&self) -> bool {
        let _persisting = self.persisting.lock().unwrap_or_else(PoisonError::into_inner);
        self.cache.save_store(&self.store.main(), self.clock.now_ms())
    }

    pub fn prune(&self) -> usize {
        self.store.prune(self.clock.today(), self.window_years)
    }

    pub fn notify(&self, kind: EventKind, draw: Option<Draw>, significant: bool) {
        self.events.emit(kind, draw, significant);
    }
}
