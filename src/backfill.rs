//! Historical backfill: gap repair after startup, single-year loads and full history.
//!
//! All runs share one slot (see [`SyncState::try_begin_backfill`]); a request
//! that finds the slot taken gets the current state back instead of a second run.
//!
//! [`SyncState::try_begin_backfill`]: crate::state::SyncState::try_begin_backfill

use chrono::Datelike;
use futures_util::future::join_all;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

use crate::cache::INDEX_MAX_AGE_MS;
use crate::context::SyncContext;
use crate::events::EventKind;
use crate::store::Partition;
use crate::types::{Draw, DrawIndexEntry};
use crate::utils::{window_cutoff, BUDDHIST_ERA_OFFSET};

pub const DEFAULT_BATCH_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillOutcome {
    /// Another backfill holds the slot.
    Busy,
    /// The draw index could not be obtained.
    NoIndex,
    /// Nothing was missing.
    UpToDate,
    Completed { requested: usize, fetched: usize },
}

struct CachedIndex {
    fetched_at_ms: i64,
    entries: Arc<Vec<DrawIndexEntry>>,
}

pub struct BackfillCoordinator {
    ctx: Arc<SyncContext>,
    batch_size: usize,
    index: Mutex<Option<CachedIndex>>,
}

impl BackfillCoordinator {
    pub fn new(ctx: Arc<SyncContext>, batch_size: usize) -> Self {
        Self {
            ctx,
            batch_size: batch_size.max(1),
            index: Mutex::new(None),
        }
    }

    /// The full `{id, date}` index: memory, then the persisted snapshot, then upstream.
    /// Empty when upstream is unreachable and nothing fresh is cached.
    pub async fn draw_index(&self) -> Arc<Vec<DrawIndexEntry>> {
        let now_ms = self.ctx.clock.now_ms();

        {
            let memo = self.index.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = memo.as_ref() {
                if now_ms - cached.fetched_at_ms <= INDEX_MAX_AGE_MS {
                    return Arc::clone(&cached.entries);
                }
            }
        }

        if let Some(snapshot) = self.ctx.cache.load_index(now_ms) {
            return self.remember(snapshot.timestamp, snapshot.ids);
        }

        let mut entries = Vec::new();
        let mut page = 1;
        while let Some(items) = self.ctx.upstream.fetch_index_page(page).await {
            if items.is_empty() {
                break;
            }
            entries.extend(items);
            page += 1;
        }
        info!(entries = entries.len(), pages = page - 1, "draw index fetched");

        if entries.is_empty() {
            return Arc::new(entries);
        }
        self.ctx.cache.save_index(&entries, now_ms);
        self.remember(now_ms, entries)
    }

    fn remember(&self, fetched_at_ms: i64, entries: Vec<DrawIndexEntry>) -> Arc<Vec<DrawIndexEntry>> {
        let entries = Arc::new(entries);
        *self.index.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedIndex {
            fetched_at_ms,
            entries: Arc::clone(&entries),
        });
        entries
    }

    /// Years present upstream, newest first.
    pub async fn available_years(&self) -> Vec<i32> {
        let index = self.draw_index().await;
        let years: BTreeSet<i32> = index.iter().map(|e| e.date.year()).collect();
        years.into_iter().rev().collect()
    }

    /// Fetches `items` in windows of `batch_size`. A window's progress is published
    /// only once every fetch in it has settled; failed fetches are dropped.
    async fn fetch_batch(&self, items: &[DrawIndexEntry], label: &str) -> Vec<Draw> {
        let ctx = &self.ctx;
        let total = items.len();

        let mut results = Vec::with_capacity(total);
        for (i, window) in items.chunks(self.batch_size).enumerate() {
            let settled = join_all(window.iter().map(|entry| ctx.upstream.fetch_by_id(&entry.id))).await;
            let before = results.len();
            results.extend(settled.into_iter().flatten());
            if results.len() - before < window.len() {
                warn!(
                    failed = window.len() - (results.len() - before),
                    "some records in batch could not be fetched"
                );
            }

            let loaded = ((i + 1) * self.batch_size).min(total);
            ctx.state.set_loaded(loaded);
            ctx.state.set_status(format!("📥 {label} {loaded}/{total}..."));
            ctx.notify(EventKind::Loading, None, false);
        }
        results
    }

    /// Fills draws missing from the main window since the last run, then prunes.
    pub async fn fill_gap(&self) -> BackfillOutcome {
        let ctx = &self.ctx;
        let Some(_slot) = ctx.state.try_begin_backfill() else {
            return BackfillOutcome::Busy;
        };

        let index = self.draw_index().await;
        if index.is_empty() {
            ctx.state.set_status("⚠️ History is incomplete");
            return BackfillOutcome::NoIndex;
        }

        let cutoff = window_cutoff(ctx.clock.today(), ctx.window_years);
        let held = ctx.store.api_dates();
        let missing = missing_entries(&index, &held, |e| e.date >= cutoff);

        if missing.is_empty() {
            ctx.prune();
            ctx.persist();
            ctx.state.set_status(self.window_status());
            ctx.notify(EventKind::Updated, None, false);
            return BackfillOutcome::UpToDate;
        }

        info!(missing = missing.len(), "filling gap in main window");
        ctx.state.start_progress(missing.len());
        let fetched = self.fetch_batch(&missing, "Loading").await;
        let outcome = BackfillOutcome::Completed {
            requested: missing.len(),
            fetched: fetched.len(),
        };

        let merged = !fetched.is_empty();
        if merged {
            ctx.store.merge(fetched, Partition::Main);
            ctx.prune();
            ctx.persist();
        }

        ctx.state.set_status(self.window_status());
        ctx.notify(EventKind::HistoryLoaded, None, merged);
        outcome
    }

    /// Fetches every draw of `year` not yet held with api provenance.
    pub async fn load_year(&self, year: i32) -> BackfillOutcome {
        let ctx = &self.ctx;
        let Some(_slot) = ctx.state.try_begin_backfill() else {
            return BackfillOutcome::Busy;
        };
        let thai_year = year + BUDDHIST_ERA_OFFSET;

        let index = self.draw_index().await;
        if index.is_empty() {
            ctx.state.set_status(format!("⚠️ Could not load year {thai_year}"));
            return BackfillOutcome::NoIndex;
        }

        let held = ctx.store.api_dates();
        let missing = missing_entries(&index, &held, |e| e.date.year() == year);

        if missing.is_empty() {
            ctx.state.set_status(format!("✅ Year {thai_year} is complete"));
            ctx.notify(EventKind::YearLoaded, None, false);
            return BackfillOutcome::UpToDate;
        }

        ctx.state.start_progress(missing.len());
        ctx.state.set_status(format!("📥 Loading year {thai_year}..."));
        ctx.notify(EventKind::LoadingYear, None, false);

        let fetched = self.fetch_batch(&missing, &format!("Loading year {thai_year}")).await;
        let outcome = BackfillOutcome::Completed {
            requested: missing.len(),
            fetched: fetched.len(),
        };
        info!(year, requested = missing.len(), fetched = fetched.len(), "year loaded");

        let merged = !fetched.is_empty();
        if merged {
            self.merge_history(fetched);
        }

        ctx.state.set_status(format!("✅ Loaded year {thai_year}"));
        ctx.notify(EventKind::YearLoaded, None, merged);
        outcome
    }

    /// Fetches every draw upstream knows about that is not yet held with api provenance.
    pub async fn load_deep_history(&self) -> BackfillOutcome {
        let ctx = &self.ctx;
        let Some(_slot) = ctx.state.try_begin_backfill() else {
            return BackfillOutcome::Busy;
        };

        let index = self.draw_index().await;
        if index.is_empty() {
            ctx.state.set_status("⚠️ Full history is incomplete");
            return BackfillOutcome::NoIndex;
        }

        let held = ctx.store.api_dates();
        let missing = missing_entries(&index, &held, |_| true);

        if missing.is_empty() {
            ctx.state.set_status(self.history_status());
            ctx.notify(EventKind::DeepLoaded, None, false);
            return BackfillOutcome::UpToDate;
        }

        let total = missing.len();
        ctx.state.start_progress(total);
        ctx.state.set_status(format!("📥 Loading full history 0/{total}..."));
        ctx.notify(EventKind::LoadingDeep, None, false);

        let fetched = self.fetch_batch(&missing, "Loading full history").await;
        let outcome = BackfillOutcome::Completed {
            requested: total,
            fetched: fetched.len(),
        };
        info!(requested = total, fetched = fetched.len(), "full history loaded");

        let merged = !fetched.is_empty();
        if merged {
            self.merge_history(fetched);
        }

        ctx.state.set_status(self.history_status());
        ctx.notify(EventKind::DeepLoaded, None, merged);
        outcome
    }

    /// Draws inside the main window go to main, older ones to extra.
    fn merge_history(&self, draws: Vec<Draw>) {
        let ctx = &self.ctx;
        let cutoff = window_cutoff(ctx.clock.today(), ctx.window_years);
        let (recent, older): (Vec<Draw>, Vec<Draw>) =
            draws.into_iter().partition(|d| d.date >= cutoff);

        if !recent.is_empty() {
            ctx.store.merge(recent, Partition::Main);
        }
        if !older.is_empty() {
            ctx.store.merge(older, Partition::Extra);
        }
        ctx.prune();
        ctx.persist();
    }

    fn window_status(&self) -> String {
        format!(
            "✅ All {} draws ({} years)",
            self.ctx.store.len(),
            self.ctx.window_years
        )
    }

    fn history_status(&self) -> String {
        format!("✅ Full history, {} draws", self.ctx.store.combined().len())
    }
}

fn missing_entries(
    index: &[DrawIndexEntry],
    held: &HashSet<chrono::NaiveDate>,
    wanted: impl Fn(&DrawIndexEntry) -> bool,
) -> Vec<DrawIndexEntry> {
    let mut seen = HashSet::new();
    index
        .iter()
        .filter(|e| wanted(e) && !held.contains(&e.date) && seen.insert(e.date))
        .cloned()
        .collect()
}
