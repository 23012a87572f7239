//! The sync engine: owns the store, drives startup, and exposes the read API.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backfill::{BackfillCoordinator, BackfillOutcome};
use crate::context::SyncContext;
use crate::events::{EventKind, SyncEvent};
use crate::scheduler::{Scheduler, SchedulerHandle};
use crate::schedule::{Announcement, announcement_status, is_draw_day};
use crate::store::Partition;
use crate::types::{
    AnalysisKind, AnalysisRow, DigitRow, Draw, DrawCount, FirstPrizeRow, LoadingProgress, SearchHit,
    SearchOptions, Source,
};

pub struct SyncEngine {
    ctx: Arc<SyncContext>,
    backfill: Arc<BackfillCoordinator>,
    scheduler: Mutex<Option<SchedulerHandle>>,
    gap_task: Mutex<Option<JoinHandle<BackfillOutcome>>>,
}

impl SyncEngine {
    pub fn new(ctx: SyncContext, batch_size: usize) -> Self {
        let ctx = Arc::new(ctx);
        Self {
            backfill: Arc::new(BackfillCoordinator::new(Arc::clone(&ctx), batch_size)),
            ctx,
            scheduler: Mutex::new(None),
            gap_task: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.ctx
    }

    /// Loads every local source, reconciles with upstream and starts polling.
    pub async fn init(&self, bundled: Vec<Draw>) -> Arc<Vec<Draw>> {
        self.load(bundled).await;
        self.start_scheduler();
        self.ctx.store.main()
    }

    /// Startup without the timer: bundled snapshot, then persisted cache, then
    /// upstream latest. A newer upstream latest starts a background gap fill.
    pub async fn load(&self, bundled: Vec<Draw>) {
        let ctx = &self.ctx;

        if !bundled.is_empty() {
            ctx.store.merge(bundled, Partition::Main);
            ctx.state.set_status(format!(
                "✅ {} draws ({} years)",
                ctx.store.len(),
                ctx.window_years
            ));
            ctx.notify(EventKind::StaticLoaded, None, false);
        }

        if let Some(snapshot) = ctx.cache.load_store() {
            if !snapshot.draws.is_empty() {
                info!(draws = snapshot.draws.len(), "cached draws loaded");
                ctx.store.merge(snapshot.draws, Partition::Main);
                ctx.state.set_status(format!("✅ {} draws", ctx.store.len()));
            }
        }
        ctx.prune();

        let Some(latest) = ctx.upstream.fetch_latest().await else {
            if ctx.store.is_empty() {
                warn!("no bundled, cached or upstream data available");
                ctx.state.set_status("❌ Unable to reach the results service");
                ctx.notify(EventKind::Error, None, false);
            } else {
                ctx.state.set_status(format!("✅ {} draws (offline)", ctx.store.len()));
            }
            return;
        };

        let local_latest = ctx.store.latest().map(|d| d.date);
        ctx.store.merge([latest.clone()], Partition::Main);
        ctx.state.mark_fetched(ctx.clock.now());
        ctx.persist();

        if local_latest == Some(latest.date) {
            ctx.state.set_status(format!("✅ Up to date ({} draws)", ctx.store.len()));
            ctx.notify(EventKind::Updated, None, false);
            return;
        }

        info!(
            local = ?local_latest,
            upstream = %latest.date,
            "upstream is ahead, filling the gap in the background"
        );
        ctx.state.set_status("📥 Fetching missing draws...");
        ctx.notify(EventKind::Loading, None, false);

        let backfill = Arc::clone(&self.backfill);
        let task = tokio::spawn(async move { backfill.fill_gap().await });
        *self.gap_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    pub fn start_scheduler(&self) {
        let mut slot = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.stop();
        }
        *slot = Some(Scheduler::new(Arc::clone(&self.ctx)).spawn());
    }

    /// Stops polling. Backfills already running finish and persist on their own.
    pub fn shutdown(&self) {
        if let Some(handle) = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner).take() {
            handle.stop();
        }
    }

    /// Waits for the startup gap fill, if one was started.
    pub async fn wait_for_gap_fill(&self) -> Option<BackfillOutcome> {
        let task = self.gap_task.lock().unwrap_or_else(PoisonError::into_inner).take()?;
        task.await.ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.ctx.events.subscribe()
    }

    pub async fn force_refresh(&self) -> bool {
        let ctx = &self.ctx;
        ctx.state.set_status("🔄 Refreshing...");
        ctx.notify(EventKind::Refreshing, None, false);

        match ctx.upstream.fetch_latest().await {
            Some(latest) => {
                ctx.store.merge([latest.clone()], Partition::Main);
                ctx.persist();
                ctx.state.mark_fetched(ctx.clock.now());
                ctx.state.set_status("✅ Refreshed");
                ctx.notify(EventKind::Refreshed, Some(latest), true);
                true
            }
            None => {
                ctx.state.set_status("❌ Refresh failed");
                ctx.notify(EventKind::Error, None, false);
                false
            }
        }
    }

    /// Loads a year of history and returns its draws.
    /// While another backfill runs this returns what is already held.
    pub async fn request_year_load(&self, year: i32) -> Vec<Draw> {
        self.backfill.load_year(year).await;
        self.ctx.store.by_year(year)
    }

    pub async fn request_deep_history_load(&self) -> BackfillOutcome {
        self.backfill.load_deep_history().await
    }

    // Read API

    pub fn all(&self) -> Arc<Vec<Draw>> {
        self.ctx.store.main()
    }

    pub fn combined(&self) -> Vec<Draw> {
        self.ctx.store.combined()
    }

    pub fn latest(&self) -> Option<Draw> {
        self.ctx.store.latest()
    }

    pub fn by_date(&self, date: NaiveDate) -> Option<Draw> {
        self.ctx.store.by_date(date)
    }

    pub fn by_year(&self, year: i32) -> Vec<Draw> {
        self.ctx.store.by_year(year)
    }

    pub fn by_year_month(&self, year: i32, month: Option<u32>) -> Vec<Draw> {
        self.ctx.store.by_year_month(year, month)
    }

    pub fn recent(&self, count: usize) -> Vec<Draw> {
        self.ctx.store.recent(count)
    }

    pub fn search_number(&self, query: &str, options: &SearchOptions) -> Vec<SearchHit> {
        self.ctx.store.search(query, options)
    }

    // Analysis projections, oldest first

    pub fn first_prizes(&self, count: DrawCount) -> Vec<FirstPrizeRow> {
        self.ctx.store.first_prizes(count)
    }

    pub fn last2_digits(&self, count: DrawCount) -> Vec<DigitRow> {
        self.ctx.store.last2_digits(count)
    }

    pub fn analysis_data(&self, kind: AnalysisKind, count: DrawCount) -> Vec<AnalysisRow> {
        self.ctx.store.analysis_data(kind, count)
    }

    pub fn available_years(&self) -> Vec<i32> {
        self.ctx.store.available_years()
    }

    pub async fn available_years_upstream(&self) -> Vec<i32> {
        self.backfill.available_years().await
    }

    pub fn has_year_data(&self, year: i32) -> bool {
        self.ctx.store.has_year(year)
    }

    pub fn is_in_default_range(&self, year: i32) -> bool {
        year >= self.ctx.clock.today().year() - self.ctx.window_years as i32
    }

    /// Provenance of the newest main-window draw, `None` when empty.
    pub fn data_source(&self) -> Option<Source> {
        self.ctx.store.latest().map(|d| d.source)
    }

    pub fn is_live(&self) -> bool {
        self.ctx.state.is_live()
    }

    pub fn is_draw_day(&self) -> bool {
        is_draw_day(self.ctx.clock.today())
    }

    pub fn announcement(&self) -> Announcement {
        announcement_status(self.ctx.clock.local())
    }

    pub fn last_fetch_time(&self) -> Option<DateTime<FixedOffset>> {
        self.ctx.state.last_fetch()
    }

    pub fn status_message(&self) -> String {
        self.ctx.state.status_message()
    }

    pub fn loading_progress(&self) -> LoadingProgress {
        self.ctx.state.progress()
    }

    pub fn is_backfill_running(&self) -> bool {
        self.ctx.state.is_backfill_running()
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
