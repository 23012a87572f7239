//! Wall-clock driven polling loop. The only timer-driven writer of the main window.

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::context::SyncContext;
use crate::events::EventKind;
use crate::schedule::{SyncPhase, LIVE_INTERVAL};
use crate::store::Partition;

/// Minimum gap between two latest-fetches outside the live window.
pub const NORMAL_DEBOUNCE_MINUTES: i64 = 60;

pub struct Scheduler {
    ctx: Arc<SyncContext>,
}

impl Scheduler {
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self { ctx }
    }

    /// Runs one evaluation of the schedule and returns the delay until the next one.
    pub async fn tick(&self) -> Duration {
        let ctx = &self.ctx;
        let phase = SyncPhase::at(ctx.clock.local());
        debug!(?phase, "tick");

        match phase {
            SyncPhase::Live => {
                ctx.state.set_live(true);
                ctx.state.set_status(format!(
                    "🔴 LIVE, refreshing every {} seconds",
                    LIVE_INTERVAL.as_secs()
                ));

                if let Some(latest) = ctx.upstream.fetch_latest().await {
                    let previous_first = ctx.store.latest().map(|d| d.first);
                    ctx.store.merge([latest.clone()], Partition::Main);
                    ctx.persist();
                    ctx.state.mark_fetched(ctx.clock.now());

                    let changed = previous_first.as_deref() != Some(latest.first.as_str());
                    if changed {
                        info!(date = %latest.date, first = %latest.first, "first prize changed");
                    }
                    ctx.notify(EventKind::Live, Some(latest), changed);
                }
            }
            SyncPhase::Waiting => {
                ctx.state.set_live(false);
                ctx.state.set_status("⏳ Draw day, waiting for results at 14:30");
                ctx.notify(EventKind::Waiting, None, false);
            }
            SyncPhase::Normal => {
                ctx.state.set_live(false);

                let due = match ctx.state.last_fetch() {
                    None => true,
                    Some(last) => {
                        ctx.clock.now() - last > ChronoDuration::minutes(NORMAL_DEBOUNCE_MINUTES)
                    }
                };
                if due {
                    if let Some(latest) = ctx.upstream.fetch_latest().await {
                        ctx.store.merge([latest.clone()], Partition::Main);
                        ctx.persist();
                        ctx.state.mark_fetched(ctx.clock.now());
                        ctx.notify(EventKind::Updated, Some(latest), false);
                    }
                }

                ctx.state.set_status(format!(
                    "✅ {} draws ({} years)",
                    ctx.store.len(),
                    ctx.window_years
                ));
            }
        }

        phase.interval()
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!("scheduler started");
            loop {
                let next = self.tick().await;
                if *stop_rx.borrow() {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(next) => {}
                    _ = stop_rx.changed() => break,
                }
            }
            info!("scheduler stopped");
        });

        SchedulerHandle { stop_tx, task }
    }
}

pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Cancels the pending timer. A tick already fetching finishes first.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub async fn join(self) {
        self.stop();
        let _ = self.task.await;
    }
}
