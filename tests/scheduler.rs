mod common;

use common::*;
use lotto_sync::scheduler::Scheduler;
use lotto_sync::schedule::{Announcement, LIVE_INTERVAL, NORMAL_INTERVAL, WAITING_INTERVAL};
use lotto_sync::store::Partition;
use lotto_sync::{EventKind, Source};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn live_tick_flags_only_a_changed_first_prize() {
    let h = harness(bangkok(2024, 3, 1, 15, 0));
    let mut events = h.engine.subscribe();
    h.ctx()
        .store
        .merge([draw(ymd(2024, 2, 16), "111111", Source::Api)], Partition::Main);
    h.upstream.set_latest(Some(draw(ymd(2024, 3, 1), "222222", Source::Api)));
    let scheduler = Scheduler::new(Arc::clone(h.ctx()));

    assert_eq!(scheduler.tick().await, LIVE_INTERVAL);
    assert!(h.engine.is_live());
    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, EventKind::Live);
    assert!(event.significant);
    assert_eq!(h.engine.latest().unwrap().first, "222222");

    h.clock.advance(chrono::Duration::seconds(30));
    scheduler.tick().await;
    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, EventKind::Live);
    assert!(!event.significant);
    assert_eq!(FakeUpstream::calls(&h.upstream.latest_calls), 2);
    assert_eq!(h.ctx().cache.load_store().unwrap().draws.len(), 2);
}

#[tokio::test]
async fn morning_of_draw_day_waits_without_fetching() {
    let h = harness(bangkok(2024, 3, 16, 10, 0));
    let mut events = h.engine.subscribe();
    let scheduler = Scheduler::new(Arc::clone(h.ctx()));

    assert_eq!(scheduler.tick().await, WAITING_INTERVAL);
    assert!(!h.engine.is_live());
    assert_eq!(events.try_recv().unwrap().kind, EventKind::Waiting);
    assert_eq!(FakeUpstream::calls(&h.upstream.latest_calls), 0);
}

#[tokio::test]
async fn evening_leaves_live_mode() {
    let h = harness(bangkok(2024, 3, 16, 18, 59));
    let scheduler = Scheduler::new(Arc::clone(h.ctx()));
    assert_eq!(scheduler.tick().await, LIVE_INTERVAL);
    assert!(h.engine.is_live());
    assert_eq!(h.engine.announcement(), Announcement::Live);

    h.clock.set(bangkok(2024, 3, 16, 19, 0));
    assert_eq!(scheduler.tick().await, NORMAL_INTERVAL);
    assert!(!h.engine.is_live());
    assert_eq!(h.engine.announcement(), Announcement::Published);
}

#[tokio::test]
async fn normal_ticks_are_debounced() {
    let h = harness(bangkok(2024, 3, 5, 9, 0));
    let mut events = h.engine.subscribe();
    h.upstream.set_latest(Some(draw(ymd(2024, 3, 1), "333333", Source::Api)));
    let scheduler = Scheduler::new(Arc::clone(h.ctx()));

    assert_eq!(scheduler.tick().await, NORMAL_INTERVAL);
    assert_eq!(FakeUpstream::calls(&h.upstream.latest_calls), 1);
    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, EventKind::Updated);
    assert!(!event.significant);

    h.clock.advance(chrono::Duration::minutes(30));
    scheduler.tick().await;
    assert_eq!(FakeUpstream::calls(&h.upstream.latest_calls), 1);
    assert!(events.try_recv().is_err());

    h.clock.advance(chrono::Duration::minutes(31));
    scheduler.tick().await;
    assert_eq!(FakeUpstream::calls(&h.upstream.latest_calls), 2);
    assert!(h.engine.status_message().contains("1 draws"));
}

#[tokio::test]
async fn failed_fetch_leaves_store_untouched() {
    let h = harness(bangkok(2024, 3, 1, 16, 0));
    let mut events = h.engine.subscribe();
    h.ctx()
        .store
        .merge([draw(ymd(2024, 2, 16), "111111", Source::Api)], Partition::Main);
    let scheduler = Scheduler::new(Arc::clone(h.ctx()));

    scheduler.tick().await;

    assert_eq!(h.engine.all().len(), 1);
    assert!(h.engine.last_fetch_time().is_none());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn stopped_scheduler_does_not_fetch_again() {
    let h = harness(bangkok(2024, 3, 5, 9, 0));
    h.upstream.set_latest(Some(draw(ymd(2024, 3, 1), "333333", Source::Api)));

    let handle = Scheduler::new(Arc::clone(h.ctx())).spawn();
    tokio::time::sleep(Duration::from_millis(20)).await;
    tokio::time::timeout(Duration::from_secs(1), handle.join())
        .await
        .unwrap();

    assert_eq!(FakeUpstream::calls(&h.upstream.latest_calls), 1);
    assert_eq!(h.engine.latest().unwrap().first, "333333");
}
