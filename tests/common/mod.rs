#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lotto_sync::api::Upstream;
use lotto_sync::cache::{DEFAULT_QUOTA_BYTES, PersistentCache};
use lotto_sync::connection::in_memory;
use lotto_sync::context::SyncContext;
use lotto_sync::schedule::ManualClock;
use lotto_sync::types::{Draw, DrawIndexEntry, Source};
use lotto_sync::utils::BUDDHIST_ERA_OFFSET;
use lotto_sync::SyncEngine;

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn bangkok(y: i32, m: u32, d: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    ymd(y, m, d)
        .and_hms_opt(hour, minute, 0)
        .unwrap()
        .and_local_timezone(FixedOffset::east_opt(7 * 3600).unwrap())
        .unwrap()
}

pub fn draw(date: NaiveDate, first: &str, source: Source) -> Draw {
    Draw {
        date,
        first: first.to_string(),
        near1: vec!["------".to_string(), "------".to_string()],
        prize2: vec![],
        prize3: vec![],
        prize4: vec![],
        prize5: vec![],
        front3: vec!["---".to_string(), "---".to_string()],
        back3: vec!["---".to_string(), "---".to_string()],
        last2: "--".to_string(),
        source,
    }
}

/// Upstream ids look like `16012567`: day, month, Buddhist Era year.
pub fn id_for(date: NaiveDate) -> String {
    format!("{:02}{:02}{}", date.day(), date.month(), date.year() + BUDDHIST_ERA_OFFSET)
}

/// Scripted upstream with failure injection and call accounting.
#[derive(Default)]
pub struct FakeUpstream {
    latest: Mutex<Option<Draw>>,
    records: Mutex<HashMap<String, Draw>>,
    failing: Mutex<HashSet<String>>,
    pages: Mutex<Option<Vec<Vec<DrawIndexEntry>>>>,
    pub latest_calls: AtomicUsize,
    pub record_calls: AtomicUsize,
    pub index_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_latest(&self, draw: Option<Draw>) {
        *self.latest.lock().unwrap() = draw;
    }

    /// Registers api draws for `dates` and publishes them as index pages of `page_size`.
    pub fn publish(&self, dates: &[NaiveDate], page_size: usize) {
        let mut records = self.records.lock().unwrap();
        let entries: Vec<DrawIndexEntry> = dates
            .iter()
            .map(|&date| {
                let id = id_for(date);
                records.insert(id.clone(), draw(date, &format!("{:06}", date.ordinal()), Source::Api));
                DrawIndexEntry { id, date }
            })
            .collect();
        *self.pages.lock().unwrap() = Some(entries.chunks(page_size).map(<[_]>::to_vec).collect());
    }

    /// Makes the index endpoint fail on every page.
    pub fn break_index(&self) {
        *self.pages.lock().unwrap() = None;
    }

    pub fn fail_record(&self, date: NaiveDate) {
        self.failing.lock().unwrap().insert(id_for(date));
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn fetch_latest(&self) -> Option<Draw> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        self.latest.lock().unwrap().clone()
    }

    async fn fetch_by_id(&self, id: &str) -> Option<Draw> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(5)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(id) {
            return None;
        }
        self.records.lock().unwrap().get(id).cloned()
    }

    async fn fetch_index_page(&self, page: u32) -> Option<Vec<DrawIndexEntry>> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        let pages = self.pages.lock().unwrap();
        let pages = pages.as_ref()?;
        Some(pages.get(page as usize - 1).cloned().unwrap_or_default())
    }
}

pub struct Harness {
    pub engine: SyncEngine,
    pub upstream: Arc<FakeUpstream>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn ctx(&self) -> &Arc<SyncContext> {
        self.engine.context()
    }
}

pub fn harness_with_cache(now: DateTime<FixedOffset>, cache: PersistentCache, batch_size: usize) -> Harness {
    let upstream = FakeUpstream::new();
    let clock = Arc::new(ManualClock::new(now));
    let ctx = SyncContext::new(cache, upstream.clone(), clock.clone(), 5);
    Harness {
        engine: SyncEngine::new(ctx, batch_size),
        upstream,
        clock,
    }
}

pub fn harness(now: DateTime<FixedOffset>) -> Harness {
    harness_with_cache(now, empty_cache(), 5)
}

pub fn empty_cache() -> PersistentCache {
    PersistentCache::new(in_memory().unwrap(), DEFAULT_QUOTA_BYTES)
}
