//! In-memory draw store with a bounded main window and an unbounded extra window.
//!
//! Each partition is an immutable, date-descending `Arc<Vec<Draw>>`. Writers
//! rebuild them and swap the pair in under one lock, so readers only ever see a
//! consistent pair of complete partitions. Writers are serialized by a single
//! mutex and never suspend while holding it.

use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::types::{
    AnalysisKind, AnalysisRow, DigitRow, Draw, DrawCount, FirstPrizeRow, NumberMatch, SearchHit,
    SearchOptions, Source,
};
use crate::utils::window_cutoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Main,
    Extra,
}

#[derive(Default, Clone)]
struct Partitions {
    main: Arc<Vec<Draw>>,
    extra: Arc<Vec<Draw>>,
}

#[derive(Default)]
pub struct DrawStore {
    current: RwLock<Partitions>,
    writer: Mutex<()>,
}

/// Applies the merge rule to one partition's contents and returns it sorted newest first.
fn merged(existing: &[Draw], incoming: impl IntoIterator<Item = Draw>) -> Vec<Draw> {
    let mut by_date: BTreeMap<NaiveDate, Draw> =
        existing.iter().map(|d| (d.date, d.clone())).collect();

    for draw in incoming {
        let replace = match by_date.get(&draw.date) {
            None => true,
            Some(_) => draw.source == Source::Api,
        };
        if replace {
            by_date.insert(draw.date, draw);
        }
    }

    by_date.into_values().rev().collect()
}

impl DrawStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Partitions {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn swap(&self, next: Partitions) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn main(&self) -> Arc<Vec<Draw>> {
        self.snapshot().main
    }

    pub fn extra(&self) -> Arc<Vec<Draw>> {
        self.snapshot().extra
    }

    /// Merges `draws` into `partition`. An incoming draw takes a date that is free
    /// or replaces the holder when it is api-sourced; bundled never displaces anything.
    pub fn merge(&self, draws: impl IntoIterator<Item = Draw>, partition: Partition) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = self.snapshot();
        match partition {
            Partition::Main => next.main = Arc::new(merged(&next.main, draws)),
            Partition::Extra => next.extra = Arc::new(merged(&next.extra, draws)),
        }
        self.swap(next);
    }

    /// Repartitions around the window cutoff: main draws older than the cutoff
    /// move to extra and extra draws inside the window move to main, both under
    /// the merge rule. Afterwards no date is held by both partitions.
    /// Returns how many draws changed partition.
    pub fn prune(&self, today: NaiveDate, window_years: u32) -> usize {
        let cutoff = window_cutoff(today, window_years);
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();

        let (keep, old): (Vec<Draw>, Vec<Draw>) =
            current.main.iter().cloned().partition(|d| d.date >= cutoff);
        let (recent, history): (Vec<Draw>, Vec<Draw>) =
            current.extra.iter().cloned().partition(|d| d.date >= cutoff);
        if old.is_empty() && recent.is_empty() {
            return 0;
        }
        let moved = old.len() + recent.len();

        self.swap(Partitions {
            main: Arc::new(merged(&keep, recent)),
            extra: Arc::new(merged(&history, old)),
        });
        moved
    }

    /// Union of both partitions, main winning on overlap, newest first.
    pub fn combined(&self) -> Vec<Draw> {
        let current = self.snapshot();

        let mut by_date: BTreeMap<NaiveDate, &Draw> = BTreeMap::new();
        for draw in current.extra.iter() {
            by_date.insert(draw.date, draw);
        }
        for draw in current.main.iter() {
            by_date.insert(draw.date, draw);
        }
        by_date.into_values().rev().cloned().collect()
    }

    pub fn latest(&self) -> Option<Draw> {
        self.main().first().cloned()
    }

    pub fn by_date(&self, date: NaiveDate) -> Option<Draw> {
        let current = self.snapshot();
        current
            .main
            .iter()
            .chain(current.extra.iter())
            .find(|d| d.date == date)
            .cloned()
    }

    pub fn by_year(&self, year: i32) -> Vec<Draw> {
        self.combined().into_iter().filter(|d| d.date.year() == year).collect()
    }

    /// `month` of `None` means the whole year.
    pub fn by_year_month(&self, year: i32, month: Option<u32>) -> Vec<Draw> {
        self.combined()
            .into_iter()
            .filter(|d| d.date.year() == year && month.is_none_or(|m| d.date.month() == m))
            .collect()
    }

    pub fn recent(&self, count: usize) -> Vec<Draw> {
        self.main().iter().take(count).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.main().len()
    }

    pub fn is_empty(&self) -> bool {
        let current = self.snapshot();
        current.main.is_empty() && current.extra.is_empty()
    }

    pub fn available_years(&self) -> Vec<i32> {
        let current = self.snapshot();
        let years: BTreeSet<i32> = current
            .main
            .iter()
            .chain(current.extra.iter())
            .map(|d| d.date.year())
            .collect();
        years.into_iter().rev().collect()
    }

    pub fn has_year(&self, year: i32) -> bool {
        let current = self.snapshot();
        current.main.iter().chain(current.extra.iter()).any(|d| d.date.year() == year)
    }

    /// Dates held with api provenance in either partition.
    pub fn api_dates(&self) -> HashSet<NaiveDate> {
        let current = self.snapshot();
        current
            .main
            .iter()
            .chain(current.extra.iter())
            .filter(|d| d.source == Source::Api)
            .map(|d| d.date)
            .collect()
    }

    /// `All` is the combined view; `Recent(n)` the newest `n` of main. Oldest first.
    fn selection(&self, count: DrawCount) -> Vec<Draw> {
        let mut draws = match count {
            DrawCount::All => self.combined(),
            DrawCount::Recent(n) => self.recent(n),
        };
        draws.reverse();
        draws
    }

    pub fn first_prizes(&self, count: DrawCount) -> Vec<FirstPrizeRow> {
        self.selection(count)
            .into_iter()
            .map(|d| FirstPrizeRow {
                date: d.date,
                first: d.first,
                front3: d.front3,
                back3: d.back3,
                last2: d.last2,
            })
            .collect()
    }

    pub fn last2_digits(&self, count: DrawCount) -> Vec<DigitRow> {
        self.selection(count)
            .into_iter()
            .map(|d| DigitRow {
                date: d.date,
                number: d.last2,
            })
            .collect()
    }

    pub fn analysis_data(&self, kind: AnalysisKind, count: DrawCount) -> Vec<AnalysisRow> {
        self.selection(count)
            .into_iter()
            .map(|d| AnalysisRow {
                date: d.date,
                numbers: match kind {
                    AnalysisKind::First => vec![d.first],
                    AnalysisKind::Last2 => vec![d.last2],
                    AnalysisKind::Front3 => d.front3,
                    AnalysisKind::Back3 => d.back3,
                },
            })
            .collect()
    }

    /// Substring search over the combined view.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchHit> {
        let q = query.trim();
        if q.is_empty() {
            return Vec::new();
        }

        let mut hits = Vec::new();
        for draw in self.combined() {
            let mut matches = Vec::new();
            let mut check = |tier: &'static str, prize: &'static str, number: &str| {
                if number.contains(q) {
                    matches.push(NumberMatch {
                        tier,
                        number: number.to_string(),
                        prize,
                    });
                }
            };

            if options.exact {
                check("first", "6,000,000", &draw.first);
            }
            if options.front3 && q.len() <= 3 {
                draw.front3.iter().for_each(|n| check("front3", "4,000", n));
            }
            if options.back3 && q.len() <= 3 {
                draw.back3.iter().for_each(|n| check("back3", "4,000", n));
            }
            if options.last2 && q.len() <= 2 {
                check("last2", "2,000", &draw.last2);
            }
            if options.exact {
                draw.prize2.iter().for_each(|n| check("second", "200,000", n));
                draw.prize3.iter().for_each(|n| check("third", "80,000", n));
                draw.near1.iter().for_each(|n| check("near1", "100,000", n));
            }

            if !matches.is_empty() {
                hits.push(SearchHit {
                    date: draw.date,
                    matches,
                });
            }
        }
        hits
    }
}
