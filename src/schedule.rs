//! Publication schedule: draws are announced on the 1st and 16th of every month,
//! during the afternoon.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Timelike, Utc};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub const LIVE_START_HOUR: u32 = 14;
pub const LIVE_END_HOUR: u32 = 18;

pub const LIVE_INTERVAL: Duration = Duration::from_secs(30);
pub const WAITING_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const NORMAL_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Live,
    Waiting,
    Normal,
}

impl SyncPhase {
    pub fn at(local: NaiveDateTime) -> Self {
        if !is_draw_day(local.date()) {
            return SyncPhase::Normal;
        }
        match local.hour() {
            h if h < LIVE_START_HOUR => SyncPhase::Waiting,
            h if h <= LIVE_END_HOUR => SyncPhase::Live,
            _ => SyncPhase::Normal,
        }
    }

    pub fn interval(&self) -> Duration {
        match self {
            SyncPhase::Live => LIVE_INTERVAL,
            SyncPhase::Waiting => WAITING_INTERVAL,
            SyncPhase::Normal => NORMAL_INTERVAL,
        }
    }
}

/// What a badge-style surface should show for a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announcement {
    Live,
    Pending,
    Published,
    None,
}

pub fn announcement_status(local: NaiveDateTime) -> Announcement {
    if !is_draw_day(local.date()) {
        return Announcement::None;
    }
    match local.hour() {
        h if h < LIVE_START_HOUR => Announcement::Pending,
        h if h <= LIVE_END_HOUR => Announcement::Live,
        _ => Announcement::Published,
    }
}

pub fn is_draw_day(date: NaiveDate) -> bool {
    matches!(date.day(), 1 | 16)
}

/// Wall-clock source, expressed in the offset the schedule is published in.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    fn local(&self) -> NaiveDateTime {
        self.now().naive_local()
    }

    fn today(&self) -> NaiveDate {
        self.local().date()
    }

    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn phase_follows_wall_clock() {
        assert_eq!(SyncPhase::at(at(1, 15, 0)), SyncPhase::Live);
        assert_eq!(SyncPhase::at(at(1, 10, 0)), SyncPhase::Waiting);
        for hour in 0..24 {
            assert_eq!(SyncPhase::at(at(5, hour, 0)), SyncPhase::Normal);
        }
    }

    #[test]
    fn live_window_edges() {
        assert_eq!(SyncPhase::at(at(16, 13, 59)), SyncPhase::Waiting);
        assert_eq!(SyncPhase::at(at(16, 14, 0)), SyncPhase::Live);
        assert_eq!(SyncPhase::at(at(16, 18, 59)), SyncPhase::Live);
        assert_eq!(SyncPhase::at(at(16, 19, 0)), SyncPhase::Normal);
    }

    #[test]
    fn intervals() {
        assert_eq!(SyncPhase::Live.interval(), Duration::from_secs(30));
        assert_eq!(SyncPhase::Waiting.interval(), Duration::from_secs(300));
        assert_eq!(SyncPhase::Normal.interval(), Duration::from_secs(3600));
    }

    #[test]
    fn announcement_badge() {
        assert_eq!(announcement_status(at(1, 9, 0)), Announcement::Pending);
        assert_eq!(announcement_status(at(1, 14, 30)), Announcement::Live);
        assert_eq!(announcement_status(at(1, 20, 0)), Announcement::Published);
        assert_eq!(announcement_status(at(2, 15, 0)), Announcement::None);
    }

    #[test]
    fn manual_clock_reports_local_time() {
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();
        let clock = ManualClock::new(
            at(1, 15, 0).and_local_timezone(offset).unwrap(),
        );
        assert_eq!(clock.local(), at(1, 15, 0));
        clock.advance(chrono::Duration::hours(10));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }
}
