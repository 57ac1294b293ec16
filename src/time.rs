//! Time & calendar primitives (spec §4.1).
//!
//! A [`Timestamp`] pairs epoch seconds with nanoseconds and orders
//! lexicographically on that pair. [`Clock`] wraps the OS wall clock with a
//! thread-local monotonic shim so two samples taken back-to-back on the
//! same thread never compare equal, which the scheduler and session layers
//! both rely on for uniqueness.

use chrono::{Datelike, Local, TimeZone, Timelike};
use std::cell::Cell;

/// A monotone, nanosecond-precision timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub const fn new(secs: i64, nanos: u32) -> Self {
        Self { secs, nanos }
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self { secs, nanos: 0 }
    }

    pub fn checked_add_secs(self, delta: i64) -> Self {
        Self {
            secs: self.secs + delta,
            nanos: self.nanos,
        }
    }

    /// Sentinel far in the future returned when no valid check time exists
    /// within the search horizon (spec §4.3).
    pub fn sentinel() -> Self {
        // 2038-01-01T00:00:00Z
        Self::from_secs(2_145_916_800)
    }
}

impl std::ops::Add<i64> for Timestamp {
    type Output = Timestamp;
    fn add(self, secs: i64) -> Timestamp {
        self.checked_add_secs(secs)
    }
}

/// Thread-local monotonic wall clock.
pub struct Clock;

thread_local! {
    static LAST: Cell<Timestamp> = Cell::new(Timestamp::new(0, 0));
}

impl Clock {
    /// Returns the current wall-clock time, bumping nanoseconds (carrying
    /// into seconds on overflow) until it is strictly greater than the last
    /// value this thread observed.
    pub fn now() -> Timestamp {
        let wall = Self::raw_now();
        LAST.with(|last| {
            let prev = last.get();
            let next = if wall > prev {
                wall
            } else {
                bump(prev)
            };
            last.set(next);
            next
        })
    }

    fn raw_now() -> Timestamp {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp::new(now.as_secs() as i64, now.subsec_nanos())
    }
}

fn bump(t: Timestamp) -> Timestamp {
    if t.nanos >= 999_999_999 {
        Timestamp::new(t.secs + 1, 0)
    } else {
        Timestamp::new(t.secs, t.nanos + 1)
    }
}

/// Whether `year` is a Gregorian leap year. Contract: `year >= 1` (see
/// DESIGN.md Open Question 1 — year 0 is out of the supported domain).
pub fn is_leap_year(year: i32) -> bool {
    debug_assert!(year >= 1, "is_leap_year requires year >= 1");
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Days in `mon` (1..=12) of `year`. Out-of-range months return 30, matching
/// the original implementation's defensive fallback.
pub fn days_in_month(year: i32, mon: u32) -> u8 {
    const DAYS: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if !(1..=12).contains(&mon) {
        return 30;
    }
    let base = DAYS[(mon - 1) as usize];
    if mon == 2 && is_leap_year(year) {
        base + 1
    } else {
        base
    }
}

/// Validates broken-down UTC components and returns epoch seconds.
pub fn utc_from(year: i32, mon: u32, mday: u32, hour: u32, min: u32, sec: u32) -> Option<i64> {
    if year < 1970 || !(1..=12).contains(&mon) || !(0..=23).contains(&hour)
        || !(0..=59).contains(&min) || sec > 61
    {
        return None;
    }
    if mday < 1 || mday > days_in_month(year, mon) as u32 {
        return None;
    }
    let date = chrono::NaiveDate::from_ymd_opt(year, mon, mday)?;
    let clamped_sec = sec.min(59);
    let time = chrono::NaiveTime::from_hms_opt(hour, min, clamped_sec)?;
    let naive = chrono::NaiveDateTime::new(date, time);
    Some(naive.and_utc().timestamp() + (sec as i64 - clamped_sec as i64))
}

/// ISO weekday, 1 = Monday .. 7 = Sunday.
pub fn dayofweek(year: i32, mon: u32, mday: u32) -> Option<u8> {
    let date = chrono::NaiveDate::from_ymd_opt(year, mon, mday)?;
    Some(date.weekday().number_from_monday() as u8)
}

/// Resolves `t` to a local datetime, tolerating the spring-forward gap
/// (falls back an hour, then to the UTC instant) instead of panicking —
/// the wall clock can hand the scheduler a non-existent local time.
fn local_dt(t: Timestamp) -> chrono::DateTime<Local> {
    use chrono::LocalResult;
    match Local.timestamp_opt(t.secs, t.nanos) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => match Local.timestamp_opt(t.secs + 3600, t.nanos) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
            LocalResult::None => chrono::DateTime::<Local>::from(
                chrono::DateTime::<chrono::Utc>::from_timestamp(t.secs, t.nanos).unwrap_or_default(),
            ),
        },
    }
}

/// ISO weekday of the local calendar day containing `t`.
pub fn dayofweek_local(t: Timestamp) -> u8 {
    local_dt(t).weekday().number_from_monday() as u8
}

/// Seconds since local midnight for `t`.
pub fn seconds_of_day_local(t: Timestamp) -> u32 {
    local_dt(t).num_seconds_from_midnight()
}

pub(crate) fn local_is_dst(t: Timestamp) -> bool {
    // chrono's `Local` offset already reflects DST; treat a non-standard
    // (summer) offset as "DST active" by comparing against January's offset
    // of the same year, which is never in a DST period in any real zone.
    let dt = local_dt(t);
    match Local.with_ymd_and_hms(dt.year(), 1, 1, 0, 0, 0).single() {
        Some(jan) => dt.offset().to_string() != jan.offset().to_string(),
        None => false,
    }
}

thread_local! {
    static DST_CACHE: Cell<Option<(Timestamp, Timestamp, Timestamp)>> = Cell::new(None);
}

/// Finds the minute boundary inside `[t0, t1]` at which the local
/// `isdst` flag changes, assumed to change on a zero-second boundary
/// (spec §4.1). Thread-local cache: a repeated query inside the same
/// `[t0, t1]` window is a cache hit.
pub fn find_dst_change(t0: Timestamp, t1: Timestamp) -> Timestamp {
    if let Some((c0, c1, result)) = DST_CACHE.with(|c| c.get()) {
        if t0 >= c0 && t1 <= c1 {
            return result;
        }
    }

    let start_dst = local_is_dst(t0);
    let mut lo = t0.secs;
    let mut hi = t1.secs;
    // Binary search for the minute boundary where isdst flips.
    while hi - lo > 60 {
        let mid = lo + (hi - lo) / 2;
        let mid = mid - (mid % 60);
        if local_is_dst(Timestamp::from_secs(mid)) == start_dst {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let result = Timestamp::from_secs(hi - (hi % 60));
    DST_CACHE.with(|c| c.set(Some((t0, t1, result))));
    result
}
