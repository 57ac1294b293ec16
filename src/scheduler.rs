//! Scheduler engine (C3, spec §4.3): computes the next evaluation instant
//! for one item. Grounded on the original implementation's
//! `calculate_item_nextcheck` (seed-spread candidate, flexible-window walk,
//! `ZBX_JAN_2038` sentinel) with two departures spec.md makes explicit:
//! the scheduler candidate search is the cron-like day→hour→minute→second
//! descent in §4.3 step 2, and ties are broken in the scheduler's favor
//! (the original's `scheduled_check < nextcheck` is strict; spec.md's prose
//! calls for scheduler-wins-on-equal, recorded as DESIGN.md Open Question 2).

use crate::interval::{CustomInterval, Granularity, SchedulerInterval};
use crate::time::{self, Timestamp};

const ONE_YEAR_SECS: i64 = 365 * 24 * 3600;

/// Item type families (spec.md's data model + SPEC_FULL.md supplement).
/// Every non-agent variant takes the same "otherwise" branch in step 2;
/// only `ActiveAgent` gets the trivial shortcut in step 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    ActiveAgent,
    Snmp,
    Ipmi,
    Jmx,
    External,
    DbMonitor,
    HttpAgent,
    Internal,
    Script,
}

impl ItemType {
    fn is_active_agent(self) -> bool {
        matches!(self, ItemType::ActiveAgent)
    }
}

/// Returns the smallest `t > now` at which the item must next be evaluated.
pub fn next_check(
    seed: u64,
    item_type: ItemType,
    base_delay: u32,
    custom: Option<&CustomInterval>,
    now: Timestamp,
) -> Timestamp {
    if item_type.is_active_agent() {
        return if base_delay > 0 {
            now + base_delay as i64
        } else {
            Timestamp::sentinel()
        };
    }

    let tmax = now + ONE_YEAR_SECS;
    let simple_flex = simple_flexible_candidate(seed, base_delay, custom, now, tmax);
    let sched = scheduler_candidate(custom, now, tmax);

    let mut candidate = match (simple_flex, sched) {
        (Some(a), Some(b)) => {
            if b <= a {
                b
            } else {
                a
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => Timestamp::sentinel(),
    };

    if candidate.secs < Timestamp::sentinel().secs && time::local_is_dst(now) != time::local_is_dst(candidate) {
        let change = time::find_dst_change(now, candidate);
        if let Some(reevaluated) = scheduler_candidate(custom, change, tmax) {
            candidate = reevaluated;
        }
    }

    candidate
}

fn simple_flexible_candidate(
    seed: u64,
    base_delay: u32,
    custom: Option<&CustomInterval>,
    now: Timestamp,
    tmax: Timestamp,
) -> Option<Timestamp> {
    let flexible = custom.map(|c| c.flexible.as_slice()).unwrap_or(&[]);
    if base_delay == 0 && flexible.is_empty() {
        return None;
    }

    let mut t = now;
    loop {
        if t.secs >= tmax.secs {
            return None;
        }

        let weekday = time::dayofweek_local(t);
        let sod = time::seconds_of_day_local(t);

        let active = flexible.iter().find(|f| f.period.matches(weekday, sod));
        let delay = active.map(|f| f.delay).unwrap_or(base_delay);
        let window_end_secs = active
            .map(|f| day_start(t) + f.period.end_time as i64)
            .unwrap_or_else(|| day_start(t) + 86_400);

        if delay == 0 {
            // No ticking delay in this window; advance to the window end
            // and try the next one, unless there are no windows at all.
            if flexible.is_empty() {
                return None;
            }
            t = Timestamp::from_secs(window_end_secs);
            continue;
        }

        let d = delay as i64;
        let floor = d * (t.secs / d);
        let mut candidate_secs = floor + (seed % d as u64) as i64;
        while candidate_secs <= t.secs {
            candidate_secs += d;
        }

        if candidate_secs < window_end_secs {
            return Some(Timestamp::from_secs(candidate_secs));
        }
        t = Timestamp::from_secs(window_end_secs);
    }
}

fn day_start(t: Timestamp) -> i64 {
    t.secs - time::seconds_of_day_local(t) as i64
}

fn scheduler_candidate(
    custom: Option<&CustomInterval>,
    now: Timestamp,
    tmax: Timestamp,
) -> Option<Timestamp> {
    let scheduler = custom.map(|c| c.scheduler.as_slice()).unwrap_or(&[]);
    if scheduler.is_empty() {
        return None;
    }

    scheduler
        .iter()
        .filter_map(|s| scheduler_interval_candidate(s, now, tmax))
        .min()
}

/// Cron-like day→hour→minute→second descent for one scheduler interval
/// (spec §4.3 step 2). Operates entirely in local broken-down time.
fn scheduler_interval_candidate(
    interval: &SchedulerInterval,
    now: Timestamp,
    tmax: Timestamp,
) -> Option<Timestamp> {
    let granularity = interval.granularity_or(Granularity::Day);
    let mut t = now + 1;

    for _ in 0..366 {
        if t.secs >= tmax.secs {
            return None;
        }

        if !day_matches(interval, t) {
            t = next_day_start(t);
            continue;
        }

        let sod = time::seconds_of_day_local(t);
        let target_sod = match resolve_time_of_day(interval, granularity, sod) {
            Some(v) => v,
            None => {
                t = next_day_start(t);
                continue;
            }
        };

        let candidate = Timestamp::from_secs(day_start(t) + target_sod as i64);
        if candidate.secs <= now.secs {
            t = next_day_start(t);
            continue;
        }
        return Some(candidate);
    }
    None
}

fn day_matches(interval: &SchedulerInterval, t: Timestamp) -> bool {
    match (&interval.weekday, &interval.month_day) {
        (Some(wd), _) => {
            let dow = time::dayofweek_local(t);
            wd.matches(dow as u32)
        }
        (None, Some(md)) => {
            let mday = local_mday(t);
            match mday {
                Some(mday) => md.matches(mday as u32),
                None => false,
            }
        }
        (None, None) => true,
    }
}

fn local_mday(t: Timestamp) -> Option<u8> {
    use chrono::{Datelike, Local, TimeZone};
    Local
        .timestamp_opt(t.secs, 0)
        .single()
        .map(|dt| dt.day() as u8)
}

/// Ordering of the three sub-day filter levels, finest last (spec §4.3
/// step 2's day→hour→minute→second descent).
fn level_rank(g: Granularity) -> u8 {
    match g {
        Granularity::Day => 0,
        Granularity::Hour => 1,
        Granularity::Minute => 2,
        Granularity::Second => 3,
    }
}

/// Smallest value `>= from` matching a level that has no explicit filter.
/// A level coarser than the interval's granularity is a free wildcard (the
/// current value always matches); a level finer than the granularity
/// matches only zero (spec §3: "if granularity is minute-level, unspecified
/// finer filters match only zero" — confirmed by the original's
/// `scheduler_get_filter_nextcheck`, which treats a NULL filter at
/// `level > interval->filter_level` as matching only 0).
fn unspecified_level_value(level: Granularity, granularity: Granularity, from: u32) -> Option<u32> {
    if level_rank(level) > level_rank(granularity) {
        if from == 0 {
            Some(0)
        } else {
            None
        }
    } else {
        Some(from)
    }
}

/// Finds the smallest second-of-day `>= from` satisfying the hour/minute/
/// second filters, bumping the next-coarser level and resetting finer
/// levels to zero when a level has no match (spec §4.3 step 2).
fn resolve_time_of_day(interval: &SchedulerInterval, granularity: Granularity, from: u32) -> Option<u32> {
    if granularity == Granularity::Day {
        // No hour/minute/second filter: any time-of-day on a matching day
        // satisfies the interval, so the earliest is `from` itself.
        return Some(from);
    }

    let mut hour = from / 3600;
    let mut minute = (from % 3600) / 60;
    let mut second = from % 60;

    for _ in 0..24 {
        let h = match &interval.hour {
            Some(f) => f.nearest_at_or_after(hour),
            None => unspecified_level_value(Granularity::Hour, granularity, hour),
        };
        let h = match h {
            Some(h) if h < 24 => h,
            _ => return None,
        };
        if h > hour {
            minute = 0;
            second = 0;
        }
        hour = h;

        let m = match &interval.minute {
            Some(f) => f.nearest_at_or_after(minute),
            None => unspecified_level_value(Granularity::Minute, granularity, minute),
        };
        let m = match m {
            Some(m) if m < 60 => m,
            _ => {
                hour += 1;
                minute = 0;
                second = 0;
                continue;
            }
        };
        if m > minute {
            second = 0;
        }
        minute = m;

        let s = match &interval.second {
            Some(f) => f.nearest_at_or_after(second),
            None => unspecified_level_value(Granularity::Second, granularity, second),
        };
        let s = match s {
            Some(s) if s < 60 => s,
            _ => {
                minute += 1;
                second = 0;
                continue;
            }
        };
        second = s;

        return Some(hour * 3600 + minute * 60 + second);
    }
    None
}

fn next_day_start(t: Timestamp) -> Timestamp {
    Timestamp::from_secs(day_start(t) + 86_400)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::interval::{Base, FilterAtom, FlexibleInterval, SchedulerFilter, TimePeriod};

    fn ci_empty() -> CustomInterval {
        CustomInterval::default()
    }

    #[test]
    fn active_agent_shortcut() {
        let now = Timestamp::from_secs(1_000_000);
        let t = next_check(1, ItemType::ActiveAgent, 60, None, now);
        assert_eq!(t, now + 60);

        let sentinel = next_check(1, ItemType::ActiveAgent, 0, None, now);
        assert_eq!(sentinel, Timestamp::sentinel());
    }

    #[test]
    fn simple_delay_advances_past_now() {
        let now = Timestamp::from_secs(1_700_000_000);
        let t = next_check(42, ItemType::Snmp, 60, Some(&ci_empty()), now);
        assert!(t.secs > now.secs);
        assert!(t.secs - now.secs <= 60);
    }

    #[test]
    fn next_check_never_returns_now_or_earlier() {
        let now = Timestamp::from_secs(1_700_000_000);
        for seed in 0..20u64 {
            let t = next_check(seed, ItemType::Snmp, 30, Some(&ci_empty()), now);
            assert!(t.secs > now.secs, "seed {seed} produced {:?}", t);
        }
    }

    #[test]
    fn scheduler_candidate_resolves_hour_minute() {
        let mut sched = SchedulerInterval::default();
        sched.hour = Some(SchedulerFilter { atoms: vec![FilterAtom { start: 9, end: 9, step: 1 }] });
        sched.minute = Some(SchedulerFilter { atoms: vec![FilterAtom { start: 0, end: 0, step: 1 }] });
        let custom = CustomInterval { flexible: vec![], scheduler: vec![sched] };
        let now = Timestamp::from_secs(1_700_000_000);
        let t = next_check(1, ItemType::Snmp, 0, Some(&custom), now);
        assert!(t.secs > now.secs);
        assert!(t.secs < Timestamp::sentinel().secs);
    }

    #[test]
    fn unspecified_second_pins_to_zero_not_current_second() {
        // hour/minute specified, second not: a `from` with a non-zero
        // second must bump to the next matching minute (and day, if the
        // hour/minute combo only occurs once per day) at :00 seconds,
        // never accept the current second as a wildcard match.
        assert_eq!(unspecified_level_value(Granularity::Second, Granularity::Minute, 0), Some(0));
        assert_eq!(unspecified_level_value(Granularity::Second, Granularity::Minute, 2), None);
        // minute unspecified under Hour granularity behaves the same way.
        assert_eq!(unspecified_level_value(Granularity::Minute, Granularity::Hour, 0), Some(0));
        assert_eq!(unspecified_level_value(Granularity::Minute, Granularity::Hour, 1), None);
        // a level coarser than the granularity is an unconstrained wildcard.
        assert_eq!(unspecified_level_value(Granularity::Hour, Granularity::Minute, 13), Some(13));
    }

    #[test]
    fn zero_delay_with_no_windows_is_sentinel() {
        let now = Timestamp::from_secs(1_700_000_000);
        let t = next_check(1, ItemType::Snmp, 0, None, now);
        assert_eq!(t, Timestamp::sentinel());
    }

    #[test]
    fn flexible_window_delay_applies_inside_window() {
        let period = TimePeriod::new(1, 7, 0, 86_400).unwrap();
        let custom = CustomInterval {
            flexible: vec![FlexibleInterval { period, delay: 10 }],
            scheduler: vec![],
        };
        let now = Timestamp::from_secs(1_700_000_000);
        let t = next_check(7, ItemType::Snmp, 60, Some(&custom), now);
        assert!(t.secs - now.secs <= 10);
    }

    #[test]
    fn base_matches_macro_is_opaque_to_scheduler() {
        // A macro base cannot be scheduled directly; callers must resolve
        // it to seconds before calling next_check. This crate's contract
        // only accepts a resolved `base_delay: u32`.
        let parsed = crate::interval::parse_interval("{$CHECK_DELAY}").unwrap();
        assert!(matches!(parsed.base, Base::Macro(_)));
    }
}
