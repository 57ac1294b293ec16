//! Typed structure produced by the interval parser (spec §3, §4.2).

use serde::{Deserialize, Serialize};

/// A (start_day, end_day, start_time, end_time) window, weekday-numbered
/// 1..=7 and seconds-of-day 0..=86400.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePeriod {
    pub start_day: u8,
    pub end_day: u8,
    pub start_time: u32,
    pub end_time: u32,
}

impl TimePeriod {
    pub fn new(start_day: u8, end_day: u8, start_time: u32, end_time: u32) -> Option<Self> {
        if !(1..=7).contains(&start_day) || !(1..=7).contains(&end_day) || start_day > end_day {
            return None;
        }
        if start_time >= end_time || end_time > 86_400 {
            return None;
        }
        Some(Self { start_day, end_day, start_time, end_time })
    }

    /// Whether `weekday` (1..=7) and `seconds_of_day` (0..86400) fall
    /// inside this window.
    pub fn matches(&self, weekday: u8, seconds_of_day: u32) -> bool {
        (self.start_day..=self.end_day).contains(&weekday)
            && seconds_of_day >= self.start_time
            && seconds_of_day < self.end_time
    }
}

/// A `(period, delay)` override in a flexible-interval chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlexibleInterval {
    pub period: TimePeriod,
    pub delay: u32,
}

/// One `start..=end` (optionally stepped) atom of a scheduler filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterAtom {
    pub start: u32,
    pub end: u32,
    pub step: u32,
}

impl FilterAtom {
    pub fn matches(&self, v: u32) -> bool {
        v >= self.start && v <= self.end && (v - self.start) % self.step == 0
    }

    /// Smallest value `>= from` (and `>= self.start`) that this atom
    /// matches, if any exists `<= self.end`.
    pub fn nearest_at_or_after(&self, from: u32) -> Option<u32> {
        let floor = from.max(self.start);
        let remainder = (floor - self.start) % self.step;
        let candidate = if remainder == 0 { floor } else { floor + (self.step - remainder) };
        if candidate <= self.end {
            Some(candidate)
        } else {
            None
        }
    }
}

/// A union of [`FilterAtom`]s for one calendar field (month-day, weekday,
/// hour, minute, or second).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerFilter {
    pub atoms: Vec<FilterAtom>,
}

impl SchedulerFilter {
    pub fn matches(&self, v: u32) -> bool {
        self.atoms.iter().any(|a| a.matches(v))
    }

    /// Smallest matching value `>= from`, scanning the filter chain
    /// linearly and stepping by each atom's `step` inside its range,
    /// exactly as spec §4.3 describes.
    pub fn nearest_at_or_after(&self, from: u32) -> Option<u32> {
        self.atoms
            .iter()
            .filter_map(|a| a.nearest_at_or_after(from))
            .min()
    }
}

/// Coarsest calendar granularity a [`SchedulerInterval`] specifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    Day,
    Hour,
    Minute,
    Second,
}

/// One cron-like scheduler entry (spec §3, §4.2). `month_day` and `weekday`
/// are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerInterval {
    pub month_day: Option<SchedulerFilter>,
    pub weekday: Option<SchedulerFilter>,
    pub hour: Option<SchedulerFilter>,
    pub minute: Option<SchedulerFilter>,
    pub second: Option<SchedulerFilter>,
}

impl SchedulerInterval {
    pub fn granularity(&self) -> Granularity {
        if self.second.is_some() {
            Granularity::Second
        } else if self.minute.is_some() {
            Granularity::Minute
        } else if self.hour.is_some() {
            Granularity::Hour
        } else {
            Granularity::Day
        }
    }
}

/// Parsed `update interval` expression: a base delay plus override chains
/// (spec §3). `Macro` covers the `{$NAME[:context]}` placeholder form,
/// left unresolved for the caller to expand before scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Base {
    Seconds(u32),
    Macro(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomInterval {
    pub flexible: Vec<FlexibleInterval>,
    pub scheduler: Vec<SchedulerInterval>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateInterval {
    pub base: Base,
    pub custom: CustomInterval,
}
