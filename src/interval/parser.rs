//! Hand-rolled recursive-descent parser for the interval grammar in spec
//! §4.2. The codebase this crate is grounded on never reaches for `nom` or
//! `pest` for its own small DSLs — it walks the input with an explicit
//! cursor — so this parser does the same: a `Cursor` over the byte slice,
//! one `parse_*` function per grammar production, each returning
//! `Result<_, IntervalError>` with the offending substring captured on
//! failure.

use super::types::{
    Base, CustomInterval, FilterAtom, FlexibleInterval, Granularity, SchedulerFilter,
    SchedulerInterval, TimePeriod, UpdateInterval,
};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid {kind} interval: {span:?}")]
pub struct IntervalError {
    pub kind: IntervalErrorKind,
    pub span: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalErrorKind {
    Update,
    Flexible,
    Scheduling,
}

impl std::fmt::Display for IntervalErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IntervalErrorKind::Update => "update",
            IntervalErrorKind::Flexible => "flexible",
            IntervalErrorKind::Scheduling => "scheduling",
        };
        f.write_str(s)
    }
}

fn err(kind: IntervalErrorKind, span: &str) -> IntervalError {
    IntervalError { kind, span: span.to_string() }
}

/// Parses a full update-interval expression (spec §4.2) into a typed
/// [`UpdateInterval`].
pub fn parse_interval(input: &str) -> Result<UpdateInterval, IntervalError> {
    let segments: Vec<&str> = input.split(';').collect();
    let (base_str, rest) = segments.split_first().ok_or_else(|| err(IntervalErrorKind::Update, input))?;

    let base = parse_base(base_str)?;

    let mut custom = CustomInterval::default();
    for seg in rest {
        if seg.is_empty() {
            continue;
        }
        if seg.as_bytes()[0].is_ascii_digit() {
            custom.flexible.push(parse_flexible(seg)?);
        } else {
            custom.scheduler.push(parse_scheduler(seg)?);
        }
    }

    validate_base_range(&base, &custom)?;

    Ok(UpdateInterval { base, custom })
}

fn validate_base_range(base: &Base, custom: &CustomInterval) -> Result<(), IntervalError> {
    if let Base::Seconds(secs) = base {
        let has_custom = !custom.flexible.is_empty() || !custom.scheduler.is_empty();
        if *secs == 0 && !has_custom {
            return Err(err(IntervalErrorKind::Update, "0"));
        }
        if !has_custom && !(1..=86_400).contains(secs) {
            return Err(err(IntervalErrorKind::Update, &secs.to_string()));
        }
    }
    Ok(())
}

fn parse_base(s: &str) -> Result<Base, IntervalError> {
    if s.starts_with("{$") && s.ends_with('}') {
        return Ok(Base::Macro(s.to_string()));
    }
    Ok(Base::Seconds(parse_duration(s).map_err(|_| err(IntervalErrorKind::Update, s))?))
}

/// Parses `<integer>[s|m|h|d|w]` into seconds.
fn parse_duration(s: &str) -> Result<u32, ()> {
    if s.is_empty() {
        return Err(());
    }
    let (digits, suffix) = match s.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&s[..s.len() - 1], Some(c)),
        _ => (s, None),
    };
    let value: u32 = digits.parse().map_err(|_| ())?;
    let multiplier = match suffix {
        None | Some('s') => 1,
        Some('m') => 60,
        Some('h') => 3600,
        Some('d') => 86_400,
        Some('w') => 7 * 86_400,
        _ => return Err(()),
    };
    value.checked_mul(multiplier).ok_or(())
}

fn parse_flexible(s: &str) -> Result<FlexibleInterval, IntervalError> {
    let (delay_str, period_str) = s
        .split_once('/')
        .ok_or_else(|| err(IntervalErrorKind::Flexible, s))?;
    let delay = parse_duration(delay_str).map_err(|_| err(IntervalErrorKind::Flexible, s))?;
    let period = parse_time_period(period_str).map_err(|_| err(IntervalErrorKind::Flexible, s))?;
    Ok(FlexibleInterval { period, delay })
}

/// `dN[-dM],hh:mm-hh:mm`
fn parse_time_period(s: &str) -> Result<TimePeriod, ()> {
    let (days, times) = s.split_once(',').ok_or(())?;
    let (start_day, end_day) = match days.split_once('-') {
        Some((a, b)) => (a.parse::<u8>().map_err(|_| ())?, b.parse::<u8>().map_err(|_| ())?),
        None => {
            let d = days.parse::<u8>().map_err(|_| ())?;
            (d, d)
        }
    };
    let (start_str, end_str) = times.split_once('-').ok_or(())?;
    let start_time = parse_clock(start_str)?;
    let end_time = parse_clock(end_str)?;
    TimePeriod::new(start_day, end_day, start_time, end_time).ok_or(())
}

/// `hh:mm`, `24:00` permitted only as end-of-day.
fn parse_clock(s: &str) -> Result<u32, ()> {
    let (h, m) = s.split_once(':').ok_or(())?;
    let h: u32 = h.parse().map_err(|_| ())?;
    let m: u32 = m.parse().map_err(|_| ())?;
    if m > 59 {
        return Err(());
    }
    if h == 24 {
        if m != 0 {
            return Err(());
        }
        return Ok(86_400);
    }
    if h > 23 {
        return Err(());
    }
    Ok(h * 3600 + m * 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Level {
    Day,
    Hour,
    Minute,
    Second,
}

fn parse_scheduler(s: &str) -> Result<SchedulerInterval, IntervalError> {
    let mut cursor = s;
    let mut interval = SchedulerInterval::default();
    let mut last_level: Option<Level> = None;
    let mut day_kind: Option<&'static str> = None; // "md" or "wd", mutually exclusive

    while !cursor.is_empty() {
        let (token, field_width, level, is_md_or_wd) = if let Some(rest) = cursor.strip_prefix("md") {
            cursor = rest;
            ("md", 2, Level::Day, Some("md"))
        } else if let Some(rest) = cursor.strip_prefix("wd") {
            cursor = rest;
            ("wd", 1, Level::Day, Some("wd"))
        } else if let Some(rest) = cursor.strip_prefix('h') {
            cursor = rest;
            ("h", 2, Level::Hour, None)
        } else if let Some(rest) = cursor.strip_prefix('m') {
            cursor = rest;
            ("m", 2, Level::Minute, None)
        } else if let Some(rest) = cursor.strip_prefix('s') {
            cursor = rest;
            ("s", 2, Level::Second, None)
        } else {
            return Err(err(IntervalErrorKind::Scheduling, s));
        };

        if let Some(prev) = last_level {
            if level <= prev {
                return Err(err(IntervalErrorKind::Scheduling, s));
            }
        }
        last_level = Some(level);

        if let Some(kind) = is_md_or_wd {
            if let Some(existing) = day_kind {
                if existing != kind {
                    return Err(err(IntervalErrorKind::Scheduling, s));
                }
            }
            day_kind = Some(kind);
        }

        let (filter, remainder) = parse_filter(cursor, field_width)
            .map_err(|_| err(IntervalErrorKind::Scheduling, s))?;
        cursor = remainder;

        match token {
            "md" => interval.month_day = Some(filter),
            "wd" => interval.weekday = Some(filter),
            "h" => interval.hour = Some(filter),
            "m" => interval.minute = Some(filter),
            "s" => interval.second = Some(filter),
            _ => unreachable!(),
        }
    }

    if interval.month_day.is_none()
        && interval.weekday.is_none()
        && interval.hour.is_none()
        && interval.minute.is_none()
        && interval.second.is_none()
    {
        return Err(err(IntervalErrorKind::Scheduling, s));
    }

    Ok(interval)
}

/// `part ("," part)*` where `part = [from ["-" to] ["/" step]]`, consuming
/// up to `field_width` digits per number.
fn parse_filter(s: &str, field_width: usize) -> Result<(SchedulerFilter, &str), ()> {
    let mut cursor = s;
    let mut atoms = Vec::new();

    loop {
        let (from, rest) = take_digits(cursor, field_width)?;
        let from: u32 = from.parse().map_err(|_| ())?;

        let mut to = from;
        let mut rest = rest;
        if let Some(after_dash) = rest.strip_prefix('-') {
            let (to_str, r2) = take_digits(after_dash, field_width)?;
            to = to_str.parse().map_err(|_| ())?;
            rest = r2;
        }

        if from > to {
            return Err(());
        }

        let mut step = 1;
        if let Some(after_slash) = rest.strip_prefix('/') {
            let (step_str, r2) = take_digits(after_slash, usize::MAX)?;
            step = step_str.parse().map_err(|_| ())?;
            if step == 0 || step > to - from {
                return Err(());
            }
            rest = r2;
        }

        atoms.push(FilterAtom { start: from, end: to, step });
        cursor = rest;

        match cursor.strip_prefix(',') {
            Some(r) => cursor = r,
            None => break,
        }
    }

    Ok((SchedulerFilter { atoms }, cursor))
}

fn take_digits(s: &str, max: usize) -> Result<(&str, &str), ()> {
    let count = s.chars().take(max).take_while(|c| c.is_ascii_digit()).count();
    if count == 0 {
        return Err(());
    }
    Ok(s.split_at(count))
}

impl CustomInterval {
    /// Renders this structure back to the grammar in spec §4.2, sufficient
    /// to satisfy the round-trip property `parse(format(ci)) == ci`.
    pub fn format(&self, base: &Base) -> String {
        let mut out = match base {
            Base::Seconds(s) => s.to_string(),
            Base::Macro(m) => m.clone(),
        };
        for flex in &self.flexible {
            out.push(';');
            out.push_str(&format_flexible(flex));
        }
        for sched in &self.scheduler {
            out.push(';');
            out.push_str(&format_scheduler(sched));
        }
        out
    }
}

fn format_flexible(f: &FlexibleInterval) -> String {
    let p = f.period;
    let days = if p.start_day == p.end_day {
        p.start_day.to_string()
    } else {
        format!("{}-{}", p.start_day, p.end_day)
    };
    format!(
        "{}/{},{}-{}",
        f.delay,
        days,
        format_clock(p.start_time),
        format_clock(p.end_time)
    )
}

fn format_clock(secs: u32) -> String {
    if secs == 86_400 {
        return "24:00".to_string();
    }
    format!("{:02}:{:02}", secs / 3600, (secs % 3600) / 60)
}

fn format_scheduler(interval: &SchedulerInterval) -> String {
    let mut out = String::new();
    if let Some(md) = &interval.month_day {
        out.push_str("md");
        out.push_str(&format_filter(md));
    }
    if let Some(wd) = &interval.weekday {
        out.push_str("wd");
        out.push_str(&format_filter(wd));
    }
    if let Some(h) = &interval.hour {
        out.push('h');
        out.push_str(&format_filter(h));
    }
    if let Some(m) = &interval.minute {
        out.push('m');
        out.push_str(&format_filter(m));
    }
    if let Some(s) = &interval.second {
        out.push('s');
        out.push_str(&format_filter(s));
    }
    out
}

fn format_filter(f: &SchedulerFilter) -> String {
    f.atoms
        .iter()
        .map(|a| {
            if a.start == a.end {
                a.start.to_string()
            } else if a.step == 1 {
                format!("{}-{}", a.start, a.end)
            } else {
                format!("{}-{}/{}", a.start, a.end, a.step)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

impl SchedulerInterval {
    pub fn granularity_or(&self, default: Granularity) -> Granularity {
        if self.second.is_none() && self.minute.is_none() && self.hour.is_none() {
            default
        } else {
            self.granularity()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_base() {
        let ci = parse_interval("60").unwrap();
        assert_eq!(ci.base, Base::Seconds(60));
        assert!(ci.custom.flexible.is_empty());
    }

    #[test]
    fn parses_duration_suffix() {
        assert_eq!(parse_duration("1m").unwrap(), 60);
        assert_eq!(parse_duration("1h").unwrap(), 3600);
        assert_eq!(parse_duration("1d").unwrap(), 86_400);
        assert_eq!(parse_duration("1w").unwrap(), 7 * 86_400);
    }

    #[test]
    fn rejects_zero_base_without_custom() {
        assert!(parse_interval("0").is_err());
    }

    #[test]
    fn accepts_zero_base_with_scheduler() {
        let ci = parse_interval("0;h9m0").unwrap();
        assert_eq!(ci.base, Base::Seconds(0));
        assert_eq!(ci.custom.scheduler.len(), 1);
    }

    #[test]
    fn parses_flexible_window() {
        let ci = parse_interval("60;300/1-7,00:00-24:00").unwrap();
        let flex = &ci.custom.flexible[0];
        assert_eq!(flex.delay, 300);
        assert_eq!(flex.period.start_day, 1);
        assert_eq!(flex.period.end_day, 7);
        assert_eq!(flex.period.end_time, 86_400);
    }

    #[test]
    fn parses_scheduler_h9m0() {
        let ci = parse_interval("60;h9m0").unwrap();
        let sched = &ci.custom.scheduler[0];
        assert!(sched.hour.as_ref().unwrap().matches(9));
        assert!(sched.minute.as_ref().unwrap().matches(0));
        assert!(sched.second.is_none());
    }

    #[test]
    fn rejects_md_and_wd_together() {
        assert!(parse_interval("60;md1wd2").is_err());
    }

    #[test]
    fn rejects_out_of_order_levels() {
        assert!(parse_interval("60;m0h9").is_err());
        assert!(parse_interval("60;h9h10").is_err());
    }

    #[test]
    fn rejects_step_without_range() {
        assert!(parse_interval("60;h/5").is_err());
    }

    #[test]
    fn rejects_step_exceeding_range() {
        assert!(parse_interval("60;h1-2/5").is_err());
    }

    #[test]
    fn rejects_step_on_single_value_with_no_room_to_step() {
        // from == to means end - start == 0, so any explicit step > 0 is
        // out of bounds even though no "-" range was written.
        assert!(parse_interval("60;h9/5").is_err());
    }

    #[test]
    fn round_trip_simple() {
        let ci = parse_interval("60;300/1-7,00:00-24:00;h9m0,30").unwrap();
        let formatted = ci.custom.format(&ci.base);
        let reparsed = parse_interval(&formatted).unwrap();
        assert_eq!(format!("{:?}", reparsed.custom), format!("{:?}", ci.custom));
    }

    #[test]
    fn macro_base_is_opaque() {
        let ci = parse_interval("{$CHECK_INTERVAL}").unwrap();
        assert_eq!(ci.base, Base::Macro("{$CHECK_INTERVAL}".to_string()));
    }
}
