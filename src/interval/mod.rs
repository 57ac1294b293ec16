//! Update-interval parsing (spec §4.2): the typed model ([`types`]) and the
//! recursive-descent parser ([`parser`]) that produces it from the wire
//! grammar `BASE [";" (FLEX|SCHED)]*`.

pub mod parser;
pub mod types;

pub use parser::{parse_interval, IntervalError, IntervalErrorKind};
pub use types::{
    Base, CustomInterval, FilterAtom, FlexibleInterval, Granularity, SchedulerFilter,
    SchedulerInterval, TimePeriod, UpdateInterval,
};
