//! Check-scheduling engine and proxy data-exchange protocol core for a
//! distributed monitoring platform.
//!
//! This crate implements the pure, in-process logic of the monitoring
//! server/proxy pair: interval parsing and scheduling (when to evaluate an
//! item next), the proxy-side record buffer and batcher, session dedup,
//! configuration sync between server and proxy mirrors, connection
//! admission, the JSON wire envelopes, task dispatch, and the per-caller
//! item validators. Socket I/O, TLS termination, process lifecycle, and
//! concrete storage/metrics backends are the embedding application's
//! responsibility — this crate exposes traits at those seams.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod admission;
pub mod buffer;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod interval;
pub mod observability;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod syncconfig;
pub mod tasks;
pub mod time;
pub mod validators;
pub mod wire;

pub use error::{CoreError, CoreResult};
pub use interval::{parse_interval, CustomInterval, UpdateInterval};
pub use scheduler::{next_check, ItemType};
pub use time::{Clock, Timestamp};
