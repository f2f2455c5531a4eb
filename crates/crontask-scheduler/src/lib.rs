//! `crontask-scheduler` — the time-keyed cron dispatcher.
//!
//! # Overview
//!
//! Entries live in an in-memory map keyed by opaque handles. The
//! [`dispatcher::Dispatcher`] ticks once per second and spawns the callback
//! of every entry whose next-fire time has arrived, then recomputes that
//! entry's next occurrence from "now" — missed fires are never backfilled,
//! and a backwards clock jump leaves previously computed fire times
//! authoritative.
//!
//! # Accepted grammars
//!
//! | Form        | Example            |
//! |-------------|--------------------|
//! | 5-field     | `*/5 * * * *`      |
//! | 6-field     | `*/5 * * * * *`    |
//! | descriptor  | `@hourly`          |

pub mod dispatcher;
pub mod error;
pub mod schedule;

pub use dispatcher::{Dispatcher, EntryId, JobCallback};
pub use error::{Result, SchedulerError};
pub use schedule::{next_occurrence, parse_cron};
