//! Cooperative cancellation
//!
//! [`EarlyTermination`] is the run-wide stop signal; [`Watchdog`] bounds a single
//! unit of work by a deadline and by that signal. Both stop work cooperatively by
//! cancelling a token the work is expected to honor. A unit that ignores its token
//! past the watchdog's grace period has its task aborted.

mod termination;
mod watchdog;

pub use termination::EarlyTermination;
pub use watchdog::{UnitState, Watchdog, WatchdogError};
