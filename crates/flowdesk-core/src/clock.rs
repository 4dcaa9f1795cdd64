//! Time source used for step timestamps and report job bookkeeping.

use chrono::{DateTime, Utc};

/// Source of wall-clock time.
///
/// Injected into the engine and the report store so tests can pin
/// timestamps and durations.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
