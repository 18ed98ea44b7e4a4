//! Time source abstraction.
//!
//! The kernel consumes a monotonic clock for latency measurements (SCRAM's
//! 500 ms deadline) and a wall clock for persisted RFC 3339 timestamps.
//! The two must never be mixed — ledger entries need to stay reproducible
//! across timezones.

use std::time::Instant;

/// Time source consumed by every component that stamps a record.
pub trait Clock: Send + Sync {
    /// Current wall-clock time as an RFC 3339 / ISO 8601 UTC string.
    fn now_rfc3339(&self) -> String;

    /// A monotonic instant, used only for latency measurement (never
    /// persisted).
    fn monotonic_now(&self) -> Instant;
}

/// Default clock backed by `chrono::Utc` and `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        chrono::Utc::now().to_rfc3339()
    }

    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn system_clock_produces_rfc3339() {
        let clock = SystemClock;
        let stamp = clock.now_rfc3339();
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
    }

    #[test]
    fn monotonic_now_is_monotonic() {
        let clock = SystemClock;
        let a = clock.monotonic_now();
        let b = clock.monotonic_now();
        assert!(b >= a);
    }
}
