//! Time source for token expiry checks
//!
//! Everything that stamps or checks `valid_until` reads time through [`Clock`]
//! so tests can move time forward without sleeping.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Source of the current UTC time
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
///
/// # Example
///
/// ```rust
/// use chrono::{Duration, Utc};
/// use tokengate::clock::{Clock, ManualClock};
///
/// let start = Utc::now();
/// let clock = ManualClock::new(start);
/// clock.advance(Duration::hours(24));
/// assert_eq!(clock.now(), start + Duration::hours(24));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Jump to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
