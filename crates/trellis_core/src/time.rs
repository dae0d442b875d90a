//! Timestamps and the clock that stamps catalog versions.
//!
//! The compiler never reads the wall clock directly; it goes through a
//! [`Clock`] so that version stamping can be driven deterministically.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since the Unix epoch
    pub seconds: u64,
    /// Sub-second nanoseconds
    pub nanos: u32,
}

impl Timestamp {
    /// Maximum nanoseconds per second
    pub const NANOS_PER_SEC: u32 = 1_000_000_000;

    /// Create a new timestamp
    #[must_use]
    pub const fn new(seconds: u64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// Timestamp at whole seconds
    #[must_use]
    pub const fn from_secs(seconds: u64) -> Self {
        Self { seconds, nanos: 0 }
    }

    /// Current wall clock time
    ///
    /// Times before the Unix epoch clamp to zero.
    #[must_use]
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Convert a system time (e.g. a file modification time)
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            seconds: duration.as_secs(),
            nanos: duration.subsec_nanos(),
        }
    }

    /// The smallest timestamp strictly after this one
    #[must_use]
    pub const fn successor(&self) -> Self {
        if self.nanos + 1 >= Self::NANOS_PER_SEC {
            Self::from_secs(self.seconds + 1)
        } else {
            Self::new(self.seconds, self.nanos + 1)
        }
    }

    /// Convert to milliseconds
    #[must_use]
    pub const fn as_millis(&self) -> u128 {
        self.seconds as u128 * 1_000 + self.nanos as u128 / 1_000_000
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> Timestamp;
}

/// Clock backed by the system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Manually driven clock with whole-second resolution
#[derive(Debug, Default)]
pub struct ManualClock {
    seconds: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading `seconds`
    #[must_use]
    pub fn new(seconds: u64) -> Self {
        Self {
            seconds: AtomicU64::new(seconds),
        }
    }

    /// Set the current time
    pub fn set(&self, seconds: u64) {
        self.seconds.store(seconds, Ordering::SeqCst);
    }

    /// Advance by n seconds
    pub fn advance(&self, seconds: u64) {
        self.seconds.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs(self.seconds.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timestamp_ord() {
        let t1 = Timestamp::new(100, 500_000_000);
        let t2 = Timestamp::new(100, 600_000_000);
        let t3 = Timestamp::from_secs(101);
        assert!(t1 < t2);
        assert!(t2 < t3);
    }

    #[test]
    fn test_timestamp_from_system_time() {
        let t = Timestamp::from_system_time(UNIX_EPOCH + Duration::from_millis(1_500));
        assert_eq!(t.seconds, 1);
        assert_eq!(t.nanos, 500_000_000);
        assert_eq!(t.as_millis(), 1_500);
    }

    #[test]
    fn test_timestamp_successor() {
        assert_eq!(Timestamp::from_secs(3).successor(), Timestamp::new(3, 1));
        assert_eq!(
            Timestamp::new(3, 999_999_999).successor(),
            Timestamp::from_secs(4)
        );
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1);
        assert_eq!(clock.now(), Timestamp::from_secs(1));
        clock.set(5);
        clock.advance(2);
        assert_eq!(clock.now().seconds, 7);
    }

    #[test]
    fn test_timestamp_display() {
        assert_eq!(Timestamp::new(3, 42).to_string(), "3.000000042");
    }
}
