//! Time source and per-call context

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{Address, ProtocolError, Result, Timestamp};

/// Source of the current timestamp
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time in seconds
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn set(&self, timestamp: Timestamp) {
        self.now.store(timestamp, Ordering::SeqCst);
    }

    /// Move forward by `seconds`; the clock is left untouched on overflow
    pub fn advance(&self, seconds: u64) -> Result<Timestamp> {
        self.now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| now.checked_add(seconds))
            .map(|previous| previous + seconds)
            .map_err(|now| {
                ProtocolError::invalid_input(format!(
                    "advancing {} seconds past {} overflows",
                    seconds, now
                ))
                .into()
            })
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Who is calling and when. Passed into every state-changing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub caller: Address,
    pub now: Timestamp,
}

impl Context {
    pub fn new(caller: Address, now: Timestamp) -> Self {
        Self { caller, now }
    }

    pub fn from_clock(caller: Address, clock: &dyn Clock) -> Self {
        Self {
            caller,
            now: clock.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);
        assert_eq!(clock.advance(50).unwrap(), 1_050);
        clock.set(10);
        assert_eq!(clock.now(), 10);
    }

    #[test]
    fn test_manual_clock_advance_overflow() {
        let clock = ManualClock::new(u64::MAX - 5);
        let err = clock.advance(6).unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");
        assert_eq!(clock.now(), u64::MAX - 5);
        assert_eq!(clock.advance(5).unwrap(), u64::MAX);
    }

    #[test]
    fn test_context_from_clock() {
        let clock = ManualClock::new(42);
        let ctx = Context::from_clock(Address::from_u64(7), &clock);
        assert_eq!(ctx.now, 42);
        assert_eq!(ctx.caller, Address::from_u64(7));
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
