//! Wall clock used for expiry decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" in seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ManualClock {
    now: AtomicU64,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new(now_secs: u64) -> Self {
        Self {
            now: AtomicU64::new(now_secs),
        }
    }

    pub(crate) fn set(&self, now_secs: u64) {
        self.now.store(now_secs, Ordering::SeqCst);
    }

    pub(crate) fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_on_request() {
        let clock = ManualClock::new(1_000);
        clock.advance(5);
        assert_eq!(clock.now_secs(), 1_005);
        clock.set(7);
        assert_eq!(clock.now_secs(), 7);
    }

    #[test]
    fn system_clock_is_past_2020() {
        assert!(SystemClock.now_secs() > 1_577_836_800);
    }
}
