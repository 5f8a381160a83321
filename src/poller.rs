//! Fallback poll throttling.
//!
//! When the push transport is not connected, the session emulates push
//! delivery with periodic combined pulls (list + counts). `PollThrottle`
//! holds the rate-limit state for those pulls; it takes `Instant`s as
//! arguments instead of reading the clock so every rule is testable without
//! timers.

use std::time::{Duration, Instant};

/// Default interval between fallback polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Minimum gap between any two pulls, polled or ad hoc.
pub const MIN_PULL_GAP: Duration = Duration::from_secs(2);
/// How long after a push-sourced update polling stays quiet.
pub const PUSH_QUIET_WINDOW: Duration = Duration::from_secs(10);

/// Why a poll tick was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A pull is already running.
    InFlight,
    /// The previous pull finished too recently.
    TooSoon,
    /// The push transport delivered data moments ago; pulling now would be
    /// redundant work.
    PushQuiet,
}

/// Rate-limit state for fallback pulls.
#[derive(Debug, Clone)]
pub struct PollThrottle {
    min_gap: Duration,
    push_quiet: Duration,
    last_finished: Option<Instant>,
    last_push: Option<Instant>,
    in_flight: bool,
}

impl Default for PollThrottle {
    fn default() -> Self {
        Self::new(MIN_PULL_GAP, PUSH_QUIET_WINDOW)
    }
}

impl PollThrottle {
    pub fn new(min_gap: Duration, push_quiet: Duration) -> Self {
        Self {
            min_gap,
            push_quiet,
            last_finished: None,
            last_push: None,
            in_flight: false,
        }
    }

    /// Whether a pull may start now. `Ok(())` means go; the error names the
    /// rule that blocked it.
    pub fn check(&self, now: Instant) -> Result<(), SkipReason> {
        if self.in_flight {
            return Err(SkipReason::InFlight);
        }
        if let Some(at) = self.last_finished {
            if now.duration_since(at) < self.min_gap {
                return Err(SkipReason::TooSoon);
            }
        }
        if let Some(at) = self.last_push {
            if now.duration_since(at) < self.push_quiet {
                return Err(SkipReason::PushQuiet);
            }
        }
        Ok(())
    }

    /// Like [`check`](Self::check), but ignores the push-quiet window. Used
    /// for foreground/focus nudges, which only honor the minimum gap.
    pub fn check_adhoc(&self, now: Instant) -> Result<(), SkipReason> {
        if self.in_flight {
            return Err(SkipReason::InFlight);
        }
        if let Some(at) = self.last_finished {
            if now.duration_since(at) < self.min_gap {
                return Err(SkipReason::TooSoon);
            }
        }
        Ok(())
    }

    /// Note that a push-sourced update arrived.
    pub fn note_push(&mut self, now: Instant) {
        self.last_push = Some(now);
    }

    pub fn begin(&mut self) {
        self.in_flight = true;
    }

    pub fn finish(&mut self, now: Instant) {
        self.in_flight = false;
        self.last_finished = Some(now);
    }

    /// Forget all throttling history so an immediate pull is allowed, even
    /// if one just completed. Manual refreshes go through this.
    pub fn reset(&mut self) {
        self.last_finished = None;
        self.last_push = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle() -> PollThrottle {
        PollThrottle::new(Duration::from_secs(2), Duration::from_secs(10))
    }

    #[test]
    fn test_fresh_throttle_allows_pull() {
        let t = throttle();
        assert_eq!(t.check(Instant::now()), Ok(()));
    }

    #[test]
    fn test_in_flight_blocks() {
        let mut t = throttle();
        t.begin();
        assert_eq!(t.check(Instant::now()), Err(SkipReason::InFlight));
        t.finish(Instant::now());
        assert_ne!(t.check(Instant::now()), Err(SkipReason::InFlight));
    }

    #[test]
    fn test_min_gap_blocks_until_elapsed() {
        let mut t = throttle();
        let start = Instant::now();
        t.begin();
        t.finish(start);
        assert_eq!(t.check(start + Duration::from_secs(1)), Err(SkipReason::TooSoon));
        assert_eq!(t.check(start + Duration::from_secs(2)), Ok(()));
    }

    #[test]
    fn test_push_quiet_window_blocks() {
        let mut t = throttle();
        let start = Instant::now();
        t.note_push(start);
        assert_eq!(t.check(start + Duration::from_secs(5)), Err(SkipReason::PushQuiet));
        assert_eq!(t.check(start + Duration::from_secs(10)), Ok(()));
    }

    #[test]
    fn test_adhoc_ignores_push_quiet_but_honors_gap() {
        let mut t = throttle();
        let start = Instant::now();
        t.note_push(start);
        assert_eq!(t.check_adhoc(start), Ok(()));

        t.begin();
        t.finish(start);
        assert_eq!(t.check_adhoc(start + Duration::from_secs(1)), Err(SkipReason::TooSoon));
    }

    #[test]
    fn test_reset_allows_immediate_pull() {
        let mut t = throttle();
        let start = Instant::now();
        t.begin();
        t.finish(start);
        t.note_push(start);
        assert!(t.check(start + Duration::from_secs(1)).is_err());
        t.reset();
        assert_eq!(t.check(start + Duration::from_secs(1)), Ok(()));
    }

    #[test]
    fn test_reset_does_not_unblock_in_flight() {
        let mut t = throttle();
        t.begin();
        t.reset();
        assert_eq!(t.check(Instant::now()), Err(SkipReason::InFlight));
    }
}
