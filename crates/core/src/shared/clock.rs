use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Time source for the engagement hysteresis timers.
///
/// Everything else in the pipeline is frame-index driven; only the stare and
/// lookaway timers read the clock.
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Host-driven clock: time only moves when [`ManualClock::advance`] or
/// [`ManualClock::set`] is called.
///
/// Clones share the same underlying offset, so a host can keep one handle
/// while the detector owns another. Used for replaying recorded footage at
/// its native timing and in tests.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    /// Jump to an absolute offset from the clock's origin.
    pub fn set(&self, elapsed: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset = elapsed;
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}
