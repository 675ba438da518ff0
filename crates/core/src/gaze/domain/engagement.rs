use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Hysteresis timings for entering and leaving engagement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementTimings {
    /// Continuous forward gaze required before engagement starts, in seconds.
    pub threshold_secs: f64,
    /// Lookaway tolerated while engaged before engagement ends, in seconds.
    pub lookaway_grace_secs: f64,
}

impl EngagementTimings {
    /// Sustain window as a `Duration`, or `None` if it is negative, NaN or too large.
    pub fn threshold(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.threshold_secs).ok()
    }

    /// Grace window as a `Duration`, or `None` if it is negative, NaN or too large.
    pub fn lookaway_grace(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.lookaway_grace_secs).ok()
    }
}

/// Clamp seconds into `Duration` range; NaN and negatives become zero.
fn saturating_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

impl Default for EngagementTimings {
    fn default() -> Self {
        Self {
            threshold_secs: 1.5,
            lookaway_grace_secs: 0.5,
        }
    }
}

/// Where the subject stands in the engagement cycle.
///
/// The pending timers live inside the variants, so at most one of them
/// exists at any time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngagementState {
    #[default]
    Idle,
    StaringPending {
        since: Instant,
    },
    Engaged,
    LookawayGrace {
        since: Instant,
    },
}

impl EngagementState {
    /// True while engaged, including the grace window after looking away.
    pub fn is_engaged(&self) -> bool {
        matches!(self, EngagementState::Engaged | EngagementState::LookawayGrace { .. })
    }
}

impl Default for EngagementStateMachine {
    fn default() -> Self {
        Self::new(EngagementTimings::default())
    }
}

/// Edge emitted by a state transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngagementEvent {
    Started,
    Ended,
}

#[derive(Debug)]
pub struct EngagementStateMachine {
    timings: EngagementTimings,
    threshold: Duration,
    grace: Duration,
    state: EngagementState,
}

impl EngagementStateMachine {
    /// Out-of-range timings saturate: an oversized window simply never elapses.
    pub fn new(timings: EngagementTimings) -> Self {
        Self {
            timings,
            threshold: saturating_secs(timings.threshold_secs),
            grace: saturating_secs(timings.lookaway_grace_secs),
            state: EngagementState::Idle,
        }
    }

    pub fn state(&self) -> EngagementState {
        self.state
    }

    pub fn timings(&self) -> EngagementTimings {
        self.timings
    }

    /// Advance with one stable prediction observed at `now`.
    ///
    /// Entering a pending state never fires on the same tick; the timer is
    /// checked from the following observation on.
    pub fn update(&mut self, forward: bool, now: Instant) -> Option<EngagementEvent> {
        use EngagementState::*;

        let (next, event) = match (self.state, forward) {
            (Idle, true) => (StaringPending { since: now }, None),
            (Idle, false) => (Idle, None),
            (StaringPending { since }, true) => {
                if now.saturating_duration_since(since) >= self.threshold {
                    (Engaged, Some(EngagementEvent::Started))
                } else {
                    (StaringPending { since }, None)
                }
            }
            (StaringPending { .. }, false) => (Idle, None),
            (Engaged, true) => (Engaged, None),
            (Engaged, false) => (LookawayGrace { since: now }, None),
            (LookawayGrace { .. }, true) => (Engaged, None),
            (LookawayGrace { since }, false) => {
                if now.saturating_duration_since(since) >= self.grace {
                    (Idle, Some(EngagementEvent::Ended))
                } else {
                    (LookawayGrace { since }, None)
                }
            }
        };

        self.state = next;
        event
    }

    /// Drop to Idle immediately; ends engagement without waiting out grace.
    pub fn face_lost(&mut self) -> Option<EngagementEvent> {
        let was_engaged = self.state.is_engaged();
        self.state = EngagementState::Idle;
        was_engaged.then_some(EngagementEvent::Ended)
    }
}
