//! Tick-driven autosave timing.
//!
//! The scheduler owns no tasks and does no I/O: the host calls
//! [`poll`](AutosaveScheduler::poll) once per tick and fires a save
//! whenever it returns true. All timing state lives here so interval
//! edits can preserve the remaining countdown instead of restarting it.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::{MAX_SAVE_INTERVAL_SECS, MIN_SAVE_INTERVAL_SECS};

/// Force a requested period into the representable range. NaN and
/// infinity count as "as long as possible", not as errors.
fn clamp_interval_secs(secs: f32) -> f32 {
    if secs.is_finite() {
        secs.clamp(MIN_SAVE_INTERVAL_SECS, MAX_SAVE_INTERVAL_SECS)
    } else {
        MAX_SAVE_INTERVAL_SECS
    }
}

/// Decides when the next autosave fires.
#[derive(Debug)]
pub struct AutosaveScheduler {
    interval: Duration,
    next_fire: Instant,
    enabled: bool,
    streaming_disable: bool,
}

impl AutosaveScheduler {
    /// Build a scheduler whose first firing is one interval from `now`.
    /// The interval is clamped into
    /// [`MIN_SAVE_INTERVAL_SECS`]`..=`[`MAX_SAVE_INTERVAL_SECS`].
    pub fn new(interval_secs: f32, enabled: bool, streaming_disable: bool, now: Instant) -> Self {
        let interval = Duration::from_secs_f32(clamp_interval_secs(interval_secs));
        Self {
            interval,
            next_fire: now + interval,
            enabled,
            streaming_disable,
        }
    }

    pub fn interval_secs(&self) -> f32 {
        self.interval.as_secs_f32()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn streaming_disable(&self) -> bool {
        self.streaming_disable
    }

    pub fn set_streaming_disable(&mut self, disable: bool) {
        self.streaming_disable = disable;
    }

    pub fn next_fire(&self) -> Instant {
        self.next_fire
    }

    /// Change the interval, clamping into
    /// [`MIN_SAVE_INTERVAL_SECS`]`..=`[`MAX_SAVE_INTERVAL_SECS`].
    ///
    /// The deadline shifts by the interval delta so a timer most of the
    /// way to firing is not restarted. A shrink can pull the deadline
    /// into the past; it is floored at `now` so the countdown is never
    /// negative. Returns the clamped value actually applied.
    pub fn set_interval(&mut self, interval_secs: f32, now: Instant) -> f32 {
        let clamped = clamp_interval_secs(interval_secs);
        let new = Duration::from_secs_f32(clamped);
        let old = self.interval;

        self.next_fire = if new >= old {
            self.next_fire + (new - old)
        } else {
            self.next_fire
                .checked_sub(old - new)
                .filter(|t| *t >= now)
                .unwrap_or(now)
        };
        self.interval = new;
        clamped
    }

    /// True exactly when a save should fire at `now`; the deadline then
    /// advances by one interval. Firing requires the schedule to be
    /// enabled and not gated by streaming.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.enabled && !self.streaming_disable && now >= self.next_fire {
            self.next_fire = now + self.interval;
            true
        } else {
            false
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
