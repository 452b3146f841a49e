//! Election phase derived from the configured voting window.
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use strum::{AsRefStr, Display};

use crate::util;

pub trait TimeSource: Send + Sync {
    /// Seconds since the unix epoch.
    fn now(&self) -> f64;
}

pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> f64 {
        util::unix_now()
    }
}

/// A time source that only moves when told to. Testing only.
pub struct ManualTime {
    bits: AtomicU64,
}

impl ManualTime {
    pub fn new(now: f64) -> ManualTime {
        ManualTime {
            bits: AtomicU64::new(now.to_bits()),
        }
    }
    pub fn set(&self, now: f64) {
        self.bits.store(now.to_bits(), Ordering::SeqCst);
    }
    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

#[derive(Serialize, Display, AsRefStr, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Open,
    Closed,
}

/// Maps `(start_time, duration)` and the current time to a [`Phase`].
///
/// `Closed` is latched: once a clock has reported it, the clock keeps
/// reporting it even if the time source later moves backwards.
pub struct ElectionClock {
    start_time: f64,
    duration: f64,
    source: Arc<dyn TimeSource>,
    closed: AtomicBool,
}

impl ElectionClock {
    pub fn new(start_time: f64, duration: f64, source: Arc<dyn TimeSource>) -> ElectionClock {
        ElectionClock {
            start_time,
            duration,
            source,
            closed: AtomicBool::new(false),
        }
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    pub fn phase(&self) -> Phase {
        if self.closed.load(Ordering::SeqCst) {
            return Phase::Closed;
        }
        let now = self.source.now();
        if now >= self.end_time() {
            self.closed.store(true, Ordering::SeqCst);
            Phase::Closed
        } else if now < self.start_time {
            Phase::NotStarted
        } else {
            Phase::Open
        }
    }

    pub fn is_open(&self) -> bool {
        self.phase() == Phase::Open
    }

    pub fn is_closed(&self) -> bool {
        self.phase() == Phase::Closed
    }
}

impl fmt::Debug for ElectionClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElectionClock")
            .field("start_time", &self.start_time)
            .field("duration", &self.duration)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}
