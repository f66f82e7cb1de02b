use super::types::TimeStamp;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, PoisonError};

/// Source of block time for provenance timestamps.
pub trait HostClock: Send + Sync {
    fn now(&self) -> TimeStamp<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl HostClock for SystemClock {
    fn now(&self) -> TimeStamp<Utc> {
        TimeStamp::new()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Mutex::new(start))
    }
    pub fn set(&self, to: DateTime<Utc>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl HostClock for ManualClock {
    fn now(&self) -> TimeStamp<Utc> {
        (*self.0.lock().unwrap_or_else(PoisonError::into_inner)).into()
    }
}
