use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in local wall-clock time split into its calendar date and time-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Moment {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Moment {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }
}

impl From<NaiveDateTime> for Moment {
    fn from(date_time: NaiveDateTime) -> Self {
        Self {
            date: date_time.date(),
            time: date_time.time(),
        }
    }
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time)
    }
}

/// Source of "now" for availability queries.
pub trait IntervalClock: Send + Sync {
    fn now(&self) -> Moment;
}

/// Reads the process-local wall clock without any time zone conversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl IntervalClock for LocalClock {
    fn now(&self) -> Moment {
        Local::now().naive_local().into()
    }
}

/// Always reports the same moment.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Moment);

impl IntervalClock for FixedClock {
    fn now(&self) -> Moment {
        self.0
    }
}
