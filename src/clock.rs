use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};

/// Source of "now" for every timestamp the engine produces.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Local calendar date a record taken at `at` belongs to.
    fn work_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&Local).date_naive()
    }

    fn today(&self) -> NaiveDate {
        self.work_date(self.now())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used by tests and the shift simulator.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += by;
    }

    pub fn advance_secs_f64(&self, secs: f64) {
        self.advance(Duration::milliseconds((secs * 1000.0).round() as i64));
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let clock = ManualClock::starting_at(start);
        clock.advance_secs_f64(12.5);
        assert_eq!(clock.now(), start + Duration::milliseconds(12_500));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
