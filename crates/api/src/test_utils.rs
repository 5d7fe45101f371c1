//! Shared test utilities.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::test_utils::{ManualClock, test_start};
//!
//! let clock = Arc::new(ManualClock::new(test_start()));
//! let codes = CodeStore::new(TimeDelta::minutes(10), clock.clone());
//! clock.advance(TimeDelta::minutes(11));
//! ```

use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use crate::{clock::Clock, config::Config};

/// Fixed instant all clock-driven tests start from.
pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
}

/// Creates a test configuration with the default windows and TTLs.
pub fn test_config() -> Config {
    Config {
        env: "test".to_string(),
        ..Config::default()
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
