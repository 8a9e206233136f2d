use chrono::Utc;

use crate::domain::entities::Timestamp;
use crate::ports::outbound::TimeSource;

/// Default time source using the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}
