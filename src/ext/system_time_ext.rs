use std::time::{Duration, SystemTime};

/// Millisecond timestamps as stored in the history archive.
pub trait SystemTimeExt {
    fn unix_millis(&self) -> u64;
    fn from_unix_millis(millis: u64) -> Self;
}

impl SystemTimeExt for SystemTime {
    fn unix_millis(&self) -> u64 {
        self.duration_since(SystemTime::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }

    fn from_unix_millis(millis: u64) -> Self {
        SystemTime::UNIX_EPOCH + Duration::from_millis(millis)
    }
}
