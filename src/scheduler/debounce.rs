use std::time::{Duration, Instant};

/// Trailing quiet-period debounce capped by a maximum latency.
///
/// The quiet deadline moves with every modification; the latency deadline is
/// set by the first modification after the timers were cleared and stays put.
#[derive(Debug, Clone)]
pub struct DebounceTimers {
    quiet_period: Duration,
    max_latency: Duration,
    quiet_deadline: Option<Instant>,
    max_deadline: Option<Instant>,
}

impl DebounceTimers {
    pub fn new(quiet_period: Duration, max_latency: Duration) -> Self {
        Self {
            quiet_period,
            max_latency,
            quiet_deadline: None,
            max_deadline: None,
        }
    }

    pub fn on_modification(&mut self, now: Instant) {
        self.quiet_deadline = Some(now + self.quiet_period);
        self.max_deadline.get_or_insert(now + self.max_latency);
    }

    /// The earliest armed deadline.
    pub fn deadline(&self) -> Option<Instant> {
        match (self.quiet_deadline, self.max_deadline) {
            (Some(quiet), Some(max)) => Some(quiet.min(max)),
            (quiet, max) => quiet.or(max),
        }
    }

    pub fn clear(&mut self) {
        self.quiet_deadline = None;
        self.max_deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline().is_some()
    }
}
