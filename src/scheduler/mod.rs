//! Debounced sync scheduling with retry and fallback recovery.

mod debounce;
mod scheduler;

pub use debounce::DebounceTimers;
pub use scheduler::{ModificationSink, Scheduler, SchedulerError};
