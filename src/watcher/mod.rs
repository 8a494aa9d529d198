//! Filesystem watching: the notify backend, exclusion filtering and the
//! coalescing state machine that turns raw events into modifications.

mod coalescer;
mod exclusion;
mod notify_backend;
mod raw_event;

use snafu::Snafu;

pub use coalescer::{DEFAULT_RENAME_TIMEOUT, EventCoalescer};
pub use exclusion::{ExclusionError, ExclusionFilter};
pub use notify_backend::{NotifyBackend, translate};
pub use raw_event::{RawEvent, RawEventKind};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WatcherError {
    #[snafu(display("Failed to start watching {}", root))]
    StartError { root: String, source: notify::Error },
    #[snafu(display("Watcher backend failure"))]
    BackendError { source: notify::Error },
    #[snafu(display("Unrecognized filesystem event: {}", description))]
    UnrecognizedEvent { description: String },
}
