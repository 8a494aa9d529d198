use std::time::{Duration, Instant};

use compio::time::timeout_at;
use futures::{Stream, StreamExt};
use tracing::{debug, trace, warn};

use crate::filesystem::RelPath;
use crate::modification::Modification;
use crate::watcher::{ExclusionFilter, RawEvent, RawEventKind, WatcherError};

/// Default wait for the second half of a rename.
pub const DEFAULT_RENAME_TIMEOUT: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, PartialEq, Eq)]
enum CoalescerState {
    Idle,
    PendingRename { from: RawEvent },
}

/// Turns raw backend events into modifications, pairing rename halves into
/// a single move.
#[derive(Debug)]
pub struct EventCoalescer {
    state: CoalescerState,
    rename_timeout: Duration,
}

impl EventCoalescer {
    pub fn new(rename_timeout: Duration) -> Self {
        Self {
            state: CoalescerState::Idle,
            rename_timeout,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, CoalescerState::PendingRename { .. })
    }

    /// Feeds one event. When a rename source is pending and `event` is not
    /// its counterpart, the orphaned source is reported as deleted and
    /// `event` is processed again from the idle state.
    pub fn on_event(&mut self, event: RawEvent) -> Vec<Modification> {
        match std::mem::replace(&mut self.state, CoalescerState::Idle) {
            CoalescerState::PendingRename { from } if event.kind == RawEventKind::RenameTo => {
                let to = RelPath::new(event.path, event.is_dir);
                vec![Modification::moved(RelPath::new(from.path, to.is_dir()), to)]
            }
            CoalescerState::PendingRename { from } => {
                debug!("Rename source '{}' has no counterpart", from.path);
                let mut emitted = vec![Self::orphaned(from)];
                emitted.extend(self.on_idle_event(event));
                emitted
            }
            CoalescerState::Idle => self.on_idle_event(event).into_iter().collect(),
        }
    }

    /// The rename wait ran out: the pending source left the watched tree.
    pub fn on_timeout(&mut self) -> Option<Modification> {
        match std::mem::replace(&mut self.state, CoalescerState::Idle) {
            CoalescerState::PendingRename { from } => Some(Self::orphaned(from)),
            CoalescerState::Idle => None,
        }
    }

    fn on_idle_event(&mut self, event: RawEvent) -> Option<Modification> {
        match event.kind {
            RawEventKind::Create | RawEventKind::Write | RawEventKind::RenameTo => Some(
                Modification::updated(RelPath::new(event.path, event.is_dir)),
            ),
            RawEventKind::Delete => Some(Modification::deleted(RelPath::new(
                event.path,
                event.is_dir,
            ))),
            RawEventKind::RenameFrom => {
                self.state = CoalescerState::PendingRename { from: event };
                None
            }
            RawEventKind::NoOp => None,
        }
    }

    fn orphaned(from: RawEvent) -> Modification {
        Modification::deleted(RelPath::new(from.path, from.is_dir))
    }

    /// Runs the state machine over `source` until it ends or reports an
    /// unrecognized event. Excluded paths never reach the state machine.
    ///
    /// The rename wait is a single deadline armed by the rename source, so
    /// events that do not resolve the rename never extend it.
    pub async fn drive<S, F>(
        mut self,
        mut source: S,
        filter: &ExclusionFilter,
        mut emit: F,
    ) -> Result<(), WatcherError>
    where
        S: Stream<Item = Result<RawEvent, WatcherError>> + Unpin,
        F: FnMut(Modification),
    {
        let mut rename_deadline: Option<Instant> = None;
        loop {
            let next = match rename_deadline {
                Some(deadline) => match timeout_at(deadline, source.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        trace!("Rename wait elapsed");
                        rename_deadline = None;
                        self.on_timeout().into_iter().for_each(&mut emit);
                        continue;
                    }
                },
                None => source.next().await,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(WatcherError::BackendError { source })) => {
                    warn!("Watcher backend reported an error: {}", source);
                    continue;
                }
                Some(Err(err)) => return Err(err),
                None => {
                    self.on_timeout().into_iter().for_each(&mut emit);
                    debug!("Watcher event source closed");
                    return Ok(());
                }
            };

            if filter.is_excluded(&RelPath::new(event.path.as_str(), event.is_dir)) {
                trace!("Ignoring excluded path '{}'", event.path);
                continue;
            }

            let starts_rename = event.kind == RawEventKind::RenameFrom;
            self.on_event(event).into_iter().for_each(&mut emit);
            rename_deadline = match (self.is_pending(), starts_rename) {
                (false, _) => None,
                (true, true) => Some(Instant::now() + self.rename_timeout),
                (true, false) => rename_deadline,
            };
        }
    }
}

impl Default for EventCoalescer {
    fn default() -> Self {
        Self::new(DEFAULT_RENAME_TIMEOUT)
    }
}
