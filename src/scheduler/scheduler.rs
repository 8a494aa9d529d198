use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use compio::time::timeout_at;
use futures::StreamExt;
use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, trace, warn};

use crate::archive::HistoryArchive;
use crate::filesystem::RelPath;
use crate::modification::{InPlaceModification, Modification};
use crate::queue::{Batch, TransactionError, TransactionalQueue};
use crate::remote::{RemoteError, RemoteSync};
use crate::scheduler::DebounceTimers;

/// Producer side of the scheduler: queues a modification and wakes the
/// debounce loop.
#[derive(Debug, Clone)]
pub struct ModificationSink {
    queue: Arc<TransactionalQueue>,
    notify: UnboundedSender<()>,
}

impl ModificationSink {
    pub fn submit(&self, modification: Modification) {
        self.queue.atomic_add(modification);
        // The scheduler is gone during shutdown; the change stays queued.
        let _ = self.notify.unbounded_send(());
    }
}

#[derive(Debug)]
enum Trigger {
    Modification,
    Deadline,
    Closed,
}

#[derive(Debug)]
enum AttemptOutcome {
    Empty,
    Synced(Batch),
    Failed,
    FallbackFailed,
}

/// Drives sync attempts: debounces incoming modifications, flushes the queue
/// into batches, and recovers from failed attempts.
pub struct Scheduler<R: RemoteSync> {
    queue: Arc<TransactionalQueue>,
    remote: R,
    local_root: PathBuf,
    timers: DebounceTimers,
    notifications: UnboundedReceiver<()>,
    settled: Option<UnboundedSender<()>>,
    archive: Option<HistoryArchive>,
    last_failed: Option<Batch>,
}

impl<R: RemoteSync> Scheduler<R> {
    pub fn new(
        queue: Arc<TransactionalQueue>,
        remote: R,
        local_root: PathBuf,
        timers: DebounceTimers,
    ) -> (Self, ModificationSink) {
        let (notify, notifications) = mpsc::unbounded();
        let sink = ModificationSink {
            queue: queue.clone(),
            notify,
        };
        let scheduler = Self {
            queue,
            remote,
            local_root,
            timers,
            notifications,
            settled: None,
            archive: None,
            last_failed: None,
        };
        (scheduler, sink)
    }

    pub fn with_archive(mut self, archive: HistoryArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Receives a message every time a successful sync leaves the queue empty.
    pub fn with_settled_signal(mut self, settled: UnboundedSender<()>) -> Self {
        self.settled = Some(settled);
        self
    }

    /// Runs until every sink is dropped. Changes still pending at that point
    /// get one last sync.
    pub async fn run(mut self) -> Result<(), SchedulerError> {
        loop {
            match self.next_trigger().await {
                Trigger::Modification => {}
                Trigger::Deadline => self.sync().await?,
                Trigger::Closed => {
                    if self.timers.is_armed() {
                        self.sync().await?;
                    }
                    debug!("Modification sources closed, scheduler stopping");
                    return Ok(());
                }
            }
        }
    }

    async fn next_trigger(&mut self) -> Trigger {
        let next = match self.timers.deadline() {
            None => self.notifications.next().await,
            Some(deadline) => match timeout_at(deadline, self.notifications.next()).await {
                Ok(next) => next,
                Err(_) => return Trigger::Deadline,
            },
        };
        match next {
            Some(()) => {
                self.timers.on_modification(Instant::now());
                Trigger::Modification
            }
            None => Trigger::Closed,
        }
    }

    /// One sync round: attempts until a batch lands, the queue turns out
    /// empty, or the fallback fails too.
    async fn sync(&mut self) -> Result<(), SchedulerError> {
        self.timers.clear();
        loop {
            self.remote.wait_ready().await;
            match self.attempt().await? {
                AttemptOutcome::Empty => return Ok(()),
                AttemptOutcome::Synced(batch) => {
                    self.on_synced(batch).await?;
                    return Ok(());
                }
                AttemptOutcome::Failed => continue,
                AttemptOutcome::FallbackFailed => {
                    self.timers.on_modification(Instant::now());
                    return Ok(());
                }
            }
        }
    }

    async fn attempt(&mut self) -> Result<AttemptOutcome, SchedulerError> {
        self.queue.begin().context(TransactionSnafu)?;
        let batch = self.queue.flush_batch().context(TransactionSnafu)?;
        if batch.is_empty() {
            self.queue.commit().context(TransactionSnafu)?;
            return Ok(AttemptOutcome::Empty);
        }

        let stalled = self.last_failed.as_ref() == Some(&batch);
        let result = if stalled {
            warn!("Retry made no progress, reconciling the batch path by path");
            self.apply_fallback(&batch).await
        } else {
            self.apply(&batch).await
        };

        match result {
            Ok(()) => {
                self.queue.commit().context(TransactionSnafu)?;
                self.last_failed = None;
                Ok(AttemptOutcome::Synced(batch))
            }
            Err(err) => {
                self.queue.rollback().context(TransactionSnafu)?;
                warn!("Sync attempt failed: {}", err);
                self.last_failed = Some(batch);
                Ok(if stalled {
                    AttemptOutcome::FallbackFailed
                } else {
                    AttemptOutcome::Failed
                })
            }
        }
    }

    async fn on_synced(&mut self, batch: Batch) -> Result<(), SchedulerError> {
        info!(
            "Synced {} updated, {} deleted, {} moved",
            batch.updated().len(),
            batch.deleted().count(),
            batch.moved().count()
        );

        if let Some(archive) = &self.archive
            && let Err(err) = archive.append(&batch.modifications()).await
        {
            warn!("Failed to archive synced batch: {}", err);
        }

        if self.queue.is_empty().context(TransactionSnafu)? {
            trace!("Queue settled");
            if let Some(settled) = &self.settled {
                let _ = settled.unbounded_send(());
            }
        }
        Ok(())
    }

    /// Replays the in-place log in order, sending runs of deletions as one
    /// command, then uploads the updated set.
    async fn apply(&self, batch: &Batch) -> Result<(), RemoteError> {
        let mut deletions = Vec::new();
        for modification in batch.in_place() {
            match modification {
                InPlaceModification::Deleted { path } => deletions.push(path.clone()),
                InPlaceModification::Moved { from, to } => {
                    self.delete_pending(&mut deletions).await?;
                    self.remote.move_entry(from, to).await?;
                }
            }
        }
        self.delete_pending(&mut deletions).await?;

        if !batch.updated().is_empty() {
            self.remote.upload(batch.updated()).await?;
        }
        Ok(())
    }

    async fn delete_pending(&self, deletions: &mut Vec<RelPath>) -> Result<(), RemoteError> {
        if deletions.is_empty() {
            return Ok(());
        }
        self.remote.delete(deletions).await?;
        deletions.clear();
        Ok(())
    }

    /// Ignores the command log and mirrors the current local state of every
    /// path the batch mentions.
    async fn apply_fallback(&self, batch: &Batch) -> Result<(), RemoteError> {
        let (present, absent): (Vec<_>, Vec<_>) = batch
            .mentioned_paths()
            .into_iter()
            .partition(|path| path.to_local(&self.local_root).symlink_metadata().is_ok());

        if !absent.is_empty() {
            self.remote.delete(&absent).await?;
        }
        if !present.is_empty() {
            self.remote.upload(&present).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum SchedulerError {
    #[snafu(display("Queue transaction used out of sequence"))]
    TransactionError { source: TransactionError },
}
