use parking_lot::Mutex;
use snafu::{Snafu, ensure};
use tracing::debug;

use crate::filesystem::RelPath;
use crate::modification::{InPlaceModification, Modification};
use crate::queue::{Batch, ModificationsQueue};

#[derive(Debug, Default)]
struct TransactionState {
    live: ModificationsQueue,
    backup: Option<ModificationsQueue>,
}

impl TransactionState {
    fn is_open(&self) -> bool {
        self.backup.is_some()
    }

    /// The only mutation path: write to the live queue, and mirror into the
    /// backup while a transaction is open.
    fn apply(&mut self, modification: Modification) {
        if let Some(backup) = self.backup.as_mut() {
            backup.add(modification.clone());
        }
        self.live.add(modification);
    }
}

/// Queue that can be flushed for a sync attempt and restored if the attempt
/// fails.
///
/// `begin` snapshots the live queue. Everything added afterwards goes to both
/// the live queue and the snapshot, so a `rollback` restores what the failed
/// attempt consumed together with whatever arrived while it ran.
#[derive(Debug, Default)]
pub struct TransactionalQueue {
    state: Mutex<TransactionState>,
}

impl TransactionalQueue {
    pub fn atomic_add(&self, modification: Modification) {
        debug!("Queueing {}", modification);
        self.state.lock().apply(modification);
    }

    pub fn begin(&self) -> Result<(), TransactionError> {
        let mut state = self.state.lock();
        ensure!(!state.is_open(), AlreadyOpenSnafu);
        state.backup = Some(state.live.clone());
        Ok(())
    }

    pub fn commit(&self) -> Result<(), TransactionError> {
        let mut state = self.state.lock();
        ensure!(state.is_open(), NotOpenSnafu);
        state.backup = None;
        Ok(())
    }

    pub fn rollback(&self) -> Result<(), TransactionError> {
        let mut state = self.state.lock();
        let backup = state.backup.take().ok_or(TransactionError::NotOpen)?;
        state.live = backup;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().is_open()
    }

    /// Only meaningful between attempts.
    pub fn is_empty(&self) -> Result<bool, TransactionError> {
        let state = self.state.lock();
        ensure!(!state.is_open(), OpenSnafu);
        Ok(state.live.is_empty())
    }

    /// Reading without `flush` is allowed between attempts only. A flushing
    /// read consumes changes and is only allowed inside a transaction, where
    /// the backup still holds them.
    pub fn get_updated(&self, flush: bool) -> Result<Vec<RelPath>, TransactionError> {
        let mut state = self.state.lock();
        Self::ensure_read_allowed(&state, flush)?;
        Ok(state.live.get_updated(flush))
    }

    pub fn get_in_place(&self, flush: bool) -> Result<Vec<InPlaceModification>, TransactionError> {
        let mut state = self.state.lock();
        Self::ensure_read_allowed(&state, flush)?;
        Ok(state.live.get_in_place(flush))
    }

    /// Flushes both stores under a single lock, so no modification can land
    /// between the two halves of the batch.
    pub fn flush_batch(&self) -> Result<Batch, TransactionError> {
        let mut state = self.state.lock();
        Self::ensure_read_allowed(&state, true)?;
        let in_place = state.live.get_in_place(true);
        let updated = state.live.get_updated(true);
        Ok(Batch::new(updated, in_place))
    }

    /// Copy of the live queue.
    pub fn snapshot(&self) -> ModificationsQueue {
        self.state.lock().live.clone()
    }

    fn ensure_read_allowed(state: &TransactionState, flush: bool) -> Result<(), TransactionError> {
        if flush {
            ensure!(state.is_open(), NotOpenSnafu);
        } else {
            ensure!(!state.is_open(), OpenSnafu);
        }
        Ok(())
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum TransactionError {
    #[snafu(display("A queue transaction is already open"))]
    AlreadyOpen,
    #[snafu(display("No queue transaction is open"))]
    NotOpen,
    #[snafu(display("Operation requires the queue to be at rest, but a transaction is open"))]
    Open,
}
