//! Pending-change queues: the plain queue, the batches flushed from it, and
//! the transactional wrapper that keeps failed sync attempts lossless.

mod batch;
mod modifications_queue;
mod transactional_queue;

pub use batch::Batch;
pub use modifications_queue::ModificationsQueue;
pub use transactional_queue::{TransactionError, TransactionalQueue};
