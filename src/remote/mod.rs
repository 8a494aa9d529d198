//! The remote side: the sync operations the scheduler relies on, the
//! connection readiness flag, and their implementation over ssh and rsync.

mod command;
mod readiness;
mod remote;
mod ssh;

pub use command::{TransportCommand, shell_quote};
pub use readiness::Readiness;
pub use remote::{RemoteError, RemoteSync};
pub(crate) use remote::{SpawnSnafu, WaitSnafu};
pub use ssh::SshRemote;
