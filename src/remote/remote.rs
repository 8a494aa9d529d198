use snafu::Snafu;

use crate::filesystem::RelPath;

/// Operations the scheduler needs from the remote side.
///
/// Each command either succeeds as a whole or fails; the scheduler decides
/// how to recover.
pub trait RemoteSync {
    /// Resolves once a control connection to the remote is established.
    async fn wait_ready(&self);
    /// Transfers the current local content of `paths` (directories
    /// recursively).
    async fn upload(&self, paths: &[RelPath]) -> Result<(), RemoteError>;
    async fn delete(&self, paths: &[RelPath]) -> Result<(), RemoteError>;
    async fn move_entry(&self, from: &RelPath, to: &RelPath) -> Result<(), RemoteError>;
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RemoteError {
    #[snafu(display("Failed to spawn '{}'", command))]
    SpawnError {
        command: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to wait for '{}'", command))]
    WaitError {
        command: String,
        source: std::io::Error,
    },
    #[snafu(display("'{}' failed with exit code {}", command, status))]
    UnsuccessfulExecution { command: String, status: i32 },
}
