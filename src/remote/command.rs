use std::path::PathBuf;
use std::process::Stdio;

use compio::{io::compat::AsyncStream, process::Command, runtime::spawn};
use futures::{AsyncBufReadExt, StreamExt, io::BufReader};
use snafu::ResultExt;
use tracing::debug;

use crate::remote::{RemoteError, SpawnSnafu, WaitSnafu};

/// A transport command (ssh, rsync) with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl TransportCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Shell-like rendering for logs and errors.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs to completion, forwarding output lines to the log.
    pub async fn run(&self) -> Result<(), RemoteError> {
        let command = self.display();
        debug!("Running {}", command);

        let mut handle = self.create_command().spawn().context(SpawnSnafu {
            command: command.clone(),
        })?;

        if let Some(stdout) = handle.stdout.take() {
            Self::spawn_output_handler(AsyncStream::new(stdout), self.program.clone());
        }
        if let Some(stderr) = handle.stderr.take() {
            Self::spawn_output_handler(AsyncStream::new(stderr), self.program.clone());
        }

        let status = handle.wait().await.context(WaitSnafu {
            command: command.clone(),
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(RemoteError::UnsuccessfulExecution {
                command,
                status: status.code().unwrap_or(-1),
            })
        }
    }

    fn create_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        let _ = cmd.stdin(Stdio::null());
        let _ = cmd.stdout(Stdio::piped());
        let _ = cmd.stderr(Stdio::piped());
        cmd
    }

    fn spawn_output_handler<S>(stream: S, label: String)
    where
        S: futures::AsyncRead + Unpin + 'static,
    {
        spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            while let Some(line_result) = lines.next().await {
                match line_result {
                    Ok(line) if !line.trim().is_empty() => debug!("[{}] {}", label, line.trim()),
                    Ok(_) => {}
                    Err(e) => debug!("Error reading output of {}: {}", label, e),
                }
            }
        })
        .detach();
    }
}

/// Quotes `value` for a POSIX shell unless it only has safe characters.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
