use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use compio::runtime::spawn;
use tracing::{debug, trace};

use crate::config::RemoteTarget;
use crate::filesystem::RelPath;
use crate::remote::shell_quote;
use crate::remote::{Readiness, RemoteError, RemoteSync, TransportCommand};

const PROBE_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Remote replica reached through `ssh` for commands and `rsync` for content.
pub struct SshRemote {
    target: RemoteTarget,
    local_root: PathBuf,
    excludes: Vec<String>,
    readiness: Arc<Readiness>,
}

impl SshRemote {
    pub fn new(target: RemoteTarget, local_root: PathBuf, excludes: Vec<String>) -> Self {
        Self {
            target,
            local_root,
            excludes,
            readiness: Arc::new(Readiness::default()),
        }
    }

    /// Starts probing the remote every `interval`, publishing whether a
    /// connection can be established.
    pub fn spawn_connectivity_monitor(&self, interval: Duration) {
        let probe = self.probe_command();
        let readiness = self.readiness.clone();
        spawn(async move {
            loop {
                let reachable = match probe.run().await {
                    Ok(()) => true,
                    Err(err) => {
                        debug!("Connectivity probe failed: {}", err);
                        false
                    }
                };
                readiness.set(reachable);
                compio::time::sleep(interval).await;
            }
        })
        .detach();
    }

    fn ssh_options(&self) -> Vec<String> {
        let mut options = vec!["-o".to_string(), "BatchMode=yes".to_string()];
        if let Some(port) = self.target.port {
            options.push("-p".to_string());
            options.push(port.to_string());
        }
        options.extend(self.target.options.iter().cloned());
        options
    }

    fn ssh_command(&self, remote_script: String) -> TransportCommand {
        TransportCommand::new("ssh")
            .args(self.ssh_options())
            .arg("--")
            .arg(self.target.host.clone())
            .arg(remote_script)
    }

    fn probe_command(&self) -> TransportCommand {
        TransportCommand::new("ssh")
            .args(self.ssh_options())
            .arg("-o")
            .arg(format!("ConnectTimeout={PROBE_CONNECT_TIMEOUT_SECS}"))
            .arg(self.target.host.clone())
            .arg("true")
    }

    fn remote_path(&self, path: &RelPath) -> String {
        let root = self.target.root.trim_end_matches('/');
        if path.is_root() {
            if root.is_empty() { "/".to_string() } else { root.to_string() }
        } else {
            format!("{}/{}", root, path.as_str())
        }
    }

    fn upload_command(&self, paths: &[RelPath]) -> TransportCommand {
        let transport = std::iter::once("ssh".to_string())
            .chain(self.ssh_options())
            .map(|part| shell_quote(&part))
            .collect::<Vec<_>>()
            .join(" ");

        TransportCommand::new("rsync")
            .args(["-a", "--relative", "--delete", "-e"])
            .arg(transport)
            .args(self.excludes.iter().map(|pattern| format!("--exclude={pattern}")))
            .arg("--")
            .args(paths.iter().map(|path| {
                if path.is_root() {
                    ".".to_string()
                } else {
                    path.as_str().to_string()
                }
            }))
            .arg(format!(
                "{}:{}/",
                self.target.host,
                self.target.root.trim_end_matches('/')
            ))
            .current_dir(self.local_root.clone())
    }

    fn delete_command(&self, paths: &[RelPath]) -> TransportCommand {
        let targets = paths
            .iter()
            .map(|path| shell_quote(&self.remote_path(path)))
            .collect::<Vec<_>>()
            .join(" ");
        self.ssh_command(format!("rm -rf -- {targets}"))
    }

    fn move_command(&self, from: &RelPath, to: &RelPath) -> TransportCommand {
        let parent = shell_quote(&self.remote_path(&to.parent()));
        let source = shell_quote(&self.remote_path(from));
        let destination = shell_quote(&self.remote_path(to));
        self.ssh_command(format!(
            "mkdir -p -- {parent} && mv -f -T -- {source} {destination}"
        ))
    }
}

impl RemoteSync for SshRemote {
    async fn wait_ready(&self) {
        if !self.readiness.is_ready() {
            debug!("Waiting for a connection to {}", self.target.host);
        }
        self.readiness.wait().await;
    }

    async fn upload(&self, paths: &[RelPath]) -> Result<(), RemoteError> {
        if paths.is_empty() {
            return Ok(());
        }
        trace!("Uploading {} paths", paths.len());
        self.upload_command(paths).run().await
    }

    async fn delete(&self, paths: &[RelPath]) -> Result<(), RemoteError> {
        if paths.is_empty() {
            return Ok(());
        }
        trace!("Deleting {} paths", paths.len());
        self.delete_command(paths).run().await
    }

    async fn move_entry(&self, from: &RelPath, to: &RelPath) -> Result<(), RemoteError> {
        self.move_command(from, to).run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> SshRemote {
        SshRemote::new(
            RemoteTarget {
                host: "deploy@example.org".to_string(),
                root: "/srv/mirror/".to_string(),
                port: Some(2222),
                options: vec!["-i".to_string(), "/keys/id".to_string()],
            },
            PathBuf::from("/home/me/project"),
            vec![".git".to_string()],
        )
    }

    #[test]
    fn upload_runs_rsync_relative_from_local_root() {
        let command = remote().upload_command(&[
            RelPath::new("src/main.rs", false),
            RelPath::root(),
        ]);
        assert_eq!(
            command.get_args(),
            [
                "-a",
                "--relative",
                "--delete",
                "-e",
                "ssh -o BatchMode=yes -p 2222 -i /keys/id",
                "--exclude=.git",
                "--",
                "src/main.rs",
                ".",
                "deploy@example.org:/srv/mirror/",
            ]
        );
    }

    #[test]
    fn delete_quotes_remote_paths() {
        let command = remote().delete_command(&[RelPath::new("my notes.txt", false)]);
        assert_eq!(
            command.get_args().last().unwrap(),
            "rm -rf -- '/srv/mirror/my notes.txt'"
        );
        assert!(command.get_args().contains(&"deploy@example.org".to_string()));
    }

    #[test]
    fn move_creates_target_parent_first() {
        let command = remote().move_command(
            &RelPath::new("a.txt", false),
            &RelPath::new("docs/a.txt", false),
        );
        assert_eq!(
            command.get_args().last().unwrap(),
            "mkdir -p -- /srv/mirror/docs && mv -f -T -- /srv/mirror/a.txt /srv/mirror/docs/a.txt"
        );
    }

    #[test]
    fn probe_uses_connect_timeout() {
        let command = remote().probe_command();
        assert!(command.display().ends_with("-o ConnectTimeout=5 deploy@example.org true"));
    }

    #[test]
    fn remote_root_maps_to_configured_directory() {
        assert_eq!(remote().remote_path(&RelPath::root()), "/srv/mirror");
    }
}
