use std::path::Path;
use std::pin::pin;
use std::sync::Arc;
use std::time::SystemTime;

use futures::future::{Either, select};
use snafu::Snafu;
use snafu::prelude::*;
use supports_color::Stream;
use tracing::{debug, info};

use crate::application::history_view::render_record;
use crate::archive::{ArchiveError, HistoryArchive, follow};
use crate::cli::{Cli, Command, HistoryArgs, WatchArgs};
use crate::config::{ConfigError, SyncConfig};
use crate::ext::BestEffortPathExt;
use crate::filesystem::RelPath;
use crate::modification::Modification;
use crate::queue::TransactionalQueue;
use crate::remote::SshRemote;
use crate::scheduler::{DebounceTimers, Scheduler, SchedulerError};
use crate::watcher::{EventCoalescer, ExclusionError, ExclusionFilter, NotifyBackend, WatcherError};

/// Control directory inside the root; never mirrored.
pub const CONTROL_DIR: &str = ".rmirror";

pub struct Application;

impl Application {
    pub async fn run(cli: Cli) -> Result<(), ApplicationError> {
        match cli.command {
            Command::Watch(args) => Self::watch(args).await,
            Command::History(args) => Self::history(args).await,
        }
    }

    async fn watch(args: WatchArgs) -> Result<(), ApplicationError> {
        let root = std::fs::canonicalize(&args.root).context(RootSnafu {
            root: args.root.best_effort_path_display(),
        })?;

        let mut config = match args.config {
            Some(path) => SyncConfig::from_path(path).await,
            None => SyncConfig::read(&root).await,
        }
        .context(ConfigSnafu)?;
        if let Some(remote) = args.remote {
            config.override_remote(remote);
        }
        debug!("Loaded config: {:?}", config);

        let target = config.remote.clone().context(NoRemoteSnafu)?;
        let excludes = config
            .exclude
            .iter()
            .cloned()
            .chain(std::iter::once(CONTROL_DIR.to_string()))
            .collect::<Vec<_>>();
        let filter = ExclusionFilter::new(&excludes).context(ExclusionSnafu)?;

        info!(
            "Mirroring {} to {}:{}",
            root.best_effort_path_display(),
            target.host,
            target.root
        );
        let remote = SshRemote::new(target, root.clone(), excludes);
        remote.spawn_connectivity_monitor(config.probe_interval);

        let queue = Arc::new(TransactionalQueue::default());
        let (scheduler, sink) = Scheduler::new(
            queue,
            remote,
            root.clone(),
            DebounceTimers::new(config.quiet_period, config.max_latency),
        );
        let scheduler = if config.history {
            scheduler.with_archive(HistoryArchive::in_root(&root))
        } else {
            scheduler
        };

        if !args.no_initial_sync {
            sink.submit(Modification::updated(RelPath::root()));
        }

        let (backend, events) = NotifyBackend::open(&root).context(WatcherSnafu)?;
        let coalescer = EventCoalescer::new(config.rename_timeout);
        let watching = async move {
            coalescer
                .drive(events, &filter, |modification| sink.submit(modification))
                .await
        };

        let work = async { futures::join!(watching, scheduler.run()) };
        let shutdown = compio::signal::ctrl_c();
        let work = pin!(work);
        let shutdown = pin!(shutdown);
        let outcome = select(work, shutdown).await;
        backend.close();

        match outcome {
            Either::Left(((watched, scheduled), _)) => {
                watched.context(WatcherSnafu)?;
                scheduled.context(SchedulerSnafu)?;
            }
            Either::Right((signal, _)) => {
                signal.context(SignalSnafu)?;
                info!("Interrupted, stopping");
            }
        }
        Ok(())
    }

    async fn history(args: HistoryArgs) -> Result<(), ApplicationError> {
        let archive = HistoryArchive::in_root(&args.root);
        let now = SystemTime::now();
        let from = args.last.and_then(|last| now.checked_sub(last));

        let mut records = archive.read_range(from, None).await.context(ArchiveSnafu)?;
        if let Some(path) = args.follow {
            records = follow(&records, &followed_path(&args.root, &path));
        }

        colored::control::set_override(supports_color::on(Stream::Stdout).is_some());
        if records.is_empty() {
            println!("No recorded changes");
        }
        for record in &records {
            println!("{}", render_record(record, now));
        }
        Ok(())
    }
}

/// A trailing `/` marks a directory, which also covers directories that no
/// longer exist locally. Without one the local filesystem decides.
fn followed_path(root: &Path, raw: &str) -> RelPath {
    if raw.ends_with('/') {
        return RelPath::from_tagged_string(raw);
    }
    RelPath::new(raw, root.join(raw).is_dir())
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Cannot use {} as the mirrored root", root))]
    RootError {
        root: String,
        source: std::io::Error,
    },
    #[snafu(display("Critical failure encountered during configuration stage"))]
    ConfigError { source: ConfigError },
    #[snafu(display("No remote configured, set one in the config file or pass --remote"))]
    NoRemoteError,
    #[snafu(display("Invalid exclude pattern"))]
    ExclusionError { source: ExclusionError },
    #[snafu(display("Critical failure encountered while watching"))]
    WatcherError { source: WatcherError },
    #[snafu(display("Critical failure encountered while syncing"))]
    SchedulerError { source: SchedulerError },
    #[snafu(display("Failed to listen for the interrupt signal"))]
    SignalError { source: std::io::Error },
    #[snafu(display("Failed to read the history archive"))]
    ArchiveError { source: ArchiveError },
}
