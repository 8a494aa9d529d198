use std::path::{Path, PathBuf};

use futures_channel::mpsc::{self, UnboundedReceiver};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use snafu::ResultExt;
use tracing::{debug, info};

use crate::ext::BestEffortPathExt;
use crate::watcher::{RawEvent, RawEventKind, StartSnafu, WatcherError};

/// Recursive OS watcher on the local root, delivering translated raw events.
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
    root: PathBuf,
}

impl NotifyBackend {
    pub fn open(
        root: &Path,
    ) -> Result<(Self, UnboundedReceiver<Result<RawEvent, WatcherError>>), WatcherError> {
        let (sender, receiver) = mpsc::unbounded();
        let callback_root = root.to_path_buf();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let translated = match res {
                Ok(event) => translate(&callback_root, event),
                Err(source) => vec![Err(WatcherError::BackendError { source })],
            };
            for item in translated {
                if sender.unbounded_send(item).is_err() {
                    return;
                }
            }
        })
        .context(StartSnafu {
            root: root.best_effort_path_display(),
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .context(StartSnafu {
                root: root.best_effort_path_display(),
            })?;
        info!("Watching {}", root.best_effort_path_display());

        Ok((
            Self {
                watcher,
                root: root.to_path_buf(),
            },
            receiver,
        ))
    }

    /// Releases the OS watch. The event receiver ends once the backend is gone.
    pub fn close(mut self) {
        if let Err(err) = self.watcher.unwatch(&self.root) {
            debug!("Failed to unwatch {}: {}", self.root.display(), err);
        }
    }
}

/// Maps one notify event to backend-agnostic raw events, one per path inside
/// `root`.
pub fn translate(root: &Path, event: Event) -> Vec<Result<RawEvent, WatcherError>> {
    let kind = match classify(&event.kind) {
        Ok(kind) => kind,
        Err(err) => return vec![Err(err)],
    };

    event
        .paths
        .iter()
        .filter_map(|absolute| {
            let relative = relative_path(root, absolute)?;
            let kind = match kind {
                Classified::Known(kind) => kind,
                Classified::ByExistence if absolute.exists() => RawEventKind::Write,
                Classified::ByExistence => RawEventKind::Delete,
            };
            let is_dir = match event.kind {
                EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => {
                    true
                }
                EventKind::Create(CreateKind::File) | EventKind::Remove(RemoveKind::File) => false,
                _ => absolute.symlink_metadata().is_ok_and(|meta| meta.is_dir()),
            };
            Some(Ok(RawEvent::new(kind, relative, is_dir)))
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum Classified {
    Known(RawEventKind),
    ByExistence,
}

fn classify(kind: &EventKind) -> Result<Classified, WatcherError> {
    let classified = match kind {
        EventKind::Create(_) => Classified::Known(RawEventKind::Create),
        EventKind::Remove(_) => Classified::Known(RawEventKind::Delete),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            Classified::Known(RawEventKind::RenameFrom)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            Classified::Known(RawEventKind::RenameTo)
        }
        // Both halves were already delivered separately
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            Classified::Known(RawEventKind::NoOp)
        }
        EventKind::Modify(ModifyKind::Name(_)) => Classified::ByExistence,
        EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Access(_) => {
            Classified::Known(RawEventKind::NoOp)
        }
        EventKind::Modify(_) => Classified::Known(RawEventKind::Write),
        EventKind::Any | EventKind::Other => {
            return Err(WatcherError::UnrecognizedEvent {
                description: format!("{kind:?}"),
            });
        }
    };
    Ok(classified)
}

fn relative_path(root: &Path, absolute: &Path) -> Option<String> {
    let relative = absolute.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>();
    Some(parts.join("/"))
}
