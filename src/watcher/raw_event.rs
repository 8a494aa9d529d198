/// Backend-agnostic kind of a raw filesystem event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    Create,
    Write,
    Delete,
    RenameFrom,
    RenameTo,
    /// Metadata-only or otherwise irrelevant notification.
    NoOp,
}

/// One event as delivered by a watcher backend, already relative to the
/// watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawEventKind,
    pub path: String,
    pub is_dir: bool,
}

impl RawEvent {
    pub fn new(kind: RawEventKind, path: impl Into<String>, is_dir: bool) -> Self {
        Self {
            kind,
            path: path.into(),
            is_dir,
        }
    }
}
