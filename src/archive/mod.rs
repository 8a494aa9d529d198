mod history_archive;

pub use history_archive::{ArchiveError, ArchivedModification, HistoryArchive, follow};
