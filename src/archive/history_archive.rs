use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bincode::{Decode, Encode};
use compio::fs;
use compio::io::AsyncWriteAtExt;
use snafu::{ResultExt, Snafu};
use tracing::{debug, trace};

use crate::ext::{BestEffortPathExt, SystemTimeExt};
use crate::filesystem::RelPath;
use crate::modification::Modification;

const HISTORY_FILE_PATH: &str = ".rmirror/history.bin.zst";
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ArchivedModification {
    pub recorded_at_ms: u64,
    pub modification: Modification,
}

impl ArchivedModification {
    pub fn recorded_at(&self) -> SystemTime {
        SystemTime::from_unix_millis(self.recorded_at_ms)
    }
}

/// Append-only log of synced batches. Each batch is one zstd frame holding
/// a bincode-encoded list of records.
#[derive(Debug, Clone)]
pub struct HistoryArchive {
    path: PathBuf,
}

impl HistoryArchive {
    pub fn in_root(root: &Path) -> Self {
        Self::at(root.join(HISTORY_FILE_PATH))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, modifications: &[Modification]) -> Result<(), ArchiveError> {
        self.append_at(modifications, SystemTime::now()).await
    }

    pub async fn append_at(
        &self,
        modifications: &[Modification],
        recorded_at: SystemTime,
    ) -> Result<(), ArchiveError> {
        if modifications.is_empty() {
            return Ok(());
        }

        let recorded_at_ms = recorded_at.unix_millis();
        let records = modifications
            .iter()
            .cloned()
            .map(|modification| ArchivedModification {
                recorded_at_ms,
                modification,
            })
            .collect::<Vec<_>>();

        let encoded = bincode::encode_to_vec(&records, bincode::config::standard())
            .context(EncodeSnafu)?;
        let frame = zstd::encode_all(&encoded[..], COMPRESSION_LEVEL).context(CompressSnafu)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.context(IoSnafu {
                path: parent.best_effort_path_display(),
            })?;
        }

        let path = self.path.best_effort_path_display();
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.path)
            .await
            .context(IoSnafu { path: path.clone() })?;
        let end = file
            .metadata()
            .await
            .context(IoSnafu { path: path.clone() })?
            .len();
        // Earlier frames are never rewritten, only the new frame hits disk
        file.write_all_at(frame, end)
            .await
            .0
            .context(IoSnafu { path: path.clone() })?;
        file.sync_data().await.context(IoSnafu { path })?;

        trace!("Archived {} modifications", records.len());
        Ok(())
    }

    /// Records with `from <= recorded_at <= to`. Open bounds are unlimited.
    pub async fn read_range(
        &self,
        from: Option<SystemTime>,
        to: Option<SystemTime>,
    ) -> Result<Vec<ArchivedModification>, ArchiveError> {
        let compressed = self.read_raw().await?;
        if compressed.is_empty() {
            return Ok(Vec::new());
        }

        let decompressed = zstd::decode_all(&compressed[..]).context(DecompressSnafu)?;
        let from_ms = from.map(|time| time.unix_millis()).unwrap_or(0);
        let to_ms = to.map(|time| time.unix_millis()).unwrap_or(u64::MAX);

        let mut records = Vec::new();
        let mut offset = 0;
        while offset < decompressed.len() {
            let (batch, consumed): (Vec<ArchivedModification>, usize) =
                bincode::decode_from_slice(&decompressed[offset..], bincode::config::standard())
                    .context(DecodeSnafu)?;
            offset += consumed;
            records.extend(
                batch
                    .into_iter()
                    .filter(|record| (from_ms..=to_ms).contains(&record.recorded_at_ms)),
            );
        }

        debug!("Read {} archived modifications", records.len());
        Ok(records)
    }

    async fn read_raw(&self) -> Result<Vec<u8>, ArchiveError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err).context(IoSnafu {
                path: self.path.best_effort_path_display(),
            }),
        }
    }
}

/// Keeps the records that touched `path`, following it through moves of the
/// path itself or of any of its ancestors.
pub fn follow(records: &[ArchivedModification], path: &RelPath) -> Vec<ArchivedModification> {
    let mut tracked = path.clone();
    records
        .iter()
        .filter(|record| match &record.modification {
            Modification::Updated { path } | Modification::Deleted { path } => {
                path.relates(&tracked)
            }
            Modification::Moved { from, to } => {
                let touches = from.relates(&tracked) || to.relates(&tracked);
                if from.is_parent_of(&tracked) {
                    // Cannot fail once `from` is known to contain the path
                    let _ = tracked.rebase(from, to);
                }
                touches
            }
        })
        .cloned()
        .collect()
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ArchiveError {
    #[snafu(display("Failed to access history archive: {}", path))]
    IoError {
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to encode history records"))]
    EncodeError { source: bincode::error::EncodeError },
    #[snafu(display("Failed to decode history records"))]
    DecodeError { source: bincode::error::DecodeError },
    #[snafu(display("Failed to compress history records"))]
    CompressError { source: std::io::Error },
    #[snafu(display("Failed to decompress history archive"))]
    DecompressError { source: std::io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn file(raw: &str) -> RelPath {
        RelPath::new(raw, false)
    }

    fn dir(raw: &str) -> RelPath {
        RelPath::new(raw, true)
    }

    fn at(millis: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_millis(millis)
    }

    fn record(millis: u64, modification: Modification) -> ArchivedModification {
        ArchivedModification {
            recorded_at_ms: millis,
            modification,
        }
    }

    #[compio::test]
    async fn missing_archive_reads_as_empty() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let archive = HistoryArchive::in_root(root.path());
        assert!(archive.read_range(None, None).await.unwrap().is_empty());
    }

    #[compio::test]
    async fn appended_batches_are_read_back_in_order() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let archive = HistoryArchive::in_root(root.path());

        archive
            .append_at(
                &[
                    Modification::deleted(file("old")),
                    Modification::updated(file("a")),
                ],
                at(1_000),
            )
            .await
            .unwrap();
        archive
            .append_at(&[Modification::moved(file("a"), file("b"))], at(2_000))
            .await
            .unwrap();

        assert!(archive.path().ends_with(".rmirror/history.bin.zst"));
        assert_eq!(
            archive.read_range(None, None).await.unwrap(),
            vec![
                record(1_000, Modification::deleted(file("old"))),
                record(1_000, Modification::updated(file("a"))),
                record(2_000, Modification::moved(file("a"), file("b"))),
            ]
        );
    }

    #[compio::test]
    async fn range_bounds_are_inclusive() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let archive = HistoryArchive::in_root(root.path());
        for (millis, name) in [(1_000, "a"), (2_000, "b"), (3_000, "c")] {
            archive
                .append_at(&[Modification::updated(file(name))], at(millis))
                .await
                .unwrap();
        }

        let ranged = archive
            .read_range(Some(at(2_000)), Some(at(3_000)))
            .await
            .unwrap();
        assert_eq!(
            ranged,
            vec![
                record(2_000, Modification::updated(file("b"))),
                record(3_000, Modification::updated(file("c"))),
            ]
        );
    }

    #[compio::test]
    async fn appending_leaves_earlier_frames_untouched() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let archive = HistoryArchive::in_root(root.path());

        archive
            .append_at(&[Modification::updated(file("a"))], at(1_000))
            .await
            .unwrap();
        let before = std::fs::read(archive.path()).unwrap();

        archive
            .append_at(&[Modification::deleted(dir("b"))], at(2_000))
            .await
            .unwrap();
        let after = std::fs::read(archive.path()).unwrap();

        assert!(after.len() > before.len());
        assert_eq!(&after[..before.len()], &before[..]);
        assert_eq!(archive.read_range(None, None).await.unwrap().len(), 2);
    }

    #[compio::test]
    async fn empty_batch_is_not_written() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let archive = HistoryArchive::in_root(root.path());
        archive.append(&[]).await.unwrap();
        assert!(!archive.path().exists());
    }

    #[test]
    fn follow_tracks_path_through_ancestor_moves() {
        let records = vec![
            record(1, Modification::updated(file("docs/readme.md"))),
            record(2, Modification::updated(file("src/lib.rs"))),
            record(3, Modification::moved(dir("docs"), dir("manual"))),
            record(4, Modification::updated(file("manual/readme.md"))),
            record(5, Modification::updated(file("docs/readme.md"))),
            record(6, Modification::moved(file("manual/readme.md"), file("README.md"))),
            record(7, Modification::deleted(file("README.md"))),
        ];

        let followed = follow(&records, &file("docs/readme.md"));
        let timestamps = followed
            .iter()
            .map(|record| record.recorded_at_ms)
            .collect::<Vec<_>>();
        assert_eq!(timestamps, vec![1, 3, 4, 6, 7]);
    }

    #[test]
    fn follow_keeps_changes_to_ancestors() {
        let records = vec![
            record(1, Modification::updated(RelPath::root())),
            record(2, Modification::deleted(dir("docs"))),
            record(3, Modification::updated(file("other"))),
        ];
        let followed = follow(&records, &file("docs/readme.md"));
        assert_eq!(followed.len(), 2);
    }
}
