use std::collections::HashSet;

use crate::filesystem::RelPath;
use crate::modification::{InPlaceModification, Modification};

/// Immutable set of changes taken out of the queue for one sync attempt.
///
/// Two batches compare equal when they would issue the same commands, which
/// is how a retry that made no progress is detected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    updated: Vec<RelPath>,
    in_place: Vec<InPlaceModification>,
}

impl Batch {
    pub fn new(mut updated: Vec<RelPath>, in_place: Vec<InPlaceModification>) -> Self {
        updated.sort();
        Self { updated, in_place }
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.in_place.is_empty()
    }

    pub fn updated(&self) -> &[RelPath] {
        &self.updated
    }

    pub fn in_place(&self) -> &[InPlaceModification] {
        &self.in_place
    }

    pub fn deleted(&self) -> impl Iterator<Item = &RelPath> {
        self.in_place.iter().filter_map(|modification| match modification {
            InPlaceModification::Deleted { path } => Some(path),
            InPlaceModification::Moved { .. } => None,
        })
    }

    pub fn moved(&self) -> impl Iterator<Item = (&RelPath, &RelPath)> {
        self.in_place.iter().filter_map(|modification| match modification {
            InPlaceModification::Moved { from, to } => Some((from, to)),
            InPlaceModification::Deleted { .. } => None,
        })
    }

    /// Every path the batch touches, first occurrence wins, one entry per
    /// raw path string.
    pub fn mentioned_paths(&self) -> Vec<RelPath> {
        let mut seen = HashSet::new();
        self.in_place
            .iter()
            .flat_map(InPlaceModification::affected_paths)
            .chain(self.updated.iter())
            .filter(|path| seen.insert(path.as_str().to_string()))
            .cloned()
            .collect()
    }

    /// The batch as modifications: in-place commands in order, then updates.
    pub fn modifications(&self) -> Vec<Modification> {
        self.in_place
            .iter()
            .cloned()
            .map(Modification::from)
            .chain(self.updated.iter().cloned().map(Modification::updated))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(raw: &str) -> RelPath {
        RelPath::new(raw, false)
    }

    fn sample() -> Batch {
        Batch::new(
            vec![file("z"), file("b")],
            vec![
                InPlaceModification::Moved {
                    from: file("a"),
                    to: file("b"),
                },
                InPlaceModification::Deleted { path: file("c") },
            ],
        )
    }

    #[test]
    fn updated_paths_are_ordered_for_comparison() {
        let first = Batch::new(vec![file("b"), file("a")], Vec::new());
        let second = Batch::new(vec![file("a"), file("b")], Vec::new());
        assert_eq!(first, second);
    }

    #[test]
    fn partitions_in_place_log() {
        let batch = sample();
        assert_eq!(batch.deleted().collect::<Vec<_>>(), vec![&file("c")]);
        assert_eq!(batch.moved().collect::<Vec<_>>(), vec![(&file("a"), &file("b"))]);
    }

    #[test]
    fn mentioned_paths_are_deduplicated() {
        let paths = sample().mentioned_paths();
        assert_eq!(paths, vec![file("a"), file("b"), file("c"), file("z")]);
    }

    #[test]
    fn modifications_put_commands_before_updates() {
        let modifications = sample().modifications();
        assert_eq!(
            modifications,
            vec![
                Modification::moved(file("a"), file("b")),
                Modification::deleted(file("c")),
                Modification::updated(file("b")),
                Modification::updated(file("z")),
            ]
        );
    }

    #[test]
    fn empty_batch() {
        assert!(Batch::default().is_empty());
        assert!(!sample().is_empty());
    }
}
