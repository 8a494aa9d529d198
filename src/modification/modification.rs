use bincode::{Decode, Encode};
use derive_more::Display;
use tracing::debug;

use crate::filesystem::RelPath;
use crate::queue::ModificationsQueue;

/// A unit of change flowing from the watcher to the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Display, Encode, Decode)]
pub enum Modification {
    #[display("updated {path}")]
    Updated { path: RelPath },
    #[display("deleted {path}")]
    Deleted { path: RelPath },
    #[display("moved {from} -> {to}")]
    Moved { from: RelPath, to: RelPath },
}

/// Modifications that need an explicit, ordered remote command.
#[derive(Debug, Clone, PartialEq, Eq, Display, Encode, Decode)]
pub enum InPlaceModification {
    #[display("deleted {path}")]
    Deleted { path: RelPath },
    #[display("moved {from} -> {to}")]
    Moved { from: RelPath, to: RelPath },
}

impl Modification {
    pub fn updated(path: RelPath) -> Self {
        Modification::Updated { path }
    }

    pub fn deleted(path: RelPath) -> Self {
        Modification::Deleted { path }
    }

    pub fn moved(from: RelPath, to: RelPath) -> Self {
        Modification::Moved { from, to }
    }

    pub fn affected_paths(&self) -> Vec<&RelPath> {
        match self {
            Modification::Updated { path } | Modification::Deleted { path } => vec![path],
            Modification::Moved { from, to } => vec![from, to],
        }
    }

    /// Folds this modification into `queue`.
    ///
    /// Updates only mark the tree. Deletes and moves also land in the ordered
    /// in-place log, except for a rename onto itself (treated as an update)
    /// and a move into or out of its own subtree, which is split into a
    /// delete of the source and an update of the target.
    pub fn join(self, queue: &mut ModificationsQueue) {
        match self {
            Modification::Updated { path } => queue.tree_mut().update(&path),
            Modification::Deleted { path } => {
                queue.tree_mut().delete(&path);
                queue.push_in_place(InPlaceModification::Deleted { path });
            }
            Modification::Moved { from, to } if from == to => {
                Modification::Updated { path: from }.join(queue);
            }
            Modification::Moved { from, to } if from.relates(&to) => {
                debug!("Splitting move '{}' -> '{}' into delete and update", from, to);
                Modification::Deleted { path: from }.join(queue);
                Modification::Updated { path: to }.join(queue);
            }
            Modification::Moved { from, to } => {
                queue.tree_mut().relocate(&from, &to);
                queue.push_in_place(InPlaceModification::Moved { from, to });
            }
        }
    }
}

impl InPlaceModification {
    pub fn affected_paths(&self) -> Vec<&RelPath> {
        match self {
            InPlaceModification::Deleted { path } => vec![path],
            InPlaceModification::Moved { from, to } => vec![from, to],
        }
    }
}

impl From<InPlaceModification> for Modification {
    fn from(value: InPlaceModification) -> Self {
        match value {
            InPlaceModification::Deleted { path } => Modification::Deleted { path },
            InPlaceModification::Moved { from, to } => Modification::Moved { from, to },
        }
    }
}

/// Kind of a modification, for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ModificationKind {
    #[display("updated")]
    Updated,
    #[display("deleted")]
    Deleted,
    #[display("moved")]
    Moved,
}

impl From<&Modification> for ModificationKind {
    fn from(value: &Modification) -> Self {
        match value {
            Modification::Updated { .. } => ModificationKind::Updated,
            Modification::Deleted { .. } => ModificationKind::Deleted,
            Modification::Moved { .. } => ModificationKind::Moved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(raw: &str) -> RelPath {
        RelPath::new(raw, false)
    }

    fn dir(raw: &str) -> RelPath {
        RelPath::new(raw, true)
    }

    fn joined(modifications: Vec<Modification>) -> ModificationsQueue {
        let mut queue = ModificationsQueue::default();
        for modification in modifications {
            queue.add(modification);
        }
        queue
    }

    #[test]
    fn updated_join_is_idempotent() {
        let once = joined(vec![Modification::updated(file("a"))]);
        let twice = joined(vec![
            Modification::updated(file("a")),
            Modification::updated(file("a")),
        ]);
        assert_eq!(once, twice);
    }

    #[test]
    fn deleted_join_logs_command_and_drops_mark() {
        let mut queue = joined(vec![
            Modification::updated(file("a")),
            Modification::deleted(file("a")),
        ]);
        assert!(queue.get_updated(false).is_empty());
        assert_eq!(
            queue.get_in_place(false),
            vec![InPlaceModification::Deleted { path: file("a") }]
        );
    }

    #[test]
    fn identity_move_equals_update() {
        let moved = joined(vec![Modification::moved(file("a"), file("a"))]);
        let updated = joined(vec![Modification::updated(file("a"))]);
        assert_eq!(moved, updated);
    }

    #[test]
    fn move_into_own_subtree_splits_into_delete_and_update() {
        let moved = joined(vec![Modification::moved(dir("a"), file("a/child"))]);
        let split = joined(vec![
            Modification::deleted(dir("a")),
            Modification::updated(file("a/child")),
        ]);
        assert_eq!(moved, split);
    }

    #[test]
    fn move_out_to_ancestor_also_splits() {
        let moved = joined(vec![Modification::moved(file("a/b"), dir("a"))]);
        let split = joined(vec![
            Modification::deleted(file("a/b")),
            Modification::updated(dir("a")),
        ]);
        assert_eq!(moved, split);
    }

    #[test]
    fn general_move_relocates_and_logs() {
        let mut queue = joined(vec![
            Modification::updated(file("src/a")),
            Modification::moved(dir("src"), dir("dst")),
        ]);
        assert_eq!(queue.get_updated(false), vec![file("dst/a")]);
        assert_eq!(
            queue.get_in_place(false),
            vec![InPlaceModification::Moved {
                from: dir("src"),
                to: dir("dst"),
            }]
        );
    }

    #[test]
    fn affected_paths_lists_both_ends_of_move() {
        let modification = Modification::moved(file("a"), file("b"));
        assert_eq!(modification.affected_paths(), vec![&file("a"), &file("b")]);
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(
            Modification::moved(file("a"), file("b")).to_string(),
            "moved a -> b"
        );
        assert_eq!(ModificationKind::from(&Modification::deleted(file("a"))).to_string(), "deleted");
    }
}
