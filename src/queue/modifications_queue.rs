use crate::filesystem::{FilesystemTree, RelPath};
use crate::modification::{InPlaceModification, Modification};

/// Pending changes: a tree of updated paths plus the ordered log of deletes
/// and moves.
///
/// Updates are not stored positionally. Repeated updates of one path
/// collapse into a single tree mark, read back at flush time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModificationsQueue {
    tree: FilesystemTree,
    in_place: Vec<InPlaceModification>,
}

impl ModificationsQueue {
    pub fn add(&mut self, modification: Modification) {
        modification.join(self);
    }

    pub fn is_empty(&self) -> bool {
        self.in_place.is_empty() && self.tree.is_empty()
    }

    /// Root paths of every updated subtree. With `flush` the tree is cleared.
    pub fn get_updated(&mut self, flush: bool) -> Vec<RelPath> {
        self.tree.fetch_updated(flush)
    }

    /// The in-place log in arrival order. With `flush` the log is cleared.
    pub fn get_in_place(&mut self, flush: bool) -> Vec<InPlaceModification> {
        if flush {
            std::mem::take(&mut self.in_place)
        } else {
            self.in_place.clone()
        }
    }

    pub(crate) fn tree_mut(&mut self) -> &mut FilesystemTree {
        &mut self.tree
    }

    pub(crate) fn push_in_place(&mut self, modification: InPlaceModification) {
        self.in_place.push(modification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(raw: &str) -> RelPath {
        RelPath::new(raw, false)
    }

    #[test]
    fn fresh_queue_is_empty() {
        assert!(ModificationsQueue::default().is_empty());
    }

    #[test]
    fn single_update_flushes_once() {
        let mut queue = ModificationsQueue::default();
        queue.add(Modification::updated(file("a")));

        assert!(!queue.is_empty());
        assert_eq!(queue.get_updated(true), vec![file("a")]);
        assert!(queue.is_empty());
        assert!(queue.get_updated(true).is_empty());
    }

    #[test]
    fn move_onto_updated_path_leaves_single_update() {
        let mut queue = ModificationsQueue::default();
        queue.add(Modification::updated(file("a")));
        queue.add(Modification::updated(file("b")));
        queue.add(Modification::moved(file("b"), file("a")));

        assert_eq!(queue.get_updated(false), vec![file("a")]);
        assert_eq!(
            queue.get_in_place(false),
            vec![InPlaceModification::Moved {
                from: file("b"),
                to: file("a"),
            }]
        );
    }

    #[test]
    fn in_place_log_keeps_arrival_order() {
        let mut queue = ModificationsQueue::default();
        queue.add(Modification::moved(file("a"), file("b")));
        queue.add(Modification::moved(file("b"), file("c")));
        queue.add(Modification::deleted(file("c")));

        assert_eq!(
            queue.get_in_place(true),
            vec![
                InPlaceModification::Moved {
                    from: file("a"),
                    to: file("b"),
                },
                InPlaceModification::Moved {
                    from: file("b"),
                    to: file("c"),
                },
                InPlaceModification::Deleted { path: file("c") },
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn delete_after_update_is_not_empty_until_flushed() {
        let mut queue = ModificationsQueue::default();
        queue.add(Modification::updated(file("a")));
        queue.add(Modification::deleted(file("a")));

        assert!(!queue.is_empty());
        queue.get_in_place(true);
        assert!(queue.is_empty());
    }
}
