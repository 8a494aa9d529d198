use std::collections::BTreeMap;

use tracing::trace;

use crate::filesystem::RelPath;

/// One entry of the state tree. Children are owned by name; a node that is
/// neither updated nor has children is pruned as soon as it becomes dead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct StateNode {
    updated: bool,
    is_dir: bool,
    children: BTreeMap<String, StateNode>,
}

impl StateNode {
    fn directory() -> Self {
        Self {
            updated: false,
            is_dir: true,
            children: BTreeMap::new(),
        }
    }

    fn is_dead(&self) -> bool {
        !self.updated && self.children.is_empty()
    }

    /// Resolves `parts` below this node, materializing directories on the way.
    fn resolve_or_create(&mut self, parts: &[String]) -> &mut StateNode {
        parts.iter().fold(self, |current, part| {
            current.is_dir = true;
            current
                .children
                .entry(part.clone())
                .or_insert_with(StateNode::directory)
        })
    }

    /// Detaches the node at `parts`, pruning every ancestor below `self` that
    /// ends up dead.
    fn detach(&mut self, parts: &[String]) -> Option<StateNode> {
        let (first, rest) = parts.split_first()?;

        if rest.is_empty() {
            return self.children.remove(first);
        }

        let child = self.children.get_mut(first)?;
        let detached = child.detach(rest);
        if child.is_dead() {
            self.children.remove(first);
        }
        detached
    }

    /// True if the node at `parts`, or any node above it, is updated.
    fn covers(&self, parts: &[String]) -> bool {
        if self.updated {
            return true;
        }
        match parts.split_first() {
            Some((first, rest)) => self
                .children
                .get(first)
                .is_some_and(|child| child.covers(rest)),
            None => false,
        }
    }

    /// Collects the paths of updated nodes that have no updated ancestor.
    fn collect_updated_roots(&self, prefix: &mut Vec<String>, out: &mut Vec<RelPath>) {
        if self.updated {
            out.push(RelPath::from_parts(prefix, self.is_dir));
            return;
        }
        for (name, child) in &self.children {
            prefix.push(name.clone());
            child.collect_updated_roots(prefix, out);
            prefix.pop();
        }
    }
}

/// Tree of outstanding changes below the watched root.
///
/// It is exactly as large as the pending change set: updating a path marks
/// one node, and deleting or moving away the last mark below a directory
/// prunes that directory. An updated node covers all of its descendants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemTree {
    root: StateNode,
}

impl Default for FilesystemTree {
    fn default() -> Self {
        Self {
            root: StateNode::directory(),
        }
    }
}

impl FilesystemTree {
    pub fn update(&mut self, path: &RelPath) {
        let node = self.root.resolve_or_create(path.parts());
        node.updated = true;
        if !path.is_root() {
            node.is_dir = path.is_dir() || !node.children.is_empty();
        }
        trace!("Marked '{}' as updated", path);
    }

    pub fn delete(&mut self, path: &RelPath) {
        if path.is_root() {
            self.root = StateNode::directory();
            return;
        }
        if self.root.detach(path.parts()).is_some() {
            trace!("Dropped pending state below '{}'", path);
        }
    }

    /// Relocates the subtree at `from` to `to`, replacing whatever was
    /// pending at `to`. When `from` itself had no node but sits below an
    /// updated directory, the moved entry is carried as updated.
    pub fn relocate(&mut self, from: &RelPath, to: &RelPath) {
        let inherited = self.is_updated(from);
        let mut carried = self.root.detach(from.parts()).unwrap_or_else(|| StateNode {
            updated: false,
            is_dir: from.is_dir(),
            children: BTreeMap::new(),
        });
        carried.updated |= inherited;

        self.delete(to);
        if carried.is_dead() {
            return;
        }

        if to.is_root() {
            carried.is_dir = true;
            self.root = carried;
            return;
        }

        let parent = self.root.resolve_or_create(to.parent().parts());
        parent.children.insert(to.name().to_string(), carried);
        trace!("Moved pending state '{}' -> '{}'", from, to);
    }

    /// True if `path` or one of its ancestors is marked updated.
    pub fn is_updated(&self, path: &RelPath) -> bool {
        self.root.covers(path.parts())
    }

    /// One path per maximal updated subtree, in lexical order. With `flush`
    /// the tree is emptied afterwards.
    pub fn fetch_updated(&mut self, flush: bool) -> Vec<RelPath> {
        let mut updated = Vec::new();
        self.root.collect_updated_roots(&mut Vec::new(), &mut updated);
        if flush {
            self.root = StateNode::directory();
        }
        updated
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_dead()
    }
}
