//! Root-relative paths and the tree of pending per-path changes.
//!
//! The tree mirrors only the part of the watched hierarchy that has
//! outstanding changes, so its size follows the change set, not the history.

mod path;
mod tree;

pub use path::{PathError, RelPath};
pub use tree::FilesystemTree;
