use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use bincode::{Decode, Encode};
use derive_more::Display;
use snafu::Snafu;

/// Root-relative path of a watched entry.
///
/// `original` is the normalised `/`-joined form of `parts`, the non-empty
/// segments of the string reported by the watcher. The root has no parts. A file and
/// a directory with the same string are different entries.
#[derive(Debug, Clone, Display, Encode, Decode)]
#[display("{original}")]
pub struct RelPath {
    original: String,
    parts: Vec<String>,
    is_dir: bool,
}

impl RelPath {
    /// Empty and `.` segments are dropped, so `original` is always the
    /// `/`-join of `parts`.
    pub fn new(raw: impl AsRef<str>, is_dir: bool) -> Self {
        let parts = raw
            .as_ref()
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .map(str::to_string)
            .collect::<Vec<_>>();

        Self::from_parts(&parts, is_dir)
    }

    pub fn root() -> Self {
        Self::new("", true)
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn is_root(&self) -> bool {
        self.parts.is_empty()
    }

    /// Last segment, empty for the root.
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// The directory one level up. The root is its own parent.
    pub fn parent(&self) -> RelPath {
        match self.parts.split_last() {
            Some((_, ancestors)) => Self::from_parts(ancestors, true),
            None => Self::root(),
        }
    }

    /// True if `self` is `other`, or is a directory strictly containing it.
    pub fn is_parent_of(&self, other: &RelPath) -> bool {
        if self == other {
            return true;
        }
        self.is_dir
            && self.parts.len() < other.parts.len()
            && other.parts.starts_with(&self.parts)
    }

    /// Parent-or-child in either direction.
    pub fn relates(&self, other: &RelPath) -> bool {
        self.is_parent_of(other) || other.is_parent_of(self)
    }

    /// Rebases `self` from under `from` to under `to`. Moving `from` itself
    /// yields exactly `to`. Fails without touching `self` when `from` is not
    /// an ancestor of (or equal to) `self`.
    pub fn rebase(&mut self, from: &RelPath, to: &RelPath) -> Result<(), PathError> {
        if !from.is_parent_of(self) {
            return Err(PathError::NotMovable {
                path: self.original.clone(),
                from: from.original.clone(),
            });
        }

        if self == from {
            *self = to.clone();
            return Ok(());
        }

        let mut parts = to.parts.clone();
        parts.extend_from_slice(&self.parts[from.parts.len()..]);
        *self = Self::from_parts(&parts, self.is_dir);
        Ok(())
    }

    /// Location of this entry below a local root directory.
    pub fn to_local(&self, root: &Path) -> PathBuf {
        self.parts
            .iter()
            .fold(root.to_path_buf(), |path, part| path.join(part))
    }

    /// `a/b` for a file, `a/b/` for a directory, `/` for the root.
    pub fn to_tagged_string(&self) -> String {
        if self.is_dir {
            format!("{}/", self.original)
        } else {
            self.original.clone()
        }
    }

    pub fn from_tagged_string(tagged: &str) -> Self {
        match tagged.strip_suffix('/') {
            Some(stripped) => Self::new(stripped, true),
            None => Self::new(tagged, false),
        }
    }

    pub(crate) fn from_parts(parts: &[String], is_dir: bool) -> Self {
        Self {
            original: parts.join("/"),
            parts: parts.to_vec(),
            is_dir,
        }
    }
}

impl PartialEq for RelPath {
    fn eq(&self, other: &Self) -> bool {
        self.original == other.original && self.is_dir == other.is_dir
    }
}

impl Eq for RelPath {}

impl Hash for RelPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.original.hash(state);
        self.is_dir.hash(state);
    }
}

impl PartialOrd for RelPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RelPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.original
            .cmp(&other.original)
            .then(self.is_dir.cmp(&other.is_dir))
    }
}

#[derive(Debug, Snafu)]
pub enum PathError {
    #[snafu(display("Path '{}' is not inside '{}' and cannot be moved", path, from))]
    NotMovable { path: String, from: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    fn dir(raw: &str) -> RelPath {
        RelPath::new(raw, true)
    }

    fn file(raw: &str) -> RelPath {
        RelPath::new(raw, false)
    }

    #[test]
    fn splits_segments_and_keeps_root_empty() {
        assert_eq!(file("a/b/c.txt").parts(), ["a", "b", "c.txt"]);
        assert!(RelPath::root().parts().is_empty());
        assert!(RelPath::root().is_root());
        assert_eq!(dir("a/b/").as_str(), "a/b");
    }

    #[test]
    fn redundant_separators_do_not_create_distinct_paths() {
        let spelled = file("./a//b/./c");
        assert_eq!(spelled, file("a/b/c"));
        assert_eq!(spelled.as_str(), "a/b/c");
        assert_eq!(spelled.parts(), ["a", "b", "c"]);
        assert!(dir("a/").is_parent_of(&spelled));
    }

    #[test]
    fn file_and_directory_with_same_string_differ() {
        assert_ne!(file("a"), dir("a"));
        assert_eq!(file("a"), file("a"));
    }

    #[rstest]
    #[case(dir("a"), dir("a"), true)]
    #[case(file("a"), file("a"), true)]
    #[case(dir("a"), file("a/b"), true)]
    #[case(dir("a"), file("a/b/c"), true)]
    #[case(RelPath::root(), file("a"), true)]
    #[case(file("a"), file("a/b"), false)]
    #[case(dir("a"), file("ab"), false)]
    #[case(dir("a/b"), dir("a"), false)]
    #[case(dir("a"), file("a"), false)]
    fn parent_relationship(#[case] parent: RelPath, #[case] child: RelPath, #[case] expected: bool) {
        assert_eq!(parent.is_parent_of(&child), expected);
    }

    #[test]
    fn relates_is_symmetric() {
        assert!(dir("a").relates(&file("a/b")));
        assert!(file("a/b").relates(&dir("a")));
        assert!(!dir("a").relates(&dir("b")));
    }

    #[test]
    fn parent_of_root_is_root() {
        assert_eq!(RelPath::root().parent(), RelPath::root());
        assert_eq!(file("a/b").parent(), dir("a"));
        assert_eq!(file("a").parent(), RelPath::root());
    }

    #[test]
    fn rebase_substitutes_ancestor_prefix() {
        let mut path = file("a/b/c.txt");
        path.rebase(&dir("a/b"), &dir("x")).unwrap();
        assert_eq!(path, file("x/c.txt"));
    }

    #[test]
    fn rebase_of_moved_entry_itself_yields_target() {
        let mut path = file("a");
        path.rebase(&file("a"), &file("z/q")).unwrap();
        assert_eq!(path, file("z/q"));
    }

    #[test]
    fn rebase_outside_source_fails_and_keeps_path() {
        let mut path = file("b/c");
        let result = path.rebase(&dir("a"), &dir("x"));
        assert!(matches!(result, Err(PathError::NotMovable { .. })));
        assert_eq!(path, file("b/c"));
    }

    #[test]
    fn tagged_string_marks_directories() {
        assert_eq!(dir("a/b").to_tagged_string(), "a/b/");
        assert_eq!(file("a/b").to_tagged_string(), "a/b");
        assert_eq!(RelPath::from_tagged_string("a/b/"), dir("a/b"));
        assert_eq!(RelPath::from_tagged_string("/"), RelPath::root());
    }

    #[test]
    fn to_local_joins_segments() {
        let local = file("a/b.txt").to_local(Path::new("/srv/root"));
        assert_eq!(local, PathBuf::from("/srv/root/a/b.txt"));
    }
}
