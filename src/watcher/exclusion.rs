use globset::{Glob, GlobSet, GlobSetBuilder};
use snafu::{ResultExt, Snafu};

use crate::filesystem::RelPath;

/// Glob-based exclusion, evaluated against root-relative paths.
///
/// A path is excluded when it, or any of its ancestors, matches one of the
/// patterns, so `.git` also drops everything below `.git/`.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    globs: GlobSet,
}

impl ExclusionFilter {
    pub fn new<I, S>(patterns: I) -> Result<Self, ExclusionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).context(PatternSnafu {
                pattern: pattern.to_string(),
            })?;
            builder.add(glob);
        }
        let globs = builder.build().context(BuildSnafu)?;
        Ok(Self { globs })
    }

    pub fn is_excluded(&self, path: &RelPath) -> bool {
        let parts = path.parts();
        (1..=parts.len()).any(|depth| self.globs.is_match(parts[..depth].join("/")))
    }
}

impl Default for ExclusionFilter {
    fn default() -> Self {
        Self {
            globs: GlobSet::empty(),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ExclusionError {
    #[snafu(display("Invalid exclusion pattern '{}'", pattern))]
    PatternError {
        pattern: String,
        source: globset::Error,
    },
    #[snafu(display("Failed to build exclusion set"))]
    BuildError { source: globset::Error },
}
