//! Dotted path names.
//!
//! A path such as `"Dictionary.definition.standalone"` is split once into its
//! segments and then resolved one segment at a time against nested policies.
//! Segments are stored inline for the common case of shallow paths.

use smallvec::SmallVec;

use crate::{PolicyError, PolicyResult};

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// Maximum number of segments stored inline (stack allocated).
const INLINE_SEGMENTS: usize = 4;

/// A validated dotted path.
///
/// # Example
///
/// ```rust
/// use stratum_policy::PolicyPath;
///
/// let path = PolicyPath::parse("a.b.c").unwrap();
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.prefix(2), "a.b");
/// assert_eq!(path.iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyPath<'a> {
    full: &'a str,
    segments: SmallVec<[&'a str; INLINE_SEGMENTS]>,
}

impl<'a> PolicyPath<'a> {
    /// Splits `path` into segments.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidName`] for an empty path or a path with
    /// an empty segment (leading, trailing or doubled separator).
    pub fn parse(path: &'a str) -> PolicyResult<Self> {
        if path.is_empty() {
            return Err(PolicyError::invalid_name(path, "empty path"));
        }

        let mut segments = SmallVec::new();
        for segment in path.split(SEPARATOR) {
            if segment.is_empty() {
                return Err(PolicyError::invalid_name(path, "empty path segment"));
            }
            segments.push(segment);
        }

        Ok(Self {
            full: path,
            segments,
        })
    }

    /// The full path as given.
    #[must_use]
    pub fn as_str(&self) -> &'a str {
        self.full
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always `false`: a parsed path has at least one segment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// All segments in order.
    #[must_use]
    pub fn segments(&self) -> &[&'a str] {
        &self.segments
    }

    /// Segment at `depth`, if any.
    #[must_use]
    pub fn segment(&self, depth: usize) -> Option<&'a str> {
        self.segments.get(depth).copied()
    }

    /// The last segment, naming the slot the path addresses.
    #[must_use]
    pub fn leaf(&self) -> &'a str {
        self.segments.last().copied().unwrap_or(self.full)
    }

    /// The path made of the first `depth` segments.
    #[must_use]
    pub fn prefix(&self, depth: usize) -> &'a str {
        let depth = depth.min(self.segments.len());
        if depth == 0 {
            return "";
        }
        let end = self.segments[..depth].iter().map(|s| s.len()).sum::<usize>() + depth - 1;
        &self.full[..end]
    }

    /// Iterates over the segments in order.
    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.segments.iter().copied()
    }
}

impl std::fmt::Display for PolicyPath<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.full)
    }
}

/// Returns `true` if `name` is usable as a single path segment.
#[must_use]
pub fn is_segment(name: &str) -> bool {
    !name.is_empty() && !name.contains(SEPARATOR)
}
