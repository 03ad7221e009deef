//! Policy error types.

use thiserror::Error;

use crate::ValueKind;

/// Result type alias using [`PolicyError`].
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors raised by [`Policy`](crate::Policy) lookups and mutations.
///
/// Probing operations (`exists`, `value_count`, `is_*`) never return these;
/// they report a negative result instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// A path, or one of its intermediate segments, does not resolve.
    #[error("name not found: {path}")]
    NameNotFound {
        /// The path as given by the caller.
        path: String,
    },

    /// The stored value has a different kind than the one requested.
    #[error("type error at {path}: expected {expected}, found {found}")]
    TypeError {
        /// The path as given by the caller.
        path: String,
        /// The kind the caller asked for.
        expected: ValueKind,
        /// The kind actually stored.
        found: ValueKind,
    },

    /// Traversal reached a multi-valued slot while more path remained.
    #[error("cannot traverse {path}: slot holds {count} values")]
    AmbiguousPath {
        /// The path prefix naming the multi-valued slot.
        path: String,
        /// Number of values in that slot.
        count: usize,
    },

    /// The path itself is malformed.
    #[error("invalid name {path:?}: {reason}")]
    InvalidName {
        /// The path as given by the caller.
        path: String,
        /// Why the path was rejected.
        reason: &'static str,
    },

    /// A mutation reached a node that has been frozen.
    #[error("cannot modify {path}: policy is frozen")]
    Frozen {
        /// The path as given by the caller.
        path: String,
    },
}

impl PolicyError {
    /// Create a new name-not-found error.
    pub fn name_not_found(path: impl Into<String>) -> Self {
        Self::NameNotFound { path: path.into() }
    }

    /// Create a new type error.
    pub fn type_error(path: impl Into<String>, expected: ValueKind, found: ValueKind) -> Self {
        Self::TypeError {
            path: path.into(),
            expected,
            found,
        }
    }

    /// Create a new ambiguous-path error.
    pub fn ambiguous_path(path: impl Into<String>, count: usize) -> Self {
        Self::AmbiguousPath {
            path: path.into(),
            count,
        }
    }

    /// Create a new invalid-name error.
    pub fn invalid_name(path: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName {
            path: path.into(),
            reason,
        }
    }

    /// Create a new frozen-policy error.
    pub fn frozen(path: impl Into<String>) -> Self {
        Self::Frozen { path: path.into() }
    }

    /// Returns `true` for [`PolicyError::NameNotFound`].
    #[must_use]
    pub fn is_name_not_found(&self) -> bool {
        matches!(self, Self::NameNotFound { .. })
    }

    /// Returns `true` for [`PolicyError::TypeError`].
    #[must_use]
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::TypeError { .. })
    }

    /// Returns `true` for [`PolicyError::Frozen`].
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        matches!(self, Self::Frozen { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_not_found_error() {
        let err = PolicyError::name_not_found("a.b.c");
        assert!(err.is_name_not_found());
        assert!(err.to_string().contains("a.b.c"));
    }

    #[test]
    fn test_type_error_message() {
        let err = PolicyError::type_error("doall", ValueKind::Int, ValueKind::String);
        assert!(err.is_type_error());
        assert_eq!(
            err.to_string(),
            "type error at doall: expected int, found string"
        );
    }

    #[test]
    fn test_ambiguous_path_error() {
        let err = PolicyError::ambiguous_path("filters", 3);
        assert!(!err.is_type_error());
        assert!(err.to_string().contains("3 values"));
    }

    #[test]
    fn test_invalid_name_error() {
        let err = PolicyError::invalid_name("a..b", "empty path segment");
        assert!(err.to_string().contains("empty path segment"));
    }

    #[test]
    fn test_frozen_error() {
        let err = PolicyError::frozen("server.port");
        assert!(err.is_frozen());
        assert_eq!(err.to_string(), "cannot modify server.port: policy is frozen");
    }
}
