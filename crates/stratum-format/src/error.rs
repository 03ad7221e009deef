//! Format and loading error types.

use std::path::PathBuf;

use stratum_policy::PolicyError;
use thiserror::Error;

/// Result type alias using [`FormatError`].
pub type FormatResult<T> = Result<T, FormatError>;

/// Errors that can occur while recognizing, parsing or loading a policy.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Policy file not found.
    #[error("policy file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Failed to read a policy file.
    #[error("failed to read policy file: {path}")]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax error.
    #[error("failed to parse TOML policy: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax error.
    #[error("failed to parse JSON policy: {0}")]
    Json(#[from] serde_json::Error),

    /// Input that is syntactically valid but cannot be stored in a policy.
    /// Only raised by parsers running in strict mode.
    #[error("malformed {format} input: {message}")]
    Malformed {
        /// Name of the format being parsed.
        format: String,
        /// What was wrong.
        message: String,
    },

    /// No factory is registered under the requested format name.
    #[error("unknown policy format: {name}")]
    UnknownFormat {
        /// The requested format name.
        name: String,
    },

    /// No registered factory recognizes the input.
    #[error("unrecognized policy format in {origin}")]
    Unrecognized {
        /// Where the input came from.
        origin: String,
    },

    /// A parser's write into the policy was rejected.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Environment variable override could not be applied.
    #[error("failed to apply environment variable {var}: {reason}")]
    EnvParse {
        /// The environment variable name.
        var: String,
        /// Explanation of the failure.
        reason: String,
    },

    /// Loader settings failed validation.
    #[error("invalid loader settings: {0}")]
    InvalidSettings(String),

    /// A recognizer leader pattern did not compile.
    #[error("invalid leader pattern: {0}")]
    Leader(#[from] regex::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FormatError {
    /// Create a new file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a new read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Create a new malformed-input error.
    pub fn malformed(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Create a new unknown format error.
    pub fn unknown_format(name: impl Into<String>) -> Self {
        Self::UnknownFormat { name: name.into() }
    }

    /// Create a new unrecognized input error.
    pub fn unrecognized(origin: impl Into<String>) -> Self {
        Self::Unrecognized {
            origin: origin.into(),
        }
    }

    /// Create a new environment variable error.
    pub fn env_parse(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParse {
            var: var.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_error() {
        let err = FormatError::file_not_found("/path/to/policy.toml");
        assert!(err.to_string().contains("/path/to/policy.toml"));
    }

    #[test]
    fn test_malformed_error() {
        let err = FormatError::malformed("JSON", "root.items: null values are not supported");
        assert_eq!(
            err.to_string(),
            "malformed JSON input: root.items: null values are not supported"
        );
    }

    #[test]
    fn test_policy_error_is_transparent() {
        let err = FormatError::from(PolicyError::name_not_found("a.b"));
        assert_eq!(err.to_string(), "name not found: a.b");
    }

    #[test]
    fn test_env_parse_error() {
        let err = FormatError::env_parse("STRATUM__", "empty path");
        assert!(err.to_string().contains("STRATUM__"));
        assert!(err.to_string().contains("empty path"));
    }
}
