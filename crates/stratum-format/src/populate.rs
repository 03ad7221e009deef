//! Shared write path for the bundled parsers.
//!
//! Format modules walk their own document model and hand converted values to
//! a [`Populator`], which stores them and applies the strict/lenient rule to
//! anything that cannot be represented.

use stratum_policy::{FileRef, Policy, PolicyError, Value};

use crate::{FormatError, FormatResult};

/// Prefix marking a string value as a file reference.
pub(crate) const FILE_PREFIX: char = '@';

/// Converts a string scalar, turning `@path` into a file reference.
pub(crate) fn string_value(s: &str) -> Value {
    match s.strip_prefix(FILE_PREFIX) {
        Some(path) if !path.is_empty() => Value::from(FileRef::new(path)),
        _ => Value::from(s),
    }
}

/// Joins a parent path and a key for diagnostics.
pub(crate) fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

pub(crate) struct Populator {
    format: &'static str,
    strict: bool,
    stored: usize,
}

impl Populator {
    pub(crate) fn new(format: &'static str, strict: bool) -> Self {
        Self {
            format,
            strict,
            stored: 0,
        }
    }

    pub(crate) fn stored(&self) -> usize {
        self.stored
    }

    /// Fails in strict mode, logs and continues otherwise.
    pub(crate) fn reject(&self, path: &str, reason: &str) -> FormatResult<()> {
        if self.strict {
            return Err(FormatError::malformed(self.format, format!("{path}: {reason}")));
        }
        tracing::warn!(format = self.format, path, reason, "skipping malformed value");
        Ok(())
    }

    fn reject_write(&self, path: &str, error: PolicyError) -> FormatResult<()> {
        if self.strict {
            return Err(error.into());
        }
        tracing::warn!(format = self.format, path, error = %error, "skipping rejected value");
        Ok(())
    }

    /// Stores `values` under `key`: the first replaces any existing slot, the
    /// rest are appended.
    pub(crate) fn store(
        &mut self,
        policy: &mut Policy,
        key: &str,
        values: Vec<Value>,
        path: &str,
    ) -> FormatResult<()> {
        if values.is_empty() {
            tracing::debug!(format = self.format, path, "empty array stores nothing");
            return Ok(());
        }

        let mut first = true;
        for value in values {
            let result = if first {
                policy.set(key, value)
            } else {
                policy.add(key, value)
            };
            match result {
                Ok(()) => {
                    self.stored += 1;
                    first = false;
                }
                Err(error) => self.reject_write(path, error)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_policy::ValueKind;

    #[test]
    fn test_string_value_file_prefix() {
        assert_eq!(string_value("@defaults.toml").kind(), ValueKind::File);
        assert_eq!(string_value("@").kind(), ValueKind::String);
        assert_eq!(string_value("plain").kind(), ValueKind::String);
    }

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("", "a"), "a");
        assert_eq!(child_path("a.b", "c"), "a.b.c");
    }

    #[test]
    fn test_store_mixed_kinds_lenient() {
        let mut policy = Policy::new();
        let mut populator = Populator::new("TEST", false);
        populator
            .store(
                &mut policy,
                "k",
                vec![Value::from(1), Value::from("x"), Value::from(3)],
                "k",
            )
            .unwrap();

        assert_eq!(policy.get_int_array("k").unwrap(), vec![1, 3]);
        assert_eq!(populator.stored(), 2);
    }

    #[test]
    fn test_store_mixed_kinds_strict() {
        let mut policy = Policy::new();
        let mut populator = Populator::new("TEST", true);
        let err = populator
            .store(&mut policy, "k", vec![Value::from(1), Value::from("x")], "k")
            .unwrap_err();

        assert!(matches!(err, FormatError::Policy(e) if e.is_type_error()));
        assert_eq!(policy.value_count("k"), 1);
    }

    #[test]
    fn test_reject() {
        assert!(Populator::new("TEST", true).reject("a", "bad").is_err());
        assert!(Populator::new("TEST", false).reject("a", "bad").is_ok());
    }
}
