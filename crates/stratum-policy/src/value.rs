//! Value variants stored in a policy.
//!
//! A [`Value`] is a closed sum of the six kinds a configuration field may
//! hold. Typed access goes through [`PolicyValue`], which pattern-matches on
//! the active variant and never converts between kinds.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{PolicyError, PolicyResult, SharedPolicy};

/// Discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Double,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
    /// Unresolved reference to an external file.
    File,
    /// Nested policy.
    Policy,
}

impl ValueKind {
    /// Stable display name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::String => "string",
            Self::File => "file",
            Self::Policy => "policy",
        }
    }

    /// Returns `true` for plain parameter kinds (everything except files and
    /// nested policies).
    #[must_use]
    pub const fn is_parameter(self) -> bool {
        !matches!(self, Self::File | Self::Policy)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A reference to external content identified by a path.
///
/// The path is never opened or validated here; resolving it is left to
/// whoever consumes the policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef {
    path: PathBuf,
}

impl FileRef {
    /// Creates a reference to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The referenced path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.path.display())
    }
}

/// One concrete configuration value.
///
/// Scalars are held by value. File references and nested policies are held
/// through shared handles: cloning a `Value` aliases them, while
/// [`Value::deep_copy`] produces independent copies.
#[derive(Clone)]
pub enum Value {
    /// Integer scalar.
    Int(i64),
    /// Floating point scalar.
    Double(f64),
    /// Boolean scalar.
    Bool(bool),
    /// String scalar.
    String(String),
    /// File reference.
    File(Arc<FileRef>),
    /// Nested policy.
    Policy(SharedPolicy),
}

impl Value {
    /// The kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Double(_) => ValueKind::Double,
            Self::Bool(_) => ValueKind::Bool,
            Self::String(_) => ValueKind::String,
            Self::File(_) => ValueKind::File,
            Self::Policy(_) => ValueKind::Policy,
        }
    }

    /// Display name of this value's kind.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Extracts a typed value, reporting `path` on a kind mismatch.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stratum_policy::{Value, ValueKind};
    ///
    /// let value = Value::from("true");
    /// assert_eq!(value.extract::<String>("doall").unwrap(), "true");
    /// assert!(value.extract::<bool>("doall").is_err());
    /// ```
    pub fn extract<T: PolicyValue>(&self, path: &str) -> PolicyResult<T> {
        T::from_value(self).ok_or_else(|| PolicyError::type_error(path, T::KIND, self.kind()))
    }

    /// Returns the integer, if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the double, if this is a `Double`.
    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean, if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string, if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the file reference, if this is a `File`.
    #[must_use]
    pub fn as_file(&self) -> Option<&Arc<FileRef>> {
        match self {
            Self::File(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the nested policy handle, if this is a `Policy`.
    #[must_use]
    pub fn as_policy(&self) -> Option<&SharedPolicy> {
        match self {
            Self::Policy(v) => Some(v),
            _ => None,
        }
    }

    /// Copies this value without sharing anything with the original.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        match self {
            Self::File(file) => Self::File(Arc::new(FileRef::clone(file))),
            Self::Policy(policy) => Self::Policy(policy.deep_copy()),
            scalar => scalar.clone(),
        }
    }

    /// JSON view of this value. File references become `"@path"` strings.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Double(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Bool(v) => serde_json::Value::Bool(*v),
            Self::String(v) => serde_json::Value::String(v.clone()),
            Self::File(file) => serde_json::Value::String(file.to_string()),
            Self::Policy(policy) => policy.read().to_json(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::File(a), Self::File(b)) => a == b,
            (Self::Policy(a), Self::Policy(b)) => a.ptr_eq(b) || *a.read() == *b.read(),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Self::Double(v) => f.debug_tuple("Double").field(v).finish(),
            Self::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Self::String(v) => f.debug_tuple("String").field(v).finish(),
            Self::File(v) => f.debug_tuple("File").field(&v.path()).finish(),
            Self::Policy(v) => f.debug_tuple("Policy").field(v).finish(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v:?}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::File(v) => write!(f, "{v}"),
            Self::Policy(v) => v.read().render(f, 0),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<FileRef> for Value {
    fn from(v: FileRef) -> Self {
        Self::File(Arc::new(v))
    }
}

impl From<Arc<FileRef>> for Value {
    fn from(v: Arc<FileRef>) -> Self {
        Self::File(v)
    }
}

impl From<crate::Policy> for Value {
    fn from(v: crate::Policy) -> Self {
        Self::Policy(SharedPolicy::new(v))
    }
}

impl From<SharedPolicy> for Value {
    fn from(v: SharedPolicy) -> Self {
        Self::Policy(v)
    }
}

/// Rust types that can be read out of a [`Value`] of one specific kind.
pub trait PolicyValue: Sized {
    /// The kind this type is read from.
    const KIND: ValueKind;

    /// Returns the typed value if `value` has kind [`Self::KIND`].
    fn from_value(value: &Value) -> Option<Self>;
}

impl PolicyValue for i64 {
    const KIND: ValueKind = ValueKind::Int;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl PolicyValue for f64 {
    const KIND: ValueKind = ValueKind::Double;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_double()
    }
}

impl PolicyValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl PolicyValue for String {
    const KIND: ValueKind = ValueKind::String;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl PolicyValue for Arc<FileRef> {
    const KIND: ValueKind = ValueKind::File;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_file().cloned()
    }
}

impl PolicyValue for SharedPolicy {
    const KIND: ValueKind = ValueKind::Policy;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_policy().cloned()
    }
}
