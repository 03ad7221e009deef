//! The hierarchical policy store.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::path::{is_segment, PolicyPath, SEPARATOR};
use crate::{FileRef, PolicyError, PolicyResult, PolicyValue, SharedPolicy, Value, ValueKind};

/// The ordered, non-empty sequence of same-kind values under one name.
#[derive(Debug, Clone, PartialEq)]
struct Slot {
    kind: ValueKind,
    values: Vec<Value>,
}

impl Slot {
    fn new(value: Value) -> Self {
        Self {
            kind: value.kind(),
            values: vec![value],
        }
    }

    fn push(&mut self, value: Value, path: &str) -> PolicyResult<()> {
        if value.kind() != self.kind {
            return Err(PolicyError::type_error(path, self.kind, value.kind()));
        }
        self.values.push(value);
        Ok(())
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    /// The most recently added value.
    fn scalar(&self) -> &Value {
        &self.values[self.values.len() - 1]
    }

    fn single(&self) -> Option<&Value> {
        match self.values.as_slice() {
            [value] => Some(value),
            _ => None,
        }
    }

    fn deep_copy(&self) -> Self {
        Self {
            kind: self.kind,
            values: self.values.iter().map(Value::deep_copy).collect(),
        }
    }
}

/// A node of the configuration tree.
///
/// Each immediate child is a named slot holding one or more values of a
/// single [`ValueKind`]. Names are resolved as dotted paths: every segment
/// but the last must name a slot holding exactly one nested policy.
///
/// Reading a multi-valued slot through a scalar accessor returns the most
/// recently added value. Child names keep insertion order.
///
/// `Clone` is a shallow copy: top-level slots are duplicated, nested policies
/// and file references are shared with the source. [`Policy::deep_copy`]
/// shares nothing.
///
/// A policy can be made read-only with [`Policy::freeze`].
///
/// # Example
///
/// ```rust
/// use stratum_policy::Policy;
///
/// let mut policy = Policy::new();
/// policy.set("doall", "duh").unwrap();
/// policy.add("doall", "never").unwrap();
/// policy.set("Dictionary.definition.standalone.minOccurs", 1).unwrap();
///
/// assert_eq!(policy.value_count("doall"), 2);
/// assert_eq!(policy.get_string("doall").unwrap(), "never");
/// assert_eq!(policy.get_int("Dictionary.definition.standalone.minOccurs").unwrap(), 1);
/// assert!(policy.is_policy("Dictionary.definition"));
/// ```
/// Default relative tolerance of [`Policy::compare`].
pub const DEFAULT_RTOL: f64 = 1e-8;

/// Default absolute tolerance of [`Policy::compare`].
pub const DEFAULT_ATOL: f64 = 1e-8;

#[derive(Debug, Clone, Default)]
pub struct Policy {
    slots: IndexMap<String, Slot>,
    frozen: bool,
}

impl Policy {
    /// Creates an empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of immediate children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the policy has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    // ------------------------------------------------------------------
    // Probing
    // ------------------------------------------------------------------

    /// Returns `true` if `path` resolves to a slot.
    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.value_count(path) > 0
    }

    /// Number of values stored at `path`, or 0 if it does not resolve.
    #[must_use]
    pub fn value_count(&self, path: &str) -> usize {
        self.with_slot(path, |slot| Ok(slot.len())).unwrap_or(0)
    }

    /// Kind of the value at `path`, or `None` if it does not resolve.
    #[must_use]
    pub fn value_kind(&self, path: &str) -> Option<ValueKind> {
        self.with_slot(path, |slot| Ok(slot.kind)).ok()
    }

    /// Returns `true` if `path` holds values of `kind`.
    #[must_use]
    pub fn is_kind(&self, path: &str, kind: ValueKind) -> bool {
        self.value_kind(path) == Some(kind)
    }

    /// Returns `true` if `path` holds values readable as `T`.
    #[must_use]
    pub fn is<T: PolicyValue>(&self, path: &str) -> bool {
        self.is_kind(path, T::KIND)
    }

    /// Returns `true` if `path` holds integers.
    #[must_use]
    pub fn is_int(&self, path: &str) -> bool {
        self.is_kind(path, ValueKind::Int)
    }

    /// Returns `true` if `path` holds doubles.
    #[must_use]
    pub fn is_double(&self, path: &str) -> bool {
        self.is_kind(path, ValueKind::Double)
    }

    /// Returns `true` if `path` holds booleans.
    #[must_use]
    pub fn is_bool(&self, path: &str) -> bool {
        self.is_kind(path, ValueKind::Bool)
    }

    /// Returns `true` if `path` holds strings.
    #[must_use]
    pub fn is_string(&self, path: &str) -> bool {
        self.is_kind(path, ValueKind::String)
    }

    /// Returns `true` if `path` holds file references.
    #[must_use]
    pub fn is_file(&self, path: &str) -> bool {
        self.is_kind(path, ValueKind::File)
    }

    /// Returns `true` if `path` holds nested policies.
    #[must_use]
    pub fn is_policy(&self, path: &str) -> bool {
        self.is_kind(path, ValueKind::Policy)
    }

    /// Kind of the value at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::NameNotFound`] if `path` does not resolve.
    pub fn type_of(&self, path: &str) -> PolicyResult<ValueKind> {
        self.with_slot(path, |slot| Ok(slot.kind))
    }

    /// Display name of the kind at `path`.
    pub fn type_name(&self, path: &str) -> PolicyResult<&'static str> {
        self.type_of(path).map(ValueKind::name)
    }

    // ------------------------------------------------------------------
    // Typed reads
    // ------------------------------------------------------------------

    /// Reads the most recently added value at `path` as `T`.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::NameNotFound`] if `path` does not resolve.
    /// - [`PolicyError::TypeError`] if the stored kind is not `T::KIND`.
    pub fn get<T: PolicyValue>(&self, path: &str) -> PolicyResult<T> {
        self.with_slot(path, |slot| slot.scalar().extract(path))
    }

    /// Like [`get`](Self::get), but returns `default` when `path` is absent.
    ///
    /// Only [`PolicyError::NameNotFound`] falls back to `default`. A kind
    /// mismatch, a malformed path or an ambiguous intermediate segment is
    /// still an error, even though [`exists`](Self::exists) is `false` for
    /// the last two.
    pub fn get_or<T: PolicyValue>(&self, path: &str, default: T) -> PolicyResult<T> {
        match self.get(path) {
            Err(PolicyError::NameNotFound { .. }) => Ok(default),
            other => other,
        }
    }

    /// Reads every value at `path`, in insertion order.
    pub fn get_array<T: PolicyValue>(&self, path: &str) -> PolicyResult<Vec<T>> {
        self.with_slot(path, |slot| {
            slot.values.iter().map(|value| value.extract(path)).collect()
        })
    }

    /// Returns clones of the raw values at `path`, in insertion order.
    pub fn get_values(&self, path: &str) -> PolicyResult<Vec<Value>> {
        self.with_slot(path, |slot| Ok(slot.values.clone()))
    }

    /// Reads an integer.
    pub fn get_int(&self, path: &str) -> PolicyResult<i64> {
        self.get(path)
    }

    /// Reads an integer, falling back to `default` if absent.
    pub fn get_int_or(&self, path: &str, default: i64) -> PolicyResult<i64> {
        self.get_or(path, default)
    }

    /// Reads all integers at `path`.
    pub fn get_int_array(&self, path: &str) -> PolicyResult<Vec<i64>> {
        self.get_array(path)
    }

    /// Reads a double.
    pub fn get_double(&self, path: &str) -> PolicyResult<f64> {
        self.get(path)
    }

    /// Reads a double, falling back to `default` if absent.
    pub fn get_double_or(&self, path: &str, default: f64) -> PolicyResult<f64> {
        self.get_or(path, default)
    }

    /// Reads all doubles at `path`.
    pub fn get_double_array(&self, path: &str) -> PolicyResult<Vec<f64>> {
        self.get_array(path)
    }

    /// Reads a boolean.
    pub fn get_bool(&self, path: &str) -> PolicyResult<bool> {
        self.get(path)
    }

    /// Reads a boolean, falling back to `default` if absent.
    pub fn get_bool_or(&self, path: &str, default: bool) -> PolicyResult<bool> {
        self.get_or(path, default)
    }

    /// Reads all booleans at `path`.
    pub fn get_bool_array(&self, path: &str) -> PolicyResult<Vec<bool>> {
        self.get_array(path)
    }

    /// Reads a string.
    pub fn get_string(&self, path: &str) -> PolicyResult<String> {
        self.get(path)
    }

    /// Reads a string, falling back to `default` if absent.
    pub fn get_string_or(&self, path: &str, default: impl Into<String>) -> PolicyResult<String> {
        self.get_or(path, default.into())
    }

    /// Reads all strings at `path`.
    pub fn get_string_array(&self, path: &str) -> PolicyResult<Vec<String>> {
        self.get_array(path)
    }

    /// Returns the file reference at `path`. The file is not opened.
    pub fn get_file(&self, path: &str) -> PolicyResult<Arc<FileRef>> {
        self.get(path)
    }

    /// Returns all file references at `path`.
    pub fn get_file_array(&self, path: &str) -> PolicyResult<Vec<Arc<FileRef>>> {
        self.get_array(path)
    }

    /// Returns an aliasing handle to the nested policy at `path`.
    ///
    /// Mutations through the handle are visible through this policy and
    /// through every shallow copy sharing the node.
    pub fn get_policy(&self, path: &str) -> PolicyResult<SharedPolicy> {
        self.get(path)
    }

    /// Returns aliasing handles to all nested policies at `path`.
    pub fn get_policy_array(&self, path: &str) -> PolicyResult<Vec<SharedPolicy>> {
        self.get_array(path)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Replaces the slot at `path` with the single value `value`.
    ///
    /// The new value may have a different kind than the old slot. Missing
    /// intermediate policies are created.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::InvalidName`] for a malformed path.
    /// - [`PolicyError::TypeError`] if an intermediate segment holds
    ///   something other than a policy.
    /// - [`PolicyError::AmbiguousPath`] if an intermediate segment holds
    ///   several policies.
    /// - [`PolicyError::Frozen`] if a node on the path is frozen.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> PolicyResult<()> {
        let value = value.into();
        let parsed = PolicyPath::parse(path)?;
        self.walk_mut(&parsed, 0, true, |node, name| {
            node.slots.insert(name.to_string(), Slot::new(value));
            Ok(())
        })
    }

    /// Appends `value` to the slot at `path`, creating it if absent.
    ///
    /// # Errors
    ///
    /// As for [`set`](Self::set), plus [`PolicyError::TypeError`] when
    /// `value` has a different kind than the values already stored.
    pub fn add(&mut self, path: &str, value: impl Into<Value>) -> PolicyResult<()> {
        let value = value.into();
        let parsed = PolicyPath::parse(path)?;
        self.walk_mut(&parsed, 0, true, |node, name| {
            match node.slots.get_mut(name) {
                Some(slot) => slot.push(value, path)?,
                None => {
                    node.slots.insert(name.to_string(), Slot::new(value));
                }
            }
            Ok(())
        })
    }

    /// Removes the slot at `path`. Returns `false` if it did not resolve.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::InvalidName`] for a malformed path.
    /// - [`PolicyError::Frozen`] if a node on the path is frozen.
    pub fn remove(&mut self, path: &str) -> PolicyResult<bool> {
        let parsed = PolicyPath::parse(path)?;
        let removed = self.walk_mut(&parsed, 0, false, |node, name| {
            Ok(node.slots.shift_remove(name).is_some())
        });
        match removed {
            Err(error) if !error.is_frozen() => Ok(false),
            other => other,
        }
    }

    /// Fills in every name missing here from `defaults`.
    ///
    /// Missing slots are deep-copied. Where both sides hold exactly one
    /// nested policy under the same name, the merge recurses. Returns the
    /// number of slots added at any depth.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Frozen`] if a slot would be added to a frozen
    /// node. Slots added before that point stay in place.
    pub fn merge_defaults(&mut self, defaults: &Policy) -> PolicyResult<usize> {
        self.merge_at(defaults, "")
    }

    fn merge_at(&mut self, defaults: &Policy, prefix: &str) -> PolicyResult<usize> {
        let mut added = 0;
        for (name, theirs) in &defaults.slots {
            let Some(ours) = self.slots.get(name) else {
                if self.frozen {
                    return Err(PolicyError::frozen(child_name(prefix, name)));
                }
                self.slots.insert(name.clone(), theirs.deep_copy());
                added += 1;
                continue;
            };

            if let (Some(Value::Policy(mine)), Some(Value::Policy(default))) =
                (ours.single(), theirs.single())
            {
                if !mine.ptr_eq(default) {
                    let default = default.read();
                    added += mine.write().merge_at(&default, &child_name(prefix, name))?;
                }
            }
        }
        Ok(added)
    }

    // ------------------------------------------------------------------
    // Freezing
    // ------------------------------------------------------------------

    /// Makes this node and every nested policy read-only.
    ///
    /// Afterwards `set`, `add`, `remove` and `merge_defaults` fail with
    /// [`PolicyError::Frozen`] on any frozen node, including writes through
    /// handles obtained from [`get_policy`](Self::get_policy). Nested nodes
    /// shared with other trees are frozen there too. There is no way to
    /// unfreeze; [`deep_copy`](Self::deep_copy) returns a mutable tree.
    pub fn freeze(&mut self) {
        self.frozen = true;
        for slot in self.slots.values() {
            for value in &slot.values {
                if let Value::Policy(node) = value {
                    if !node.read().is_frozen() {
                        node.write().freeze();
                    }
                }
            }
        }
    }

    /// Returns `true` once [`freeze`](Self::freeze) has been called.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    // ------------------------------------------------------------------
    // Comparison
    // ------------------------------------------------------------------

    /// Compares two trees, treating doubles as equal within tolerance.
    ///
    /// Doubles `a` and `b` match when `|a - b| <= atol + rtol * |b|`; NaN
    /// matches nothing. Every other kind must be equal exactly. Unlike
    /// `==`, the comparison reports nothing about where the trees differ;
    /// see [`compare_with`](Self::compare_with).
    ///
    /// # Example
    ///
    /// ```rust
    /// use stratum_policy::{Policy, DEFAULT_ATOL, DEFAULT_RTOL};
    ///
    /// let mut a = Policy::new();
    /// a.set("scale", 0.1 + 0.2).unwrap();
    /// let mut b = Policy::new();
    /// b.set("scale", 0.3).unwrap();
    ///
    /// assert_ne!(a, b);
    /// assert!(a.compare(&b, DEFAULT_RTOL, DEFAULT_ATOL));
    /// ```
    #[must_use]
    pub fn compare(&self, other: &Self, rtol: f64, atol: f64) -> bool {
        self.compare_with(other, rtol, atol, |_| {})
    }

    /// Like [`compare`](Self::compare), calling `output` once per difference
    /// with a line naming the path.
    pub fn compare_with(&self, other: &Self, rtol: f64, atol: f64, mut output: impl FnMut(&str)) -> bool {
        self.compare_at(other, rtol, atol, "", &mut output)
    }

    fn compare_at(&self, other: &Self, rtol: f64, atol: f64, prefix: &str, output: &mut dyn FnMut(&str)) -> bool {
        let mut equal = true;
        for (name, ours) in &self.slots {
            let path = child_name(prefix, name);
            let Some(theirs) = other.slots.get(name) else {
                output(&format!("{path}: missing from other"));
                equal = false;
                continue;
            };
            if ours.kind != theirs.kind {
                output(&format!("{path}: {} != {}", ours.kind, theirs.kind));
                equal = false;
                continue;
            }
            if ours.len() != theirs.len() {
                output(&format!("{path}: {} values != {} values", ours.len(), theirs.len()));
                equal = false;
                continue;
            }
            for (a, b) in ours.values.iter().zip(&theirs.values) {
                equal &= values_match(a, b, rtol, atol, &path, output);
            }
        }
        for name in other.slots.keys().filter(|name| !self.slots.contains_key(*name)) {
            output(&format!("{}: missing from self", child_name(prefix, name)));
            equal = false;
        }
        equal
    }

    // ------------------------------------------------------------------
    // Enumeration
    // ------------------------------------------------------------------

    /// Appends every immediate child name to `out`; returns how many.
    pub fn names(&self, out: &mut Vec<String>) -> usize {
        self.collect_names(out, |_| true)
    }

    /// Appends the names of children holding nested policies.
    pub fn policy_names(&self, out: &mut Vec<String>) -> usize {
        self.collect_names(out, |kind| kind == ValueKind::Policy)
    }

    /// Appends the names of children holding plain parameters.
    pub fn param_names(&self, out: &mut Vec<String>) -> usize {
        self.collect_names(out, ValueKind::is_parameter)
    }

    /// Appends the names of children holding file references.
    pub fn file_names(&self, out: &mut Vec<String>) -> usize {
        self.collect_names(out, |kind| kind == ValueKind::File)
    }

    /// Iterates over immediate children and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.slots
            .iter()
            .map(|(name, slot)| (name.as_str(), slot.values.as_slice()))
    }

    fn collect_names(&self, out: &mut Vec<String>, keep: impl Fn(ValueKind) -> bool) -> usize {
        let before = out.len();
        out.extend(
            self.slots
                .iter()
                .filter(|(_, slot)| keep(slot.kind))
                .map(|(name, _)| name.clone()),
        );
        out.len() - before
    }

    // ------------------------------------------------------------------
    // Copies and views
    // ------------------------------------------------------------------

    /// Copies the whole tree. The result shares no nested policy and no file
    /// reference with `self`.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        Self {
            slots: self
                .slots
                .iter()
                .map(|(name, slot)| (name.clone(), slot.deep_copy()))
                .collect(),
            frozen: false,
        }
    }

    /// Dictionary view: single values as scalars, multi-valued slots as
    /// arrays.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .slots
            .iter()
            .map(|(name, slot)| {
                let value = match slot.single() {
                    Some(value) => value.to_json(),
                    None => serde_json::Value::Array(
                        slot.values.iter().map(Value::to_json).collect(),
                    ),
                };
                (name.clone(), value)
            })
            .collect();
        serde_json::Value::Object(map)
    }

    pub(crate) fn render(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "    ".repeat(indent);
        for (name, slot) in &self.slots {
            for value in &slot.values {
                match value {
                    Value::Policy(node) => {
                        writeln!(f, "{pad}{name}: {{")?;
                        node.read().render(f, indent + 1)?;
                        writeln!(f, "{pad}}}")?;
                    }
                    other => writeln!(f, "{pad}{name}: {other}")?,
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Path resolution
    // ------------------------------------------------------------------

    fn with_slot<R>(&self, path: &str, f: impl FnOnce(&Slot) -> PolicyResult<R>) -> PolicyResult<R> {
        let parsed = PolicyPath::parse(path)?;
        self.walk(&parsed, 0, |node, name| {
            let slot = node
                .slots
                .get(name)
                .ok_or_else(|| PolicyError::name_not_found(path))?;
            f(slot)
        })
    }

    /// Resolves every segment but the last, then applies `f` to the node
    /// holding the leaf.
    fn walk<R, F>(&self, path: &PolicyPath<'_>, depth: usize, f: F) -> PolicyResult<R>
    where
        F: FnOnce(&Self, &str) -> PolicyResult<R>,
    {
        let segments = path.segments();
        let name = segments[depth];
        if depth + 1 == segments.len() {
            return f(self, name);
        }
        let child = self.child(path, depth)?;
        let node = child.read();
        node.walk(path, depth + 1, f)
    }

    fn walk_mut<R, F>(&mut self, path: &PolicyPath<'_>, depth: usize, create: bool, f: F) -> PolicyResult<R>
    where
        F: FnOnce(&mut Self, &str) -> PolicyResult<R>,
    {
        if self.frozen {
            return Err(PolicyError::frozen(path.as_str()));
        }
        let segments = path.segments();
        let name = segments[depth];
        if depth + 1 == segments.len() {
            return f(self, name);
        }

        let child = if create && !self.slots.contains_key(name) {
            let node = SharedPolicy::default();
            self.slots
                .insert(name.to_string(), Slot::new(Value::Policy(node.clone())));
            node
        } else {
            self.child(path, depth)?
        };

        let mut node = child.write();
        node.walk_mut(path, depth + 1, create, f)
    }

    /// The nested policy named by segment `depth`, which must be the only
    /// value in its slot.
    fn child(&self, path: &PolicyPath<'_>, depth: usize) -> PolicyResult<SharedPolicy> {
        let name = path.segments()[depth];
        debug_assert!(is_segment(name));

        let slot = self
            .slots
            .get(name)
            .ok_or_else(|| PolicyError::name_not_found(path.as_str()))?;
        let prefix = path.prefix(depth + 1);

        match slot.single() {
            Some(Value::Policy(node)) => Ok(node.clone()),
            Some(other) => Err(PolicyError::type_error(
                prefix,
                ValueKind::Policy,
                other.kind(),
            )),
            None => Err(PolicyError::ambiguous_path(prefix, slot.len())),
        }
    }
}

/// Structural equality: names, order within slots and values. Shared nodes
/// compare by content. Whether a node is frozen does not matter.
impl PartialEq for Policy {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

fn child_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}{SEPARATOR}{name}")
    }
}

fn values_match(a: &Value, b: &Value, rtol: f64, atol: f64, path: &str, output: &mut dyn FnMut(&str)) -> bool {
    let matched = match (a, b) {
        (Value::Double(x), Value::Double(y)) => x == y || (x - y).abs() <= atol + rtol * y.abs(),
        (Value::Policy(p), Value::Policy(q)) => {
            return p.ptr_eq(q) || p.read().compare_at(&q.read(), rtol, atol, path, output);
        }
        _ => a == b,
    };
    if !matched {
        output(&format!("{path}: {a} != {b}"));
    }
    matched
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}
