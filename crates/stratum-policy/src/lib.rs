//! Hierarchical, dynamically-typed configuration store for Stratum.
//!
//! A [`Policy`] maps field names to ordered, non-empty slots of same-kind
//! [`Value`]s. Nested policies are addressed with dotted paths, and typed
//! accessors fail with [`PolicyError::TypeError`] instead of coercing.
//!
//! # Overview
//!
//! - [`Value`] - closed sum of `Int`, `Double`, `Bool`, `String`, `File` and
//!   `Policy`
//! - [`Policy`] - a tree node with path lookup, multi-value slots and
//!   category enumeration
//! - [`SharedPolicy`] - the aliasing handle nested policies are stored behind
//! - [`PolicyPath`] - a validated dotted path, split into segments
//!
//! # Example
//!
//! ```
//! use stratum_policy::{FileRef, Policy};
//!
//! # fn main() -> Result<(), stratum_policy::PolicyError> {
//! let mut policy = Policy::new();
//! policy.set("Dictionary.definition.standalone.minOccurs", 1)?;
//! policy.add("include", FileRef::new("defaults.paf"))?;
//!
//! let standalone = policy.get_policy("Dictionary.definition.standalone")?;
//! standalone.write().set("type", "int")?;
//!
//! assert_eq!(policy.get_string("Dictionary.definition.standalone.type")?, "int");
//! assert!(policy.is_file("include"));
//! # Ok(())
//! # }
//! ```
//!
//! # Copies
//!
//! `Policy::clone` is a shallow copy: the top-level slots are duplicated but
//! nested policies are shared, so a change made through a sub-policy handle is
//! seen by both copies. [`Policy::deep_copy`] produces a tree that shares
//! nothing with its source.

#![warn(missing_docs)]

mod error;
mod path;
mod policy;
mod shared;
mod value;

pub use error::{PolicyError, PolicyResult};
pub use path::{PolicyPath, SEPARATOR};
pub use policy::{Policy, DEFAULT_ATOL, DEFAULT_RTOL};
pub use shared::SharedPolicy;
pub use value::{FileRef, PolicyValue, Value, ValueKind};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shallow_clone_shares_nested() {
        let mut p = Policy::new();
        p.set("sub.x", 1).unwrap();
        let copy = p.clone();

        p.get_policy("sub").unwrap().write().set("x", 2).unwrap();
        assert_eq!(copy.get_int("sub.x").unwrap(), 2);
    }

    #[test]
    fn test_shallow_clone_top_level_is_independent() {
        let mut p = Policy::new();
        p.set("a", 1).unwrap();
        let mut copy = p.clone();

        copy.set("b", 2).unwrap();
        copy.set("a", 10).unwrap();
        assert!(!p.exists("b"));
        assert_eq!(p.get_int("a").unwrap(), 1);
    }
}
