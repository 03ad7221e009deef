//! Parser factory protocol.
//!
//! A [`ParserFactory`] pairs a [`FormatRecognizer`] with a constructor for
//! the matching [`PolicyParser`]. New formats plug in by implementing the
//! factory; the policy store never sees their grammar.

use stratum_policy::Policy;

use crate::{FormatRecognizer, FormatResult, Recognition};

/// A format-specific parser bound to a destination policy.
///
/// Parsers write through [`Policy::set`] and [`Policy::add`]. On error the
/// destination keeps whatever was written before the failure.
pub trait PolicyParser {
    /// Parses `input` into the bound policy and returns the number of values
    /// stored, nested policies included.
    ///
    /// # Errors
    ///
    /// Returns the format's syntax error, or
    /// [`FormatError::Malformed`](crate::FormatError::Malformed) for
    /// unrepresentable content when the parser is strict.
    fn parse(&mut self, input: &str) -> FormatResult<usize>;

    /// Whether malformed fragments are fatal.
    fn is_strict(&self) -> bool;
}

/// Recognizes one serialization format and builds parsers for it.
///
/// # Example
///
/// ```rust
/// use stratum_format::{ParserFactory, TomlParserFactory};
/// use stratum_policy::Policy;
///
/// let factory = TomlParserFactory::new();
/// assert!(factory.recognize("# <?cfg TOML ?>\nport = 80"));
///
/// let mut policy = Policy::new();
/// factory.create_parser(&mut policy, true).parse("port = 80").unwrap();
/// assert_eq!(policy.get_int("port").unwrap(), 80);
/// ```
pub trait ParserFactory: Send + Sync {
    /// The recognizer for this factory's format.
    fn recognizer(&self) -> &FormatRecognizer;

    /// Creates a parser writing into `policy`. Ownership of the parser goes
    /// to the caller.
    fn create_parser<'p>(&self, policy: &'p mut Policy, strict: bool)
        -> Box<dyn PolicyParser + 'p>;

    /// Stable format identifier, also the name used in content declarations.
    fn format_name(&self) -> &str {
        self.recognizer().format_name()
    }

    /// Grades `leading` against this format.
    fn recognition(&self, leading: &str) -> Recognition {
        self.recognizer().recognition(leading)
    }

    /// Returns `true` if `leading` is declared as, or looks like, this format.
    fn recognize(&self, leading: &str) -> bool {
        self.recognition(leading).is_recognized()
    }
}
