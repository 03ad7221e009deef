//! Format recognition from the leading text of a stream.
//!
//! Two signals are checked, strongest first:
//!
//! 1. A content declaration on its own line near the start, for example
//!    `# <?cfg TOML ?>`. It may follow other comment lines such as a
//!    generated-file header. Matching is case-insensitive and the format name
//!    may be followed by modifier tokens. When a declaration is present it
//!    decides the outcome on its own.
//! 2. Otherwise a leader pattern applied to the start of the text, by
//!    default "first non-blank character is a word character". This is a
//!    weak signal that a registry only uses when no format was declared.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use crate::FormatResult;

/// Default leader: the first non-whitespace character is alphanumeric or `_`.
pub const DEFAULT_LEADER: &str = r"^\s*\w";

fn declaration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        RegexBuilder::new(r"^[ \t]*#[ \t]*<\?cfg[ \t]+(\w+)((?:[ \t]+\w+)*)[ \t]*\?>")
            .case_insensitive(true)
            .multi_line(true)
            .build()
            .expect("valid regex")
    })
}

fn default_leader() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(DEFAULT_LEADER).expect("valid regex"))
}

/// How strongly a recognizer claims an input.
///
/// Variants are ordered by strength so that registries can keep the
/// strongest claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Recognition {
    /// Not this format.
    Unrecognized,
    /// The leader heuristic matched and nothing was declared.
    Heuristic,
    /// The input declares this format explicitly.
    Declared,
}

impl Recognition {
    /// Returns `true` unless this is [`Recognition::Unrecognized`].
    #[must_use]
    pub fn is_recognized(self) -> bool {
        self != Self::Unrecognized
    }
}

/// An explicit in-stream declaration of the serialization format.
///
/// # Example
///
/// ```rust
/// use stratum_format::ContentDeclaration;
///
/// let decl = ContentDeclaration::parse("# <?cfg toml strict ?>\nname = 1").unwrap();
/// assert!(decl.names("TOML"));
/// assert_eq!(decl.modifiers(), ["strict"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDeclaration {
    format: String,
    modifiers: Vec<String>,
}

impl ContentDeclaration {
    /// Finds the first declaration line in `leading`.
    #[must_use]
    pub fn parse(leading: &str) -> Option<Self> {
        let captures = declaration_pattern().captures(leading)?;
        let format = captures.get(1)?.as_str().to_string();
        let modifiers = captures
            .get(2)
            .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        Some(Self { format, modifiers })
    }

    /// Returns `text` after the declaration line, or all of `text` if it
    /// declares nothing. Lines in front of the declaration are dropped too.
    #[must_use]
    pub fn strip(text: &str) -> &str {
        let Some(found) = declaration_pattern().find(text) else {
            return text;
        };
        let rest = &text[found.end()..];
        rest.find('\n').map_or("", |newline| &rest[newline + 1..])
    }

    /// The declared format name, as written.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Modifier tokens following the format name.
    #[must_use]
    pub fn modifiers(&self) -> &[String] {
        &self.modifiers
    }

    /// Returns `true` if the declaration names `format` (ignoring case).
    #[must_use]
    pub fn names(&self, format: &str) -> bool {
        self.format.eq_ignore_ascii_case(format)
    }
}

/// Decides whether leading text is written in one particular format.
///
/// Recognizers are stateless; the format identity is fixed at construction.
///
/// # Example
///
/// ```rust
/// use stratum_format::{FormatRecognizer, Recognition};
///
/// let paf = FormatRecognizer::new("PAF");
/// assert_eq!(paf.recognition("# <?cfg PAF ?>\n"), Recognition::Declared);
/// assert_eq!(paf.recognition("name: value"), Recognition::Heuristic);
/// assert!(!paf.recognize("{\"name\": 1}"));
/// ```
#[derive(Debug, Clone)]
pub struct FormatRecognizer {
    format: String,
    leader: Regex,
}

impl FormatRecognizer {
    /// Creates a recognizer for `format` using the default leader.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            leader: default_leader().clone(),
        }
    }

    /// Replaces the leader heuristic with `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Leader`](crate::FormatError::Leader) if the
    /// pattern does not compile.
    pub fn with_leader(mut self, pattern: &str) -> FormatResult<Self> {
        self.leader = Regex::new(pattern)?;
        Ok(self)
    }

    /// The format this recognizer claims.
    #[must_use]
    pub fn format_name(&self) -> &str {
        &self.format
    }

    /// Grades how strongly `leading` looks like this format.
    #[must_use]
    pub fn recognition(&self, leading: &str) -> Recognition {
        if let Some(declaration) = ContentDeclaration::parse(leading) {
            return if declaration.names(&self.format) {
                Recognition::Declared
            } else {
                Recognition::Unrecognized
            };
        }

        if self.leader.is_match(leading) {
            Recognition::Heuristic
        } else {
            Recognition::Unrecognized
        }
    }

    /// Returns `true` if `leading` is declared as, or looks like, this format.
    #[must_use]
    pub fn recognize(&self, leading: &str) -> bool {
        self.recognition(leading).is_recognized()
    }
}
