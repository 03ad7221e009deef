//! Parser registry.
//!
//! The registry is an ordinary value owned by the application: factories are
//! registered explicitly and the registry is passed to whatever needs to pick
//! a parser. Selection prefers a format the input declares over one that
//! merely matches a leader heuristic; among equal claims the earliest
//! registered factory wins.

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use stratum_policy::Policy;

use crate::{
    FormatError, FormatResult, JsonParserFactory, ParserFactory, Recognition, TomlParserFactory,
};

/// Default number of leading bytes handed to recognizers.
pub const DEFAULT_SCAN_LEN: usize = 512;

/// Ordered collection of parser factories.
///
/// # Example
///
/// ```rust
/// use stratum_format::ParserRegistry;
/// use stratum_policy::Policy;
///
/// let registry = ParserRegistry::with_defaults();
/// let mut policy = Policy::new();
/// registry.parse_str("{\"port\": 8080}", &mut policy, true).unwrap();
/// assert_eq!(policy.get_int("port").unwrap(), 8080);
/// ```
#[derive(Clone)]
pub struct ParserRegistry {
    factories: Vec<Arc<dyn ParserFactory>>,
    scan_len: usize,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
            scan_len: DEFAULT_SCAN_LEN,
        }
    }

    /// Creates a registry holding the bundled TOML and JSON factories.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(TomlParserFactory::new())
            .register(JsonParserFactory::new());
        registry
    }

    /// Sets how many leading bytes recognizers see.
    #[must_use]
    pub fn with_scan_len(mut self, scan_len: usize) -> Self {
        self.scan_len = scan_len.max(1);
        self
    }

    /// Appends a factory.
    pub fn register(&mut self, factory: impl ParserFactory + 'static) -> &mut Self {
        self.register_shared(Arc::new(factory))
    }

    /// Appends an already shared factory.
    pub fn register_shared(&mut self, factory: Arc<dyn ParserFactory>) -> &mut Self {
        tracing::debug!(format = factory.format_name(), "registered parser factory");
        self.factories.push(factory);
        self
    }

    /// Number of registered factories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if no factory is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Names of the registered formats, in registration order.
    pub fn format_names(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|f| f.format_name())
    }

    /// Looks up a factory by format name, ignoring case.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn ParserFactory>> {
        self.factories
            .iter()
            .find(|f| f.format_name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// The leading fragment of `text` recognizers are given.
    #[must_use]
    pub fn head<'t>(&self, text: &'t str) -> &'t str {
        leading(text, self.scan_len)
    }

    /// Picks the factory with the strongest claim on `leading`.
    #[must_use]
    pub fn find(&self, leading: &str) -> Option<(Arc<dyn ParserFactory>, Recognition)> {
        let mut best: Option<(&Arc<dyn ParserFactory>, Recognition)> = None;
        for factory in &self.factories {
            let recognition = factory.recognition(leading);
            if recognition == Recognition::Declared {
                best = Some((factory, recognition));
                break;
            }
            if recognition.is_recognized() && best.is_none() {
                best = Some((factory, recognition));
            }
        }

        if let Some((factory, recognition)) = best {
            tracing::debug!(
                format = factory.format_name(),
                recognition = ?recognition,
                "selected parser factory"
            );
        }
        best.map(|(factory, recognition)| (Arc::clone(factory), recognition))
    }

    /// Detects the format of `text` and parses it into `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Unrecognized`] if no factory claims the text,
    /// or whatever the selected parser reports.
    pub fn parse_str(&self, text: &str, policy: &mut Policy, strict: bool) -> FormatResult<usize> {
        let (factory, _) = self
            .find(self.head(text))
            .ok_or_else(|| FormatError::unrecognized("input"))?;
        factory.create_parser(policy, strict).parse(text)
    }

    /// Parses `text` with the factory registered as `format`.
    pub fn parse_str_as(&self, format: &str, text: &str, policy: &mut Policy, strict: bool) -> FormatResult<usize> {
        let factory = self
            .by_name(format)
            .ok_or_else(|| FormatError::unknown_format(format))?;
        factory.create_parser(policy, strict).parse(text)
    }

    /// Reads `reader` to the end, then behaves like [`parse_str`](Self::parse_str).
    pub fn parse_reader(&self, mut reader: impl Read, policy: &mut Policy, strict: bool) -> FormatResult<usize> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        self.parse_str(&text, policy, strict)
    }
}

/// At most `len` leading bytes of `text`, cut back to a char boundary.
pub(crate) fn leading(text: &str, len: usize) -> &str {
    let mut end = len.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("formats", &self.format_names().collect::<Vec<_>>())
            .field("scan_len", &self.scan_len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FormatRecognizer, PolicyParser};

    /// Heuristic-only format that stores the whole input under `raw`.
    struct RawFactory {
        recognizer: FormatRecognizer,
    }

    struct RawParser<'p> {
        policy: &'p mut Policy,
        strict: bool,
    }

    impl PolicyParser for RawParser<'_> {
        fn parse(&mut self, input: &str) -> FormatResult<usize> {
            self.policy.set("raw", input.trim())?;
            Ok(1)
        }

        fn is_strict(&self) -> bool {
            self.strict
        }
    }

    impl ParserFactory for RawFactory {
        fn recognizer(&self) -> &FormatRecognizer {
            &self.recognizer
        }

        fn create_parser<'p>(&self, policy: &'p mut Policy, strict: bool) -> Box<dyn PolicyParser + 'p> {
            Box::new(RawParser { policy, strict })
        }
    }

    fn raw(name: &str) -> RawFactory {
        RawFactory {
            recognizer: FormatRecognizer::new(name),
        }
    }

    #[test]
    fn test_declared_beats_earlier_heuristic() {
        let mut registry = ParserRegistry::new();
        registry.register(raw("PAF")).register(TomlParserFactory::new());

        let (factory, recognition) = registry.find("# <?cfg TOML ?>\nname = 1").unwrap();
        assert_eq!(factory.format_name(), "TOML");
        assert_eq!(recognition, Recognition::Declared);

        let (factory, recognition) = registry.find("name = 1").unwrap();
        assert_eq!(factory.format_name(), "PAF");
        assert_eq!(recognition, Recognition::Heuristic);
    }

    #[test]
    fn test_find_none() {
        let registry = ParserRegistry::with_defaults();
        assert!(registry.find("<xml/>").is_none());
        assert!(registry.find("# <?cfg XML ?>").is_none());
        assert!(ParserRegistry::new().find("name = 1").is_none());
    }

    #[test]
    fn test_by_name_ignores_case() {
        let registry = ParserRegistry::with_defaults();
        assert_eq!(registry.by_name("json").unwrap().format_name(), "JSON");
        assert!(registry.by_name("yaml").is_none());
        assert_eq!(registry.format_names().collect::<Vec<_>>(), vec!["TOML", "JSON"]);
    }

    #[test]
    fn test_parse_str_dispatches() {
        let registry = ParserRegistry::with_defaults();
        let mut policy = Policy::new();
        assert_eq!(registry.parse_str("a = 1\nb = 2", &mut policy, true).unwrap(), 2);
        assert_eq!(registry.parse_str("{\"c\": 3}", &mut policy, true).unwrap(), 1);
        assert_eq!(policy.get_int("a").unwrap(), 1);
        assert_eq!(policy.get_int("c").unwrap(), 3);

        assert!(matches!(
            registry.parse_str("<xml/>", &mut policy, true).unwrap_err(),
            FormatError::Unrecognized { .. }
        ));
    }

    #[test]
    fn test_parse_str_comment_led_toml() {
        let registry = ParserRegistry::with_defaults();
        let mut policy = Policy::new();
        registry
            .parse_str("# service settings\nport = 8080\n", &mut policy, true)
            .unwrap();
        assert_eq!(policy.get_int("port").unwrap(), 8080);
    }

    #[test]
    fn test_declaration_after_header_comment() {
        let registry = ParserRegistry::with_defaults();
        let text = "# generated by deploy\n# <?cfg JSON ?>\n{\"a\": 1}";

        let (factory, recognition) = registry.find(registry.head(text)).unwrap();
        assert_eq!(factory.format_name(), "JSON");
        assert_eq!(recognition, Recognition::Declared);

        let mut policy = Policy::new();
        registry.parse_str(text, &mut policy, true).unwrap();
        assert_eq!(policy.get_int("a").unwrap(), 1);
    }

    #[test]
    fn test_parse_str_as() {
        let mut registry = ParserRegistry::new();
        registry.register(raw("RAW"));
        let mut policy = Policy::new();

        registry.parse_str_as("raw", "  anything  ", &mut policy, false).unwrap();
        assert_eq!(policy.get_string("raw").unwrap(), "anything");
        assert!(matches!(
            registry.parse_str_as("toml", "", &mut policy, false).unwrap_err(),
            FormatError::UnknownFormat { .. }
        ));
    }

    #[test]
    fn test_parse_reader() {
        let registry = ParserRegistry::with_defaults();
        let mut policy = Policy::new();
        registry
            .parse_reader("[server]\nport = 80".as_bytes(), &mut policy, true)
            .unwrap();
        assert_eq!(policy.get_int("server.port").unwrap(), 80);
    }

    #[test]
    fn test_head_respects_char_boundaries() {
        let registry = ParserRegistry::new().with_scan_len(2);
        assert_eq!(registry.head("ab"), "ab");
        assert_eq!(registry.head("aé"), "a");
        assert_eq!(registry.head(""), "");
    }
}
