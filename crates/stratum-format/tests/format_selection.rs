//! Integration tests for format recognition and layered file loading.
//!
//! These tests drive the public API only: a registry picks a parser from the
//! leading text, and the loader stacks files written to a temporary directory.

use std::fs;
use std::path::Path;

use stratum_format::{
    FormatError, FormatRecognizer, FormatResult, ParserFactory, ParserRegistry, PolicyLoader,
    PolicyParser, Recognition,
};
use stratum_policy::Policy;

/// A line-oriented `name value` format with only the default leader.
struct PafFactory {
    recognizer: FormatRecognizer,
}

impl PafFactory {
    fn new() -> Self {
        Self {
            recognizer: FormatRecognizer::new("PAF"),
        }
    }
}

struct PafParser<'p> {
    policy: &'p mut Policy,
    strict: bool,
}

impl PolicyParser for PafParser<'_> {
    fn parse(&mut self, input: &str) -> FormatResult<usize> {
        let mut stored = 0;
        for line in input.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some((name, value)) = line.split_once(char::is_whitespace) else {
                continue;
            };
            self.policy.add(name, value.trim())?;
            stored += 1;
        }
        Ok(stored)
    }

    fn is_strict(&self) -> bool {
        self.strict
    }
}

impl ParserFactory for PafFactory {
    fn recognizer(&self) -> &FormatRecognizer {
        &self.recognizer
    }

    fn create_parser<'p>(&self, policy: &'p mut Policy, strict: bool) -> Box<dyn PolicyParser + 'p> {
        Box::new(PafParser { policy, strict })
    }
}

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// A declared format beats a heuristic match from an earlier factory.
#[test]
fn test_declaration_outranks_registration_order() {
    let mut registry = ParserRegistry::new();
    registry.register(PafFactory::new());
    registry.register_shared(ParserRegistry::with_defaults().by_name("toml").unwrap());

    let plain = "name = 1";
    let declared = "# <?cfg TOML ?>\nname = 1";

    let (factory, recognition) = registry.find(plain).unwrap();
    assert_eq!((factory.format_name(), recognition), ("PAF", Recognition::Heuristic));

    let (factory, recognition) = registry.find(declared).unwrap();
    assert_eq!((factory.format_name(), recognition), ("TOML", Recognition::Declared));

    let mut policy = Policy::new();
    registry.parse_str(declared, &mut policy, true).unwrap();
    assert_eq!(policy.get_int("name").unwrap(), 1);
}

/// Each factory is asked the same question and answers independently.
#[test]
fn test_each_factory_recognizes_only_its_own_format() {
    let registry = ParserRegistry::with_defaults();
    let toml = registry.by_name("TOML").unwrap();
    let json = registry.by_name("JSON").unwrap();

    assert!(toml.recognize("[server]\nport = 1"));
    assert!(!json.recognize("[server]\nport = 1"));
    assert!(json.recognize("{\"port\": 1}"));
    assert!(!toml.recognize("{\"port\": 1}"));

    assert!(json.recognize("# <?cfg json ?>\n{}"));
    assert!(!toml.recognize("# <?cfg json ?>\n{}"));
}

#[test]
fn test_declaration_beyond_scan_len_is_not_seen() {
    let registry = ParserRegistry::with_defaults().with_scan_len(4);
    let mut policy = Policy::new();

    // The scanned head only holds "# <?", which no leader matches.
    let err = registry
        .parse_str("# <?cfg JSON ?>\n{\"a\": 1}", &mut policy, true)
        .unwrap_err();
    assert!(matches!(err, FormatError::Unrecognized { .. }));
}

#[test]
fn test_load_layered_files() {
    let dir = tempfile::tempdir().unwrap();
    let base = write(
        dir.path(),
        "base.toml",
        r#"
[server]
host = "0.0.0.0"
port = 8080

[[filters]]
id = "a"

[[filters]]
id = "b"
"#,
    );
    let local = write(
        dir.path(),
        "local.json",
        r#"{"server": {"port": 9000}, "include": "@extra.toml"}"#,
    );

    let policy = PolicyLoader::new()
        .with_file(&base)
        .unwrap()
        .with_file(&local)
        .unwrap()
        .with_optional_file(dir.path().join("missing.toml"))
        .unwrap()
        .load()
        .unwrap();

    assert_eq!(policy.get_int("server.port").unwrap(), 9000);
    assert_eq!(policy.get_string("server.host").unwrap(), "0.0.0.0");
    assert_eq!(policy.value_count("filters"), 2);
    assert_eq!(
        policy.get_file("include").unwrap().path(),
        Path::new("extra.toml")
    );
}

/// Content that no leader claims falls back to the file extension.
#[test]
fn test_extension_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "empty.toml", "\n# nothing set yet\n");

    let policy = PolicyLoader::new().with_file(&path).unwrap().load().unwrap();
    assert!(policy.is_empty());

    let path = write(dir.path(), "empty.conf", "\n# nothing set yet\n");
    let err = PolicyLoader::new().with_file(&path).unwrap_err();
    assert!(matches!(err, FormatError::Unrecognized { .. }));
}

/// Comment-led TOML is recognized from its content alone.
#[test]
fn test_comment_led_toml_without_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "service.conf", "# deployment\nport = 1\n");

    let policy = PolicyLoader::new().with_file(&path).unwrap().load().unwrap();
    assert_eq!(policy.get_int("port").unwrap(), 1);

    let policy = PolicyLoader::new()
        .with_reader("# deployment\n\n[server]\nport = 2\n".as_bytes())
        .unwrap()
        .load()
        .unwrap();
    assert_eq!(policy.get_int("server.port").unwrap(), 2);
}

/// A declaration may follow a header comment.
#[test]
fn test_declaration_after_header_line() {
    let policy = PolicyLoader::new()
        .with_string("#!/usr/bin/env stratum\n# <?cfg JSON ?>\n{\"a\": {\"b\": 1}}")
        .unwrap()
        .load()
        .unwrap();
    assert_eq!(policy.get_int("a.b").unwrap(), 1);
}

#[test]
fn test_strict_failure_reports_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "bad.json", r#"{"a": [[1], [2]]}"#);

    let err = PolicyLoader::new().with_file(&path).unwrap_err();
    assert!(matches!(err, FormatError::Malformed { ref format, .. } if format == "JSON"));

    let policy = PolicyLoader::new()
        .strict(false)
        .with_file(&path)
        .unwrap()
        .load()
        .unwrap();
    assert!(!policy.exists("a"));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = PolicyLoader::new()
        .with_file(dir.path().join("absent.toml"))
        .unwrap_err();
    assert!(matches!(err, FormatError::FileNotFound { .. }));
}
