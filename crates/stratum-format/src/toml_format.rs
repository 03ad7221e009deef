//! TOML policy format.
//!
//! Tables become nested policies, arrays become multi-valued slots, and
//! arrays of tables become slots of several policies. Datetimes are kept as
//! their string form.

use stratum_policy::{Policy, Value};

use crate::populate::{child_path, string_value, Populator};
use crate::{FormatRecognizer, FormatResult, ParserFactory, PolicyParser};

/// Format name used for recognition and content declarations.
pub const TOML_FORMAT: &str = "TOML";

/// A TOML document starts with a key or a table header, possibly after
/// blank and comment lines.
const TOML_LEADER: &str = r#"^(?:[ \t]*(?:#[^\n]*)?\r?\n)*[ \t]*[\w\["']"#;

/// Factory for [`TomlParser`].
#[derive(Debug, Clone)]
pub struct TomlParserFactory {
    recognizer: FormatRecognizer,
}

impl TomlParserFactory {
    /// Creates the factory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            recognizer: FormatRecognizer::new(TOML_FORMAT)
                .with_leader(TOML_LEADER)
                .expect("valid regex"),
        }
    }
}

impl Default for TomlParserFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserFactory for TomlParserFactory {
    fn recognizer(&self) -> &FormatRecognizer {
        &self.recognizer
    }

    fn create_parser<'p>(&self, policy: &'p mut Policy, strict: bool) -> Box<dyn PolicyParser + 'p> {
        Box::new(TomlParser::new(policy, strict))
    }
}

/// Parses TOML text into a policy.
#[derive(Debug)]
pub struct TomlParser<'p> {
    policy: &'p mut Policy,
    strict: bool,
}

impl<'p> TomlParser<'p> {
    /// Creates a parser writing into `policy`.
    pub fn new(policy: &'p mut Policy, strict: bool) -> Self {
        Self { policy, strict }
    }
}

impl PolicyParser for TomlParser<'_> {
    fn parse(&mut self, input: &str) -> FormatResult<usize> {
        let table: toml::Table = toml::from_str(input)?;
        let mut populator = Populator::new(TOML_FORMAT, self.strict);
        fill(&mut populator, self.policy, &table, "")?;
        Ok(populator.stored())
    }

    fn is_strict(&self) -> bool {
        self.strict
    }
}

fn fill(populator: &mut Populator, policy: &mut Policy, table: &toml::Table, prefix: &str) -> FormatResult<()> {
    for (key, item) in table {
        let path = child_path(prefix, key);
        let values = values_of(populator, item, &path)?;
        populator.store(policy, key, values, &path)?;
    }
    Ok(())
}

fn values_of(populator: &mut Populator, item: &toml::Value, path: &str) -> FormatResult<Vec<Value>> {
    let toml::Value::Array(items) = item else {
        return Ok(scalar(populator, item, path)?.into_iter().collect());
    };

    let mut values = Vec::with_capacity(items.len());
    for element in items {
        if element.is_array() {
            populator.reject(path, "nested arrays are not supported")?;
            continue;
        }
        values.extend(scalar(populator, element, path)?);
    }
    Ok(values)
}

fn scalar(populator: &mut Populator, item: &toml::Value, path: &str) -> FormatResult<Option<Value>> {
    let value = match item {
        toml::Value::String(s) => string_value(s),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Double(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Table(table) => {
            let mut nested = Policy::new();
            fill(populator, &mut nested, table, path)?;
            Value::from(nested)
        }
        toml::Value::Array(_) => return Ok(None),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FormatError, Recognition};

    fn parse(input: &str, strict: bool) -> FormatResult<(Policy, usize)> {
        let mut policy = Policy::new();
        let count = TomlParserFactory::new()
            .create_parser(&mut policy, strict)
            .parse(input)?;
        Ok((policy, count))
    }

    #[test]
    fn test_recognition() {
        let factory = TomlParserFactory::new();
        assert_eq!(factory.format_name(), "TOML");
        assert_eq!(
            factory.recognition("# <?cfg toml ?>\n[server]"),
            Recognition::Declared
        );
        assert_eq!(factory.recognition("[server]\nport = 1"), Recognition::Heuristic);
        assert_eq!(factory.recognition("{\"a\": 1}"), Recognition::Unrecognized);
    }

    #[test]
    fn test_recognition_skips_leading_comments() {
        let factory = TomlParserFactory::new();
        assert!(factory.recognize("# service settings\nport = 8080\n"));
        assert!(factory.recognize("\n  # a\r\n\n#b\n[server]\n"));
        assert!(factory.recognize("\"quoted key\" = 1"));
        assert!(!factory.recognize("# only a comment\n"));
        assert!(!factory.recognize("# header\n{\"a\": 1}"));
    }

    #[test]
    fn test_scalars_and_tables() {
        let (policy, count) = parse(
            r#"
            # <?cfg TOML ?>
            name = "triage"
            ratio = 0.5
            enabled = true

            [server]
            port = 8080
            include = "@server-defaults.toml"
            "#,
            true,
        )
        .unwrap();

        assert_eq!(policy.get_string("name").unwrap(), "triage");
        assert!((policy.get_double("ratio").unwrap() - 0.5).abs() < f64::EPSILON);
        assert!(policy.get_bool("enabled").unwrap());
        assert_eq!(policy.get_int("server.port").unwrap(), 8080);
        assert!(policy.is_file("server.include"));
        assert_eq!(count, 6);
    }

    #[test]
    fn test_arrays_become_multi_valued() {
        let (policy, _) = parse(
            r#"
            tags = ["a", "b", "c"]

            [[filter]]
            name = "first"

            [[filter]]
            name = "second"
            "#,
            true,
        )
        .unwrap();

        assert_eq!(policy.get_string_array("tags").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(policy.value_count("filter"), 2);
        let filters = policy.get_policy_array("filter").unwrap();
        assert_eq!(filters[1].read().get_string("name").unwrap(), "second");
    }

    #[test]
    fn test_datetime_kept_as_string() {
        let (policy, _) = parse("when = 1979-05-27T07:32:00Z", true).unwrap();
        assert_eq!(policy.get_string("when").unwrap(), "1979-05-27T07:32:00Z");
    }

    #[test]
    fn test_nested_array_strict_vs_lenient() {
        let input = "matrix = [[1, 2], [3]]\nok = 1";
        assert!(matches!(
            parse(input, true).unwrap_err(),
            FormatError::Malformed { .. }
        ));

        let (policy, count) = parse(input, false).unwrap();
        assert!(!policy.exists("matrix"));
        assert_eq!(policy.get_int("ok").unwrap(), 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            parse("name = ", false).unwrap_err(),
            FormatError::Toml(_)
        ));
    }

    #[test]
    fn test_dotted_keys_nest() {
        let (policy, _) = parse("a.b.c = 1", true).unwrap();
        assert!(policy.is_policy("a.b"));
        assert_eq!(policy.get_int("a.b.c").unwrap(), 1);
    }
}
