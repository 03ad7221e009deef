//! JSON policy format.
//!
//! The document root must be an object. A content declaration line in front
//! of the document is removed before parsing, since JSON has no comments.

use stratum_policy::{Policy, Value};

use crate::populate::{child_path, string_value, Populator};
use crate::{ContentDeclaration, FormatError, FormatRecognizer, FormatResult, ParserFactory, PolicyParser};

/// Format name used for recognition and content declarations.
pub const JSON_FORMAT: &str = "JSON";

/// A JSON policy document is an object.
const JSON_LEADER: &str = r"^\s*\{";

/// Factory for [`JsonParser`].
#[derive(Debug, Clone)]
pub struct JsonParserFactory {
    recognizer: FormatRecognizer,
}

impl JsonParserFactory {
    /// Creates the factory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            recognizer: FormatRecognizer::new(JSON_FORMAT)
                .with_leader(JSON_LEADER)
                .expect("valid regex"),
        }
    }
}

impl Default for JsonParserFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserFactory for JsonParserFactory {
    fn recognizer(&self) -> &FormatRecognizer {
        &self.recognizer
    }

    fn create_parser<'p>(&self, policy: &'p mut Policy, strict: bool) -> Box<dyn PolicyParser + 'p> {
        Box::new(JsonParser::new(policy, strict))
    }
}

/// Parses JSON text into a policy.
#[derive(Debug)]
pub struct JsonParser<'p> {
    policy: &'p mut Policy,
    strict: bool,
}

impl<'p> JsonParser<'p> {
    /// Creates a parser writing into `policy`.
    pub fn new(policy: &'p mut Policy, strict: bool) -> Self {
        Self { policy, strict }
    }
}

impl PolicyParser for JsonParser<'_> {
    fn parse(&mut self, input: &str) -> FormatResult<usize> {
        let document: serde_json::Value = serde_json::from_str(ContentDeclaration::strip(input))?;
        let serde_json::Value::Object(root) = document else {
            return Err(FormatError::malformed(JSON_FORMAT, "document root must be an object"));
        };

        let mut populator = Populator::new(JSON_FORMAT, self.strict);
        fill(&mut populator, self.policy, &root, "")?;
        Ok(populator.stored())
    }

    fn is_strict(&self) -> bool {
        self.strict
    }
}

fn fill(
    populator: &mut Populator,
    policy: &mut Policy,
    object: &serde_json::Map<String, serde_json::Value>,
    prefix: &str,
) -> FormatResult<()> {
    for (key, item) in object {
        let path = child_path(prefix, key);
        let values = values_of(populator, item, &path)?;
        populator.store(policy, key, values, &path)?;
    }
    Ok(())
}

fn values_of(populator: &mut Populator, item: &serde_json::Value, path: &str) -> FormatResult<Vec<Value>> {
    let serde_json::Value::Array(items) = item else {
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

fn scalar(populator: &mut Populator, item: &serde_json::Value, path: &str) -> FormatResult<Option<Value>> {
    let value = match item {
        serde_json::Value::Null => {
            populator.reject(path, "null values are not supported")?;
            return Ok(None);
        }
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if n.is_u64() {
                populator.reject(path, "integer out of range")?;
                return Ok(None);
            } else if let Some(f) = n.as_f64() {
                Value::Double(f)
            } else {
                populator.reject(path, "unrepresentable number")?;
                return Ok(None);
            }
        }
        serde_json::Value::String(s) => string_value(s),
        serde_json::Value::Object(object) => {
            let mut nested = Policy::new();
            fill(populator, &mut nested, object, path)?;
            Value::from(nested)
        }
        serde_json::Value::Array(_) => return Ok(None),
    };
    Ok(Some(value))
}
