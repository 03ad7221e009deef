//! Policy loader with layered approach.
//!
//! This module provides the [`PolicyLoader`] for building one policy out of
//! several sources: files, strings, readers and environment variables.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::Path;

use stratum_policy::{Policy, Value};

use crate::populate::{string_value, FILE_PREFIX};
use crate::registry::leading;
use crate::{FormatError, FormatResult, LoaderSettings, ParserRegistry};

/// Policy loader with layered approach.
///
/// Sources are applied in order, later layers overriding earlier ones:
/// 1. Files, strings and readers, in the order they are added
/// 2. Environment variables (if a prefix is set)
///
/// Overriding works name by name: a later source replaces the slots it
/// defines and inherits everything else through [`Policy::merge_defaults`].
///
/// # Example
///
/// ```no_run
/// use stratum_format::PolicyLoader;
///
/// # fn main() -> Result<(), stratum_format::FormatError> {
/// let policy = PolicyLoader::new()
///     .with_file("defaults.toml")?
///     .with_optional_file("local.json")?
///     .with_env_prefix("STRATUM")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PolicyLoader {
    registry: ParserRegistry,
    settings: LoaderSettings,
    policy: Policy,
    layers: usize,
}

impl Default for PolicyLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyLoader {
    /// Create a new loader using the bundled formats and default settings.
    ///
    /// # Example
    ///
    /// ```
    /// use stratum_format::PolicyLoader;
    ///
    /// let policy = PolicyLoader::new().load().unwrap();
    /// assert!(policy.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: ParserRegistry::with_defaults(),
            settings: LoaderSettings::default(),
            policy: Policy::new(),
            layers: 0,
        }
    }

    /// Use `registry` to recognize and parse sources.
    #[must_use]
    pub fn with_registry(mut self, registry: ParserRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the loader settings.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::InvalidSettings`] if the settings do not
    /// validate.
    pub fn with_settings(mut self, settings: LoaderSettings) -> FormatResult<Self> {
        settings.validate()?;
        self.settings = settings;
        Ok(self)
    }

    /// Toggle strict parsing.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.settings.strict = strict;
        self
    }

    /// Parse every subsequent source as `format` instead of detecting it.
    #[must_use]
    pub fn with_format(mut self, format: &str) -> Self {
        self.settings.format = Some(format.to_string());
        self
    }

    /// Load a policy file.
    ///
    /// The format is taken from the settings if forced, else recognized from
    /// the content, else guessed from the file extension.
    ///
    /// # Errors
    ///
    /// Returns `FormatError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - No format can be determined
    /// - The parser rejects the content
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> FormatResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(FormatError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| FormatError::read_error(path, e))?;
        let extension = path.extension().and_then(|e| e.to_str());
        self.with_layer(&content, &path.display().to_string(), extension)
    }

    /// Load a policy file if it exists; otherwise continue unchanged.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> FormatResult<Self> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            tracing::debug!(path = %path.as_ref().display(), "optional policy file absent");
            Ok(self)
        }
    }

    /// Load policy text.
    ///
    /// # Example
    ///
    /// ```
    /// use stratum_format::PolicyLoader;
    ///
    /// let policy = PolicyLoader::new()
    ///     .with_string("[server]\nport = 3000")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(policy.get_int("server.port").unwrap(), 3000);
    /// ```
    pub fn with_string(self, content: &str) -> FormatResult<Self> {
        self.with_layer(content, "string", None)
    }

    /// Load policy text from a reader.
    pub fn with_reader(self, mut reader: impl Read) -> FormatResult<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        self.with_layer(&content, "reader", None)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Variables use the format `PREFIX__SEGMENT__SEGMENT`; segments are
    /// lowercased and joined with dots. For example, with prefix "STRATUM",
    /// `STRATUM__SERVER__PORT=9000` sets `server.port` to the integer 9000.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.settings.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if one exists.
    pub fn with_dotenv(self) -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        self
    }

    /// Finalize and return the loaded policy.
    ///
    /// # Errors
    ///
    /// Returns `FormatError::EnvParse` if an environment override cannot be
    /// applied.
    pub fn load(mut self) -> FormatResult<Policy> {
        if let Some(prefix) = self.settings.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        tracing::info!(layers = self.layers, names = self.policy.len(), "policy loaded");
        Ok(self.policy)
    }

    fn with_layer(mut self, content: &str, origin: &str, extension: Option<&str>) -> FormatResult<Self> {
        let mut layer = Policy::new();
        let strict = self.settings.strict;

        let stored = if let Some(format) = self.settings.format.as_deref() {
            self.registry.parse_str_as(format, content, &mut layer, strict)?
        } else if let Some((factory, recognition)) = self.registry.find(leading(content, self.settings.scan_len)) {
            tracing::debug!(origin, format = factory.format_name(), recognition = ?recognition, "recognized policy format");
            factory.create_parser(&mut layer, strict).parse(content)?
        } else if let Some(factory) = extension.and_then(|ext| self.registry.by_name(ext)) {
            tracing::debug!(origin, format = factory.format_name(), "format taken from file extension");
            factory.create_parser(&mut layer, strict).parse(content)?
        } else {
            return Err(FormatError::unrecognized(origin));
        };

        let inherited = layer.merge_defaults(&self.policy)?;
        tracing::debug!(origin, stored, inherited, "applied policy layer");
        self.policy = layer;
        self.layers += 1;
        Ok(self)
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> FormatResult<()> {
        for (key, value) in prefixed_vars(env::vars_os(), prefix) {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> FormatResult<()> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            // Shares the prefix but is not one of ours, e.g. STRATUMX
            return Ok(());
        };

        let path = rest
            .split("__")
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(".");

        tracing::debug!(var = key, path = %path, "applying environment override");
        self.policy
            .set(&path, infer_value(value))
            .map_err(|e| FormatError::env_parse(key, e.to_string()))
    }
}

/// Collects the variables starting with `prefix`, skipping any that are not
/// valid UTF-8.
fn prefixed_vars(
    vars: impl Iterator<Item = (OsString, OsString)>,
    prefix: &str,
) -> BTreeMap<String, String> {
    vars.filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
        (Ok(key), Ok(value)) => Some((key, value)),
        (Ok(key), Err(_)) => {
            if key.starts_with(prefix) {
                tracing::warn!(var = key.as_str(), "skipping environment variable with non-UTF-8 value");
            }
            None
        }
        (Err(_), _) => None,
    })
    .filter(|(key, _)| key.starts_with(prefix))
    .collect()
}

/// Infers the kind of an environment value: integer, then double, then
/// boolean words, then `@file`, else string.
fn infer_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if raw.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(f) = raw.parse::<f64>() {
            return Value::Double(f);
        }
    }
    if let Some(b) = parse_bool(raw) {
        return Value::Bool(b);
    }
    if raw.starts_with(FILE_PREFIX) {
        return string_value(raw);
    }
    Value::String(raw.to_string())
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
