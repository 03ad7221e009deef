//! Loader settings.
//!
//! These control how [`PolicyLoader`](crate::PolicyLoader) reads its sources,
//! not the content of the policy being loaded.

use serde::{Deserialize, Serialize};

use crate::registry::DEFAULT_SCAN_LEN;
use crate::{FormatError, FormatResult};

/// Settings for [`PolicyLoader`](crate::PolicyLoader).
///
/// # Example
///
/// ```
/// use stratum_format::LoaderSettings;
///
/// let settings = LoaderSettings::from_toml_str(r#"
///     strict = false
///     env_prefix = "STRATUM"
/// "#).unwrap();
///
/// assert!(!settings.strict);
/// assert_eq!(settings.scan_len, 512);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoaderSettings {
    /// Treat malformed fragments as fatal.
    #[serde(default = "default_strict")]
    pub strict: bool,

    /// Leading bytes handed to format recognizers.
    #[serde(default = "default_scan_len")]
    pub scan_len: usize,

    /// Skip recognition and parse every source with this format.
    #[serde(default)]
    pub format: Option<String>,

    /// Prefix of environment variables applied as overrides.
    #[serde(default)]
    pub env_prefix: Option<String>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            strict: default_strict(),
            scan_len: default_scan_len(),
            format: None,
            env_prefix: None,
        }
    }
}

fn default_strict() -> bool {
    true
}

fn default_scan_len() -> usize {
    DEFAULT_SCAN_LEN
}

impl LoaderSettings {
    /// Parses settings from TOML.
    pub fn from_toml_str(content: &str) -> FormatResult<Self> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks the settings for values the loader cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::InvalidSettings`] if `scan_len` is zero or a
    /// configured format or prefix is blank.
    pub fn validate(&self) -> FormatResult<()> {
        if self.scan_len == 0 {
            return Err(FormatError::InvalidSettings(
                "scan_len must be greater than zero".to_string(),
            ));
        }
        if self.format.as_deref().is_some_and(|f| f.trim().is_empty()) {
            return Err(FormatError::InvalidSettings("format must not be blank".to_string()));
        }
        if self.env_prefix.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(FormatError::InvalidSettings(
                "env_prefix must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}
