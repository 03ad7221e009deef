//! Format recognition and parsing for Stratum policies.
//!
//! This crate turns policy text into a [`stratum_policy::Policy`]:
//! - Format recognition from the leading bytes of the input
//! - Pluggable parser factories, one per format
//! - Bundled TOML and JSON formats
//! - Layered loading (files → strings → env)
//!
//! # Overview
//!
//! - [`FormatRecognizer`] - decides whether text is in its format, either from
//!   a content declaration or from a leader pattern
//! - [`ParserFactory`] - pairs a recognizer with a way to build a
//!   [`PolicyParser`]
//! - [`ParserRegistry`] - an ordered set of factories that picks one for a
//!   given input
//! - [`PolicyLoader`] - applies several sources on top of each other
//!
//! # Content Declarations
//!
//! A source may name its format on its first line:
//!
//! ```text
//! # <?cfg JSON ?>
//! {"port": 8080}
//! ```
//!
//! A declaration is authoritative: it wins over any factory whose leader
//! merely matches, and a factory whose format it does not name will not claim
//! the input.
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden via environment variables using the format
//! `PREFIX__SEGMENT__KEY`. For example:
//!
//! - `STRATUM__SERVER__PORT=9000` sets `server.port` to 9000
//! - `STRATUM__DEBUG=on` sets `debug` to `true`
//! - `STRATUM__INCLUDE=@base.toml` sets `include` to a file reference
//!
//! # File References
//!
//! String values starting with `@` are stored as file references.

#![warn(missing_docs)]

mod error;
mod factory;
mod json_format;
mod loader;
mod populate;
mod recognizer;
mod registry;
mod settings;
mod toml_format;

pub use error::{FormatError, FormatResult};
pub use factory::{ParserFactory, PolicyParser};
pub use json_format::{JsonParser, JsonParserFactory, JSON_FORMAT};
pub use loader::PolicyLoader;
pub use recognizer::{ContentDeclaration, FormatRecognizer, Recognition, DEFAULT_LEADER};
pub use registry::{ParserRegistry, DEFAULT_SCAN_LEN};
pub use settings::LoaderSettings;
pub use toml_format::{TomlParser, TomlParserFactory, TOML_FORMAT};
