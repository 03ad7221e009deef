//! Subcommand handlers.
//!
//! Each handler returns the text to print so that it can be tested without
//! capturing stdout.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Args;
use stratum_format::{
    ContentDeclaration, LoaderSettings, ParserRegistry, PolicyLoader, Recognition,
};
use stratum_policy::{Policy, Value};

/// Options shared by the commands that load a policy.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Policy file to read.
    pub file: PathBuf,

    /// Skip malformed values instead of failing.
    #[arg(long)]
    pub lenient: bool,

    /// Parse as this format instead of detecting it.
    #[arg(long, value_name = "NAME")]
    pub format: Option<String>,

    /// Apply `PREFIX__A__B=value` environment overrides.
    #[arg(long, value_name = "PREFIX")]
    pub env_prefix: Option<String>,
}

impl SourceArgs {
    fn settings(&self) -> LoaderSettings {
        LoaderSettings {
            strict: !self.lenient,
            format: self.format.clone(),
            env_prefix: self.env_prefix.as_deref().map(str::to_uppercase),
            ..LoaderSettings::default()
        }
    }

    /// Loads the policy the arguments describe.
    pub fn load(&self) -> anyhow::Result<Policy> {
        let policy = PolicyLoader::new()
            .with_settings(self.settings())?
            .with_file(&self.file)?
            .load()?;
        Ok(policy)
    }
}

/// Arguments of `stratum detect`.
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// File whose format to detect.
    pub file: PathBuf,
}

/// Arguments of `stratum dump`.
#[derive(Args, Debug)]
pub struct DumpArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Print JSON instead of the indented tree.
    #[arg(long)]
    pub json: bool,
}

/// Arguments of `stratum get`.
#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Dotted path of the value.
    pub path: String,

    /// Print the values as a JSON array.
    #[arg(long)]
    pub json: bool,
}

/// Names the format of a file and how it was recognized.
pub fn detect(file: &Path) -> anyhow::Result<String> {
    let content =
        fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    let registry = ParserRegistry::with_defaults();
    let leading = registry.head(&content);

    let Some((factory, recognition)) = registry.find(leading) else {
        match ContentDeclaration::parse(leading) {
            Some(declaration) => bail!(
                "{}: declares unsupported format {}",
                file.display(),
                declaration.format()
            ),
            None => bail!("{}: format not recognized", file.display()),
        }
    };

    let how = match recognition {
        Recognition::Declared => "declared",
        Recognition::Heuristic | Recognition::Unrecognized => "heuristic",
    };
    let mut line = format!("{} ({how})", factory.format_name());
    if let Some(declaration) = ContentDeclaration::parse(leading) {
        if !declaration.modifiers().is_empty() {
            line.push_str(&format!(" [{}]", declaration.modifiers().join(" ")));
        }
    }
    Ok(line)
}

/// Renders the whole policy.
pub fn dump(args: &DumpArgs) -> anyhow::Result<String> {
    let policy = args.source.load()?;
    if args.json {
        Ok(serde_json::to_string_pretty(&policy.to_json())?)
    } else {
        Ok(policy.to_string())
    }
}

/// Renders the values stored at one path, one per line.
pub fn get(args: &GetArgs) -> anyhow::Result<String> {
    let policy = args.source.load()?;
    let values = policy
        .get_values(&args.path)
        .with_context(|| format!("lookup of {} failed", args.path))?;

    if args.json {
        let array = values.iter().map(Value::to_json).collect::<Vec<_>>();
        return Ok(serde_json::to_string_pretty(&array)?);
    }

    let lines = values
        .iter()
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>();
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(dir: &tempfile::TempDir, name: &str, content: &str) -> SourceArgs {
        let file = dir.path().join(name);
        fs::write(&file, content).unwrap();
        SourceArgs {
            file,
            ..SourceArgs::default()
        }
    }

    #[test]
    fn test_detect() {
        let dir = tempfile::tempdir().unwrap();
        let toml = source(&dir, "a.cfg", "[server]\nport = 1\n");
        let json = source(&dir, "b.cfg", "# <?cfg JSON strict ?>\n{}");
        let xml = source(&dir, "c.cfg", "# <?cfg XML ?>\n<a/>");

        assert_eq!(detect(&toml.file).unwrap(), "TOML (heuristic)");
        assert_eq!(detect(&json.file).unwrap(), "JSON (declared) [strict]");
        let err = detect(&xml.file).unwrap_err();
        assert!(err.to_string().contains("unsupported format XML"));
    }

    #[test]
    fn test_dump_tree_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let args = DumpArgs {
            source: source(&dir, "p.json", r#"{"server": {"port": 80}}"#),
            json: true,
        };
        let json: serde_json::Value = serde_json::from_str(&dump(&args).unwrap()).unwrap();
        assert_eq!(json["server"]["port"], 80);

        let args = DumpArgs { json: false, ..args };
        assert!(dump(&args).unwrap().contains("port"));
    }

    #[test]
    fn test_get_values() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(&dir, "p.toml", "hosts = [\"a\", \"b\"]\nport = 80\n");

        let args = GetArgs {
            source: src.clone(),
            path: "hosts".to_string(),
            json: false,
        };
        assert_eq!(get(&args).unwrap(), "a\nb");

        let args = GetArgs {
            source: src,
            path: "port".to_string(),
            json: true,
        };
        assert_eq!(get(&args).unwrap(), "[\n  80\n]");
    }

    #[test]
    fn test_get_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let args = GetArgs {
            source: source(&dir, "p.toml", "port = 80\n"),
            path: "host".to_string(),
            json: false,
        };
        assert!(get(&args).is_err());
    }

    #[test]
    fn test_lenient_and_forced_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut src = source(&dir, "p.txt", r#"{"a": null, "b": 1}"#);
        assert!(src.load().is_err());

        src.lenient = true;
        assert!(!src.load().unwrap().exists("a"));

        let src = SourceArgs {
            format: Some("toml".to_string()),
            ..source(&dir, "q.txt", "b = 2\n")
        };
        assert_eq!(src.load().unwrap().get_int("b").unwrap(), 2);
    }
}
