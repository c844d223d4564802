//! Shell configuration, read from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How the shell prints query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory of `<case id>.sql` schema files.
    #[serde(default)]
    pub cases_dir: Option<PathBuf>,

    /// Case loaded when none is given on the command line.
    #[serde(default)]
    pub default_case: Option<String>,

    #[serde(default)]
    pub format: OutputFormat,

    /// `tracing` filter directive, e.g. `warn` or `casesql=debug`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub history_file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cases_dir: None,
            default_case: None,
            format: OutputFormat::default(),
            log_level: default_log_level(),
            history_file: None,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Config::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.format, OutputFormat::Table);
    }

    #[test]
    fn fields_are_read() {
        let config = Config::from_toml_str(
            r#"
            cases_dir = "cases"
            default_case = "library"
            format = "json"
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.cases_dir, Some(PathBuf::from("cases")));
        assert_eq!(config.default_case.as_deref(), Some("library"));
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.log_level, "debug");
        assert!(config.history_file.is_none());
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = Config::from_toml_str(r#"format = "csv""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "history_file = \"/tmp/casesql_history\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.history_file, Some(PathBuf::from("/tmp/casesql_history")));
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
