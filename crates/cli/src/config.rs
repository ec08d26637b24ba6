//! Optional `stratus.toml` configuration.
//!
//! Resolution order for every setting: CLI flag, then config file, then the
//! built-in default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::exit_codes::EXIT_USAGE;
use crate::CliError;

/// Input file the hosting process falls back to when none is given.
pub const DEFAULT_INPUT: &str = "ETL_developer_Case.json";

/// Directory the five relations persist under by default.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

const DEFAULT_CONFIG_PATH: &str = "stratus.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Default snapshot path for `stratus run`.
    pub input: Option<PathBuf>,
    /// Directory holding the persisted relations.
    pub output_dir: Option<PathBuf>,
}

impl Settings {
    /// Load settings. An explicitly passed path must exist; the implicit
    /// `stratus.toml` is optional and silently defaults when absent.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self, CliError> {
        let raw = fs::read_to_string(path).map_err(|e| CliError {
            code: EXIT_USAGE,
            message: format!("cannot read config {}: {e}", path.display()),
            hint: None,
        })?;
        Self::from_toml(&raw).map_err(|message| CliError {
            code: EXIT_USAGE,
            message: format!("{}: {message}", path.display()),
            hint: Some("config keys: input, output_dir".into()),
        })
    }

    fn from_toml(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| e.to_string())
    }

    pub fn resolve_input(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.input.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT))
    }

    pub fn resolve_output_dir(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let settings =
            Settings::from_toml("input = \"daily.json\"\noutput_dir = \"state\"\n").unwrap();
        assert_eq!(settings.input.as_deref(), Some(Path::new("daily.json")));
        assert_eq!(settings.output_dir.as_deref(), Some(Path::new("state")));
    }

    #[test]
    fn reject_unknown_keys() {
        assert!(Settings::from_toml("outputs = \"state\"\n").is_err());
    }

    #[test]
    fn flag_beats_config_beats_default() {
        let settings = Settings::from_toml("input = \"daily.json\"\n").unwrap();
        assert_eq!(
            settings.resolve_input(Some(PathBuf::from("cli.json"))),
            PathBuf::from("cli.json")
        );
        assert_eq!(settings.resolve_input(None), PathBuf::from("daily.json"));

        let empty = Settings::default();
        assert_eq!(empty.resolve_input(None), PathBuf::from(DEFAULT_INPUT));
        assert_eq!(
            empty.resolve_output_dir(None),
            PathBuf::from(DEFAULT_OUTPUT_DIR)
        );
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/stratus.toml"))).unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
    }
}
