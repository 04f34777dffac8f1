//! Run configuration.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! YAML file (`--config` or `CLAR_CONFIG`), the `CLAR_FIXTURE_PATH`
//! environment variable, and finally command-line flags (applied by the CLI).
//!
//! ```yaml
//! fixture_root: tests/resources
//! report_errors_only: false
//! exit_on_error: false
//! categories: [default, slow]
//! color: auto
//! ```

use std::{
    env,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use termcolor::ColorChoice;

use crate::context::RunOptions;
use crate::errors::ClarError;

/// Names the YAML configuration file.
pub const CONFIG_ENV: &str = "CLAR_CONFIG";

/// Overrides the fixture root.
pub const FIXTURE_ENV: &str = "CLAR_FIXTURE_PATH";

/// When to colorize reporter output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Color only when stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn choice(self) -> ColorChoice {
        match self {
            ColorMode::Auto if atty::is(atty::Stream::Stdout) => ColorChoice::Auto,
            ColorMode::Auto | ColorMode::Never => ColorChoice::Never,
            ColorMode::Always => ColorChoice::Always,
        }
    }
}

/// Settings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Directory holding named fixture trees. Always absolute once loaded.
    pub fixture_root: Option<PathBuf>,
    pub report_errors_only: bool,
    pub exit_on_error: bool,
    /// Categories to enable in addition to any `-i` flags.
    pub categories: Vec<String>,
    pub color: ColorMode,
}

impl RunConfig {
    /// Loads the configuration for a run: the file named by `explicit` or by
    /// [`CONFIG_ENV`] if any, then environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ClarError> {
        let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_yaml_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|var| env::var_os(var));
        Ok(config)
    }

    /// Parses a YAML file. A relative `fixture_root` is taken relative to
    /// the file's directory.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ClarError> {
        let text = fs::read_to_string(path).map_err(|e| ClarError::Config {
            path: path.to_path_buf(),
            message: "cannot read file".to_string(),
            source: Some(Box::new(e)),
        })?;
        let mut config = Self::from_yaml_str(&text, path)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.fixture_root = config
            .fixture_root
            .map(|root| absolutize(&base.join(root)));
        Ok(config)
    }

    /// Parses YAML text; `origin` only labels errors.
    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self, ClarError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| ClarError::Config {
            path: origin.to_path_buf(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })
    }

    /// Applies [`FIXTURE_ENV`]; a relative value is taken relative to the
    /// current directory.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<OsString>) {
        if let Some(root) = lookup(FIXTURE_ENV).filter(|v| !v.is_empty()) {
            self.fixture_root = Some(absolutize(Path::new(&root)));
        }
    }

    pub fn options(&self) -> RunOptions {
        RunOptions {
            report_errors_only: self.report_errors_only,
            exit_on_error: self.exit_on_error,
        }
    }
}

// The sandbox changes the working directory, so relative paths must be
// pinned before the run starts.
fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_fields_map_onto_the_config() {
        let text = "report_errors_only: true\ncategories: [slow, network]\ncolor: never\n";
        let config = RunConfig::from_yaml_str(text, Path::new("clar.yaml")).unwrap();
        assert!(config.report_errors_only);
        assert!(!config.exit_on_error);
        assert_eq!(config.categories, vec!["slow", "network"]);
        assert_eq!(config.color, ColorMode::Never);
        assert_eq!(
            config.options(),
            RunOptions {
                report_errors_only: true,
                exit_on_error: false
            }
        );
    }

    #[test]
    fn empty_yaml_is_the_default() {
        let config = RunConfig::from_yaml_str("  \n", Path::new("empty.yaml")).unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RunConfig::from_yaml_str("colour: always\n", Path::new("typo.yaml")).unwrap_err();
        assert!(matches!(err, ClarError::Config { .. }));
        assert!(err.to_string().contains("typo.yaml"));
    }

    #[test]
    fn file_relative_fixture_root_is_resolved_against_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clar.yaml");
        fs::write(&path, "fixture_root: resources\n").unwrap();

        let config = RunConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.fixture_root, Some(dir.path().join("resources")));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunConfig::from_yaml_file(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ClarError::Config { .. }));
    }

    #[test]
    fn env_overrides_the_fixture_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RunConfig::default();
        let root = dir.path().to_path_buf();
        config.apply_env(|var| (var == FIXTURE_ENV).then(|| root.clone().into_os_string()));
        assert_eq!(config.fixture_root, Some(root));

        config.apply_env(|_| Some(OsString::new()));
        assert_eq!(config.fixture_root, Some(dir.path().to_path_buf()));
    }
}
