//! Configuration parsing and management for covdelta.
//!
//! This crate provides:
//! - Configuration types (`Config`, `PathConfig`)
//! - TOML parsing and validation
//! - Discovery of `covdelta.toml` from the working directory upwards
//! - Precedence handling (CLI > config file > defaults)
//! - Glob-based path exclusion

use covdelta_types::OutputFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for by [`discover_config`].
pub const CONFIG_FILE_NAME: &str = "covdelta.toml";

/// Check-run name used when none is configured.
pub const DEFAULT_NAME: &str = "Code Coverage";

/// Current report location used when none is configured.
pub const DEFAULT_LCOV_FILE: &str = "./coverage/lcov.info";

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value.
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Path handling configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathConfig {
    /// Literal prefix stripped from LCOV `SF` paths.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Glob patterns for files to drop from both reports.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Full configuration for covdelta, as written in `covdelta.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Check-run name, used in the report title.
    #[serde(default)]
    pub name: Option<String>,

    /// Path to the current LCOV report.
    #[serde(default)]
    pub lcov_file: Option<PathBuf>,

    /// Path to the base LCOV report.
    #[serde(default)]
    pub lcov_base: Option<PathBuf>,

    /// Output format for the report body.
    #[serde(default)]
    pub format: Option<OutputFormat>,

    /// Path handling configuration.
    #[serde(default)]
    pub paths: PathConfig,
}

// ============================================================================
// Effective Configuration
// ============================================================================

/// Effective configuration with all values resolved.
///
/// This represents the final configuration after applying:
/// 1. Defaults
/// 2. Config file values
/// 3. CLI overrides
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub name: String,
    pub lcov_file: PathBuf,
    pub lcov_base: Option<PathBuf>,
    pub format: OutputFormat,
    pub prefix: Option<String>,
    pub exclude_patterns: Vec<String>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            lcov_file: PathBuf::from(DEFAULT_LCOV_FILE),
            lcov_base: None,
            format: OutputFormat::Markdown,
            prefix: None,
            exclude_patterns: vec![],
        }
    }
}

// ============================================================================
// Configuration Loading
// ============================================================================

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration values.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if let Some(name) = &config.name
        && name.trim().is_empty()
    {
        return Err(ConfigError::InvalidValue(
            "name must not be empty".to_string(),
        ));
    }
    validate_patterns(&config.paths.exclude)
}

/// Check that every pattern is a valid glob.
pub fn validate_patterns(patterns: &[String]) -> Result<(), ConfigError> {
    for pattern in patterns {
        if let Err(err) = glob::Pattern::new(pattern) {
            return Err(ConfigError::InvalidValue(format!(
                "invalid exclude pattern '{}': {}",
                pattern, err
            )));
        }
    }
    Ok(())
}

/// Try to find and load configuration from the current directory or its parents.
pub fn discover_config() -> Result<Option<(PathBuf, Config)>, ConfigError> {
    let current = std::env::current_dir()?;
    discover_config_from(&current)
}

/// Search for `covdelta.toml` in `start` and its parent directories.
///
/// The nearest file wins. A file that exists but fails to load is an error
/// rather than being skipped.
pub fn discover_config_from(start: &Path) -> Result<Option<(PathBuf, Config)>, ConfigError> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            let config = load_config(&config_path)?;
            return Ok(Some((config_path, config)));
        }

        if !current.pop() {
            break;
        }
    }

    Ok(None)
}

// ============================================================================
// Precedence Resolution
// ============================================================================

/// CLI override options.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub name: Option<String>,
    pub lcov_file: Option<PathBuf>,
    pub lcov_base: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub prefix: Option<String>,
    /// Replaces the configured exclude patterns when present.
    pub exclude: Option<Vec<String>>,
}

/// Resolve effective configuration from the config file and CLI overrides.
///
/// Precedence: CLI > config file > defaults
pub fn resolve_config(config: Option<&Config>, cli: &CliOverrides) -> EffectiveConfig {
    let mut effective = EffectiveConfig::default();

    // Apply config file values
    if let Some(config) = config {
        if let Some(name) = &config.name {
            effective.name = name.clone();
        }
        if let Some(lcov_file) = &config.lcov_file {
            effective.lcov_file = lcov_file.clone();
        }
        if let Some(lcov_base) = &config.lcov_base {
            effective.lcov_base = Some(lcov_base.clone());
        }
        if let Some(format) = config.format {
            effective.format = format;
        }
        if let Some(prefix) = &config.paths.prefix {
            effective.prefix = Some(prefix.clone());
        }
        effective.exclude_patterns = config.paths.exclude.clone();
    }

    // Apply CLI overrides
    if let Some(name) = &cli.name {
        effective.name = name.clone();
    }
    if let Some(lcov_file) = &cli.lcov_file {
        effective.lcov_file = lcov_file.clone();
    }
    if let Some(lcov_base) = &cli.lcov_base {
        effective.lcov_base = Some(lcov_base.clone());
    }
    if let Some(format) = cli.format {
        effective.format = format;
    }
    if let Some(prefix) = &cli.prefix {
        effective.prefix = Some(prefix.clone());
    }
    if let Some(exclude) = &cli.exclude {
        effective.exclude_patterns = exclude.clone();
    }

    effective
}

// ============================================================================
// Path Filtering
// ============================================================================

/// Check if a path matches any of the given glob patterns.
pub fn matches_any_pattern(path: &str, patterns: &[String]) -> bool {
    for pattern in patterns {
        if let Ok(glob_pattern) = glob::Pattern::new(pattern)
            && glob_pattern.matches(path)
        {
            return true;
        }
    }
    false
}

/// Returns `true` if a normalized path survives the exclude patterns.
pub fn should_include_path(path: &str, exclude_patterns: &[String]) -> bool {
    !matches_any_pattern(path, exclude_patterns)
}

// ============================================================================
// Tests
// ============================================================================
