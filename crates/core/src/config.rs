//! TOML-based configuration for unconflict.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::conflict::resolver::{ResolveOptions, Side, DEFAULT_MAX_PASSES};
use crate::errors::ConfigError;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Which files a scan visits.
    #[serde(default)]
    pub scan: ScanConfig,

    /// How conflict blocks are collapsed.
    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

/// File selection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanConfig {
    /// Extensions (without the dot) of files that are checked for markers.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory names that are never descended into.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// Glob patterns (relative to the scan root) of files to skip.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Files larger than this many bytes are skipped. 0 = no limit.
    #[serde(default)]
    pub max_file_size: u64,
}

fn default_extensions() -> Vec<String> {
    ["jsx", "js", "css", "json", "html", "md", "env"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_exclude_dirs() -> Vec<String> {
    vec![".git".into(), "node_modules".into()]
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude_dirs: default_exclude_dirs(),
            ignore_patterns: Vec::new(),
            max_file_size: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolve
// ---------------------------------------------------------------------------

/// Conflict resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolveConfig {
    /// Side kept when the two segments differ: `theirs` (default) or `ours`.
    #[serde(default)]
    pub prefer: Side,

    /// Bound on fixed-point passes per file.
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

fn default_max_passes() -> usize {
    DEFAULT_MAX_PASSES
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            prefer: Side::default(),
            max_passes: default_max_passes(),
        }
    }
}

impl From<&ResolveConfig> for ResolveOptions {
    fn from(config: &ResolveConfig) -> Self {
        Self {
            prefer: config.prefer,
            max_passes: config.max_passes,
        }
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all values are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "scan.extensions".into(),
                detail: "at least one extension is required".into(),
            });
        }
        if let Some(bad) = self
            .scan
            .extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(ConfigError::InvalidValue {
                field: "scan.extensions".into(),
                detail: format!("'{bad}' must be a non-empty extension without a leading dot"),
            });
        }
        if self.scan.exclude_dirs.iter().any(|d| d.is_empty() || d.contains('/')) {
            return Err(ConfigError::InvalidValue {
                field: "scan.exclude_dirs".into(),
                detail: "entries must be bare directory names".into(),
            });
        }
        if self.resolve.max_passes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "resolve.max_passes".into(),
                detail: "max_passes must be > 0".into(),
            });
        }
        if !LOG_LEVELS.contains(&self.log.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "log.level".into(),
                detail: format!(
                    "unknown level '{}' (expected one of {})",
                    self.log.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// The documented default configuration as TOML.
    pub fn default_toml() -> &'static str {
        DEFAULT_CONFIG_TOML
    }
}

const DEFAULT_CONFIG_TOML: &str = r#"# unconflict configuration

[scan]
# File extensions (without the dot) checked for conflict markers.
extensions = ["jsx", "js", "css", "json", "html", "md", "env"]
# Directory names that are never descended into.
exclude_dirs = [".git", "node_modules"]
# Glob patterns, relative to the scan root, of files to skip.
ignore_patterns = []
# Skip files larger than this many bytes (0 = no limit).
max_file_size = 0

[resolve]
# Side kept when both segments differ: "theirs" (after =======) or "ours".
prefer = "theirs"
# Upper bound on resolution passes per file.
max_passes = 8

[log]
level = "warn"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[scan]
extensions = ["ts", "tsx", "md"]
exclude_dirs = [".git", "target"]
ignore_patterns = ["vendor/**"]
max_file_size = 1048576

[resolve]
prefer = "ours"
max_passes = 4

[log]
level = "debug"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.scan.extensions, vec!["ts", "tsx", "md"]);
        assert_eq!(config.scan.exclude_dirs, vec![".git", "target"]);
        assert_eq!(config.scan.ignore_patterns, vec!["vendor/**"]);
        assert_eq!(config.scan.max_file_size, 1_048_576);
        assert_eq!(config.resolve.prefer, Side::Ours);
        assert_eq!(config.resolve.max_passes, 4);
        assert_eq!(config.log.level, "debug");
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.scan.extensions.len(), 7);
        assert_eq!(config.scan.exclude_dirs, vec![".git", "node_modules"]);
        assert_eq!(config.resolve.prefer, Side::Theirs);
        assert_eq!(config.resolve.max_passes, DEFAULT_MAX_PASSES);
        assert_eq!(config.log.level, "warn");
        config.validate().unwrap();
    }

    #[test]
    fn test_default_toml_matches_defaults() {
        let config: AppConfig = toml::from_str(AppConfig::default_toml()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unconflict.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_and_validate(&path).expect("load failed");
        assert_eq!(config.resolve.prefer, Side::Ours);
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/unconflict.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[resolve]\nprefer = \"both\"\n").unwrap();
        let result = AppConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_empty_extensions() {
        let mut config = AppConfig::default();
        config.scan.extensions.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "scan.extensions"
        ));
    }

    #[test]
    fn test_validate_rejects_dotted_extension() {
        let mut config = AppConfig::default();
        config.scan.extensions.push(".ts".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "scan.extensions"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_passes() {
        let mut config = AppConfig::default();
        config.resolve.max_passes = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "resolve.max_passes"
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = AppConfig::default();
        config.log.level = "loud".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "log.level"
        ));
    }

    #[test]
    fn test_resolve_options_from_config() {
        let config: AppConfig = toml::from_str(sample_toml()).unwrap();
        let options = ResolveOptions::from(&config.resolve);
        assert_eq!(options.prefer, Side::Ours);
        assert_eq!(options.max_passes, 4);
    }
}
