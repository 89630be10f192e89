/*!
 * Configuration support for the license explorer
 *
 * Settings are layered: built-in defaults, then the user config file, then
 * `COMPOUNDING_*` environment variables.
 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::{ExplorerError, ExportFormat, Result};

/// Prefix of environment variables that override configuration values
pub const ENV_PREFIX: &str = "COMPOUNDING";

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Whether to show progress bars while loading
    #[serde(default)]
    pub enable_progress_bar: bool,

    /// Whether to skip invalid records during parsing
    #[serde(default)]
    pub skip_invalid_records: bool,

    /// Number of threads for parallel filtering (None = use all available)
    #[serde(default)]
    pub parallel_threads: Option<usize>,

    /// Default export format
    #[serde(default)]
    pub default_export_format: ExportFormat,

    /// Directory holding all_pharmacies.csv / available_pharmacies.csv
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Separator between tags inside a cell
    #[serde(default = "default_tag_delimiter")]
    pub tag_delimiter: char,

    /// Extra synonyms (variant -> canonical label) on top of the built-in table
    #[serde(default)]
    pub synonyms: BTreeMap<String, String>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            enable_progress_bar: false,
            skip_invalid_records: false,
            parallel_threads: None,
            default_export_format: ExportFormat::Json,
            data_dir: None,
            tag_delimiter: default_tag_delimiter(),
            synonyms: BTreeMap::new(),
        }
    }
}

fn default_tag_delimiter() -> char {
    crate::constants::TAG_DELIMITER
}

impl ExplorerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&contents)
            .map_err(|e| ExplorerError::Configuration {
                message: format!("Failed to parse config file: {}", e),
                suggestion: Some("Check that the file is valid TOML format".to_string()),
            })
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ExplorerError::Configuration {
                message: format!("Failed to serialize config: {}", e),
                suggestion: None,
            })?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/ca-compounding/config.toml` on Unix-like systems
    /// or `%APPDATA%\ca-compounding\config.toml` on Windows
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ca-compounding")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Layer a config file and the environment over the defaults
    ///
    /// A file passed here must exist. Environment variables use the
    /// `COMPOUNDING_` prefix, e.g. `COMPOUNDING_SKIP_INVALID_RECORDS=true` or
    /// `COMPOUNDING_DATA_DIR=./data`.
    pub fn load_layered(file: Option<&Path>) -> Result<Self> {
        Self::layered(file, true)
    }

    fn layered(file: Option<&Path>, required: bool) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(required));
        }

        let layered = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ExplorerError::Configuration {
                message: format!("Failed to read configuration: {}", e),
                suggestion: Some(format!("Check the config file and {}_* environment variables", ENV_PREFIX)),
            })?;

        layered
            .try_deserialize()
            .map_err(|e| ExplorerError::Configuration {
                message: format!("Invalid configuration value: {}", e),
                suggestion: None,
            })
    }

    /// Load from the default config location and the environment
    ///
    /// Falls back to built-in defaults when neither supplies anything usable.
    pub fn load() -> Self {
        let path = Self::default_config_path();
        match Self::layered(path.as_deref(), false) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}; using default configuration", e);
                Self::default()
            }
        }
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<Option<ExplorerConfig>> = RwLock::new(None);
}

/// Set the process-wide configuration
pub fn set_global_config(config: ExplorerConfig) {
    if let Ok(mut guard) = GLOBAL_CONFIG.write() {
        *guard = Some(config);
    }
}

/// Get the process-wide configuration (or load one if not set)
pub fn global_config() -> ExplorerConfig {
    GLOBAL_CONFIG.read()
        .ok()
        .and_then(|guard| guard.clone())
        .unwrap_or_else(ExplorerConfig::load)
}

/// Clear the process-wide configuration
pub fn clear_global_config() {
    if let Ok(mut guard) = GLOBAL_CONFIG.write() {
        *guard = None;
    }
}

/// Builder for customizing configuration
pub struct ConfigBuilder {
    config: ExplorerConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ExplorerConfig::default(),
        }
    }

    /// Set progress bar enabled
    pub fn progress_bar(mut self, enabled: bool) -> Self {
        self.config.enable_progress_bar = enabled;
        self
    }

    /// Set skip invalid records
    pub fn skip_invalid_records(mut self, skip: bool) -> Self {
        self.config.skip_invalid_records = skip;
        self
    }

    /// Set number of parallel threads
    pub fn parallel_threads(mut self, threads: Option<usize>) -> Self {
        self.config.parallel_threads = threads;
        self
    }

    pub fn default_export_format(mut self, format: ExportFormat) -> Self {
        self.config.default_export_format = format;
        self
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.data_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn tag_delimiter(mut self, delimiter: char) -> Self {
        self.config.tag_delimiter = delimiter;
        self
    }

    /// Add a synonym entry
    pub fn synonym<V: Into<String>, C: Into<String>>(mut self, variant: V, canonical: C) -> Self {
        self.config.synonyms.insert(variant.into(), canonical.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> ExplorerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ExplorerConfig::default();
        assert!(!config.enable_progress_bar);
        assert_eq!(config.tag_delimiter, ',');
        assert_eq!(config.default_export_format, ExportFormat::Json);
        assert!(config.synonyms.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .progress_bar(true)
            .parallel_threads(Some(2))
            .skip_invalid_records(true)
            .default_export_format(ExportFormat::Csv)
            .synonym("Peds", "Pediatrics")
            .build();

        assert!(config.enable_progress_bar);
        assert_eq!(config.parallel_threads, Some(2));
        assert!(config.skip_invalid_records);
        assert_eq!(config.default_export_format, ExportFormat::Csv);
        assert_eq!(config.synonyms.get("Peds").map(String::as_str), Some("Pediatrics"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = ConfigBuilder::new()
            .data_dir("data")
            .synonym("Joint Commission Accredited", "TJC")
            .build();

        config.save(&path).unwrap();
        assert_eq!(ExplorerConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "skip_invalid_records = true\n").unwrap();

        let config = ExplorerConfig::load_layered(Some(&path)).unwrap();
        assert!(config.skip_invalid_records);
        assert_eq!(config.tag_delimiter, ',');
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("conifg.toml");
        assert!(matches!(
            ExplorerConfig::load_layered(Some(&missing)),
            Err(ExplorerError::Configuration { .. })
        ));
        assert!(ExplorerConfig::layered(Some(&missing), false).is_ok());
    }

    #[test]
    fn test_global_config_set_and_clear() {
        let config = ConfigBuilder::new().tag_delimiter(';').build();
        set_global_config(config.clone());
        assert_eq!(global_config(), config);

        clear_global_config();
        assert!(GLOBAL_CONFIG.read().unwrap().is_none());
    }

    #[test]
    fn test_invalid_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "skip_invalid_records = [").unwrap();
        assert!(matches!(
            ExplorerConfig::from_file(&path),
            Err(ExplorerError::Configuration { .. })
        ));
    }
}
