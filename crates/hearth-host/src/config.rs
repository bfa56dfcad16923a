//! Host configuration management.
//!
//! [`HostConfig`] is replaced wholesale, never mutated field-by-field in
//! place: `AppHost::set_config` computes a fresh [`DerivedConfig`] via the
//! pure [`DerivedConfig::compute`] and swaps both atomically. Components
//! read a consistent `(config, derived)` snapshot for the duration of one
//! request.

use std::collections::BTreeSet;
use std::ops::Deref;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::features::{Feature, FeatureSet};

/// Host configuration.
///
/// Created with defaults at host construction, then shaped by the
/// `load_config` hook and user `configure` code before plugins load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Display name of the hosted service.
    pub service_name: String,
    /// Debug mode; adds the diagnostic plugin and relaxes error masking.
    pub debug: bool,
    /// Enabled optional capabilities.
    pub features: FeatureSet,
    /// Content type served when a request does not pick one. `None` until
    /// user code or post-init finalization sets it.
    pub default_content_type: Option<String>,
    /// Format short names hidden from the metadata surface. Hiding a format
    /// here does not stop it being requested directly.
    pub ignored_metadata_formats: BTreeSet<String>,
    /// Path prefix the handler factory answers under, e.g. `api`.
    pub handler_factory_path: String,
    /// Headers stamped onto every response.
    pub global_response_headers: Vec<(String, String)>,
    /// Physical root the default virtual-files provider serves from.
    pub web_host_physical_path: PathBuf,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            service_name: "hearth".to_string(),
            debug: cfg!(debug_assertions),
            features: FeatureSet::ALL,
            default_content_type: None,
            ignored_metadata_formats: BTreeSet::new(),
            handler_factory_path: String::new(),
            global_response_headers: Vec::new(),
            web_host_physical_path: PathBuf::from("."),
        }
    }
}

impl HostConfig {
    /// Defaults for a named service.
    pub fn for_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }
}

/// State recomputed whenever the configuration is replaced.
///
/// Computing this is a pure function of the configuration, so the
/// recompute step can be tested without a host.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedConfig {
    /// `handler_factory_path` with any leading separator stripped.
    pub handler_path: String,
    /// Format short names visible on the metadata surface: enabled format
    /// features minus the ignored set.
    pub metadata_formats: Vec<&'static str>,
}

impl DerivedConfig {
    /// Recompute derived state from a configuration snapshot.
    pub fn compute(config: &HostConfig) -> Self {
        let handler_path = config
            .handler_factory_path
            .strip_prefix('/')
            .unwrap_or(&config.handler_factory_path)
            .to_string();

        let metadata_formats = Feature::ALL
            .into_iter()
            .filter(|f| config.features.contains(*f))
            .filter_map(Feature::metadata_format)
            .map(|f| f.short_name())
            .filter(|name| !config.ignored_metadata_formats.contains(*name))
            .collect();

        Self {
            handler_path,
            metadata_formats,
        }
    }
}

/// An immutable `(config, derived)` pair.
///
/// Dereferences to the [`HostConfig`] so call sites read
/// `snapshot.debug` directly; derived state is reached explicitly via
/// [`ConfigSnapshot::derived`].
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    settings: HostConfig,
    /// Derived state for this configuration.
    pub derived: DerivedConfig,
}

impl ConfigSnapshot {
    /// Pair a configuration with its freshly-computed derived state.
    pub fn new(settings: HostConfig) -> Self {
        let derived = DerivedConfig::compute(&settings);
        Self { settings, derived }
    }

    /// Clone the settings for a mutate-and-reassign cycle.
    pub fn to_config(&self) -> HostConfig {
        self.settings.clone()
    }
}

impl Deref for ConfigSnapshot {
    type Target = HostConfig;

    fn deref(&self) -> &HostConfig {
        &self.settings
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format.
    #[error("unsupported configuration file format, use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),
}

impl HostConfig {
    /// Load configuration from a file (TOML, YAML, or JSON).
    ///
    /// The format is auto-detected from the extension. Environment
    /// variables with the `HEARTH_` prefix override file settings, e.g.
    /// `HEARTH_SERVICE_NAME=orders`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, the extension is
    /// unsupported, or the contents fail to deserialize.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let loaded = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(
                config::Environment::with_prefix("HEARTH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(loaded.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_enables_everything() {
        let config = HostConfig::default();
        assert_eq!(config.features, FeatureSet::ALL);
        assert!(config.default_content_type.is_none());
        assert!(config.ignored_metadata_formats.is_empty());
    }

    #[test]
    fn derived_strips_leading_separator() {
        let mut config = HostConfig::default();
        config.handler_factory_path = "/api".to_string();
        assert_eq!(DerivedConfig::compute(&config).handler_path, "api");

        config.handler_factory_path = "api".to_string();
        assert_eq!(DerivedConfig::compute(&config).handler_path, "api");
    }

    #[test]
    fn derived_metadata_formats_respect_features_and_ignores() {
        let mut config = HostConfig::default();
        config.features = config.features.without(Feature::Csv);
        config.ignored_metadata_formats.insert("soap11".to_string());

        let derived = DerivedConfig::compute(&config);
        assert!(!derived.metadata_formats.contains(&"csv"));
        assert!(!derived.metadata_formats.contains(&"soap11"));
        assert!(derived.metadata_formats.contains(&"json"));
        assert!(derived.metadata_formats.contains(&"xml"));
    }

    #[test]
    fn compute_is_pure() {
        let config = HostConfig::default();
        assert_eq!(
            DerivedConfig::compute(&config),
            DerivedConfig::compute(&config)
        );
    }

    #[test]
    fn snapshot_derefs_to_settings() {
        let snapshot = ConfigSnapshot::new(HostConfig::for_service("orders"));
        assert_eq!(snapshot.service_name, "orders");
        assert!(snapshot.derived.metadata_formats.contains(&"json"));
    }

    #[test]
    fn from_file_rejects_missing_and_unknown() {
        assert!(matches!(
            HostConfig::from_file("/nonexistent/host.toml"),
            Err(ConfigError::FileNotFound(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(matches!(
            HostConfig::from_file(&path),
            Err(ConfigError::UnsupportedFormat)
        ));
    }

    #[test]
    fn from_file_loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.toml");
        std::fs::write(
            &path,
            r#"
service_name = "orders"
debug = false
handler_factory_path = "api"
web_host_physical_path = "/srv/orders"
features = ["json", "xml", "metadata"]
"#,
        )
        .unwrap();

        let config = HostConfig::from_file(&path).unwrap();
        assert_eq!(config.service_name, "orders");
        assert!(config.features.contains(Feature::Metadata));
        assert!(!config.features.contains(Feature::Csv));
    }
}
