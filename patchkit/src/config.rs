//! Engine and file-based configuration.
//!
//! [`EngineConfig`] is the injected configuration for one engine instance.
//! [`ConfigFile`] is the on-disk `config.ini` representation used by the
//! CLI, with typed access through [`ConfigKey`].

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

/// Default bandwidth ceiling (20 MiB/s).
pub const DEFAULT_MAX_BYTES_PER_SEC: u64 = 20 * 1024 * 1024;

/// Default manifest cache TTL (5 minutes).
pub const DEFAULT_MANIFEST_TTL: Duration = Duration::from_secs(300);

/// Default HTTP timeout for manifest requests.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors reading, writing, or interpreting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Filesystem failure accessing the config file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The config file was not valid INI.
    #[error("failed to parse config file: {0}")]
    Parse(String),

    /// A required setting has no value.
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// A setting's value could not be interpreted.
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Configuration for one synchronization engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// URL of the manifest JSON document.
    pub manifest_url: String,

    /// Base URL files are fetched from (`files_base_url + entry.path`).
    pub files_base_url: String,

    /// Local installation root directory.
    pub install_root: PathBuf,

    /// Global bandwidth ceiling in bytes per second (zero disables pacing).
    pub max_bytes_per_sec: u64,

    /// How long a fetched manifest stays valid in the cache.
    pub manifest_ttl: Duration,

    /// Timeout for manifest HTTP requests.
    pub http_timeout: Duration,
}

impl EngineConfig {
    /// Create a configuration with default throttling, TTL, and timeout.
    pub fn new(
        manifest_url: impl Into<String>,
        files_base_url: impl Into<String>,
        install_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            manifest_url: manifest_url.into(),
            files_base_url: files_base_url.into(),
            install_root: install_root.into(),
            max_bytes_per_sec: DEFAULT_MAX_BYTES_PER_SEC,
            manifest_ttl: DEFAULT_MANIFEST_TTL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Set the bandwidth ceiling in bytes per second.
    pub fn with_max_bytes_per_sec(mut self, max: u64) -> Self {
        self.max_bytes_per_sec = max;
        self
    }

    /// Set the manifest cache TTL.
    pub fn with_manifest_ttl(mut self, ttl: Duration) -> Self {
        self.manifest_ttl = ttl;
        self
    }

    /// Set the HTTP timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

/// Default install root: a `patchkit` directory under the user's documents
/// folder, falling back to the current directory.
pub fn default_install_root() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("patchkit")
}

/// Location of the CLI config file (`<config dir>/patchkit/config.ini`).
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("patchkit")
        .join("config.ini")
}

/// The on-disk configuration, all settings optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    /// `[remote] manifest_url`
    pub manifest_url: Option<String>,
    /// `[remote] files_base_url`
    pub files_base_url: Option<String>,
    /// `[install] root`
    pub install_root: Option<PathBuf>,
    /// `[download] max_speed_mib`, the bandwidth ceiling in MiB/s.
    pub max_speed_mib: Option<u64>,
    /// `[download] timeout_secs`
    pub timeout_secs: Option<u64>,
    /// `[manifest] cache_ttl_secs`
    pub cache_ttl_secs: Option<u64>,
}

impl ConfigFile {
    /// Load from the default location; missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from an explicit path. Unknown sections and keys are ignored.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut config = Self::default();

        if let Some(section) = ini.section(Some("remote")) {
            config.manifest_url = section.get("manifest_url").map(str::to_string);
            config.files_base_url = section.get("files_base_url").map(str::to_string);
        }

        if let Some(section) = ini.section(Some("install")) {
            config.install_root = section.get("root").map(PathBuf::from);
        }

        if let Some(section) = ini.section(Some("download")) {
            config.max_speed_mib = parse_u64(section.get("max_speed_mib"), "download.max_speed_mib")?;
            config.timeout_secs = parse_u64(section.get("timeout_secs"), "download.timeout_secs")?;
        }

        if let Some(section) = ini.section(Some("manifest")) {
            config.cache_ttl_secs =
                parse_u64(section.get("cache_ttl_secs"), "manifest.cache_ttl_secs")?;
        }

        Ok(config)
    }

    /// Save to the default location, creating parent directories.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut ini = Ini::new();

        if let Some(v) = &self.manifest_url {
            ini.with_section(Some("remote")).set("manifest_url", v);
        }
        if let Some(v) = &self.files_base_url {
            ini.with_section(Some("remote")).set("files_base_url", v);
        }
        if let Some(v) = &self.install_root {
            ini.with_section(Some("install"))
                .set("root", v.display().to_string());
        }
        if let Some(v) = self.max_speed_mib {
            ini.with_section(Some("download"))
                .set("max_speed_mib", v.to_string());
        }
        if let Some(v) = self.timeout_secs {
            ini.with_section(Some("download"))
                .set("timeout_secs", v.to_string());
        }
        if let Some(v) = self.cache_ttl_secs {
            ini.with_section(Some("manifest"))
                .set("cache_ttl_secs", v.to_string());
        }

        ini.write_to_file(path)?;
        Ok(())
    }

    /// Build an [`EngineConfig`], applying defaults for unset options.
    ///
    /// The remote URLs are required; everything else has a default.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let manifest_url = self
            .manifest_url
            .clone()
            .ok_or(ConfigError::Missing("remote.manifest_url"))?;
        let files_base_url = self
            .files_base_url
            .clone()
            .ok_or(ConfigError::Missing("remote.files_base_url"))?;

        let mut config = EngineConfig::new(
            manifest_url,
            files_base_url,
            self.install_root.clone().unwrap_or_else(default_install_root),
        );

        if let Some(mib) = self.max_speed_mib {
            config.max_bytes_per_sec = mib * 1024 * 1024;
        }
        if let Some(secs) = self.timeout_secs {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.cache_ttl_secs {
            config.manifest_ttl = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse_u64(value: Option<&str>, key: &str) -> Result<Option<u64>, ConfigError> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
            }),
    }
}

/// Typed handle to one config setting, addressed as `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ManifestUrl,
    FilesBaseUrl,
    InstallRoot,
    MaxSpeedMib,
    TimeoutSecs,
    CacheTtlSecs,
}

impl ConfigKey {
    /// All known keys, in display order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            Self::ManifestUrl,
            Self::FilesBaseUrl,
            Self::InstallRoot,
            Self::MaxSpeedMib,
            Self::TimeoutSecs,
            Self::CacheTtlSecs,
        ]
    }

    /// INI section this key lives in.
    pub fn section(&self) -> &'static str {
        match self {
            Self::ManifestUrl | Self::FilesBaseUrl => "remote",
            Self::InstallRoot => "install",
            Self::MaxSpeedMib | Self::TimeoutSecs => "download",
            Self::CacheTtlSecs => "manifest",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ManifestUrl => "remote.manifest_url",
            Self::FilesBaseUrl => "remote.files_base_url",
            Self::InstallRoot => "install.root",
            Self::MaxSpeedMib => "download.max_speed_mib",
            Self::TimeoutSecs => "download.timeout_secs",
            Self::CacheTtlSecs => "manifest.cache_ttl_secs",
        }
    }

    /// Current value as a display string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            Self::ManifestUrl => config.manifest_url.clone().unwrap_or_default(),
            Self::FilesBaseUrl => config.files_base_url.clone().unwrap_or_default(),
            Self::InstallRoot => config
                .install_root
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            Self::MaxSpeedMib => config
                .max_speed_mib
                .map(|v| v.to_string())
                .unwrap_or_default(),
            Self::TimeoutSecs => config
                .timeout_secs
                .map(|v| v.to_string())
                .unwrap_or_default(),
            Self::CacheTtlSecs => config
                .cache_ttl_secs
                .map(|v| v.to_string())
                .unwrap_or_default(),
        }
    }

    /// Set the value from its string form.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        match self {
            Self::ManifestUrl => config.manifest_url = Some(value.to_string()),
            Self::FilesBaseUrl => config.files_base_url = Some(value.to_string()),
            Self::InstallRoot => config.install_root = Some(PathBuf::from(value)),
            Self::MaxSpeedMib => config.max_speed_mib = parse_u64(Some(value), self.name())?,
            Self::TimeoutSecs => config.timeout_secs = parse_u64(Some(value), self.name())?,
            Self::CacheTtlSecs => config.cache_ttl_secs = parse_u64(Some(value), self.name())?,
        }
        Ok(())
    }
}

impl FromStr for ConfigKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::new(
            "http://example.com/manifest.json",
            "http://example.com/files/",
            "/tmp/install",
        );

        assert_eq!(config.max_bytes_per_sec, 20 * 1024 * 1024);
        assert_eq!(config.manifest_ttl, Duration::from_secs(300));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::new("http://m", "http://f", "/i")
            .with_max_bytes_per_sec(1024)
            .with_manifest_ttl(Duration::from_secs(60))
            .with_http_timeout(Duration::from_secs(5));

        assert_eq!(config.max_bytes_per_sec, 1024);
        assert_eq!(config.manifest_ttl, Duration::from_secs(60));
        assert_eq!(config.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        let config = ConfigFile {
            manifest_url: Some("http://example.com/manifest.json".to_string()),
            files_base_url: Some("http://example.com/files/".to_string()),
            install_root: Some(PathBuf::from("/games/myserver")),
            max_speed_mib: Some(10),
            timeout_secs: Some(45),
            cache_ttl_secs: Some(120),
        };

        config.save_to(&path).unwrap();
        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[remote]\nmanifest_url = http://example.com/m.json\n").unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(
            loaded.manifest_url.as_deref(),
            Some("http://example.com/m.json")
        );
        assert_eq!(loaded.files_base_url, None);
        assert_eq!(loaded.max_speed_mib, None);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[remote]\nmystery = 1\n[future]\nx = y\n").unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, ConfigFile::default());
    }

    #[test]
    fn test_invalid_number_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[download]\nmax_speed_mib = fast\n").unwrap();

        let result = ConfigFile::load_from(&path);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_engine_config_requires_urls() {
        let config = ConfigFile::default();
        assert!(matches!(
            config.engine_config(),
            Err(ConfigError::Missing("remote.manifest_url"))
        ));

        let config = ConfigFile {
            manifest_url: Some("http://m".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.engine_config(),
            Err(ConfigError::Missing("remote.files_base_url"))
        ));
    }

    #[test]
    fn test_engine_config_applies_overrides() {
        let config = ConfigFile {
            manifest_url: Some("http://m".to_string()),
            files_base_url: Some("http://f".to_string()),
            install_root: Some(PathBuf::from("/i")),
            max_speed_mib: Some(5),
            timeout_secs: Some(10),
            cache_ttl_secs: Some(60),
        };

        let engine = config.engine_config().unwrap();
        assert_eq!(engine.max_bytes_per_sec, 5 * 1024 * 1024);
        assert_eq!(engine.http_timeout, Duration::from_secs(10));
        assert_eq!(engine.manifest_ttl, Duration::from_secs(60));
        assert_eq!(engine.install_root, PathBuf::from("/i"));
    }

    #[test]
    fn test_config_key_parse_and_name() {
        let key: ConfigKey = "remote.manifest_url".parse().unwrap();
        assert_eq!(key, ConfigKey::ManifestUrl);
        assert_eq!(key.section(), "remote");
        assert!("nonsense.key".parse::<ConfigKey>().is_err());
    }

    #[test]
    fn test_config_key_get_set() {
        let mut config = ConfigFile::default();

        ConfigKey::MaxSpeedMib.set(&mut config, "12").unwrap();
        assert_eq!(config.max_speed_mib, Some(12));
        assert_eq!(ConfigKey::MaxSpeedMib.get(&config), "12");

        assert!(ConfigKey::MaxSpeedMib.set(&mut config, "slow").is_err());
        assert_eq!(ConfigKey::ManifestUrl.get(&config), "");
    }
}
