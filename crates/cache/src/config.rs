//! Persistent dict configuration with precedence and validation
use crate::backend::{BackendKind, LocalStatefulBackend};
use pdict_codec::{CompressionKind, SerializerKind, SerializerOptions};
use pdict_core::{
    Error, Result, ResultExt, CONFIG_SECTION, DEFAULT_ENCODING, DEFAULT_NAME, ENV_ASYNC_ENABLED,
    ENV_BACKEND, ENV_BASE_KEY, ENV_COMPRESSION, ENV_COMPRESSION_LEVEL, ENV_DATA_DIR,
    ENV_ENCODING, ENV_EXPIRATION, ENV_HSET_DISABLED, ENV_REDIS_URL, ENV_SERIALIZER,
};
use pdict_utils::XdgPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for one persistent dict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentDictConfig {
    /// Dict name; also the Local document file stem
    pub name: String,
    pub backend: BackendKind,
    /// `json|orjson|ujson|simdjson|pickle|dill|cloudpickle|bincode|rmp|msgpack`
    pub serializer: String,
    /// `gzip|zlib|lzma|zstd|none`
    pub compression: String,
    pub compression_level: Option<i32>,
    /// Codec tried when the current one cannot decompress an entry
    pub previous_compression: Option<String>,
    /// Also try zlib before giving up on decompression
    pub legacy_fallback: bool,
    pub raise_errors: bool,
    /// Return bare payloads for unregistered record types
    pub allow_unregistered: bool,
    pub base_key: Option<String>,
    /// Default TTL in seconds (Redis)
    pub expiration: Option<u64>,
    pub hset_disabled: bool,
    pub key_separator: Option<String>,
    /// Run blocking writes as background tasks when called inside a runtime
    pub async_enabled: bool,
    /// Local document encoding; only UTF-8 is supported
    pub encoding: String,
    pub file_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub redis_url: Option<String>,
    #[serde(skip)]
    pub source: ConfigSource,
}

impl Default for PersistentDictConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            backend: BackendKind::Auto,
            serializer: SerializerKind::Json.as_str().to_string(),
            compression: CompressionKind::None.as_str().to_string(),
            compression_level: None,
            previous_compression: None,
            legacy_fallback: true,
            raise_errors: false,
            allow_unregistered: false,
            base_key: None,
            expiration: None,
            hset_disabled: false,
            key_separator: None,
            async_enabled: false,
            encoding: DEFAULT_ENCODING.to_string(),
            file_path: None,
            data_dir: None,
            redis_url: None,
            source: ConfigSource::Default,
        }
    }
}

impl PersistentDictConfig {
    /// Check every setting that would otherwise fail at construction
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::configuration("name must not be empty"));
        }
        let options = self.serializer_options()?;
        if let Some(level) = self.compression_level {
            options.compression.validate_level(level)?;
        }

        let encoding = self.encoding.trim().to_ascii_lowercase();
        if encoding != "utf-8" && encoding != "utf8" {
            return Err(Error::configuration(format!(
                "unsupported encoding '{}'; only utf-8 is supported",
                self.encoding
            )));
        }

        if matches!(self.key_separator.as_deref(), Some("")) {
            return Err(Error::configuration("key_separator must not be empty"));
        }

        if self.backend == BackendKind::Redis && self.redis_url.is_none() {
            return Err(Error::configuration(
                "backend 'redis' requires redis_url to be set",
            ));
        }

        Ok(())
    }

    /// Serializer settings derived from this configuration
    pub fn serializer_options(&self) -> Result<SerializerOptions> {
        let kind: SerializerKind = self.serializer.parse()?;
        let compression: CompressionKind = self.compression.parse()?;
        let mut options = SerializerOptions::new(kind)
            .with_compression(compression, self.compression_level)
            .raise_errors(self.raise_errors)
            .allow_unregistered(self.allow_unregistered);
        if let Some(previous) = &self.previous_compression {
            options = options.with_previous_compression(previous.parse()?);
        }
        options.legacy_fallback = self.legacy_fallback;
        Ok(options)
    }

    /// Backend after resolving `auto`
    pub fn resolved_backend(&self) -> BackendKind {
        match self.backend {
            BackendKind::Auto if self.redis_url.is_some() => BackendKind::Redis,
            BackendKind::Auto => BackendKind::Local,
            other => other,
        }
    }

    pub fn expiration_duration(&self) -> Option<Duration> {
        self.expiration.filter(|secs| *secs > 0).map(Duration::from_secs)
    }

    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(XdgPaths::data_dir)
    }

    /// Local document path: `file_path`, else `<data_dir>/<name>.cache`
    pub fn local_file_path(&self) -> PathBuf {
        self.file_path.clone().unwrap_or_else(|| {
            LocalStatefulBackend::default_file_path(&self.resolved_data_dir(), &self.name)
        })
    }
}

/// Source of configuration for debugging and precedence tracking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    #[default]
    Default,
    ConfigFile(PathBuf),
    EnvironmentVariable(String),
    /// Built in code through [`PersistentDictConfigBuilder`]
    Programmatic,
}

/// Builder for creating persistent dict configurations
#[derive(Debug, Clone, Default)]
pub struct PersistentDictConfigBuilder {
    config: PersistentDictConfig,
}

impl PersistentDictConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration, e.g. one produced by [`ConfigLoader`]
    pub fn from_config(config: PersistentDictConfig) -> Self {
        Self { config }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn with_serializer(mut self, serializer: impl Into<String>) -> Self {
        self.config.serializer = serializer.into();
        self
    }

    pub fn with_compression(mut self, compression: impl Into<String>) -> Self {
        self.config.compression = compression.into();
        self
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.config.compression_level = Some(level);
        self
    }

    pub fn with_previous_compression(mut self, previous: impl Into<String>) -> Self {
        self.config.previous_compression = Some(previous.into());
        self
    }

    pub fn with_legacy_fallback(mut self, enabled: bool) -> Self {
        self.config.legacy_fallback = enabled;
        self
    }

    pub fn with_raise_errors(mut self, raise_errors: bool) -> Self {
        self.config.raise_errors = raise_errors;
        self
    }

    pub fn with_allow_unregistered(mut self, allow: bool) -> Self {
        self.config.allow_unregistered = allow;
        self
    }

    pub fn with_base_key(mut self, base_key: impl Into<String>) -> Self {
        self.config.base_key = Some(base_key.into());
        self
    }

    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.config.expiration = Some(expiration.as_secs());
        self
    }

    pub fn with_hset_disabled(mut self, disabled: bool) -> Self {
        self.config.hset_disabled = disabled;
        self
    }

    pub fn with_key_separator(mut self, separator: impl Into<String>) -> Self {
        self.config.key_separator = Some(separator.into());
        self
    }

    pub fn with_async_enabled(mut self, enabled: bool) -> Self {
        self.config.async_enabled = enabled;
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.config.encoding = encoding.into();
        self
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.file_path = Some(path.into());
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(dir.into());
        self
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.config.redis_url = Some(url.into());
        self
    }

    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.config.source = source;
        self
    }

    /// Build and validate the configuration
    pub fn build(mut self) -> Result<PersistentDictConfig> {
        if self.config.source == ConfigSource::Default {
            self.config.source = ConfigSource::Programmatic;
        }
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Partial settings read from one configuration layer
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
struct ConfigOverrides {
    name: Option<String>,
    backend: Option<BackendKind>,
    serializer: Option<String>,
    compression: Option<String>,
    compression_level: Option<i32>,
    previous_compression: Option<String>,
    legacy_fallback: Option<bool>,
    raise_errors: Option<bool>,
    allow_unregistered: Option<bool>,
    base_key: Option<String>,
    expiration: Option<u64>,
    hset_disabled: Option<bool>,
    key_separator: Option<String>,
    async_enabled: Option<bool>,
    encoding: Option<String>,
    file_path: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    redis_url: Option<String>,
}

/// Configuration loader that handles precedence:
/// defaults < config file < environment
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the XDG config file and the environment
    pub fn load() -> Result<PersistentDictConfig> {
        Self::load_from(&Self::get_config_file_path())
    }

    /// Load configuration using `config_path` as the config file
    pub fn load_from(config_path: &Path) -> Result<PersistentDictConfig> {
        let mut config = Self::load_defaults();

        if let Some(file_config) = Self::load_from_config_file(config_path)? {
            config = Self::merge_config(
                config,
                file_config,
                ConfigSource::ConfigFile(config_path.to_path_buf()),
            );
        }

        if let Some(env_config) = Self::load_from_env()? {
            config = Self::merge_config(
                config,
                env_config,
                ConfigSource::EnvironmentVariable("PDICT_*".to_string()),
            );
        }

        config.validate()?;
        Ok(config)
    }

    fn load_defaults() -> PersistentDictConfig {
        PersistentDictConfig::default()
    }

    fn load_from_config_file(config_path: &Path) -> Result<Option<ConfigOverrides>> {
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path)
            .map_err(|e| Error::file_system(config_path, "read config file", e))?;
        let file_config: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", config_path.display()))?;

        let Some(section) = file_config.get(CONFIG_SECTION) else {
            tracing::debug!(
                "No '{}' section in {}",
                CONFIG_SECTION,
                config_path.display()
            );
            return Ok(None);
        };
        let overrides: ConfigOverrides = serde_json::from_value(section.clone())
            .context(format!("invalid '{CONFIG_SECTION}' section"))?;
        Ok(Some(overrides))
    }

    fn load_from_env() -> Result<Option<ConfigOverrides>> {
        let mut overrides = ConfigOverrides::default();

        if let Some(serializer) = env_string(ENV_SERIALIZER) {
            overrides.serializer = Some(serializer);
        }
        if let Some(compression) = env_string(ENV_COMPRESSION) {
            overrides.compression = Some(compression);
        }
        if let Some(level) = env_string(ENV_COMPRESSION_LEVEL) {
            overrides.compression_level = Some(parse_env(ENV_COMPRESSION_LEVEL, &level)?);
        }
        if let Some(base_key) = env_string(ENV_BASE_KEY) {
            overrides.base_key = Some(base_key);
        }
        if let Some(expiration) = env_string(ENV_EXPIRATION) {
            overrides.expiration = Some(parse_env(ENV_EXPIRATION, &expiration)?);
        }
        if let Some(flag) = env_string(ENV_HSET_DISABLED) {
            overrides.hset_disabled = Some(parse_flag(ENV_HSET_DISABLED, &flag)?);
        }
        if let Some(flag) = env_string(ENV_ASYNC_ENABLED) {
            overrides.async_enabled = Some(parse_flag(ENV_ASYNC_ENABLED, &flag)?);
        }
        if let Some(encoding) = env_string(ENV_ENCODING) {
            overrides.encoding = Some(encoding);
        }
        if let Some(backend) = env_string(ENV_BACKEND) {
            overrides.backend = Some(backend.parse()?);
        }
        if let Some(url) = env_string(ENV_REDIS_URL) {
            overrides.redis_url = Some(url);
        }
        if let Some(dir) = env_string(ENV_DATA_DIR) {
            overrides.data_dir = Some(PathBuf::from(dir));
        }

        if overrides == ConfigOverrides::default() {
            Ok(None)
        } else {
            Ok(Some(overrides))
        }
    }

    /// Get the configuration file path
    pub fn get_config_file_path() -> PathBuf {
        XdgPaths::config_file()
    }

    fn merge_config(
        base: PersistentDictConfig,
        overrides: ConfigOverrides,
        source: ConfigSource,
    ) -> PersistentDictConfig {
        let mut config = base;

        if let Some(name) = overrides.name {
            config.name = name;
        }
        if let Some(backend) = overrides.backend {
            config.backend = backend;
        }
        if let Some(serializer) = overrides.serializer {
            config.serializer = serializer;
        }
        if let Some(compression) = overrides.compression {
            config.compression = compression;
        }
        if overrides.compression_level.is_some() {
            config.compression_level = overrides.compression_level;
        }
        if overrides.previous_compression.is_some() {
            config.previous_compression = overrides.previous_compression;
        }
        if let Some(enabled) = overrides.legacy_fallback {
            config.legacy_fallback = enabled;
        }
        if let Some(raise_errors) = overrides.raise_errors {
            config.raise_errors = raise_errors;
        }
        if let Some(allow) = overrides.allow_unregistered {
            config.allow_unregistered = allow;
        }
        if overrides.base_key.is_some() {
            config.base_key = overrides.base_key;
        }
        if overrides.expiration.is_some() {
            config.expiration = overrides.expiration;
        }
        if let Some(disabled) = overrides.hset_disabled {
            config.hset_disabled = disabled;
        }
        if overrides.key_separator.is_some() {
            config.key_separator = overrides.key_separator;
        }
        if let Some(enabled) = overrides.async_enabled {
            config.async_enabled = enabled;
        }
        if let Some(encoding) = overrides.encoding {
            config.encoding = encoding;
        }
        if overrides.file_path.is_some() {
            config.file_path = overrides.file_path;
        }
        if overrides.data_dir.is_some() {
            config.data_dir = overrides.data_dir;
        }
        if overrides.redis_url.is_some() {
            config.redis_url = overrides.redis_url;
        }

        config.source = source;
        config
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        Error::configuration(format!("{name} has an invalid value '{value}'"))
    })
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::configuration(format!(
            "{name} must be a boolean, got '{value}'"
        ))),
    }
}
