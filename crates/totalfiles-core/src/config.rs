use crate::dedup::MatchPolicy;
use crate::error::Result;
use crate::hasher::{Algorithm, ChunkedHasher, DEFAULT_CHUNK_SIZE};
use crate::storage::models::CollectionConfig;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;

/// What to do when a catalog lookup or write fails for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Record the failure and move on to the next file.
    #[default]
    Continue,
    /// Stop the whole run at the first failure.
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub algorithm: Algorithm,
    pub chunk_size: usize,
    pub match_policy: MatchPolicy,
    pub on_error: OnError,
    pub ignore_patterns: Vec<String>,
    /// Seeded into the settings table when it is empty.
    pub default_collection: CollectionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "totalfiles.db".to_string(),
            algorithm: Algorithm::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            match_policy: MatchPolicy::default(),
            on_error: OnError::default(),
            ignore_patterns: Vec::new(),
            default_collection: CollectionConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn hasher(&self) -> Result<ChunkedHasher> {
        ChunkedHasher::new(self.algorithm, self.chunk_size)
    }
}

/// Load `Config.toml` (if present) from the working directory.
pub fn load_configuration() -> std::result::Result<AppConfig, ConfigError> {
    load_configuration_from("Config")
}

/// Load configuration from `name` (extension optional, file optional), then
/// apply `TOTALFILES_*` environment overrides (`__` separates nested keys)
/// and finally `DATABASE_URL`.
pub fn load_configuration_from(name: &str) -> std::result::Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(false))
        .add_source(
            Environment::with_prefix("TOTALFILES")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("database_url", env::var("DATABASE_URL").ok())?
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
