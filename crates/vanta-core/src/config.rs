//! Configuration management for VantaDB.
//!
//! Layered sources with precedence: environment variables, then an optional
//! config file (`VANTA_CONFIG`, `./config/vanta.yaml`, `/etc/vanta/vanta.yaml`),
//! then hardcoded defaults.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VantaConfig {
    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub query: QuerySettings,

    #[serde(default)]
    pub engine: EngineSettings,
}

/// Default HNSW parameters applied to new collections.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexSettings {
    /// Graph degree at layers >= 1.
    pub hnsw_m: usize,
    /// Beam width during construction.
    pub hnsw_ef_construction: usize,
    /// Default beam width during search.
    pub hnsw_ef_search: usize,
}

/// Query-path tunables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuerySettings {
    /// Over-fetch multiplier applied when a filter is present.
    pub overfetch_factor: usize,
}

/// Engine-level tunables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    /// Interval between TTL sweep passes, in seconds. Zero disables the sweeper.
    pub sweep_interval_secs: u64,
    /// Audit log retention capacity.
    pub audit_capacity: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 50,
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self { overfetch_factor: 10 }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            audit_capacity: 10_000,
        }
    }
}

impl Default for VantaConfig {
    fn default() -> Self {
        Self {
            index: IndexSettings::default(),
            query: QuerySettings::default(),
            engine: EngineSettings::default(),
        }
    }
}

impl VantaConfig {
    /// Load configuration from files and the environment.
    ///
    /// Environment overrides use the `VANTA` prefix with `__` separators,
    /// e.g. `VANTA_INDEX__HNSW_M=32`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        builder = Self::set_defaults(builder)?;

        if let Ok(config_path) = std::env::var("VANTA_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        builder = builder
            .add_source(File::with_name("./config/vanta").required(false))
            .add_source(File::with_name("/etc/vanta/vanta").required(false));

        builder = builder.add_source(
            Environment::with_prefix("VANTA")
                .separator("__")
                .try_parsing(true),
        );

        let config: VantaConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("index.hnsw_m", 16)?
            .set_default("index.hnsw_ef_construction", 200)?
            .set_default("index.hnsw_ef_search", 50)?
            .set_default("query.overfetch_factor", 10)?
            .set_default("engine.sweep_interval_secs", 60)?
            .set_default("engine.audit_capacity", 10_000)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.hnsw_m == 0 {
            return Err(ConfigError::Message("index.hnsw_m must be > 0".to_string()));
        }
        if self.index.hnsw_ef_construction == 0 {
            return Err(ConfigError::Message(
                "index.hnsw_ef_construction must be > 0".to_string(),
            ));
        }
        if self.index.hnsw_ef_search == 0 {
            return Err(ConfigError::Message(
                "index.hnsw_ef_search must be > 0".to_string(),
            ));
        }
        if self.query.overfetch_factor == 0 {
            return Err(ConfigError::Message(
                "query.overfetch_factor must be > 0".to_string(),
            ));
        }
        if self.engine.audit_capacity == 0 {
            return Err(ConfigError::Message(
                "engine.audit_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
