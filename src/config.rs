use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for milemark
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MilemarkConfig {
    /// Storage settings
    pub storage: StorageConfig,
    /// Invoicing defaults
    pub invoicing: InvoicingConfig,
    /// External directory lookup settings
    pub directory: DirectoryConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Database settings (optional; used by the `database` feature)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Path to the JSON snapshot the CLI operates on
    pub state_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvoicingConfig {
    /// Payment terms applied when the caller gives none (Net-N days)
    pub default_net_days: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryConfig {
    /// Path to the local directory registry (jobs/companies/engineers)
    pub registry_path: String,
    /// TTL for cached existence lookups, in seconds
    pub cache_ttl_seconds: u64,
    /// Cache capacity (entries)
    pub cache_capacity: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Enable structured tracing output
    pub tracing_enabled: bool,
    /// Log level
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file path or connection string
    pub url: String,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for MilemarkConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                state_path: ".milemark/contracts.json".to_string(),
            },
            invoicing: InvoicingConfig {
                default_net_days: 14,
            },
            directory: DirectoryConfig {
                registry_path: ".milemark/directory.json".to_string(),
                cache_ttl_seconds: 300,
                cache_capacity: 10_000,
            },
            observability: ObservabilityConfig {
                tracing_enabled: true,
                log_level: "info".to_string(),
            },
            database: None,
        }
    }
}

impl MilemarkConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (milemark.toml)
    /// 3. Environment variables (prefixed with MILEMARK_)
    pub fn load() -> Result<Self> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&MilemarkConfig::default())?);

        if Path::new("milemark.toml").exists() {
            builder = builder.add_source(File::with_name("milemark"));
        }

        builder = builder.add_source(
            Environment::with_prefix("MILEMARK")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let milemark_config: MilemarkConfig = config.try_deserialize()?;
        Ok(milemark_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<MilemarkConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = MilemarkConfig::load_env_file();
        MilemarkConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static MilemarkConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let cfg = MilemarkConfig::default();
        assert_eq!(cfg.invoicing.default_net_days, 14);
        assert!(cfg.database.is_none());
        assert!(cfg.directory.cache_ttl_seconds > 0);
    }
}
