use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use config::{Config, Environment, File, Map};
use fhirqb_search::SearchConfig;
use serde::Deserialize;

/// Default configuration file looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "fhirqb.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    /// Search parameter definition file; built-in common parameters when unset
    pub parameters: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub sql: SqlConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    pub schema: String,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        let search = &self.search;
        if search.max_count == 0 {
            bail!("search.max_count must be >= 1");
        }
        if search.default_count == 0 || search.default_count > search.max_count {
            bail!(
                "search.default_count must be between 1 and search.max_count ({})",
                search.max_count
            );
        }
        if search.join_foreign_key.trim().is_empty() {
            bail!("search.join_foreign_key must not be empty");
        }
        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            bail!("logging.level '{}' is not a log level", self.logging.level);
        }
        Ok(())
    }
}

/// Load configuration: the file (explicit, or `fhirqb.toml` when present),
/// then `FHIRQB__*` environment overrides, e.g. `FHIRQB__SEARCH__MAX_COUNT=50`.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    load_config_from(path, None)
}

fn load_config_from(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<AppConfig> {
    let mut builder = Config::builder();
    match path {
        Some(p) => {
            if !p.exists() {
                bail!("config file {} does not exist", p.display());
            }
            builder = builder.add_source(File::from(p));
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path));
            }
        }
    }
    builder = builder.add_source(
        Environment::with_prefix("FHIRQB")
            .try_parsing(true)
            .separator("__")
            .source(env),
    );

    let merged: AppConfig = builder
        .build()
        .context("config build error")?
        .try_deserialize()
        .context("config deserialize error")?;
    merged.validate()?;
    Ok(merged)
}
