use super::reproduction::ReproductionConfig;
use crate::error::ClanTuneError;
use config::{Config, Environment, File};
use log::warn;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Prefix of environment variables overriding file values,
/// e.g. `CLANTUNE_SEED=7` or `CLANTUNE_MUTATION__STD=0.2`.
pub const ENV_PREFIX: &str = "CLANTUNE";

pub struct ConfigManager {
    config: Arc<RwLock<ReproductionConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(ReproductionConfig::default())),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ReproductionConfig>, ClanTuneError> {
        self.config
            .read()
            .map_err(|_| ClanTuneError::Configuration("Config lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ReproductionConfig>, ClanTuneError> {
        self.config
            .write()
            .map_err(|_| ClanTuneError::Configuration("Config lock poisoned".to_string()))
    }

    /// Loads a file (format from its extension), then applies `CLANTUNE_*`
    /// environment overrides.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ClanTuneError> {
        let path = path.as_ref();
        let overrides: Vec<String> = std::env::vars()
            .map(|(key, _)| key)
            .filter(|key| key.starts_with(&format!("{}_", ENV_PREFIX)))
            .collect();
        if !overrides.is_empty() {
            warn!("Environment overrides applied to {}: {:?}", path.display(), overrides);
        }

        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ClanTuneError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: ReproductionConfig = settings
            .try_deserialize()
            .map_err(|e| ClanTuneError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        *self.write()? = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ClanTuneError> {
        let config = self.read()?;
        let toml_str = toml::to_string_pretty(&*config)
            .map_err(|e| ClanTuneError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| ClanTuneError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> Result<ReproductionConfig, ClanTuneError> {
        Ok(self.read()?.clone())
    }

    /// Applies `f` and keeps the result only if it validates.
    pub fn update<F>(&self, f: F) -> Result<(), ClanTuneError>
    where
        F: FnOnce(&mut ReproductionConfig),
    {
        let mut config = self.write()?;
        let mut candidate = config.clone();
        f(&mut candidate);
        candidate.validate()?;
        *config = candidate;
        Ok(())
    }
}
