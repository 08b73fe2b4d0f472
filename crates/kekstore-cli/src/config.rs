use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::{config_dir, data_dir};
use kekstore_storage::EncryptedFsConfig;
use serde::{Deserialize, Serialize};

/// User-level configuration loaded from `<config dir>/kekstore/config.toml`.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Keystore location and master key; platform defaults when absent.
    pub keystore: Option<EncryptedFsConfig>,
}

impl Config {
    /// Effective keystore settings.
    pub fn keystore(&self) -> Result<EncryptedFsConfig> {
        match &self.keystore {
            Some(keystore) => Ok(keystore.clone()),
            None => default_keystore(),
        }
    }
}

/// Load config from `path`, or from the default path when none is given.
pub fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_from_path(path),
        None => load_from_path(default_path()?),
    }
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("kekstore").join("config.toml"))
}

/// Default keystore: `<data dir>/kekstore` with the master key beside it.
pub fn default_keystore() -> Result<EncryptedFsConfig> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(EncryptedFsConfig::new(
        base.join("kekstore"),
        base.join("kekstore.key"),
    ))
}

/// Write `config` to `path` unless a file is already there, creating parent
/// directories as needed. Existing files are left untouched.
pub fn write_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}
