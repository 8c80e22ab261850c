//! Configuration Management
//!
//! This module loads and saves Folio's connection defaults.
//!
//! # Configuration Locations
//! - Local: `.folio/config.json` (per project directory)
//! - Global: `~/.config/folio/config.json` (per user)
//!
//! # Resolution Precedence
//! 1. Command-line flags (highest priority)
//! 2. Local config file
//! 3. Global config file
//! 4. Built-in defaults
//!
//! Files are merged field by field: a local file that only sets `port`
//! keeps every other value from the global file.
//!
//! Passwords are never written to disk. `password_env` names an environment
//! variable to read the password from instead.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FolioError, Result};
use crate::gateway::{SessionConfig, DEFAULT_MIN_MESSAGES};
use crate::session::Credentials;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_MAINTENANCE_DATABASE: &str = "postgres";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Connection defaults, every field optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FolioConfig {
    /// Backend hostname
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Backend port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Catalog used to create and drop databases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_database: Option<String>,

    /// Username that is granted the Administrator role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_username: Option<String>,

    /// Lowest notice severity the backend should send (`notice`, `warning`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_min_messages: Option<String>,

    /// Table offered at the table prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_table: Option<String>,

    /// Environment variable holding the password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

impl FolioConfig {
    /// Overlay `other` on top of `self`; fields set in `other` win
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            host: other.host.or(self.host),
            port: other.port.or(self.port),
            maintenance_database: other.maintenance_database.or(self.maintenance_database),
            admin_username: other.admin_username.or(self.admin_username),
            client_min_messages: other.client_min_messages.or(self.client_min_messages),
            default_table: other.default_table.or(self.default_table),
            password_env: other.password_env.or(self.password_env),
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    #[must_use]
    pub fn maintenance_database(&self) -> &str {
        self.maintenance_database.as_deref().unwrap_or(DEFAULT_MAINTENANCE_DATABASE)
    }

    #[must_use]
    pub fn admin_username(&self) -> &str {
        self.admin_username.as_deref().unwrap_or(DEFAULT_ADMIN_USERNAME)
    }

    #[must_use]
    pub fn client_min_messages(&self) -> &str {
        self.client_min_messages.as_deref().unwrap_or(DEFAULT_MIN_MESSAGES)
    }

    /// Resolve `password_env`
    ///
    /// Returns `Ok(None)` when no variable is configured, and an error when
    /// one is configured but unset.
    pub fn resolve_password(&self) -> Result<Option<String>> {
        let Some(env_var) = &self.password_env else {
            return Ok(None);
        };

        std::env::var(env_var).map(Some).map_err(|_| {
            FolioError::config_error(format!("Environment variable {env_var} not found for password"))
        })
    }

    /// Session parameters for the given credentials
    #[must_use]
    pub fn session_config(&self, credentials: &Credentials) -> SessionConfig {
        SessionConfig {
            host: self.host().to_string(),
            port: self.port(),
            database: credentials.database.clone(),
            maintenance_database: self.maintenance_database().to_string(),
            user: credentials.username.clone(),
            password: credentials.password.clone(),
            min_messages: self.client_min_messages().to_lowercase(),
        }
    }
}

/// Configuration file location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLocation {
    /// `.folio/config.json` in the current directory
    Local,
    /// `~/.config/folio/config.json`
    Global,
}

impl ConfigLocation {
    pub fn path(self) -> Result<PathBuf> {
        match self {
            Self::Local => local_config_path(),
            Self::Global => global_config_path(),
        }
    }
}

/// Get path to local config file (`.folio/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        FolioError::config_error(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".folio").join("config.json"))
}

/// Get path to global config file (`~/.config/folio/config.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| FolioError::config_error("Could not determine user config directory"))?;

    Ok(config_dir.join("folio").join("config.json"))
}

/// Load a config file; a missing file is an empty config
pub fn load_config(path: &Path) -> Result<FolioConfig> {
    if !path.exists() {
        return Ok(FolioConfig::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| FolioError::config_error(format!("Could not read config file: {e}")))?;

    serde_json::from_str(&contents).map_err(|e| {
        FolioError::config_error(format!("Invalid config file {}: {e}", path.display()))
    })
}

/// Save a config file, creating its directory if needed
pub fn save_config(path: &Path, config: &FolioConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            FolioError::config_error(format!("Could not create config directory: {e}"))
        })?;
    }

    let contents = serde_json::to_string_pretty(config)
        .map_err(|e| FolioError::config_error(format!("Could not serialize config: {e}")))?;

    fs::write(path, contents)
        .map_err(|e| FolioError::config_error(format!("Could not write config file: {e}")))?;

    Ok(())
}

/// Merge `overlay` into the file at `location`
pub fn update_config(location: ConfigLocation, overlay: FolioConfig) -> Result<PathBuf> {
    let path = location.path()?;
    let merged = load_config(&path)?.merge(overlay);
    save_config(&path, &merged)?;
    Ok(path)
}

/// Load global then local config, local taking precedence
pub fn load_with_precedence() -> Result<FolioConfig> {
    let global = load_config(&global_config_path()?)?;
    let local = load_config(&local_config_path()?)?;
    Ok(global.merge(local))
}
