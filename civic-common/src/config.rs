//! Configuration loading and root folder resolution
//!
//! Values resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing config file is not an error; defaults are used and a warning is
//! logged. A config file that exists but does not parse is an error.

use crate::reconcile::StationMatch;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "civic.db";

/// Config file name inside the platform config directory
pub const CONFIG_FILE: &str = "civic.toml";

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "CIVIC_ROOT_FOLDER";

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "CIVIC_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CivicConfig {
    /// Folder holding the database
    pub root_folder: Option<PathBuf>,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub registration: RegistrationConfig,
    pub reconciliation: ReconciliationConfig,
    pub reference: ReferenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// When false, the `X-User-Id` header is trusted instead of a bearer session
    pub enabled: bool,
    /// Lifetime of sessions issued by biometric verification
    pub session_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            session_ttl_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Secret mixed into every national ID digest
    pub national_id_pepper: String,
    /// Attempts at a collision-free civic code before giving up
    pub max_code_attempts: u32,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            national_id_pepper: String::new(),
            max_code_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    pub station_match: StationMatch,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// External reference dataset; the built-in one is used when absent
    pub path: Option<PathBuf>,
}

impl CivicConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load configuration
    ///
    /// An explicitly named file must exist. Without one, `CIVIC_CONFIG` and
    /// then the platform default location are tried; if neither exists the
    /// compiled defaults are returned.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let config = Self::from_file(path)?;
            info!("Loaded config: {}", path.display());
            return Ok(config);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            let config = Self::from_file(&path)?;
            info!("Loaded config from {}: {}", CONFIG_ENV, path.display());
            return Ok(config);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                let config = Self::from_file(&path)?;
                info!("Loaded config: {}", path.display());
                Ok(config)
            }
            _ => {
                warn!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject settings that would make the service misbehave
    pub fn validate(&self) -> Result<()> {
        if self.registration.max_code_attempts == 0 {
            return Err(Error::Config(
                "registration.max_code_attempts must be at least 1".to_string(),
            ));
        }
        if self.auth.session_ttl_days <= 0 {
            return Err(Error::Config(
                "auth.session_ttl_days must be positive".to_string(),
            ));
        }
        if self.registration.national_id_pepper.is_empty() {
            warn!("registration.national_id_pepper is empty; national ID digests are only salted");
        }
        Ok(())
    }
}

/// Platform config file location (`~/.config/civic/civic.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    if cfg!(target_os = "linux") {
        let user_config = dirs::config_dir().map(|d| d.join("civic").join(CONFIG_FILE));
        let system_config = PathBuf::from("/etc/civic").join(CONFIG_FILE);
        match user_config {
            Some(path) if path.exists() => Some(path),
            _ if system_config.exists() => Some(system_config),
            other => other,
        }
    } else {
        dirs::config_dir().map(|d| d.join("civic").join(CONFIG_FILE))
    }
}

/// Resolve the root folder: CLI argument, environment, TOML, compiled default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &CivicConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("civic"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/civic"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("civic"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/civic"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("civic"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\civic"))
    } else {
        PathBuf::from("./civic_data")
    }
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}
