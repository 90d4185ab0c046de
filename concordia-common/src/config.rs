//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration is resolved in priority order:
//! 1. Command-line argument (highest priority, supplied by the binary)
//! 2. Environment variable (`CONCORDIA_ROOT_FOLDER`, then `CONCORDIA_ROOT`)
//! 3. TOML config file (`~/.config/concordia/<module>.toml`, then `/etc/concordia/<module>.toml`)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file never stops startup: a warning is
//! logged and compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Primary environment variable naming the root folder
pub const ENV_ROOT_FOLDER: &str = "CONCORDIA_ROOT_FOLDER";

/// Alternative (shorter) environment variable naming the root folder
pub const ENV_ROOT: &str = "CONCORDIA_ROOT";

/// Database file created inside the root folder
pub const DATABASE_FILE_NAME: &str = "concordia.db";

/// Default HTTP port for concordia-ws
pub const DEFAULT_PORT: u16 = 5730;

/// Compiled-in defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub port: u16,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was compiled for
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: default_log_level(),
            log_file: None,
            port: DEFAULT_PORT,
        }
    }
}

fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/concordia (or /var/lib/concordia for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("concordia"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/concordia"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("concordia"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/concordia"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("concordia"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\concordia"))
    } else {
        PathBuf::from("./concordia_data")
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_page_size() -> i64 {
    crate::pagination::DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> i64 {
    crate::pagination::MAX_PAGE_SIZE
}

fn default_busy_timeout_ms() -> u64 {
    250
}

fn default_max_lock_wait_ms() -> u64 {
    5000
}

fn default_max_connections() -> u32 {
    10
}

/// Bootstrap configuration loaded from `<module>.toml`
///
/// Every field is optional in the file; absent fields take compiled defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding `concordia.db`
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub listing: ListingConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            logging: LoggingConfig::default(),
            listing: ListingConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Asset listing limits
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListingConfig {
    /// `per_page` used when the request does not name one
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,

    /// Hard cap applied to any requested `per_page`
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// SQLite connection and write-lock tuning
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite busy_timeout applied to every connection
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Total time a ledger write keeps retrying a locked database
    #[serde(default = "default_max_lock_wait_ms")]
    pub max_lock_wait_ms: u64,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
            max_lock_wait_ms: default_max_lock_wait_ms(),
            max_connections: default_max_connections(),
        }
    }
}

/// Locate `<module>.toml`, preferring the per-user config directory
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", module_name);

    let user_config = dirs::config_dir().map(|d| d.join("concordia").join(&file_name));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/concordia").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Write a TOML config file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load a module's TOML config with graceful degradation
///
/// Missing file → defaults. Unreadable or invalid file → warning + defaults.
pub fn load_module_config(module_name: &str, explicit_path: Option<&Path>) -> TomlConfig {
    let path = match explicit_path {
        Some(path) => Some(path.to_path_buf()),
        None => config_file_path(module_name),
    };

    let Some(path) = path else {
        info!(module = module_name, "No config file found, using compiled defaults");
        return TomlConfig::default();
    };

    match load_toml_config(&path) {
        Ok(config) => {
            info!(path = %path.display(), "Loaded configuration");
            config
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unusable config file, using compiled defaults");
            TomlConfig::default()
        }
    }
}

/// Resolves the root folder following the documented priority order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_override: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_override: None,
            toml_root: None,
        }
    }

    /// Command-line value (priority 1)
    pub fn with_cli_override(mut self, path: Option<PathBuf>) -> Self {
        self.cli_override = path;
        self
    }

    /// Value taken from an already-loaded TOML config (priority 3)
    pub fn with_toml_config(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_override {
            return path.clone();
        }

        for var in [ENV_ROOT_FOLDER, ENV_ROOT] {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    return PathBuf::from(value);
                }
            }
        }

        if let Some(path) = &self.toml_root {
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Prepares the resolved root folder for use
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder (and parents) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: TomlConfig = toml::from_str("port = 6000").unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.listing.max_page_size, crate::pagination::MAX_PAGE_SIZE);
        assert_eq!(config.database.max_lock_wait_ms, 5000);
        assert!(config.root_folder.is_none());
    }

    #[test]
    fn test_partial_listing_section() {
        let config: TomlConfig = toml::from_str("[listing]\nmax_page_size = 50\n").unwrap();
        assert_eq!(config.listing.max_page_size, 50);
        assert_eq!(config.listing.default_page_size, crate::pagination::DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_cli_override_wins() {
        let resolver = RootFolderResolver::new("concordia-ws")
            .with_cli_override(Some(PathBuf::from("/tmp/from-cli")));
        assert_eq!(resolver.resolve(), PathBuf::from("/tmp/from-cli"));
    }
}
