//! Lock session configuration
//!
//! Loaded from `$XDG_CONFIG_HOME/fancylock/config.json` (falling back to the
//! platform config directory) or from an explicit path. Every field has a
//! default, so a partial file is valid.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::credential::DEFAULT_MAX_CREDENTIAL_LEN;
use crate::display::MonitorGeometry;
use crate::error::ConfigError;
use crate::lockout::{LockoutConfig, MAX_LOCKOUT_SECS};

/// Configuration file name
const CONFIG_FILE_NAME: &str = "config.json";

/// Configuration directory under ~/.config
const CONFIG_DIR_NAME: &str = "fancylock";

/// Dedicated authentication service file; `system-auth` is used without it
const DEDICATED_SERVICE_FILE: &str = "/etc/pam.d/fancylock";

/// Default cap on rendered password dots
pub const DEFAULT_MAX_PASSWORD_DOTS: usize = 20;

/// Lock session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Directory scanned recursively for background media
    pub media_dir: PathBuf,

    /// File extensions (lower case, with leading dot) to play
    pub supported_extensions: Vec<String>,

    /// Whether still images are included
    pub include_images: bool,

    /// Seconds each still image stays on screen
    pub image_display_time: u64,

    /// Media player executable
    pub media_player_cmd: String,

    /// Authentication service name
    pub auth_service: String,

    /// Argon2 PHC string for the built-in hash authenticator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,

    /// Allow Escape/q/Q to end the session (never enable in production)
    pub debug_exit: bool,

    /// Shell command run before locking
    pub pre_lock_command: String,

    /// Shell command run after unlocking
    pub post_lock_command: String,

    /// Pause desktop media players when locking
    pub lock_pause_media: bool,

    /// Resume the players paused at lock time when unlocking
    pub unlock_unpause_media: bool,

    /// Cap on rendered password dots
    pub max_password_dots: usize,

    /// Cap on the credential length in bytes; excess input is dropped
    pub max_credential_len: usize,

    /// Lockout schedule
    pub lockout: LockoutConfig,

    /// Explicit monitor layout; empty means ask the display adapter
    pub monitors: Vec<MonitorGeometry>,
}

fn default_media_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("Videos")
}

fn default_auth_service() -> String {
    if Path::new(DEDICATED_SERVICE_FILE).exists() {
        "fancylock".to_string()
    } else {
        "system-auth".to_string()
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            media_dir: default_media_dir(),
            supported_extensions: [".mov", ".mkv", ".mp4", ".avi", ".webm"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            include_images: true,
            image_display_time: 30,
            media_player_cmd: "mpv".to_string(),
            auth_service: default_auth_service(),
            password_hash: None,
            debug_exit: false,
            pre_lock_command: String::new(),
            post_lock_command: String::new(),
            lock_pause_media: false,
            unlock_unpause_media: false,
            max_password_dots: DEFAULT_MAX_PASSWORD_DOTS,
            max_credential_len: DEFAULT_MAX_CREDENTIAL_LEN,
            lockout: LockoutConfig::default(),
            monitors: Vec::new(),
        }
    }
}

impl LockConfig {
    /// Get the configuration directory path
    pub fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            if !xdg_config.is_empty() {
                return Some(PathBuf::from(xdg_config).join(CONFIG_DIR_NAME));
            }
        }

        dirs::config_dir().map(|p| p.join(CONFIG_DIR_NAME))
    }

    /// Get the full config file path
    pub fn config_file_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Load the default config file.
    ///
    /// Returns defaults if the file is missing, unreadable or invalid.
    pub fn load() -> Self {
        let path = match Self::config_file_path() {
            Some(p) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Self::default();
        }

        Self::load_from(&path).unwrap_or_else(|e| {
            warn!("Failed to load config file {:?}: {}", path, e);
            Self::default()
        })
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Check the configuration for values the session cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.supported_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "no supported media extensions specified".to_string(),
            ));
        }

        if let Some(ext) = self
            .supported_extensions
            .iter()
            .find(|ext| !ext.starts_with('.'))
        {
            return Err(ConfigError::Invalid(format!(
                "extension {:?} must start with '.'",
                ext
            )));
        }

        if self.image_display_time == 0 {
            return Err(ConfigError::Invalid(
                "image display time must be positive".to_string(),
            ));
        }

        if self.lockout.threshold == 0 {
            return Err(ConfigError::Invalid(
                "lockout threshold must be positive".to_string(),
            ));
        }

        if self.lockout.base_secs > self.lockout.max_secs {
            return Err(ConfigError::Invalid(format!(
                "lockout base ({}s) exceeds ceiling ({}s)",
                self.lockout.base_secs, self.lockout.max_secs
            )));
        }

        if self.lockout.max_secs > MAX_LOCKOUT_SECS {
            return Err(ConfigError::Invalid(format!(
                "lockout ceiling ({}s) exceeds {}s",
                self.lockout.max_secs, MAX_LOCKOUT_SECS
            )));
        }

        if !self.media_dir.is_dir() {
            warn!(
                "Media directory {:?} does not exist; the lock screen will have no background media",
                self.media_dir
            );
        }

        Ok(())
    }

    /// Save to the default config file
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_file_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Validate and write pretty JSON to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;

        debug!("Saved config to {:?}", path);
        Ok(())
    }

    /// Write a default config file unless one already exists.
    ///
    /// Returns the path and whether a new file was written.
    pub fn generate_default() -> Result<(PathBuf, bool), ConfigError> {
        let path = Self::config_file_path().ok_or(ConfigError::NoConfigDir)?;
        if path.exists() {
            return Ok((path, false));
        }

        Self::default().save_to(&path)?;
        Ok((path, true))
    }
}
