//! Error types for the lock session engine

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for lock session operations
pub type Result<T> = std::result::Result<T, LockError>;

/// Errors that end or prevent a lock session
#[derive(Debug, Error)]
pub enum LockError {
    /// Exclusive input could not be acquired; the screen was never locked
    #[error("Failed to capture input: {0}")]
    InputCapture(#[from] DisplayError),

    /// Another session is already live in this process
    #[error("A lock session is already active")]
    AlreadyLocked,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Authenticator could not be constructed
    #[error("Authenticator error: {0}")]
    Auth(#[from] AuthError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a display adapter
#[derive(Debug, Error)]
pub enum DisplayError {
    /// A mandatory display resource is missing
    #[error("Missing display resource: {0}")]
    MissingResource(String),

    /// Keyboard or pointer grab was refused
    #[error("Input grab refused: {0}")]
    GrabRefused(String),

    /// IO error talking to the display
    #[error("Display IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the media process supervisor
#[derive(Debug, Error)]
pub enum MediaError {
    /// The media directory could not be walked
    #[error("Failed to scan media directory {path:?}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Scan succeeded but found nothing playable
    #[error("No media files found in {0:?}")]
    NoMediaFound(PathBuf),

    /// A player process could not be launched for one monitor
    #[error("Failed to start media player on monitor {monitor}: {source}")]
    Spawn {
        monitor: usize,
        #[source]
        source: std::io::Error,
    },

    /// The ephemeral playlist file could not be written
    #[error("Failed to write playlist for monitor {monitor}: {source}")]
    Playlist {
        monitor: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors constructing an authenticator
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No password hash configured - run `fancylock hash-password` first")]
    NotConfigured,

    #[error("Invalid stored hash: {0}")]
    InvalidHash(String),

    #[error("Failed to hash password: {0}")]
    Hashing(String),
}
