//! Lock session engine for fancylock
//!
//! This crate holds everything that decides whether the screen stays locked:
//!
//! - [`SecureCredentialBuffer`]: zeroizing password entry buffer
//! - [`LockoutPolicy`]: failure counting and lockout schedule
//! - [`Authenticator`]: pluggable credential verification
//! - [`MediaProcessSupervisor`]: background media players, one per monitor
//! - [`LockSessionController`]: the session state machine tying them together
//!
//! Rendering and input capture live behind [`DisplayAdapter`]; the binary
//! crate ships a terminal implementation.

pub mod auth;
pub mod config;
pub mod controller;
pub mod credential;
pub mod display;
pub mod error;
pub mod events;
pub mod hooks;
pub mod lockout;
pub mod media;
pub mod media_control;

#[cfg(test)]
mod test_log;

pub use auth::{classify, hash_password, AuthOutcome, AuthResult, Authenticator, HashAuthenticator};
pub use config::LockConfig;
pub use controller::{LockSessionController, SessionState};
pub use credential::SecureCredentialBuffer;
pub use display::{DisplayAdapter, MonitorGeometry};
pub use error::{AuthError, ConfigError, DisplayError, LockError, MediaError, Result};
pub use events::{EventSender, KeyCode, KeyEvent, SessionEvent};
pub use lockout::{LockoutConfig, LockoutOutcome, LockoutPolicy};
pub use media::{MediaFile, MediaKind, MediaProcessSupervisor, PlayerSettings};
pub use media_control::{MediaBus, MediaBusController, PlaybackStatus, PlayerctlBus};
