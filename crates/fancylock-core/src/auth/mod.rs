//! Authentication contract and outcome translation
//!
//! The core only depends on [`Authenticator`]. Backends report a free-text
//! message alongside success/failure; the message is for logs, and the single
//! exception (the "account locked" heuristic) lives in [`classify`].

mod hash;

pub use hash::{hash_password, HashAuthenticator};

/// Outcome reported by an authentication backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthResult {
    /// Whether the credential was accepted
    pub success: bool,
    /// Backend message, for logs only
    pub message: String,
}

impl AuthResult {
    /// Accepted credential
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Rejected credential or backend failure
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Credential verification backend
///
/// `verify` may block (a PAM conversation does); the controller runs it on a
/// blocking worker. Implementations must not retain or log the credential.
pub trait Authenticator: Send + Sync {
    /// Check a credential
    fn verify(&self, credential: &[u8]) -> AuthResult;

    /// Service name, for logs
    fn service(&self) -> &str {
        "fancylock"
    }
}

/// How the controller should treat a backend result
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Unlock
    Accepted,
    /// Count a failure
    Rejected,
    /// The backend says the account itself is locked; start the longest lockout
    AccountLocked,
}

/// Translate a backend result into a control-flow decision.
///
/// Heuristic: a failure whose message mentions "account is locked" or
/// "account locked" (any case) is treated as [`AuthOutcome::AccountLocked`].
/// This is the only place the message text influences behaviour.
pub fn classify(result: &AuthResult) -> AuthOutcome {
    if result.success {
        return AuthOutcome::Accepted;
    }

    let message = result.message.to_ascii_lowercase();
    if message.contains("account is locked") || message.contains("account locked") {
        AuthOutcome::AccountLocked
    } else {
        AuthOutcome::Rejected
    }
}
