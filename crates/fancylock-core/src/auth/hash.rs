//! Argon2 password-hash authenticator

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::debug;
use zeroize::Zeroizing;

use super::{AuthResult, Authenticator};
use crate::error::AuthError;

/// Verifies credentials against a stored Argon2 PHC string
pub struct HashAuthenticator {
    service: String,
    hash: String,
}

impl HashAuthenticator {
    /// Build from a PHC string, rejecting malformed hashes up front
    pub fn new(service: impl Into<String>, hash: impl Into<String>) -> Result<Self, AuthError> {
        let hash = hash.into();
        if hash.trim().is_empty() {
            return Err(AuthError::NotConfigured);
        }
        PasswordHash::new(&hash).map_err(|e| AuthError::InvalidHash(e.to_string()))?;

        Ok(Self {
            service: service.into(),
            hash,
        })
    }
}

impl Authenticator for HashAuthenticator {
    fn verify(&self, credential: &[u8]) -> AuthResult {
        let parsed = match PasswordHash::new(&self.hash) {
            Ok(parsed) => parsed,
            Err(e) => return AuthResult::failure(format!("Invalid stored hash: {}", e)),
        };

        let credential = Zeroizing::new(credential.to_vec());
        match Argon2::default().verify_password(&credential, &parsed) {
            Ok(()) => AuthResult::success("Authentication successful"),
            Err(e) => {
                debug!(service = %self.service, "Password verification failed: {}", e);
                AuthResult::failure("Authentication failure")
            }
        }
    }

    fn service(&self) -> &str {
        &self.service
    }
}

/// Hash a password with Argon2id and a random salt, returning the PHC string
pub fn hash_password(password: &[u8]) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let password = Zeroizing::new(password.to_vec());

    Argon2::default()
        .hash_password(&password, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password(b"hunter2").unwrap();
        let auth = HashAuthenticator::new("fancylock", hash).unwrap();

        assert!(auth.verify(b"hunter2").success);
        let rejected = auth.verify(b"hunter3");
        assert!(!rejected.success);
        assert_eq!(rejected.message, "Authentication failure");
    }

    #[test]
    fn test_empty_hash_is_not_configured() {
        assert!(matches!(
            HashAuthenticator::new("fancylock", ""),
            Err(AuthError::NotConfigured)
        ));
    }

    #[test]
    fn test_malformed_hash_rejected() {
        assert!(matches!(
            HashAuthenticator::new("fancylock", "not-a-phc-string"),
            Err(AuthError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password(b"same").unwrap();
        let b = hash_password(b"same").unwrap();
        assert_ne!(a, b);
    }
}
