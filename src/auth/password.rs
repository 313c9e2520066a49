/// Password Hashing and Verification
///
/// The hashing primitive sits behind a trait so the flows do not depend on
/// bcrypt directly.

use bcrypt::{hash, verify};
use thiserror::Error;

/// bcrypt only reads this many bytes of input
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password does not match")]
    Mismatch,
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError>;

    /// Compare a plaintext password against a stored hash.
    ///
    /// `Err(PasswordError::Mismatch)` signals a wrong password.
    fn compare(&self, hash: &str, plaintext: &str) -> Result<(), PasswordError>;
}

/// bcrypt-backed hasher with a configurable cost
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::Hashing(format!(
                "password exceeds {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }
        hash(plaintext, self.cost).map_err(|e| PasswordError::Hashing(e.to_string()))
    }

    fn compare(&self, hash: &str, plaintext: &str) -> Result<(), PasswordError> {
        // Longer input would be truncated and could match a different password
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::Mismatch);
        }
        match verify(plaintext, hash) {
            Ok(true) => Ok(()),
            Ok(false) => Err(PasswordError::Mismatch),
            // An unparseable stored hash can never match
            Err(e) => {
                tracing::error!(error = %e, "Stored password hash could not be verified");
                Err(PasswordError::Mismatch)
            }
        }
    }
}
