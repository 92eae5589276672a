//! Password hashing and verification
//!
//! Wraps Argon2 behind a context that is constructed once at startup and
//! shared for the lifetime of the process. Plaintext passwords only ever
//! appear as arguments here; everything stored or returned is the salted
//! hash string.

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};

/// Process-wide password hashing context
#[derive(Clone, Default)]
pub struct PasswordContext {
    argon2: Argon2<'static>,
}

impl PasswordContext {
    /// Create a context with the default Argon2 parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash a plaintext password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a plaintext password against a stored hash
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

        let result = self.argon2.verify_password(password.as_bytes(), &parsed_hash);

        Ok(result.is_ok())
    }
}
