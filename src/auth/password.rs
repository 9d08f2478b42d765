//! Password hashing with Argon2id
//!
//! Hashes are PHC strings carrying their own salt and parameters, so a
//! hash produced under one cost profile still verifies after the profile
//! changes.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::constants::{DEFAULT_ARGON2_ITERATIONS, DEFAULT_ARGON2_MEMORY_KIB, DEFAULT_ARGON2_PARALLELISM};
use crate::error::{ApiError, Result};

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_ARGON2_MEMORY_KIB,
            iterations: DEFAULT_ARGON2_ITERATIONS,
            parallelism: DEFAULT_ARGON2_PARALLELISM,
        }
    }
}

impl PasswordPolicy {
    /// Creates a policy, rejecting parameters Argon2 would refuse
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let policy = Self {
            memory_kib,
            iterations,
            parallelism,
        };
        policy.params()?;
        Ok(policy)
    }

    /// Cheapest valid profile. Only for tests.
    pub fn minimal() -> Self {
        Self {
            memory_kib: Params::MIN_M_COST,
            iterations: Params::MIN_T_COST,
            parallelism: Params::MIN_P_COST,
        }
    }

    fn params(&self) -> Result<Params> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| ApiError::Config(format!("Invalid Argon2 parameters: {}", e)))
    }
}

/// One-way password hashing and verification
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    policy: PasswordPolicy,
}

impl PasswordHasher {
    pub fn new(policy: PasswordPolicy) -> Self {
        Self { policy }
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, self.policy.params()?))
    }

    /// Hash a plaintext password with a fresh random salt
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()?
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::ServerFault(format!("Password hashing failed: {}", e)))
    }

    /// Check a plaintext against a stored hash.
    ///
    /// A mismatch is `Ok(false)`, not an error. Only an unreadable stored
    /// hash is reported as a fault.
    pub fn verify(&self, plaintext: &str, stored_hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| ApiError::ServerFault(format!("Stored password hash is malformed: {}", e)))?;

        match self.argon2()?.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(ApiError::ServerFault(format!("Password verification failed: {}", e))),
        }
    }

    /// [`hash`](Self::hash) on the blocking pool
    pub async fn hash_blocking(&self, plaintext: String) -> Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext)).await?
    }

    /// [`verify`](Self::verify) on the blocking pool
    pub async fn verify_blocking(&self, plaintext: String, stored_hash: String) -> Result<bool> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &stored_hash)).await?
    }
}
