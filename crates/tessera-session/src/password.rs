//! Password hashing.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

use crate::{error, Error};

/// Hashing and verification of user passwords.
///
/// Both operations are expected to be CPU-expensive;
/// the session flows call them from a blocking thread.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password.
    fn hash(&self, password: &str) -> Result<String, Error>;

    /// Check a plaintext password against a stored hash.
    fn verify(&self, hash: &str, password: &str) -> Result<bool, Error>;
}

/// Argon2id [PasswordHasher] producing PHC strings.
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Argon2id with explicit cost parameters.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, Error> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(error::password_hash_params)?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(error::password_hash)?;

        Ok(hash.to_string())
    }

    fn verify(&self, hash: &str, password: &str) -> Result<bool, Error> {
        let hash = PasswordHash::new(hash).map_err(error::password_hash)?;

        match self.argon2.verify_password(password.as_bytes(), &hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(error::password_hash(err)),
        }
    }
}
