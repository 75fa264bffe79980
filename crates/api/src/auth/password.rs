//! Password hashing with Argon2

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Shortest accepted password, in bytes
pub const MIN_PASSWORD_BYTES: usize = 3;
/// Longest accepted password, in bytes. Longer input is refused, never truncated.
pub const MAX_PASSWORD_BYTES: usize = 72;

const MEMORY_COST_KIB: u32 = 19_456;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|e| PasswordError::Hashing(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password using Argon2id with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordError::TooLong);
    }

    let salt = SaltString::generate(&mut OsRng);
    hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    // Nothing longer than the limit was ever hashed.
    if password.len() > MAX_PASSWORD_BYTES {
        return Ok(false);
    }

    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    Ok(hasher()?
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Validate password length for registration
pub fn validate_password(password: &str) -> Result<(), PasswordValidationError> {
    if password.len() < MIN_PASSWORD_BYTES {
        return Err(PasswordValidationError::TooShort);
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordValidationError::TooLong);
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Invalid password hash: {0}")]
    InvalidHash(String),
    #[error("Password exceeds {MAX_PASSWORD_BYTES} bytes")]
    TooLong,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PasswordValidationError {
    #[error("password must be at least {MIN_PASSWORD_BYTES} characters")]
    TooShort,
    #[error("password must be at most {MAX_PASSWORD_BYTES} bytes")]
    TooLong,
}
