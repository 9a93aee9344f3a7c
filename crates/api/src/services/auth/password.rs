//! Credential verifier.
//!
//! Argon2id hashing and verification. Both are deliberately slow, so they run
//! on the blocking thread pool instead of the async executor.

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use secrecy::{ExposeSecret, SecretString};

use super::error::AuthFailure;

/// Minimum password length for new passwords.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash verified against when the account does not exist, so an unknown
/// email costs the same as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_blocking("milo-dummy-password").ok());

/// Check a new password against the strength policy.
///
/// # Errors
///
/// Returns the policy message when the password is too short.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }
    Ok(())
}

fn hash_blocking(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

fn verify_blocking(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Hash a password into an Argon2id PHC string.
///
/// # Errors
///
/// Returns `AuthFailure::Hashing` if hashing fails or the blocking task
/// panics.
pub async fn hash_password(password: SecretString) -> Result<String, AuthFailure> {
    tokio::task::spawn_blocking(move || hash_blocking(password.expose_secret()))
        .await
        .map_err(|e| AuthFailure::Hashing(e.to_string()))?
        .map_err(|e| AuthFailure::Hashing(e.to_string()))
}

/// Verify a password against a stored hash.
///
/// Any failure, including an unparseable hash, reads as a mismatch.
pub async fn verify_password(password: SecretString, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_blocking(password.expose_secret(), &hash))
        .await
        .unwrap_or(false)
}

/// Burn one verification against the dummy hash and report a mismatch.
pub async fn verify_against_dummy(password: SecretString) -> bool {
    // The first call also computes the dummy hash, so keep it off the executor.
    let _ = tokio::task::spawn_blocking(move || {
        DUMMY_HASH
            .as_deref()
            .is_some_and(|hash| verify_blocking(password.expose_secret(), hash))
    })
    .await;
    false
}
