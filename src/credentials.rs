//! Credential Vault: one-way password hashing and verification.
//!
//! Digests are Argon2id PHC strings (`$argon2id$v=19$...`) carrying their own random
//! salt and parameters, so `verify` needs nothing but the stored string.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// The hasher itself failed. Never caused by user input.
    #[error("password hashing failed: {0}")]
    Hashing(String),

    /// The blocking worker running the hasher panicked or was cancelled.
    #[error("credential worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Produces a salted Argon2id digest of `plaintext`.
pub fn hash(plaintext: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|digest| digest.to_string())
        .map_err(|e| CredentialError::Hashing(e.to_string()))
}

/// Checks `plaintext` against a stored digest. A malformed digest is a mismatch.
pub fn verify(plaintext: &str, digest: &str) -> bool {
    match PasswordHash::new(digest) {
        Ok(parsed) => Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

static DUMMY_DIGEST: LazyLock<String> = LazyLock::new(|| {
    hash("no-such-identity").expect("FATAL: failed to derive the sign-in dummy digest.")
});

/// A real digest no password is expected to match. Verifying against it costs the
/// same as verifying against a stored digest.
///
/// The first call runs a full Argon2 hash; `main` calls it once before serving.
pub fn dummy_digest() -> &'static str {
    &DUMMY_DIGEST
}

/// `verify` against the dummy digest on the blocking pool. Used when the username
/// is unknown so the failure takes as long as a wrong password.
pub async fn verify_dummy_blocking(plaintext: String) -> Result<bool, CredentialError> {
    Ok(tokio::task::spawn_blocking(move || verify(&plaintext, dummy_digest())).await?)
}

/// `hash` on the blocking pool; Argon2 is deliberately slow.
pub async fn hash_blocking(plaintext: String) -> Result<String, CredentialError> {
    tokio::task::spawn_blocking(move || hash(&plaintext)).await?
}

/// `verify` on the blocking pool.
pub async fn verify_blocking(plaintext: String, digest: String) -> Result<bool, CredentialError> {
    Ok(tokio::task::spawn_blocking(move || verify(&plaintext, &digest)).await?)
}
