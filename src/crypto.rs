//! Password hashing and secret wrappers.

use argon2::password_hash::{
    Error as PhcError, PasswordHash as PhcHash, PasswordHasher,
    PasswordVerifier, SaltString,
};
use std::sync::Arc;

use argon2::{Argon2, Params, Version};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::config::Argon2 as ArgonConfig;
use crate::error::{Error, Result};

const DUMMY_PASSWORD_LENGTH: usize = 32;

/// Plaintext password, wiped from memory on drop.
#[derive(Clone)]
pub struct Password(Zeroizing<String>);

impl Password {
    /// Create a new [`Password`].
    ///
    /// No strength rule is applied here, emptiness is checked by the
    /// service before registration.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Returns the same string as a string slice `&str`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// A hashed password as stored by a backend.
///
/// Only [`PasswordManager::hash`] and [`PasswordHash::parse`] build one, so a
/// plaintext value can never be persisted through this type.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Converts a [`String`] into a valid [`PasswordHash`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the string is not in PHC format.
    pub fn parse(phc_string: impl Into<String>) -> Result<Self> {
        let phc_string = phc_string.into();
        if let Err(err) = PhcHash::new(&phc_string) {
            return Err(Error::Internal {
                details: format!("stored credential is not a PHC string: {err}"),
                source: None,
            });
        }

        Ok(Self(phc_string))
    }

    /// Returns the same string as a string slice `&str`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHash")
            .field("phc_string", &"[REDACTED]")
            .finish()
    }
}

/// Password manager that uses Argon2id and PHC string format for hashing and
/// verification.
pub struct PasswordManager {
    params: Params,
    dummy: PasswordHash,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    ///
    /// Also hashes a random throwaway password, used by
    /// [`PasswordManager::verify_dummy`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();

        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| Error::Configuration(format!("argon2: {err}")))?;

        let mut manager = Self {
            params,
            dummy: PasswordHash(String::new()),
        };
        let throwaway = Password::new(
            Alphanumeric.sample_string(&mut OsRng, DUMMY_PASSWORD_LENGTH),
        );
        manager.dummy = manager.hash(&throwaway)?;

        Ok(manager)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
    }

    /// Hash password using Argon2id with a fresh random salt.
    pub fn hash(&self, password: &Password) -> Result<PasswordHash> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|err| Error::Internal {
                details: format!("argon2 hashing failed: {err}"),
                source: None,
            })?;

        Ok(PasswordHash(hash.to_string()))
    }

    /// Verify password against a PHC.
    ///
    /// A mismatch yields [`Error::InvalidCredentials`].
    pub fn verify(&self, password: &Password, hash: &PasswordHash) -> Result<()> {
        let parsed = PhcHash::new(hash.as_str()).map_err(|err| Error::Internal {
            details: format!("stored credential is not a PHC string: {err}"),
            source: None,
        })?;

        match self
            .argon2()
            .verify_password(password.as_str().as_bytes(), &parsed)
        {
            Ok(()) => Ok(()),
            Err(PhcError::Password) => Err(Error::InvalidCredentials),
            Err(err) => Err(Error::Internal {
                details: format!("argon2 verification failed: {err}"),
                source: None,
            }),
        }
    }

    /// Spend the same work as a real verification when no account matched,
    /// so unknown emails answer as slowly as wrong passwords.
    pub fn verify_dummy(&self, password: &Password) {
        let _ = self.verify(password, &self.dummy);
    }
}

/// Run `task` on the blocking thread pool.
///
/// Argon2 is CPU bound: run inline it would stall a runtime worker and no
/// deadline could interrupt it. Dropping the returned future leaves the
/// computation to finish in the background and returns control at once.
pub(crate) async fn spawn_hashing<T, F>(
    hasher: &Arc<PasswordManager>,
    task: F,
) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&PasswordManager) -> Result<T> + Send + 'static,
{
    let hasher = Arc::clone(hasher);

    tokio::task::spawn_blocking(move || task(&hasher))
        .await
        .map_err(|err| Error::internal("password hashing task failed", err))?
}

/// Hash `password` off the async runtime.
pub(crate) async fn hash_password(
    hasher: &Arc<PasswordManager>,
    password: Password,
) -> Result<PasswordHash> {
    spawn_hashing(hasher, move |hasher| hasher.hash(&password)).await
}

/// Cheap parameters, tests only.
#[cfg(test)]
pub(crate) fn test_manager() -> PasswordManager {
    PasswordManager::new(Some(ArgonConfig {
        memory_cost: 1024,
        iterations: 1,
        parallelism: 1,
        hash_length: 32,
    }))
    .unwrap()
}
