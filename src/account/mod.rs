mod profile;
mod repository;
mod service;

pub use profile::*;
pub use repository::*;
pub use service::*;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::crypto::{self, Password, PasswordHash, PasswordManager};
use crate::error::{Error, Result};

/// Longest accepted email, in characters (RFC 5321 local part, `@` and
/// domain). Every backend stores at least this much.
pub const MAX_EMAIL_LENGTH: u64 = 320;

/// Value object of an account identifier.
///
/// Generated by the repository on registration, never supplied by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Create a fresh random [`AccountId`].
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Read an identifier coming back from storage.
    pub(crate) fn from_stored(id: &str) -> Result<Self> {
        id.parse()
            .map_err(|err| Error::internal("stored account id is not a UUID", err))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Account as saved on a backend.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    #[serde(skip)]
    pub password_hash: PasswordHash,
    pub profile: Profile,
}

/// Registration input, password still in plaintext.
///
/// Only `email` goes through the `validator` derive: its errors carry the
/// offending value, which must never be the password.
#[derive(Clone, Debug, Validate)]
pub struct NewAccount {
    #[validate(length(min = 1, max = MAX_EMAIL_LENGTH))]
    pub email: String,
    pub password: Password,
    pub profile: Profile,
}

/// Reject an email no backend can store.
pub(crate) fn check_email_length(email: &str) -> Result<()> {
    if email.chars().count() as u64 > MAX_EMAIL_LENGTH {
        return Err(Error::EmailTooLong);
    }

    Ok(())
}

impl NewAccount {
    /// Create a new [`NewAccount`] with an empty profile.
    pub fn new(email: impl Into<String>, password: impl Into<Password>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            profile: Profile::default(),
        }
    }

    /// Update `profile` of [`NewAccount`].
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Assign an id and hash the password on the blocking pool.
    ///
    /// Consumes `self` so the plaintext is dropped, and zeroized, once
    /// hashed.
    pub(crate) async fn into_account(
        self,
        hasher: &Arc<PasswordManager>,
    ) -> Result<Account> {
        let Self {
            email,
            password,
            profile,
        } = self;
        check_email_length(&email)?;

        let password_hash = crypto::hash_password(hasher, password).await?;

        Ok(Account {
            id: AccountId::generate(),
            email,
            password_hash,
            profile,
        })
    }
}
