//! Credential persistence port, implemented by every backend in
//! [`crate::database`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::account::{Account, AccountId, NewAccount};
use crate::crypto::{self, Password, PasswordManager};
use crate::error::{Error, Result};

/// Port for account persistence.
///
/// Every implementation must behave the same way:
///
/// - uniqueness of `email` is enforced by the backend itself, never with a
///   read before the write;
/// - `login` answers [`Error::InvalidCredentials`] for an unknown email and
///   for a wrong password alike;
/// - `delete` of an unknown id and `reset_password` of an unknown email
///   succeed silently.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Hash the password, assign a fresh id and insert the account.
    ///
    /// Fails with [`Error::DuplicateEmail`] if the email is taken.
    async fn register(&self, account: NewAccount) -> Result<Account>;

    /// Find the account by email and verify `password` against its hash.
    async fn login(&self, email: &str, password: &Password) -> Result<Account>;

    /// Fails with [`Error::NotFound`] if no account has this id.
    async fn get_by_id(&self, id: &AccountId) -> Result<Account>;

    /// Exact-match lookup on the unique email.
    ///
    /// Fails with [`Error::NotFound`] if no account has this email.
    async fn get_by_email(&self, email: &str) -> Result<Account>;

    /// Replace email, password hash and profile of the account with the same
    /// id.
    ///
    /// Fails with [`Error::DuplicateEmail`] if the new email is taken,
    /// [`Error::EmailTooLong`] if it exceeds
    /// [`MAX_EMAIL_LENGTH`](crate::account::MAX_EMAIL_LENGTH) and
    /// [`Error::NotFound`] if the id is unknown.
    async fn update(&self, account: &Account) -> Result<()>;

    /// Hard delete. Idempotent.
    async fn delete(&self, id: &AccountId) -> Result<()>;

    /// Replace the stored hash with a hash of `new_password`.
    async fn reset_password(
        &self,
        email: &str,
        new_password: &Password,
    ) -> Result<()>;
}

/// Shared tail of every `login`: verify the candidate password against the
/// looked-up account, or burn a dummy verification when nothing matched.
///
/// Verification runs on the blocking pool.
pub(crate) async fn authenticate(
    hasher: &Arc<PasswordManager>,
    found: Option<Account>,
    password: &Password,
) -> Result<Account> {
    let password = password.clone();
    let hash = found.as_ref().map(|account| account.password_hash.clone());

    crypto::spawn_hashing(hasher, move |hasher| match hash {
        Some(hash) => hasher.verify(&password, &hash),
        None => {
            hasher.verify_dummy(&password);
            Err(Error::InvalidCredentials)
        },
    })
    .await?;

    found.ok_or(Error::InvalidCredentials)
}
