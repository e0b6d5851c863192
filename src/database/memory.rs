//! In-memory implementation for account repository.
//!
//! Useful for tests and local runs. The email index is kept under the same
//! lock as the accounts, so uniqueness holds under concurrent registration.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::account::{
    Account, AccountId, AccountRepository, NewAccount, authenticate,
    check_email_length,
};
use crate::crypto::{self, Password, PasswordManager};
use crate::error::{Error, Result};

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    emails: HashMap<String, AccountId>,
}

/// In-memory account repository.
pub struct MemoryAccountRepository {
    tables: RwLock<Tables>,
    hasher: Arc<PasswordManager>,
}

impl MemoryAccountRepository {
    /// Create a new, empty [`MemoryAccountRepository`].
    pub fn new(hasher: Arc<PasswordManager>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            hasher,
        }
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn register(&self, account: NewAccount) -> Result<Account> {
        // Hash outside the lock.
        let account = account.into_account(&self.hasher).await?;

        let mut tables = self.tables.write().await;
        if tables.emails.contains_key(&account.email) {
            return Err(Error::DuplicateEmail);
        }

        tables.emails.insert(account.email.clone(), account.id);
        tables.accounts.insert(account.id, account.clone());

        Ok(account)
    }

    async fn login(&self, email: &str, password: &Password) -> Result<Account> {
        let found = {
            let tables = self.tables.read().await;
            tables
                .emails
                .get(email)
                .and_then(|id| tables.accounts.get(id))
                .cloned()
        };

        authenticate(&self.hasher, found, password).await
    }

    async fn get_by_id(&self, id: &AccountId) -> Result<Account> {
        self.tables
            .read()
            .await
            .accounts
            .get(id)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<Account> {
        let tables = self.tables.read().await;
        tables
            .emails
            .get(email)
            .and_then(|id| tables.accounts.get(id))
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn update(&self, account: &Account) -> Result<()> {
        check_email_length(&account.email)?;

        let mut tables = self.tables.write().await;

        let previous = tables
            .accounts
            .get(&account.id)
            .map(|stored| stored.email.clone())
            .ok_or(Error::NotFound)?;

        if previous != account.email {
            if tables.emails.contains_key(&account.email) {
                return Err(Error::DuplicateEmail);
            }

            tables.emails.remove(&previous);
            tables.emails.insert(account.email.clone(), account.id);
        }

        tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn delete(&self, id: &AccountId) -> Result<()> {
        let mut tables = self.tables.write().await;

        if let Some(account) = tables.accounts.remove(id) {
            tables.emails.remove(&account.email);
        }

        Ok(())
    }

    async fn reset_password(
        &self,
        email: &str,
        new_password: &Password,
    ) -> Result<()> {
        let password_hash =
            crypto::hash_password(&self.hasher, new_password.clone()).await?;

        let mut tables = self.tables.write().await;
        let Tables { accounts, emails } = &mut *tables;

        if let Some(account) = emails.get(email).and_then(|id| accounts.get_mut(id)) {
            account.password_hash = password_hash;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_manager;
    use crate::database::contract;

    fn repository() -> MemoryAccountRepository {
        MemoryAccountRepository::new(Arc::new(test_manager()))
    }

    #[tokio::test]
    async fn test_scenario() {
        contract::scenario(&repository()).await;
    }

    #[tokio::test]
    async fn test_uniqueness() {
        contract::uniqueness(&repository()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration() {
        contract::concurrent_registration(&repository()).await;
    }

    #[tokio::test]
    async fn test_hash_round_trip() {
        contract::hash_round_trip(&repository()).await;
    }

    #[tokio::test]
    async fn test_anti_enumeration() {
        contract::anti_enumeration(&repository()).await;
    }

    #[tokio::test]
    async fn test_lifecycle() {
        contract::lifecycle(&repository()).await;
    }

    #[tokio::test]
    async fn test_reset_password() {
        contract::reset_password(&repository()).await;
    }

    #[tokio::test]
    async fn test_update() {
        contract::update(&repository()).await;
    }

    #[tokio::test]
    async fn test_get_by_email() {
        contract::get_by_email(&repository()).await;
    }

    #[tokio::test]
    async fn test_email_length() {
        contract::email_length(&repository()).await;
    }

    #[tokio::test]
    async fn test_profile_round_trip() {
        contract::profile_round_trip(&repository()).await;
    }

    #[tokio::test]
    async fn test_email_freed_after_delete() {
        let repo = repository();
        let account = repo
            .register(NewAccount::new("freed@x.com", "secret1"))
            .await
            .unwrap();

        repo.delete(&account.id).await.unwrap();

        let again = repo
            .register(NewAccount::new("freed@x.com", "secret2"))
            .await
            .unwrap();
        assert_ne!(again.id, account.id);
    }
}
