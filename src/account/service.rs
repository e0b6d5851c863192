use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use validator::Validate;

use crate::account::{Account, AccountId, AccountRepository, NewAccount};
use crate::config::{Configuration, DEFAULT_TIMEOUT_MS};
use crate::crypto::Password;
use crate::error::{Error, Result};
use crate::{database, telemetry};

/// Account manager.
///
/// Validates input, then delegates to the configured repository under a
/// deadline.
#[derive(Clone)]
pub struct AccountService {
    repo: Arc<dyn AccountRepository>,
    timeout: Duration,
}

impl AccountService {
    /// Create a new [`AccountService`].
    pub fn new(repo: Arc<dyn AccountRepository>) -> Self {
        Self {
            repo,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Connect the backend named by `config` and build the service on it.
    pub async fn from_config(config: &Configuration) -> Result<Self> {
        let repo = database::connect(config).await?;
        Ok(Self::new(repo).with_timeout(config.timeout()))
    }

    /// Update the per-operation deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `operation`, dropping it (and so aborting the backend call) once
    /// the deadline is reached.
    async fn deadline<T>(
        &self,
        operation: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, operation).await?
    }

    pub async fn register(&self, account: NewAccount) -> Result<Account> {
        validate(&account)?;

        let account = self.deadline(self.repo.register(account)).await?;
        telemetry::record_account_created(&account.id);

        Ok(account)
    }

    pub async fn login(&self, email: &str, password: &Password) -> Result<Account> {
        match self.deadline(self.repo.login(email, password)).await {
            Ok(account) => {
                telemetry::record_auth_success(&account.id);
                Ok(account)
            },
            Err(Error::InvalidCredentials) => {
                telemetry::record_auth_failure("invalid_credentials");
                Err(Error::InvalidCredentials)
            },
            Err(err) => {
                telemetry::record_auth_failure("backend_error");
                Err(err)
            },
        }
    }

    pub async fn get_by_id(&self, id: &AccountId) -> Result<Account> {
        self.deadline(self.repo.get_by_id(id)).await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Account> {
        self.deadline(self.repo.get_by_email(email)).await
    }

    pub async fn update(&self, account: &Account) -> Result<()> {
        self.deadline(self.repo.update(account)).await
    }

    pub async fn delete(&self, id: &AccountId) -> Result<()> {
        self.deadline(self.repo.delete(id)).await?;
        tracing::info!(account_id = %id, "account deleted");
        Ok(())
    }

    pub async fn reset_password(
        &self,
        email: &str,
        new_password: &Password,
    ) -> Result<()> {
        self.deadline(self.repo.reset_password(email, new_password))
            .await
    }
}

/// Reject a registration missing its email or password, or whose email is
/// too long to store.
///
/// Email problems are reported first.
pub fn validate(account: &NewAccount) -> Result<()> {
    if account.validate().is_err() {
        if account.email.is_empty() {
            return Err(Error::EmailRequired);
        }

        return Err(Error::EmailTooLong);
    }

    if account.password.is_empty() {
        return Err(Error::PasswordRequired);
    }

    Ok(())
}
