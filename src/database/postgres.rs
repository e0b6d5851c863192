//! PostgreSQL implementation for account repository.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;

use super::{AccountRecord, checked_identifier};
use crate::account::{
    Account, AccountId, AccountRepository, NewAccount, authenticate,
    check_email_length,
};
use crate::crypto::{self, Password, PasswordManager};
use crate::error::{Error, Result};

/// Statements for one table, built once at construction.
struct Queries {
    insert: String,
    find_by_email: String,
    find_by_id: String,
    update: String,
    delete: String,
    reset_password: String,
}

impl Queries {
    fn new(table: &str) -> Self {
        let columns = "id, email, password_hash, profile";

        Self {
            insert: format!(
                "INSERT INTO {table} ({columns}) VALUES ($1, $2, $3, $4)"
            ),
            find_by_email: format!("SELECT {columns} FROM {table} WHERE email = $1"),
            find_by_id: format!("SELECT {columns} FROM {table} WHERE id = $1"),
            update: format!(
                "UPDATE {table} SET email = $2, password_hash = $3, profile = $4 WHERE id = $1"
            ),
            delete: format!("DELETE FROM {table} WHERE id = $1"),
            reset_password: format!(
                "UPDATE {table} SET password_hash = $2 WHERE email = $1"
            ),
        }
    }
}

/// PostgreSQL account repository.
pub struct PgAccountRepository {
    pool: PgPool,
    hasher: Arc<PasswordManager>,
    queries: Queries,
}

impl PgAccountRepository {
    /// Open a pool on `url` and prepare `table`.
    pub async fn connect(
        url: &str,
        pool_size: u32,
        table: &str,
        hasher: Arc<PasswordManager>,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(url)
            .await?;

        tracing::info!(backend = "postgres", %table, "connected");

        Self::from_pool(pool, table, hasher).await
    }

    /// Create a new [`PgAccountRepository`] on an existing pool.
    ///
    /// Creates `table` and its unique index on `email` if they are missing.
    pub async fn from_pool(
        pool: PgPool,
        table: &str,
        hasher: Arc<PasswordManager>,
    ) -> Result<Self> {
        let table = checked_identifier(table)?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                profile JSONB NOT NULL DEFAULT '{{}}'::jsonb
            )
            "#
        ))
        .execute(&pool)
        .await?;

        sqlx::query(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {table}_email_idx ON {table} (email)"
        ))
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            hasher,
            queries: Queries::new(table),
        })
    }

    async fn find(&self, query: &str, key: &str) -> Result<Option<Account>> {
        let record = sqlx::query_as::<_, AccountRecord>(query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        record.map(AccountRecord::try_into_account).transpose()
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn register(&self, account: NewAccount) -> Result<Account> {
        let account = account.into_account(&self.hasher).await?;

        sqlx::query(&self.queries.insert)
            .bind(account.id.to_string())
            .bind(&account.email)
            .bind(account.password_hash.as_str())
            .bind(Json(&account.profile))
            .execute(&self.pool)
            .await?;

        Ok(account)
    }

    async fn login(&self, email: &str, password: &Password) -> Result<Account> {
        let found = self.find(&self.queries.find_by_email, email).await?;
        authenticate(&self.hasher, found, password).await
    }

    async fn get_by_id(&self, id: &AccountId) -> Result<Account> {
        self.find(&self.queries.find_by_id, &id.to_string())
            .await?
            .ok_or(Error::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<Account> {
        self.find(&self.queries.find_by_email, email)
            .await?
            .ok_or(Error::NotFound)
    }

    async fn update(&self, account: &Account) -> Result<()> {
        check_email_length(&account.email)?;

        let result = sqlx::query(&self.queries.update)
            .bind(account.id.to_string())
            .bind(&account.email)
            .bind(account.password_hash.as_str())
            .bind(Json(&account.profile))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }

        Ok(())
    }

    async fn delete(&self, id: &AccountId) -> Result<()> {
        sqlx::query(&self.queries.delete)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn reset_password(
        &self,
        email: &str,
        new_password: &Password,
    ) -> Result<()> {
        let password_hash =
            crypto::hash_password(&self.hasher, new_password.clone()).await?;

        sqlx::query(&self.queries.reset_password)
            .bind(email)
            .bind(password_hash.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
