//! MySQL implementation for account repository.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::MySqlPool;
use sqlx::mysql::{MySqlDatabaseError, MySqlPoolOptions};
use sqlx::types::Json;

use super::{AccountRecord, checked_identifier};
use crate::account::{
    Account, AccountId, AccountRepository, MAX_EMAIL_LENGTH, NewAccount,
    authenticate, check_email_length,
};
use crate::crypto::{self, Password, PasswordManager};
use crate::error::{Error, Result};

/// `ER_DUP_KEYNAME`, raised when the index already exists.
const DUPLICATE_KEY_NAME: u16 = 1061;

/// Index names are scoped to their table in MySQL.
fn email_index_ddl(table: &str) -> String {
    format!("CREATE UNIQUE INDEX `email_idx` ON `{table}` (email)")
}

struct Queries {
    insert: String,
    find_by_email: String,
    find_by_id: String,
    update: String,
    exists: String,
    delete: String,
    reset_password: String,
}

impl Queries {
    fn new(table: &str) -> Self {
        let columns = "id, email, password_hash, profile";

        Self {
            insert: format!(
                "INSERT INTO `{table}` ({columns}) VALUES (?, ?, ?, ?)"
            ),
            find_by_email: format!("SELECT {columns} FROM `{table}` WHERE email = ?"),
            find_by_id: format!("SELECT {columns} FROM `{table}` WHERE id = ?"),
            update: format!(
                "UPDATE `{table}` SET email = ?, password_hash = ?, profile = ? WHERE id = ?"
            ),
            exists: format!("SELECT COUNT(*) FROM `{table}` WHERE id = ?"),
            delete: format!("DELETE FROM `{table}` WHERE id = ?"),
            reset_password: format!(
                "UPDATE `{table}` SET password_hash = ? WHERE email = ?"
            ),
        }
    }
}

/// MySQL account repository.
pub struct MySqlAccountRepository {
    pool: MySqlPool,
    hasher: Arc<PasswordManager>,
    queries: Queries,
}

impl MySqlAccountRepository {
    /// Open a pool on `url` and prepare `table`.
    pub async fn connect(
        url: &str,
        pool_size: u32,
        table: &str,
        hasher: Arc<PasswordManager>,
    ) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(pool_size)
            .connect(url)
            .await?;

        tracing::info!(backend = "mysql", %table, "connected");

        Self::from_pool(pool, table, hasher).await
    }

    /// Create a new [`MySqlAccountRepository`] on an existing pool.
    ///
    /// Creates `table` and its unique index on `email` if they are missing.
    /// Emails are compared byte for byte (`utf8mb4_bin`).
    pub async fn from_pool(
        pool: MySqlPool,
        table: &str,
        hasher: Arc<PasswordManager>,
    ) -> Result<Self> {
        let table = checked_identifier(table)?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS `{table}` (
                id CHAR(36) NOT NULL PRIMARY KEY,
                email VARCHAR({MAX_EMAIL_LENGTH}) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                profile JSON NOT NULL
            )
            "#
        ))
        .execute(&pool)
        .await?;

        // MySQL has no `CREATE INDEX IF NOT EXISTS`.
        let index = sqlx::query(&email_index_ddl(table)).execute(&pool).await;

        match index {
            Ok(_) => tracing::debug!(%table, "email index created"),
            Err(sqlx::Error::Database(err))
                if err
                    .try_downcast_ref::<MySqlDatabaseError>()
                    .is_some_and(|e| e.number() == DUPLICATE_KEY_NAME) => {},
            Err(err) => return Err(err.into()),
        }

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
impl AccountRepository for MySqlAccountRepository {
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

        let id = account.id.to_string();

        let result = sqlx::query(&self.queries.update)
            .bind(&account.email)
            .bind(account.password_hash.as_str())
            .bind(Json(&account.profile))
            .bind(&id)
            .execute(&self.pool)
            .await?;

        // MySQL counts changed rows, not matched ones: an update that
        // rewrites identical values also reports zero.
        if result.rows_affected() == 0 {
            let count: i64 = sqlx::query_scalar(&self.queries.exists)
                .bind(&id)
                .fetch_one(&self.pool)
                .await?;

            if count == 0 {
                return Err(Error::NotFound);
            }
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
            .bind(password_hash.as_str())
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_manager;
    use crate::database::contract;

    async fn repository(pool: MySqlPool) -> MySqlAccountRepository {
        MySqlAccountRepository::from_pool(pool, "users", Arc::new(test_manager()))
            .await
            .unwrap()
    }

    #[test]
    fn test_queries() {
        let queries = Queries::new("accounts");
        assert_eq!(
            queries.find_by_id,
            "SELECT id, email, password_hash, profile FROM `accounts` WHERE id = ?"
        );
        assert_eq!(
            queries.reset_password,
            "UPDATE `accounts` SET password_hash = ? WHERE email = ?"
        );
    }

    #[test]
    fn test_email_index_fits_any_table_name() {
        let table = "t".repeat(64);
        let ddl = email_index_ddl(&table);

        assert!(ddl.starts_with("CREATE UNIQUE INDEX `email_idx` ON"));
        assert!(!ddl.contains(&format!("{table}_email_idx")));
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing to MySQL"]
    async fn test_contract(pool: MySqlPool) {
        let repo = repository(pool).await;
        contract::run_all(&repo).await;
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing to MySQL"]
    async fn test_setup_is_idempotent(pool: MySqlPool) {
        let first = repository(pool.clone()).await;
        contract::scenario(&first).await;

        let second = repository(pool).await;
        contract::update(&second).await;
    }
}
