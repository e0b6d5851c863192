//! Storage backends implementing [`AccountRepository`].

pub mod memory;
pub mod mongo;
pub mod mysql;
pub mod postgres;

#[cfg(test)]
pub(crate) mod contract;

use std::sync::Arc;

use sqlx::FromRow;

use crate::account::{Account, AccountId, AccountRepository, Profile};
use crate::config::{Backend, Configuration};
use crate::crypto::{PasswordHash, PasswordManager};
use crate::error::{Error, Result};

/// Open the backend selected by `config`.
///
/// The connection (or pool) is established here, once, and the unique index
/// on `email` is created if missing.
pub async fn connect(config: &Configuration) -> Result<Arc<dyn AccountRepository>> {
    let hasher = Arc::new(PasswordManager::new(config.argon2.clone())?);

    let repo: Arc<dyn AccountRepository> = match &config.backend {
        Backend::Postgres(sql) => Arc::new(
            postgres::PgAccountRepository::connect(
                &sql.connection_url("postgres"),
                sql.pool_size(),
                sql.table(),
                hasher,
            )
            .await?,
        ),
        Backend::Mysql(sql) => Arc::new(
            mysql::MySqlAccountRepository::connect(
                &sql.connection_url("mysql"),
                sql.pool_size(),
                sql.table(),
                hasher,
            )
            .await?,
        ),
        Backend::Mongodb(mongo) => Arc::new(
            mongo::MongoAccountRepository::connect(
                &mongo.uri,
                mongo.database(),
                mongo.collection(),
                hasher,
            )
            .await?,
        ),
        Backend::Memory => {
            tracing::warn!("using in-memory account storage, data is lost on exit");
            Arc::new(memory::MemoryAccountRepository::new(hasher))
        },
    };

    Ok(repo)
}

/// Longest table or collection name. PostgreSQL truncates identifiers to 63
/// bytes and the email index is named `{table}_email_idx`.
pub const MAX_IDENTIFIER_LENGTH: usize = 63 - "_email_idx".len();

/// Table and collection names are spliced into queries, keep them to
/// `[A-Za-z0-9_]`.
pub(crate) fn checked_identifier(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LENGTH
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(name)
    } else {
        Err(Error::Configuration(format!(
            "`{name}` is not a valid table name"
        )))
    }
}

/// Account row as stored by both SQL backends.
#[derive(FromRow)]
pub(crate) struct AccountRecord {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    #[sqlx(json)]
    pub profile: Profile,
}

impl AccountRecord {
    /// Convert to [`Account`].
    pub fn try_into_account(self) -> Result<Account> {
        Ok(Account {
            id: AccountId::from_stored(&self.id)?,
            email: self.email,
            password_hash: PasswordHash::parse(self.password_hash)?,
            profile: self.profile,
        })
    }
}
