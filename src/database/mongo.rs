//! MongoDB implementation for account repository.

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};

use super::checked_identifier;
use crate::account::{
    Account, AccountId, AccountRepository, NewAccount, Profile, authenticate,
    check_email_length,
};
use crate::crypto::{self, Password, PasswordHash, PasswordManager};
use crate::error::{Error, Result};

/// Account as stored in the collection.
#[derive(Debug, Serialize, Deserialize)]
struct AccountDocument {
    #[serde(rename = "_id")]
    id: String,
    email: String,
    password_hash: String,
    #[serde(default)]
    profile: Profile,
}

impl From<&Account> for AccountDocument {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            email: account.email.clone(),
            password_hash: account.password_hash.as_str().to_owned(),
            profile: account.profile.clone(),
        }
    }
}

impl TryFrom<AccountDocument> for Account {
    type Error = Error;

    fn try_from(document: AccountDocument) -> Result<Self> {
        Ok(Account {
            id: AccountId::from_stored(&document.id)?,
            email: document.email,
            password_hash: PasswordHash::parse(document.password_hash)?,
            profile: document.profile,
        })
    }
}

/// MongoDB account repository.
pub struct MongoAccountRepository {
    accounts: Collection<AccountDocument>,
    hasher: Arc<PasswordManager>,
}

impl MongoAccountRepository {
    /// Connect to `uri` and prepare `database.collection`.
    pub async fn connect(
        uri: &str,
        database: &str,
        collection: &str,
        hasher: Arc<PasswordManager>,
    ) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;

        // The driver connects lazily, fail now rather than on first request.
        client
            .database(database)
            .run_command(doc! { "ping": 1 })
            .await?;

        tracing::info!(backend = "mongodb", %database, %collection, "connected");

        Self::from_client(&client, database, collection, hasher).await
    }

    /// Create a new [`MongoAccountRepository`] on an existing client.
    ///
    /// Creates the unique index on `email` if it is missing.
    pub async fn from_client(
        client: &Client,
        database: &str,
        collection: &str,
        hasher: Arc<PasswordManager>,
    ) -> Result<Self> {
        let collection = checked_identifier(collection)?;
        let accounts = client
            .database(database)
            .collection::<AccountDocument>(collection);

        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name(format!("{collection}_email_idx"))
                    .unique(true)
                    .build(),
            )
            .build();
        accounts.create_index(index).await?;

        Ok(Self { accounts, hasher })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.accounts
            .find_one(doc! { "email": email })
            .await?
            .map(Account::try_from)
            .transpose()
    }
}

#[async_trait]
impl AccountRepository for MongoAccountRepository {
    async fn register(&self, account: NewAccount) -> Result<Account> {
        let account = account.into_account(&self.hasher).await?;

        self.accounts
            .insert_one(AccountDocument::from(&account))
            .await?;

        Ok(account)
    }

    async fn login(&self, email: &str, password: &Password) -> Result<Account> {
        let found = self.find_by_email(email).await?;
        authenticate(&self.hasher, found, password).await
    }

    async fn get_by_id(&self, id: &AccountId) -> Result<Account> {
        self.accounts
            .find_one(doc! { "_id": id.to_string() })
            .await?
            .ok_or(Error::NotFound)?
            .try_into()
    }

    async fn get_by_email(&self, email: &str) -> Result<Account> {
        self.find_by_email(email).await?.ok_or(Error::NotFound)
    }

    async fn update(&self, account: &Account) -> Result<()> {
        check_email_length(&account.email)?;
        let document = AccountDocument::from(account);

        let result = self
            .accounts
            .replace_one(doc! { "_id": document.id.as_str() }, &document)
            .await?;

        if result.matched_count == 0 {
            return Err(Error::NotFound);
        }

        Ok(())
    }

    async fn delete(&self, id: &AccountId) -> Result<()> {
        self.accounts
            .delete_one(doc! { "_id": id.to_string() })
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

        self.accounts
            .update_one(
                doc! { "email": email },
                doc! { "$set": { "password_hash": password_hash.as_str() } },
            )
            .await?;

        Ok(())
    }
}
