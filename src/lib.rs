//! Credstore is a minimal user-credential store.
//!
//! Accounts are registered, authenticated, read, updated, deleted and have
//! their password reset through an [`AccountService`], over one of several
//! interchangeable backends: PostgreSQL, MySQL, MongoDB or process memory.
//!
//! ```no_run
//! use credstore::{AccountService, NewAccount, config::Configuration};
//!
//! # async fn run() -> credstore::Result<()> {
//! let config = Configuration::default().read();
//! let service = AccountService::from_config(&config).await?;
//!
//! let account = service.register(NewAccount::new("ada@x.com", "secret1")).await?;
//! let logged = service.login("ada@x.com", &"secret1".into()).await?;
//! assert_eq!(account.id, logged.id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod account;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod telemetry;

pub use account::{
    Account, AccountId, AccountRepository, AccountService, NewAccount, Profile,
};
pub use crypto::{Password, PasswordHash};
pub use error::{Error, Result};
