//! Error handler for credstore.

use mongodb::error::{ErrorKind, WriteFailure};
use sqlx::Error as SQLxError;
use thiserror::Error;

/// MongoDB `E11000 duplicate key error`.
const MONGO_DUPLICATE_KEY: i32 = 11000;

pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Every failure a caller can observe.
///
/// Secrets never reach this type: [`crate::crypto::Password`] and
/// [`crate::crypto::PasswordHash`] do not implement `Display` and their
/// `Debug` output is redacted.
#[derive(Debug, Error)]
pub enum Error {
    #[error("email is required")]
    EmailRequired,
    #[error("password is required")]
    PasswordRequired,
    #[error("email is longer than {} characters", crate::account::MAX_EMAIL_LENGTH)]
    EmailTooLong,

    /// Unknown email and wrong password share this variant.
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email is already registered")]
    DuplicateEmail,
    #[error("account not found")]
    NotFound,

    #[error("storage backend unavailable")]
    BackendUnavailable(#[source] BoxError),
    #[error("storage request timed out")]
    Timeout,

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("internal error, {details}")]
    Internal {
        details: String,
        source: Option<BoxError>,
    },
}

impl Error {
    /// Wrap an unexpected error with some context.
    pub fn internal<E>(details: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            details: details.into(),
            source: Some(Box::new(err)),
        }
    }

    fn unavailable<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::BackendUnavailable(Box::new(err))
    }
}

impl From<SQLxError> for Error {
    fn from(err: SQLxError) -> Self {
        match err {
            SQLxError::RowNotFound => Error::NotFound,
            SQLxError::Database(ref db) if db.is_unique_violation() => {
                Error::DuplicateEmail
            },
            SQLxError::PoolTimedOut => Error::Timeout,
            SQLxError::Io(_) | SQLxError::Tls(_) | SQLxError::PoolClosed => {
                Error::unavailable(err)
            },
            _ => Error::internal("SQL request failed", err),
        }
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(e))
                if e.code == MONGO_DUPLICATE_KEY =>
            {
                Error::DuplicateEmail
            },
            ErrorKind::Command(e) if e.code == MONGO_DUPLICATE_KEY => {
                Error::DuplicateEmail
            },
            ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. }
            | ErrorKind::Io(_) => Error::unavailable(err),
            _ => Error::internal("mongodb request failed", err),
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}
