//! Configuration manager for credstore.

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CREDENTIALS: &str = "root";
pub const DEFAULT_DATABASE_NAME: &str = "credstore";
pub const DEFAULT_TABLE_NAME: &str = "users";
pub const DEFAULT_POOL_SIZE: u32 = 10;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Which storage engine holds the accounts.
    #[serde(default)]
    pub backend: Backend,
    /// Related to Argon2 configuration.
    pub argon2: Option<Argon2>,
    /// Deadline applied to every account operation, in milliseconds.
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub logging: Logging,
    #[serde(skip)]
    path: PathBuf,
}

/// Storage backend selection.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backend {
    Postgres(Sql),
    Mysql(Sql),
    Mongodb(Mongo),
    /// Process-local, lost on exit.
    #[default]
    Memory,
}

/// PostgreSQL or MySQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Sql {
    /// Full connection URL. Takes precedence over the fields below.
    pub url: Option<String>,
    /// Hostname:(?port) for SQL instance.
    #[serde(default)]
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Table holding accounts.
    pub table: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

impl Sql {
    /// Build the connection URL for `scheme` (`postgres` or `mysql`).
    pub fn connection_url(&self, scheme: &str) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }

        let username = self.username.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
        let password = self.password.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
        let db = self.database.as_deref().unwrap_or(DEFAULT_DATABASE_NAME);

        format!("{scheme}://{username}:{password}@{}/{db}", self.address)
    }

    pub fn table(&self) -> &str {
        self.table.as_deref().unwrap_or(DEFAULT_TABLE_NAME)
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size.unwrap_or(DEFAULT_POOL_SIZE)
    }
}

/// MongoDB configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Mongo {
    /// `mongodb://` or `mongodb+srv://` URI.
    pub uri: String,
    /// Database name.
    pub database: Option<String>,
    /// Collection holding accounts.
    pub collection: Option<String>,
}

impl Mongo {
    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE_NAME)
    }

    pub fn collection(&self) -> &str {
        self.collection.as_deref().unwrap_or(DEFAULT_TABLE_NAME)
    }
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// Default filter, `RUST_LOG` wins when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Deadline for a single account operation.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Self {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            PathBuf::from(DEFAULT_CONFIG_PATH)
        };

        match File::open(&file_path) {
            Ok(file) => match serde_yaml::from_reader::<_, Configuration>(file) {
                Ok(config) => config.path(file_path),
                Err(err) => Self::error(file_path, err),
            },
            Err(err) => Self::error(file_path, err),
        }
    }

    /// Return a default configuration as fallback.
    fn error(path: PathBuf, err: impl std::error::Error) -> Self {
        tracing::error!(
            error = %err,
            path = %path.display(),
            "configuration file unusable, using defaults"
        );
        Self {
            path,
            ..Default::default()
        }
    }
}
