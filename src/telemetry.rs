//! Telemetry logic.
//! Support logging and metrics.
//!
//! Events carry account ids and failure reasons only: never emails,
//! passwords or hashes.

use tracing_subscriber::EnvFilter;

use crate::account::AccountId;
use crate::config::Logging;

type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a
/// subscriber is already installed.
pub fn init_tracing(config: &Logging) -> Result<(), InitError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}

pub(crate) fn record_account_created(id: &AccountId) {
    tracing::info!(account_id = %id, "account created");
    metrics::counter!("accounts_registered_total").increment(1);
}

pub(crate) fn record_auth_success(id: &AccountId) {
    tracing::info!(account_id = %id, "authentication successful");
    metrics::counter!("authentications_total", "outcome" => "success").increment(1);
}

pub(crate) fn record_auth_failure(reason: &'static str) {
    tracing::info!(reason, "authentication failed");
    metrics::counter!("authentications_total", "outcome" => reason).increment(1);
}
