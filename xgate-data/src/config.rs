use crate::{
    error::DataError,
    exchange::{ExchangeId, Schema},
    supervisor::reconnect::ReconnectionBackoffPolicy,
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{path::Path, time::Duration};

/// Default [`ReconnectionBackoffPolicy`] for a [`Connection`](crate::supervisor::Connection).
pub const DEFAULT_RECONNECTION_POLICY: ReconnectionBackoffPolicy = ReconnectionBackoffPolicy {
    backoff_ms_initial: 125,
    backoff_multiplier: 2,
    backoff_ms_max: 60000,
};

/// Configuration of one exchange connection.
///
/// ### Raw Payload Examples
/// ```json
/// {
///     "exchange": "bitmex",
///     "schema": "margin",
///     "account": "main",
///     "register_state": false,
///     "reconnect": {"backoff_ms_initial": 250, "backoff_multiplier": 2, "backoff_ms_max": 30000}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionConfig {
    pub exchange: ExchangeId,
    pub schema: Schema,
    pub account: SmolStr,
    /// Strict enrichment: skip items whose symbol has no snapshot in the state store.
    #[serde(default = "default_register_state")]
    pub register_state: bool,
    #[serde(default = "default_subscription_timeout_ms")]
    pub subscription_timeout_ms: u64,
    #[serde(default = "default_reconnect")]
    pub reconnect: ReconnectionBackoffPolicy,
}

fn default_register_state() -> bool {
    true
}

fn default_subscription_timeout_ms() -> u64 {
    10_000
}

fn default_reconnect() -> ReconnectionBackoffPolicy {
    DEFAULT_RECONNECTION_POLICY
}

impl ConnectionConfig {
    pub fn new<Account>(exchange: ExchangeId, schema: Schema, account: Account) -> Self
    where
        Account: Into<SmolStr>,
    {
        Self {
            exchange,
            schema,
            account: account.into(),
            register_state: default_register_state(),
            subscription_timeout_ms: default_subscription_timeout_ms(),
            reconnect: default_reconnect(),
        }
    }

    /// Read a [`ConnectionConfig`] from a JSON file.
    pub fn load<P>(path: P) -> Result<Self, DataError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|error| {
            DataError::Config(format!("failed to read {}: {error}", path.display()))
        })?;

        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, DataError> {
        serde_json::from_str(contents).map_err(|error| DataError::Config(error.to_string()))
    }

    pub fn subscription_timeout(&self) -> Duration {
        Duration::from_millis(self.subscription_timeout_ms)
    }
}
