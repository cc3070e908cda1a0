use crate::error::DataError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{
    fmt::{Debug, Formatter},
    time::Duration,
};

/// Fraction of a [`Lease`] ttl remaining at which it is considered expiring.
const LEASE_RENEW_FRACTION: u32 = 3;

/// Source of the credential used to authenticate private streams.
///
/// Lease renewal and token refresh happen behind this interface.
#[async_trait]
pub trait CredentialProvider
where
    Self: Debug + Send + Sync,
{
    /// Currently valid [`Credential`], if any.
    fn current_secret(&self) -> Option<Credential>;

    /// Determines if the current [`Credential`] is about to expire and should be refreshed.
    fn is_expiring(&self) -> bool;

    /// Renew the current [`Credential`] ahead of its expiry.
    ///
    /// Providers without a renewal mechanism keep serving the same [`Credential`].
    async fn refresh(&self) -> Result<(), DataError> {
        Ok(())
    }
}

/// Authentication material for one account.
#[derive(Clone, PartialEq, Deserialize, Serialize)]
pub struct Credential {
    pub key: SmolStr,
    pub secret: SmolStr,
    pub kind: CredentialKind,
    pub lease: Option<Lease>,
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("kind", &self.kind)
            .field("lease", &self.lease)
            .finish()
    }
}

impl Credential {
    pub fn api_key<Key, Secret>(key: Key, secret: Secret) -> Self
    where
        Key: Into<SmolStr>,
        Secret: Into<SmolStr>,
    {
        Self {
            key: key.into(),
            secret: secret.into(),
            kind: CredentialKind::ApiKey,
            lease: None,
        }
    }

    /// Binance user data stream listen key. The key itself is bound to the stream url.
    pub fn listen_key<Key>(listen_key: Key) -> Self
    where
        Key: Into<SmolStr>,
    {
        Self {
            key: listen_key.into(),
            secret: SmolStr::default(),
            kind: CredentialKind::ListenKey,
            lease: None,
        }
    }

    pub fn with_lease(self, lease: Lease) -> Self {
        Self {
            lease: Some(lease),
            ..self
        }
    }
}

/// Kind specific credential fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    ApiKey,
    ListenKey,
    /// Api key pair read from a Vault KV secret engine.
    VaultKv { path: SmolStr },
}

/// Time-bounded credential grant that must be renewed before expiry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Lease {
    pub issued: DateTime<Utc>,
    pub ttl: Duration,
    pub renewable: bool,
}

impl Lease {
    pub fn expires(&self) -> DateTime<Utc> {
        chrono::TimeDelta::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.issued.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Determines if less than a third of the ttl remains at `now`.
    pub fn is_expiring(&self, now: DateTime<Utc>) -> bool {
        let threshold = chrono::TimeDelta::from_std(self.ttl / LEASE_RENEW_FRACTION)
            .unwrap_or(chrono::TimeDelta::MAX);

        self.expires().signed_duration_since(now) <= threshold
    }
}

/// [`CredentialProvider`] holding one fixed [`Credential`].
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credential: Credential,
}

impl StaticCredentials {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    fn current_secret(&self) -> Option<Credential> {
        Some(self.credential.clone())
    }

    fn is_expiring(&self) -> bool {
        self.credential
            .lease
            .as_ref()
            .is_some_and(|lease| lease.is_expiring(Utc::now()))
    }
}
