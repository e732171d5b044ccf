//! Process-local cache of the token secret and OAuth client credentials
//!
//! Both values live in the durable [`Store`] and are read at most once per
//! process. The token secret is created lazily: the first process that needs
//! it and finds none generates 32 random bytes and commits them with a
//! create-if-absent transaction. Racing creators converge on whichever value
//! was committed first.
//!
//! ```text
//! read lock ──hit──▶ cached
//!     │miss
//! write lock ──hit──▶ cached (filled by another task meanwhile)
//!     │miss
//! store.get ──found──▶ cache it
//!     │absent
//! begin → get ──found──▶ adopt winner
//!     │absent
//! put → commit ──Conflict──▶ back off, retry
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::StoreSettings;
use crate::error::AuthError;
use crate::store::{self, Store, StoreError, StoreKey};

/// Token secret width in bytes
pub const SECRET_LEN: usize = 32;

/// Symmetric key used to seal tokens
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret([u8; SECRET_LEN]);

impl TokenSecret {
    /// Draw a fresh secret from the OS random source
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Rebuild a secret from stored bytes
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not exactly [`SECRET_LEN`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AuthError> {
        let bytes: [u8; SECRET_LEN] = bytes.try_into().map_err(|_| {
            AuthError::Internal(format!(
                "stored token secret is {} bytes, expected {SECRET_LEN}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Raw key bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }
}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenSecret(..)")
    }
}

/// OAuth client credentials issued by the identity provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    /// Client identifier
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
}

impl ClientCredentials {
    /// Create a credential pair
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

/// Bounded retry for conflicting provisioning commits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total commit attempts, at least 1
    pub max_attempts: u32,
    /// Delay before the first retry
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based), doubling each time
    #[must_use]
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&StoreSettings::default())
    }
}

impl From<&StoreSettings> for RetryPolicy {
    fn from(settings: &StoreSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff: settings.retry_backoff(),
        }
    }
}

/// Lazily populated cache over the secret store
pub struct SecretCache {
    store: Arc<dyn Store>,
    retry: RetryPolicy,
    token_secret: RwLock<Option<TokenSecret>>,
    credentials: RwLock<Option<ClientCredentials>>,
}

impl fmt::Debug for SecretCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCache")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl SecretCache {
    /// Create an empty cache over `store`
    #[must_use]
    pub fn new(store: Arc<dyn Store>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            token_secret: RwLock::new(None),
            credentials: RwLock::new(None),
        }
    }

    /// Current token secret, created on first use if the store has none
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails, the stored value is corrupt, or
    /// provisioning keeps conflicting past the retry policy.
    pub async fn token_secret(&self) -> Result<TokenSecret, AuthError> {
        if let Some(secret) = self.token_secret.read().await.as_ref() {
            return Ok(secret.clone());
        }

        let mut slot = self.token_secret.write().await;
        if let Some(secret) = slot.as_ref() {
            return Ok(secret.clone());
        }

        let secret = match self.store.get(&StoreKey::token_secret()).await? {
            Some(bytes) => TokenSecret::from_slice(&bytes)?,
            None => self.create_token_secret().await?,
        };
        *slot = Some(secret.clone());
        Ok(secret)
    }

    async fn create_token_secret(&self) -> Result<TokenSecret, AuthError> {
        let key = StoreKey::token_secret();
        let candidate = TokenSecret::generate();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut tx = self.store.begin().await?;
            if let Some(existing) = tx.get(&key).await? {
                tx.rollback();
                tracing::debug!(attempt, "adopting token secret created by another writer");
                return TokenSecret::from_slice(&existing);
            }

            tx.put(&key, candidate.as_bytes().to_vec());
            match tx.commit().await {
                Ok(()) => {
                    tracing::info!(attempt, "provisioned new token secret");
                    return Ok(candidate);
                }
                Err(StoreError::Conflict(_)) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff_after(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "token secret commit conflicted, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Replace the token secret, invalidating every token issued so far
    ///
    /// Other processes keep their cached secret until they restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn rotate_token_secret(&self) -> Result<TokenSecret, AuthError> {
        let secret = TokenSecret::generate();
        let mut slot = self.token_secret.write().await;
        self.store
            .put(&StoreKey::token_secret(), secret.as_bytes().to_vec())
            .await?;
        *slot = Some(secret.clone());
        tracing::warn!("token secret rotated, previously issued tokens are now invalid");
        Ok(secret)
    }

    /// OAuth client credentials
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotConfigured`] when none were provisioned, or a
    /// storage error.
    pub async fn client_credentials(&self) -> Result<ClientCredentials, AuthError> {
        if let Some(credentials) = self.credentials.read().await.as_ref() {
            return Ok(credentials.clone());
        }

        let mut slot = self.credentials.write().await;
        if let Some(credentials) = slot.as_ref() {
            return Ok(credentials.clone());
        }

        let bytes = self
            .store
            .get(&StoreKey::client_credentials())
            .await?
            .ok_or_else(|| AuthError::NotConfigured("OAuth client credentials".to_string()))?;
        let credentials: ClientCredentials = store::from_json(&bytes)?;
        *slot = Some(credentials.clone());
        Ok(credentials)
    }

    /// Store OAuth client credentials, once
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AlreadyConfigured`] if credentials exist, including
    /// when a concurrent call committed first.
    pub async fn provision_client_credentials(
        &self,
        credentials: ClientCredentials,
    ) -> Result<(), AuthError> {
        let key = StoreKey::client_credentials();
        let mut tx = self.store.begin().await?;
        if tx.get(&key).await?.is_some() {
            tx.rollback();
            return Err(AuthError::AlreadyConfigured);
        }

        tx.put(&key, store::to_json(&credentials)?);
        match tx.commit().await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(AuthError::AlreadyConfigured),
            Err(err) => return Err(err.into()),
        }

        tracing::info!(client_id = %credentials.client_id, "OAuth client credentials provisioned");
        *self.credentials.write().await = Some(credentials);
        Ok(())
    }
}
