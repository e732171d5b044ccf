//! Token codec
//!
//! A token is the base64-url encoding of
//!
//! ```text
//! nonce (24 bytes) ‖ XChaCha20-Poly1305( JSON identity ) ‖ tag (16 bytes)
//! ```
//!
//! sealed under the current [`TokenSecret`]. Nothing about a token is stored
//! server side; it is valid exactly when it opens under the current secret
//! and its embedded `valid_until` is still in the future.

use std::sync::Arc;

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};

use crate::clock::Clock;
use crate::error::AuthError;
use crate::identity::Identity;
use crate::secrets::{SecretCache, TokenSecret};

/// Nonce width in bytes
pub const NONCE_LEN: usize = 24;

/// Authentication tag width in bytes
pub const TAG_LEN: usize = 16;

/// URL-safe alphabet, unpadded on output, padding optional on input
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encrypts identities into tokens and back
#[derive(Clone)]
pub struct TokenCodec {
    secrets: Arc<SecretCache>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secrets", &self.secrets)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec reading its key from `secrets`
    #[must_use]
    pub fn new(secrets: Arc<SecretCache>, clock: Arc<dyn Clock>) -> Self {
        Self { secrets, clock }
    }

    /// Seal an identity into a token
    ///
    /// # Errors
    ///
    /// Returns an error if the secret cannot be obtained.
    pub async fn encode(&self, identity: &Identity) -> Result<String, AuthError> {
        let secret = self.secrets.token_secret().await?;
        seal(&secret, identity)
    }

    /// Open a token and check it has not expired
    ///
    /// # Errors
    ///
    /// - [`AuthError::Malformed`] for bad base64 or input shorter than a nonce
    /// - [`AuthError::Tampered`] when authenticated decryption fails
    /// - [`AuthError::Expired`] when `valid_until` is not after now
    pub async fn decode(&self, token: &str) -> Result<Identity, AuthError> {
        self.decode_at(token, self.clock.now()).await
    }

    /// [`decode`](Self::decode) against an explicit instant
    ///
    /// # Errors
    ///
    /// Same as [`decode`](Self::decode).
    pub async fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, AuthError> {
        let raw = TOKEN_ENGINE
            .decode(token)
            .map_err(|e| AuthError::Malformed(format!("token is not base64-url: {e}")))?;
        if raw.len() < NONCE_LEN {
            return Err(AuthError::Malformed(format!(
                "token is {} bytes, shorter than its {NONCE_LEN}-byte nonce",
                raw.len()
            )));
        }

        let secret = self.secrets.token_secret().await?;
        let identity = open(&secret, &raw)?;
        if !identity.is_valid_at(now) {
            return Err(AuthError::Expired);
        }
        Ok(identity)
    }
}

fn seal(secret: &TokenSecret, identity: &Identity) -> Result<String, AuthError> {
    let plaintext = serde_json::to_vec(identity)
        .map_err(|e| AuthError::Internal(format!("identity serialization failed: {e}")))?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(secret.as_bytes()));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext.as_slice())
        .map_err(|_| AuthError::Internal("token encryption failed".to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(TOKEN_ENGINE.encode(sealed))
}

fn open(secret: &TokenSecret, raw: &[u8]) -> Result<Identity, AuthError> {
    let (nonce, ciphertext) = raw.split_at(NONCE_LEN);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(secret.as_bytes()));
    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| AuthError::Tampered)?;

    // only we can produce a sealed payload, so anything unreadable was not ours
    serde_json::from_slice(&plaintext).map_err(|_| AuthError::Tampered)
}
