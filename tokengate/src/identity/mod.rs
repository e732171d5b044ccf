//! Identity records carried inside tokens

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::ProviderProfile;
use crate::store::{self, Store, StoreKey, StoreResult};

/// Authenticated user's profile plus the end of its validity window
///
/// The whole record is embedded in every token, so a token's identity can
/// never change during its lifetime. A copy is also persisted under
/// `("User", id)` for lookup by other parts of the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable identifier assigned by the identity provider
    pub id: String,
    /// Primary email address
    pub email: String,
    /// Whether the provider verified the email address
    pub verified_email: bool,
    /// Display name
    pub name: String,
    /// Given name
    #[serde(default)]
    pub given_name: String,
    /// Family name
    #[serde(default)]
    pub family_name: String,
    /// Gender, when the provider reports one
    #[serde(default)]
    pub gender: String,
    /// Hosted domain of a managed account
    #[serde(default)]
    pub hosted_domain: String,
    /// Profile page
    #[serde(default)]
    pub link: String,
    /// Preferred locale
    #[serde(default)]
    pub locale: String,
    /// Avatar url
    #[serde(default)]
    pub picture: String,
    /// Instant after which the identity is no longer accepted
    pub valid_until: DateTime<Utc>,
}

impl Identity {
    /// Build an identity from a provider profile
    #[must_use]
    pub fn from_profile(profile: ProviderProfile, valid_until: DateTime<Utc>) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            verified_email: profile.verified_email.unwrap_or(false),
            name: profile.name,
            given_name: profile.given_name,
            family_name: profile.family_name,
            gender: profile.gender,
            hosted_domain: profile.hd,
            link: profile.link,
            locale: profile.locale,
            picture: profile.picture,
            valid_until,
        }
    }

    /// Synthetic identity used by the `fake-id` bypass
    pub fn fake(id: impl Into<String>, valid_until: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            email: "fake@fake.fake".to_string(),
            verified_email: true,
            name: "Fakey Fakeson".to_string(),
            given_name: "Fakey".to_string(),
            family_name: "Fakeson".to_string(),
            gender: String::new(),
            hosted_domain: String::new(),
            link: String::new(),
            locale: String::new(),
            picture: String::new(),
            valid_until,
        }
    }

    /// True while `valid_until` is strictly after `now`
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until > now
    }

    /// Storage key of this identity
    #[must_use]
    pub fn store_key(&self) -> StoreKey {
        StoreKey::identity(self.id.as_str())
    }

    /// Persist this identity, replacing any earlier copy
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, store: &dyn Store) -> StoreResult<()> {
        store.put(&self.store_key(), store::to_json(self)?).await
    }

    /// Load a persisted identity
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the stored value is not an identity.
    pub async fn load(store: &dyn Store, id: &str) -> StoreResult<Option<Self>> {
        store
            .get(&StoreKey::identity(id))
            .await?
            .map(|bytes| store::from_json(&bytes))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;

    #[test]
    fn test_validity_is_strict() {
        let now = Utc::now();
        let identity = Identity::fake("1", now);
        assert!(!identity.is_valid_at(now));
        assert!(identity.is_valid_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_from_profile_maps_fields() {
        let profile = ProviderProfile {
            id: "108".to_string(),
            email: "ada@example.com".to_string(),
            verified_email: Some(true),
            name: "Ada Lovelace".to_string(),
            given_name: "Ada".to_string(),
            family_name: "Lovelace".to_string(),
            hd: "example.com".to_string(),
            ..ProviderProfile::default()
        };
        let until = Utc::now();

        let identity = Identity::from_profile(profile, until);
        assert_eq!(identity.id, "108");
        assert!(identity.verified_email);
        assert_eq!(identity.hosted_domain, "example.com");
        assert_eq!(identity.valid_until, until);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemoryStore::new();
        let identity = Identity::fake("abc", Utc::now());

        identity.save(&store).await.unwrap();
        let loaded = Identity::load(&store, "abc").await.unwrap().unwrap();
        assert_eq!(loaded, identity);
        assert!(Identity::load(&store, "missing").await.unwrap().is_none());
    }
}
