//! Per-user local cache on top of the key-value storage seam.
//!
//! Keys are namespaced by user (`profile:{user_id}`, `conversations:{user_id}`)
//! so a session teardown can purge one user's entries by prefix. Reads fail
//! soft: a missing, unreadable, or corrupt payload is a cache miss, never an
//! error the caller sees.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{Conversation, UserProfile};
use crate::storage::KeyValueStorage;

const PROFILE_NAMESPACE: &str = "profile";
const CONVERSATIONS_NAMESPACE: &str = "conversations";

#[derive(Clone)]
pub struct LocalCache {
    storage: Arc<dyn KeyValueStorage>,
}

impl LocalCache {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    fn profile_key(user_id: &str) -> String {
        format!("{PROFILE_NAMESPACE}:{user_id}")
    }

    fn conversations_key(user_id: &str) -> String {
        format!("{CONVERSATIONS_NAMESPACE}:{user_id}")
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = match self.storage.get(key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "cache payload corrupt, treating as miss");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value).map_err(crate::error::CoreError::storage)?;
        self.storage.set(key, &payload).await
    }

    pub async fn load_profile(&self, user_id: &str) -> Option<UserProfile> {
        let mut profile: UserProfile = self.load(&Self::profile_key(user_id)).await?;
        profile.normalize();
        Some(profile)
    }

    pub async fn store_profile(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        self.store(&Self::profile_key(user_id), profile).await
    }

    pub async fn load_conversations(&self, user_id: &str) -> Option<Vec<Conversation>> {
        let mut conversations: Vec<Conversation> =
            self.load(&Self::conversations_key(user_id)).await?;
        for conversation in &mut conversations {
            conversation.normalize();
        }
        Some(conversations)
    }

    pub async fn store_conversations(
        &self,
        user_id: &str,
        conversations: &[Conversation],
    ) -> Result<()> {
        self.store(&Self::conversations_key(user_id), &conversations)
            .await
    }

    /// Remove every cache entry namespaced to this user.
    pub async fn purge_user(&self, user_id: &str) -> Result<()> {
        let prefixes = [Self::profile_key(user_id), Self::conversations_key(user_id)];
        let keys = self.storage.list_keys().await?;
        let doomed: Vec<String> = keys
            .into_iter()
            .filter(|key| prefixes.iter().any(|prefix| key.starts_with(prefix.as_str())))
            .collect();
        if doomed.is_empty() {
            return Ok(());
        }
        debug!(user_id, count = doomed.len(), "purging cache namespace");
        self.storage.remove_many(&doomed).await
    }
}
