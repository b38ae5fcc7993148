//! Remote collaborator seams.
//!
//! The identity provider, profile/usage service, and conversation service
//! live outside this crate; hosts inject implementations of these traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ChatMessage, Conversation, ProfileUpdate, UserProfile};

/// An authenticated identity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity>;
    async fn sign_out(&self) -> Result<()>;
    async fn send_password_reset(&self, email: &str) -> Result<()>;
    async fn delete_identity(&self) -> Result<()>;
}

#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<UserProfile>;
    async fn create_profile(&self, profile: &UserProfile) -> Result<()>;
    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<()>;
    async fn update_last_login(&self, user_id: &str) -> Result<()>;
}

#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>>;

    /// Persist a conversation created client-side. Returns the id the
    /// service assigned; the caller rebinds its provisional id to it.
    async fn create_conversation(&self, user_id: &str, conversation: &Conversation)
        -> Result<String>;

    async fn delete_conversation(&self, id: &str) -> Result<()>;

    /// Set the favorite flag. Returns the server-settled value, which wins
    /// over the client's optimistic guess when they disagree.
    async fn set_favorite(&self, id: &str, favorite: bool) -> Result<bool>;

    /// Set the archived flag. Same settled-value contract as `set_favorite`.
    async fn set_archived(&self, id: &str, archived: bool) -> Result<bool>;

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<()>;

    async fn append_message(&self, id: &str, message: &ChatMessage) -> Result<()>;
}
