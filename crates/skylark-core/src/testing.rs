//! In-memory collaborator mocks shared by the module tests: configurable
//! failure injection, call recording, and gates for holding a remote call
//! open while the test arranges a concurrent operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Semaphore;

use crate::error::{CoreError, Result};
use crate::models::{ChatMessage, Conversation, ProfileUpdate, UserProfile};
use crate::remote::{ConversationService, Identity, IdentityProvider, ProfileService};

/// A pass-through point that can be closed. While closed, every `pass()`
/// consumes one permit, so callers block until the test releases them.
pub struct Gate {
    closed: AtomicBool,
    permits: Semaphore,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            closed: AtomicBool::new(false),
            permits: Semaphore::new(0),
        }
    }
}

impl Gate {
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Let `n` blocked (or future) callers through.
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    pub async fn pass(&self) {
        if self.closed.load(Ordering::SeqCst) {
            self.permits.acquire().await.expect("gate closed").forget();
        }
    }
}

// ===== Identity provider =====

#[derive(Default)]
pub struct MockIdentityProvider {
    pub fail_sign_in: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    pub sign_out_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub reset_emails: RwLock<Vec<String>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn identity_for(email: &str) -> Identity {
        let local = email.split('@').next().unwrap_or(email);
        Identity::new(format!("uid-{local}"), email)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn create_account(&self, email: &str, _password: &str) -> Result<Identity> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(CoreError::auth("account creation rejected"));
        }
        Ok(Self::identity_for(email))
    }

    async fn sign_in(&self, email: &str, _password: &str) -> Result<Identity> {
        if self.fail_sign_in.load(Ordering::SeqCst) {
            return Err(CoreError::auth("invalid credentials"));
        }
        Ok(Self::identity_for(email))
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        self.reset_emails.write().push(email.to_string());
        Ok(())
    }

    async fn delete_identity(&self) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(CoreError::network("delete failed"));
        }
        Ok(())
    }
}

// ===== Profile service =====

#[derive(Default)]
pub struct MockProfileService {
    pub profiles: RwLock<HashMap<String, UserProfile>>,
    pub fail_get: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_update: AtomicBool,
    pub get_calls: AtomicUsize,
    pub last_login_calls: AtomicUsize,
    pub get_gate: Gate,
}

impl MockProfileService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(profile: UserProfile) -> Self {
        let service = Self::default();
        service
            .profiles
            .write()
            .insert(profile.user.id.clone(), profile);
        service
    }

    pub fn set_profile(&self, profile: UserProfile) {
        self.profiles
            .write()
            .insert(profile.user.id.clone(), profile);
    }
}

#[async_trait]
impl ProfileService for MockProfileService {
    async fn get_profile(&self, user_id: &str) -> Result<UserProfile> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.get_gate.pass().await;
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(CoreError::network("profile service offline"));
        }
        self.profiles
            .read()
            .get(user_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("profile {user_id}")))
    }

    async fn create_profile(&self, profile: &UserProfile) -> Result<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(CoreError::network("profile service offline"));
        }
        self.set_profile(profile.clone());
        Ok(())
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<()> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(CoreError::network("profile service offline"));
        }
        let mut profiles = self.profiles.write();
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| CoreError::not_found(format!("profile {user_id}")))?;
        if let Some(name) = &update.display_name {
            profile.user.display_name = Some(name.clone());
        }
        if let Some(preferences) = &update.preferences {
            profile.preferences = preferences.clone();
        }
        Ok(())
    }

    async fn update_last_login(&self, _user_id: &str) -> Result<()> {
        self.last_login_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ===== Conversation service =====

#[derive(Default)]
pub struct MockConversationService {
    pub conversations: RwLock<Vec<Conversation>>,
    pub fail_list: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_set_favorite: AtomicBool,
    pub fail_set_archived: AtomicBool,
    pub fail_rename: AtomicBool,
    pub fail_append: AtomicBool,
    /// When set, the mutation endpoints report this as the settled value
    /// regardless of what the client asked for.
    pub forced_favorite: Mutex<Option<bool>>,
    pub forced_archived: Mutex<Option<bool>>,
    pub favorite_calls: RwLock<Vec<(String, bool)>>,
    pub list_calls: AtomicUsize,
    pub next_id: AtomicUsize,
    pub list_gate: Gate,
    pub mutate_gate: Gate,
}

impl MockConversationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversations(conversations: Vec<Conversation>) -> Self {
        let service = Self::default();
        *service.conversations.write() = conversations;
        service
    }
}

#[async_trait]
impl ConversationService for MockConversationService {
    async fn list_conversations(&self, _user_id: &str) -> Result<Vec<Conversation>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.list_gate.pass().await;
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(CoreError::network("conversation service offline"));
        }
        Ok(self.conversations.read().clone())
    }

    async fn create_conversation(
        &self,
        _user_id: &str,
        conversation: &Conversation,
    ) -> Result<String> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(CoreError::network("conversation service offline"));
        }
        let id = format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut stored = conversation.clone();
        stored.id = id.clone();
        self.conversations.write().push(stored);
        Ok(id)
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        self.mutate_gate.pass().await;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(CoreError::network("conversation service offline"));
        }
        self.conversations.write().retain(|c| c.id != id);
        Ok(())
    }

    async fn set_favorite(&self, id: &str, favorite: bool) -> Result<bool> {
        self.favorite_calls.write().push((id.to_string(), favorite));
        self.mutate_gate.pass().await;
        if self.fail_set_favorite.load(Ordering::SeqCst) {
            return Err(CoreError::network("conversation service offline"));
        }
        let settled = self.forced_favorite.lock().unwrap_or(favorite);
        if let Some(conv) = self.conversations.write().iter_mut().find(|c| c.id == id) {
            conv.is_favorite = settled;
        }
        Ok(settled)
    }

    async fn set_archived(&self, id: &str, archived: bool) -> Result<bool> {
        self.mutate_gate.pass().await;
        if self.fail_set_archived.load(Ordering::SeqCst) {
            return Err(CoreError::network("conversation service offline"));
        }
        let settled = self.forced_archived.lock().unwrap_or(archived);
        if let Some(conv) = self.conversations.write().iter_mut().find(|c| c.id == id) {
            conv.is_archived = settled;
        }
        Ok(settled)
    }

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<()> {
        self.mutate_gate.pass().await;
        if self.fail_rename.load(Ordering::SeqCst) {
            return Err(CoreError::network("conversation service offline"));
        }
        if let Some(conv) = self.conversations.write().iter_mut().find(|c| c.id == id) {
            conv.title = title.to_string();
        }
        Ok(())
    }

    async fn append_message(&self, id: &str, message: &ChatMessage) -> Result<()> {
        self.mutate_gate.pass().await;
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(CoreError::network("conversation service offline"));
        }
        if let Some(conv) = self.conversations.write().iter_mut().find(|c| c.id == id) {
            conv.push_message(message.clone());
        }
        Ok(())
    }
}
