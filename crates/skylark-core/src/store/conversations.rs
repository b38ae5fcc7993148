//! In-memory conversation store for the active user.
//!
//! Mutations follow one discipline: snapshot, apply optimistically, call the
//! remote service, then commit the server-settled values or roll back to the
//! snapshot. Mutations on the same conversation are serialized behind a
//! per-id lock; different conversations proceed independently. A `load_all`
//! resolving after the session has turned over is discarded.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::cache::LocalCache;
use crate::error::{CoreError, Result};
use crate::models::{ChatMessage, Conversation, MessageRole};
use crate::remote::ConversationService;
use crate::session::SessionEpoch;
use crate::store::views::{self, ConversationQuery};

#[derive(Default)]
struct StoreState {
    conversations: Vec<Conversation>,
    selected_id: Option<String>,
    user_id: Option<String>,
    last_error: Option<CoreError>,
}

#[derive(Clone)]
pub struct ConversationStore {
    service: Arc<dyn ConversationService>,
    cache: LocalCache,
    epoch: SessionEpoch,
    state: Arc<RwLock<StoreState>>,
    id_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ConversationStore {
    pub fn new(service: Arc<dyn ConversationService>, cache: LocalCache, epoch: SessionEpoch) -> Self {
        Self {
            service,
            cache,
            epoch,
            state: Arc::new(RwLock::new(StoreState::default())),
            id_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replace in-memory state with the remote conversation list. The cached
    /// copy seeds the store first when it is empty, so the UI has something
    /// to render while the fetch is in flight. A failed fetch leaves prior
    /// state untouched and records the error for the UI's retry affordance.
    pub async fn load_all(&self, user_id: &str) -> Result<()> {
        let epoch_at_start = self.epoch.current();

        if self.state.read().conversations.is_empty() {
            if let Some(cached) = self.cache.load_conversations(user_id).await {
                if self.epoch.is_current(epoch_at_start) {
                    debug!(user_id, count = cached.len(), "seeding conversations from cache");
                    let mut state = self.state.write();
                    if state.conversations.is_empty() {
                        state.conversations = cached;
                        state.user_id = Some(user_id.to_string());
                    }
                }
            }
        }

        match self.service.list_conversations(user_id).await {
            Ok(mut fetched) => {
                for conversation in &mut fetched {
                    conversation.normalize();
                }
                fetched.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

                if !self.epoch.is_current(epoch_at_start) {
                    debug!(user_id, "discarding conversation list from a stale session");
                    return Ok(());
                }

                {
                    let mut state = self.state.write();
                    // Unpersisted provisional conversations survive a reload
                    let mut merged: Vec<Conversation> = state
                        .conversations
                        .iter()
                        .filter(|c| c.is_provisional())
                        .cloned()
                        .collect();
                    merged.extend(fetched.iter().cloned());
                    state.conversations = merged;
                    state.user_id = Some(user_id.to_string());
                    state.last_error = None;
                }

                if let Err(e) = self.cache.store_conversations(user_id, &fetched).await {
                    warn!(user_id, error = %e, "conversation cache write failed");
                }
                Ok(())
            }
            Err(e) => {
                warn!(user_id, error = %e, "conversation list fetch failed");
                if self.epoch.is_current(epoch_at_start) {
                    self.state.write().last_error = Some(e.clone());
                }
                Err(e)
            }
        }
    }

    // ===== Reads =====

    pub fn conversations(&self) -> Vec<Conversation> {
        self.state.read().conversations.clone()
    }

    pub fn get(&self, id: &str) -> Option<Conversation> {
        self.state.read().conversations.iter().find(|c| c.id == id).cloned()
    }

    /// Derived view, pipeline search → filter → sort. Pure; the source
    /// collection is untouched.
    pub fn visible(&self, query: &ConversationQuery) -> Vec<Conversation> {
        views::apply(&self.state.read().conversations, query)
    }

    pub fn last_error(&self) -> Option<CoreError> {
        self.state.read().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.state.write().last_error = None;
    }

    // ===== Selection =====

    pub fn select(&self, id: Option<&str>) -> Result<()> {
        let mut state = self.state.write();
        match id {
            None => {
                state.selected_id = None;
                Ok(())
            }
            Some(id) => {
                if state.conversations.iter().any(|c| c.id == id) {
                    state.selected_id = Some(id.to_string());
                    Ok(())
                } else {
                    Err(CoreError::not_found(format!("conversation {id}")))
                }
            }
        }
    }

    pub fn current(&self) -> Option<Conversation> {
        let state = self.state.read();
        let id = state.selected_id.as_deref()?;
        state.conversations.iter().find(|c| c.id == id).cloned()
    }

    /// Install and select a fresh provisional conversation. It is persisted
    /// to the remote service lazily, on the first appended message.
    pub fn start_new(&self) -> Conversation {
        let conversation = Conversation::provisional();
        let mut state = self.state.write();
        state.conversations.insert(0, conversation.clone());
        state.selected_id = Some(conversation.id.clone());
        conversation
    }

    // ===== Mutations =====

    pub async fn toggle_favorite(&self, id: &str) -> Result<bool> {
        let service = self.service.clone();
        self.optimistic_mutation(
            id,
            |c| c.is_favorite = !c.is_favorite,
            move |pending| async move {
                let settled = service.set_favorite(&pending.id, pending.is_favorite).await?;
                Ok((settled, move |c: &mut Conversation| c.is_favorite = settled))
            },
        )
        .await
    }

    pub async fn toggle_archive(&self, id: &str) -> Result<bool> {
        let service = self.service.clone();
        self.optimistic_mutation(
            id,
            |c| c.is_archived = !c.is_archived,
            move |pending| async move {
                let settled = service.set_archived(&pending.id, pending.is_archived).await?;
                Ok((settled, move |c: &mut Conversation| c.is_archived = settled))
            },
        )
        .await
    }

    pub async fn rename(&self, id: &str, title: &str) -> Result<()> {
        // Provisional conversations exist only locally
        if self.get(id).is_some_and(|c| c.is_provisional()) {
            let _guard = self.lock_conversation(id).await;
            let mut state = self.state.write();
            if let Some(conv) = state.conversations.iter_mut().find(|c| c.id == id) {
                conv.title = title.to_string();
            }
            return Ok(());
        }

        let service = self.service.clone();
        let title = title.to_string();
        self.optimistic_mutation(
            id,
            |c| c.title = title.clone(),
            move |pending| async move {
                service.rename_conversation(&pending.id, &pending.title).await?;
                Ok(((), |_: &mut Conversation| {}))
            },
        )
        .await
    }

    /// Remove immediately; on remote failure the conversation reappears at
    /// its original index.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.lock_conversation(id).await;
        let epoch_at_start = self.epoch.current();

        let (index, removed, was_selected) = {
            let mut state = self.state.write();
            let Some(index) = state.conversations.iter().position(|c| c.id == id) else {
                return Err(CoreError::not_found(format!("conversation {id}")));
            };
            let removed = state.conversations.remove(index);
            let was_selected = state.selected_id.as_deref() == Some(id);
            if was_selected {
                state.selected_id = None;
            }
            (index, removed, was_selected)
        };

        if removed.is_provisional() {
            // Never persisted; nothing to delete remotely
            return Ok(());
        }

        match self.service.delete_conversation(id).await {
            Ok(()) => {
                self.write_through().await;
                Ok(())
            }
            Err(e) => {
                if self.epoch.is_current(epoch_at_start) {
                    let mut state = self.state.write();
                    let index = index.min(state.conversations.len());
                    state.conversations.insert(index, removed);
                    if was_selected {
                        state.selected_id = Some(id.to_string());
                    }
                }
                warn!(id, error = %e, "remote delete failed, conversation restored");
                Err(e)
            }
        }
    }

    /// Append a message to the current conversation. The first message of a
    /// provisional conversation persists it remotely and rebinds the local
    /// id to the one the service assigned. Returns the conversation id the
    /// message now lives under.
    pub async fn append_message(&self, role: MessageRole, content: &str) -> Result<String> {
        let selected = self
            .state
            .read()
            .selected_id
            .clone()
            .ok_or_else(|| CoreError::not_found("no active conversation"))?;
        let _guard = self.lock_conversation(&selected).await;
        let epoch_at_start = self.epoch.current();
        let message = ChatMessage::new(role, content);

        let (snapshot, pending, user_id) = {
            let mut state = self.state.write();
            let user_id = state.user_id.clone();
            let Some(conv) = state.conversations.iter_mut().find(|c| c.id == selected) else {
                return Err(CoreError::not_found(format!("conversation {selected}")));
            };
            let snapshot = conv.clone();
            conv.push_message(message.clone());
            (snapshot, conv.clone(), user_id)
        };

        let outcome = if pending.is_provisional() {
            match user_id {
                None => Err(CoreError::auth("no active session")),
                Some(user_id) => match self.service.create_conversation(&user_id, &pending).await {
                    Ok(assigned_id) => {
                        if self.epoch.is_current(epoch_at_start) {
                            let mut state = self.state.write();
                            if let Some(conv) =
                                state.conversations.iter_mut().find(|c| c.id == pending.id)
                            {
                                conv.id = assigned_id.clone();
                            }
                            if state.selected_id.as_deref() == Some(pending.id.as_str()) {
                                state.selected_id = Some(assigned_id.clone());
                            }
                        }
                        Ok(assigned_id)
                    }
                    Err(e) => Err(e),
                },
            }
        } else {
            self.service
                .append_message(&pending.id, &message)
                .await
                .map(|()| pending.id.clone())
        };

        match outcome {
            Ok(conversation_id) => {
                self.write_through().await;
                Ok(conversation_id)
            }
            Err(e) => {
                if self.epoch.is_current(epoch_at_start) {
                    let mut state = self.state.write();
                    if let Some(conv) = state.conversations.iter_mut().find(|c| c.id == selected) {
                        *conv = snapshot;
                    }
                }
                warn!(id = %selected, error = %e, "message append failed, rolled back");
                Err(e)
            }
        }
    }

    /// Drop all per-session state. Part of session teardown.
    pub fn clear(&self) {
        *self.state.write() = StoreState::default();
        self.id_locks.lock().clear();
    }

    // ===== Internals =====

    async fn lock_conversation(&self, id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.id_locks.lock();
            locks
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// One optimistic mutation: Idle → Pending (apply) → Committed (server
    /// values win) or RolledBack (snapshot restored). Serialized per id.
    async fn optimistic_mutation<R, Fut, Commit>(
        &self,
        id: &str,
        apply: impl FnOnce(&mut Conversation),
        remote: impl FnOnce(Conversation) -> Fut,
    ) -> Result<R>
    where
        Fut: Future<Output = Result<(R, Commit)>>,
        Commit: FnOnce(&mut Conversation),
    {
        let _guard = self.lock_conversation(id).await;
        let epoch_at_start = self.epoch.current();

        let (snapshot, pending) = {
            let mut state = self.state.write();
            let Some(conv) = state.conversations.iter_mut().find(|c| c.id == id) else {
                return Err(CoreError::not_found(format!("conversation {id}")));
            };
            let snapshot = conv.clone();
            apply(conv);
            (snapshot, conv.clone())
        };

        match remote(pending).await {
            Ok((result, commit)) => {
                {
                    let mut state = self.state.write();
                    if let Some(conv) = state.conversations.iter_mut().find(|c| c.id == id) {
                        commit(conv);
                    }
                }
                self.write_through().await;
                Ok(result)
            }
            Err(e) => {
                if self.epoch.is_current(epoch_at_start) {
                    let mut state = self.state.write();
                    if let Some(conv) = state.conversations.iter_mut().find(|c| c.id == id) {
                        *conv = snapshot;
                    }
                }
                warn!(id, error = %e, "mutation failed, rolled back");
                Err(e)
            }
        }
    }

    /// Write the committed list through to the per-user cache. Best-effort;
    /// provisional conversations are not persisted.
    async fn write_through(&self) {
        let (user_id, persisted) = {
            let state = self.state.read();
            let persisted: Vec<Conversation> = state
                .conversations
                .iter()
                .filter(|c| !c.is_provisional())
                .cloned()
                .collect();
            (state.user_id.clone(), persisted)
        };
        if let Some(user_id) = user_id {
            if let Err(e) = self.cache.store_conversations(&user_id, &persisted).await {
                warn!(%user_id, error = %e, "conversation cache write failed");
            }
        }
    }
}
