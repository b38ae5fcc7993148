//! Authenticated-session lifecycle.
//!
//! The session manager owns the profile synchronizer and conversation store:
//! it populates them when a session begins and purges all per-user state
//! (memory and cache) when one ends. Downstream components receive the user
//! id as a parameter; there is no ambient global user.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::cache::LocalCache;
use crate::error::Result;
use crate::models::UserProfile;
use crate::remote::{ConversationService, Identity, IdentityProvider, ProfileService};
use crate::storage::KeyValueStorage;
use crate::store::ConversationStore;
use crate::sync::ProfileSynchronizer;

/// Monotonic counter bumped on every session transition. Async work captures
/// the epoch when it starts and checks it before committing, so results that
/// resolve after the session has turned over are discarded.
#[derive(Debug, Clone, Default)]
pub struct SessionEpoch(Arc<AtomicU64>);

impl SessionEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.current() == epoch
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Authenticated(String),
    Unauthenticated,
}

#[derive(Clone)]
pub struct SessionManager {
    identity_provider: Arc<dyn IdentityProvider>,
    profile_service: Arc<dyn ProfileService>,
    cache: LocalCache,
    epoch: SessionEpoch,
    profiles: ProfileSynchronizer,
    conversations: ConversationStore,
    state: Arc<RwLock<SessionState>>,
    current_identity: Arc<RwLock<Option<Identity>>>,
}

impl SessionManager {
    pub fn new(
        identity_provider: Arc<dyn IdentityProvider>,
        profile_service: Arc<dyn ProfileService>,
        conversation_service: Arc<dyn ConversationService>,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Self {
        let cache = LocalCache::new(storage);
        let epoch = SessionEpoch::new();
        let profiles =
            ProfileSynchronizer::new(profile_service.clone(), cache.clone(), epoch.clone());
        let conversations =
            ConversationStore::new(conversation_service, cache.clone(), epoch.clone());
        Self {
            identity_provider,
            profile_service,
            cache,
            epoch,
            profiles,
            conversations,
            state: Arc::new(RwLock::new(SessionState::Uninitialized)),
            current_identity: Arc::new(RwLock::new(None)),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn profiles(&self) -> ProfileSynchronizer {
        self.profiles.clone()
    }

    pub fn conversations(&self) -> ConversationStore {
        self.conversations.clone()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.current_identity.read().clone()
    }

    /// Mark the manager as waiting on the identity provider's session
    /// restoration. The host follows up with `resume_session` or
    /// `session_expired` once the provider reports.
    pub fn initialize(&self) {
        let mut state = self.state.write();
        if *state == SessionState::Uninitialized {
            *state = SessionState::Initializing;
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile> {
        self.set_state(SessionState::Initializing);
        let identity = match self.identity_provider.sign_in(email, password).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "sign-in failed");
                self.set_state(SessionState::Unauthenticated);
                return Err(e);
            }
        };
        self.enter_authenticated(identity).await
    }

    /// Create the account, persist an initial default profile, then enter
    /// the authenticated state. A failed remote profile creation falls back
    /// to the locally constructed default.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<UserProfile> {
        self.set_state(SessionState::Initializing);
        let identity = match self.identity_provider.create_account(email, password).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "account creation failed");
                self.set_state(SessionState::Unauthenticated);
                return Err(e);
            }
        };

        let profile = UserProfile::default_free(&identity.user_id, &identity.email);
        if let Err(e) = self.profile_service.create_profile(&profile).await {
            warn!(user_id = %identity.user_id, error = %e, "remote profile creation failed, continuing with local default");
        }

        self.enter_authenticated(identity).await
    }

    /// Re-enter an existing session the identity provider restored.
    pub async fn resume_session(&self, identity: Identity) -> Result<UserProfile> {
        self.enter_authenticated(identity).await
    }

    /// Tear the session down locally regardless of whether the provider's
    /// sign-out round-trip succeeds; staying signed in locally after the
    /// user asked to leave is the worse failure.
    pub async fn sign_out(&self) {
        if let Err(e) = self.identity_provider.sign_out().await {
            warn!(error = %e, "provider sign-out failed, tearing down locally anyway");
        }
        self.teardown().await;
    }

    /// Purge local state first (same path as sign-out), then remove the
    /// remote identity.
    pub async fn delete_account(&self) -> Result<()> {
        self.teardown().await;
        self.identity_provider.delete_identity().await
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<()> {
        self.identity_provider.send_password_reset(email).await
    }

    /// Entry point for the host's session-change bridge: an expired or
    /// externally revoked session forces `Unauthenticated` through the same
    /// teardown as sign-out, without a provider round-trip.
    pub async fn session_expired(&self) {
        if matches!(self.state(), SessionState::Authenticated(_)) {
            warn!("session expired, forcing unauthenticated");
        }
        self.teardown().await;
    }

    async fn enter_authenticated(&self, identity: Identity) -> Result<UserProfile> {
        self.epoch.advance();
        info!(user_id = %identity.user_id, "session authenticated");
        self.set_state(SessionState::Authenticated(identity.user_id.clone()));
        *self.current_identity.write() = Some(identity.clone());

        let profile = self.profiles.load(&identity).await?;

        if let Err(e) = self.conversations.load_all(&identity.user_id).await {
            // The store keeps the error for the UI's retry affordance
            warn!(user_id = %identity.user_id, error = %e, "initial conversation load failed");
        }

        if let Err(e) = self
            .profile_service
            .update_last_login(&identity.user_id)
            .await
        {
            warn!(user_id = %identity.user_id, error = %e, "last-login update failed");
        }

        Ok(profile)
    }

    async fn teardown(&self) {
        let identity = self.current_identity.write().take();
        self.epoch.advance();
        self.profiles.clear();
        self.conversations.clear();

        if let Some(identity) = identity {
            info!(user_id = %identity.user_id, "session ended");
            if let Err(e) = self.cache.purge_user(&identity.user_id).await {
                // Cache trouble never blocks leaving the session
                warn!(user_id = %identity.user_id, error = %e, "cache purge failed");
            }
        }

        self.set_state(SessionState::Unauthenticated);
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }
}
