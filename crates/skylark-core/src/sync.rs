//! Cache-then-network profile synchronization.
//!
//! `load` surfaces the cached profile first so the UI renders immediately,
//! then reconciles against the authoritative remote copy. Concurrent loads
//! for one user share a single in-flight fetch.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{FutureExt, Shared};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::cache::LocalCache;
use crate::error::Result;
use crate::models::{ProfileUpdate, UserProfile};
use crate::remote::{Identity, ProfileService};
use crate::session::SessionEpoch;

/// Where an emitted profile value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    /// Local cache, shown while the remote fetch is in flight.
    Cached,
    /// Authoritative remote copy.
    Remote,
    /// Client-side default, used when the remote fails and no cache exists.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct ProfileEvent {
    pub source: ProfileSource,
    pub profile: UserProfile,
}

type SharedLoad = Shared<Pin<Box<dyn Future<Output = Result<UserProfile>> + Send>>>;

const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Clone)]
pub struct ProfileSynchronizer {
    service: Arc<dyn ProfileService>,
    cache: LocalCache,
    epoch: SessionEpoch,
    current: Arc<RwLock<Option<UserProfile>>>,
    events: broadcast::Sender<ProfileEvent>,
    in_flight: Arc<tokio::sync::Mutex<HashMap<String, (u64, SharedLoad)>>>,
    next_token: Arc<AtomicU64>,
}

impl ProfileSynchronizer {
    pub fn new(service: Arc<dyn ProfileService>, cache: LocalCache, epoch: SessionEpoch) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            service,
            cache,
            epoch,
            current: Arc::new(RwLock::new(None)),
            events,
            in_flight: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            next_token: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The last reconciled profile, if any.
    pub fn current(&self) -> Option<UserProfile> {
        self.current.read().clone()
    }

    /// Subscribe to profile emissions. A subscriber observes the cached
    /// value strictly before the remote one, and never sees a reversion
    /// back to the cached value afterwards.
    pub fn subscribe(&self) -> broadcast::Receiver<ProfileEvent> {
        self.events.subscribe()
    }

    /// Load this user's profile: cached copy first (when present), then the
    /// authoritative remote copy, which overwrites both memory and cache.
    /// With the remote unreachable and no cache, resolves to a client-side
    /// free-tier default so callers never block indefinitely.
    ///
    /// Concurrent calls for the same user attach to the in-flight fetch
    /// instead of issuing a duplicate.
    pub async fn load(&self, identity: &Identity) -> Result<UserProfile> {
        let user_id = identity.user_id.clone();
        let (shared, created_token) = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some((_, existing)) = in_flight.get(&user_id) {
                debug!(%user_id, "attaching to in-flight profile load");
                (existing.clone(), None)
            } else {
                let token = self.next_token.fetch_add(1, Ordering::Relaxed);
                let this = self.clone();
                let identity = identity.clone();
                let epoch_at_start = self.epoch.current();
                let fut: Pin<Box<dyn Future<Output = Result<UserProfile>> + Send>> =
                    Box::pin(async move { this.run_load(identity, epoch_at_start).await });
                let shared = fut.shared();
                in_flight.insert(user_id.clone(), (token, shared.clone()));
                (shared, Some(token))
            }
        };

        let result = shared.await;

        if let Some(token) = created_token {
            let mut in_flight = self.in_flight.lock().await;
            if in_flight.get(&user_id).map(|(t, _)| *t) == Some(token) {
                in_flight.remove(&user_id);
            }
        }

        result
    }

    async fn run_load(&self, identity: Identity, epoch_at_start: u64) -> Result<UserProfile> {
        let user_id = identity.user_id.as_str();

        let cached = self.cache.load_profile(user_id).await;
        if let Some(profile) = &cached {
            if self.epoch.is_current(epoch_at_start) {
                *self.current.write() = Some(profile.clone());
                self.emit(ProfileSource::Cached, profile.clone());
            }
        }

        match self.service.get_profile(user_id).await {
            Ok(mut remote) => {
                remote.normalize();
                if self.epoch.is_current(epoch_at_start) {
                    if let Err(e) = self.cache.store_profile(user_id, &remote).await {
                        warn!(user_id, error = %e, "profile cache write failed");
                    }
                    *self.current.write() = Some(remote.clone());
                    self.emit(ProfileSource::Remote, remote.clone());
                } else {
                    debug!(user_id, "discarding stale profile load");
                }
                Ok(remote)
            }
            Err(e) => {
                warn!(user_id, error = %e, "remote profile fetch failed");
                if let Some(profile) = cached {
                    // Keep showing the cached value; no second emission, so
                    // subscribers never observe a downgrade.
                    return Ok(profile);
                }
                let fallback = UserProfile::default_free(user_id, &identity.email);
                if self.epoch.is_current(epoch_at_start) {
                    *self.current.write() = Some(fallback.clone());
                    self.emit(ProfileSource::Fallback, fallback.clone());
                }
                Ok(fallback)
            }
        }
    }

    /// Send a partial update, then reload to reconcile. Usage counters are
    /// backend-authoritative, so nothing is applied optimistically: on
    /// failure the error propagates and local state is untouched.
    pub async fn update(&self, identity: &Identity, update: &ProfileUpdate) -> Result<UserProfile> {
        self.service
            .update_profile(&identity.user_id, update)
            .await?;
        self.load(identity).await
    }

    /// Drop in-memory profile state. Part of session teardown.
    pub fn clear(&self) {
        *self.current.write() = None;
    }

    fn emit(&self, source: ProfileSource, profile: UserProfile) {
        let _ = self.events.send(ProfileEvent { source, profile });
    }
}
