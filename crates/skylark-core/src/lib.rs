pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod search;
pub mod session;
pub mod storage;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::LocalCache;
pub use config::CoreConfig;
pub use error::{CoreError, Result};
pub use models::{
    ChatMessage, Conversation, MessageRole, PlanInfo, PlanTier, Preferences, ProfileUpdate,
    UsageLimits, UserIdentity, UserProfile,
};
pub use remote::{ConversationService, Identity, IdentityProvider, ProfileService};
pub use session::{SessionEpoch, SessionManager, SessionState};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::{ConversationQuery, ConversationStore, FilterStatus, SortOrder};
pub use sync::{ProfileEvent, ProfileSource, ProfileSynchronizer};
