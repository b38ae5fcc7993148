pub mod conversation;
pub mod profile;

pub use conversation::{
    ChatMessage, Conversation, MessageRole, DEFAULT_CONVERSATION_TITLE, PROVISIONAL_ID_PREFIX,
};
pub use profile::{
    FeatureUsage, PeriodUsage, PlanInfo, PlanTier, Preferences, ProfileUpdate, UsageLimits,
    UserIdentity, UserProfile,
};
