pub mod conversations;
pub mod views;

pub use conversations::ConversationStore;
pub use views::{ConversationQuery, FilterStatus, SortOrder};
