//! Derived read-side views over the conversation list.
//!
//! Pure functions, applied in pipeline order search → filter → sort. None
//! of them mutate the source collection.

use crate::models::Conversation;
use crate::search::{conversation_matches, parse_search_terms};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterStatus {
    /// Everything except archived conversations.
    #[default]
    All,
    /// Favorites, archived excluded.
    Favorites,
    /// Archived conversations only.
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Most recently updated first.
    #[default]
    Recent,
    Oldest,
    /// Title, case-insensitive; ties break by `updated_at` descending.
    Alphabetical,
}

#[derive(Debug, Clone, Default)]
pub struct ConversationQuery {
    pub search: String,
    pub status: FilterStatus,
    pub order: SortOrder,
}

/// Case-insensitive substring match over title and message bodies. An empty
/// term returns the collection unfiltered.
pub fn search(list: &[Conversation], term: &str) -> Vec<Conversation> {
    let terms = parse_search_terms(term);
    if terms.is_empty() {
        return list.to_vec();
    }
    list.iter()
        .filter(|c| conversation_matches(c, &terms))
        .cloned()
        .collect()
}

pub fn filter(list: &[Conversation], status: FilterStatus) -> Vec<Conversation> {
    list.iter()
        .filter(|c| match status {
            FilterStatus::All => !c.is_archived,
            FilterStatus::Favorites => c.is_favorite && !c.is_archived,
            FilterStatus::Archived => c.is_archived,
        })
        .cloned()
        .collect()
}

pub fn sort(mut list: Vec<Conversation>, order: SortOrder) -> Vec<Conversation> {
    match order {
        SortOrder::Recent => list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        SortOrder::Oldest => list.sort_by(|a, b| a.updated_at.cmp(&b.updated_at)),
        SortOrder::Alphabetical => list.sort_by(|a, b| {
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        }),
    }
    list
}

pub fn apply(list: &[Conversation], query: &ConversationQuery) -> Vec<Conversation> {
    sort(filter(&search(list, &query.search), query.status), query.order)
}
