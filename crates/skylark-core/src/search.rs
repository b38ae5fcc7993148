//! Search semantics for the conversation list.
//!
//! Multi-term AND queries with the '+' operator, matched ASCII
//! case-insensitively against a conversation's title and message bodies.

use crate::models::Conversation;

/// Split a query into terms. '+' separates terms that must ALL match
/// (AND semantics at the conversation level); terms are trimmed and
/// lowercased, empty terms dropped.
pub fn parse_search_terms(query: &str) -> Vec<String> {
    query
        .split('+')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Substring match, ASCII case-insensitive. An empty term matches anything.
pub fn text_contains_term(text: &str, term: &str) -> bool {
    let text_chars: Vec<char> = text.chars().collect();
    let term_chars: Vec<char> = term.chars().collect();

    if term_chars.is_empty() {
        return true;
    }

    if text_chars.len() < term_chars.len() {
        return false;
    }

    for start_idx in 0..=(text_chars.len() - term_chars.len()) {
        let matches = term_chars.iter().enumerate().all(|(i, tc)| {
            text_chars
                .get(start_idx + i)
                .is_some_and(|c| c.eq_ignore_ascii_case(tc))
        });
        if matches {
            return true;
        }
    }
    false
}

/// A conversation matches when every term appears in its title or in at
/// least one message body. Different terms may match different messages.
pub fn conversation_matches(conversation: &Conversation, terms: &[String]) -> bool {
    terms.iter().all(|term| {
        text_contains_term(&conversation.title, term)
            || conversation
                .messages
                .iter()
                .any(|m| text_contains_term(&m.content, term))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, MessageRole};

    fn conversation_with(title: &str, bodies: &[&str]) -> Conversation {
        let mut conv = Conversation::provisional();
        conv.title = title.to_string();
        for body in bodies {
            conv.push_message(ChatMessage::new(MessageRole::User, *body));
        }
        conv
    }

    #[test]
    fn test_parse_search_terms() {
        assert_eq!(parse_search_terms("rust"), vec!["rust"]);
        assert_eq!(parse_search_terms("rust+borrow"), vec!["rust", "borrow"]);
        assert_eq!(parse_search_terms(" rust + borrow "), vec!["rust", "borrow"]);
        assert_eq!(parse_search_terms("rust++borrow"), vec!["rust", "borrow"]);
        assert!(parse_search_terms("").is_empty());
        assert_eq!(parse_search_terms("RUST"), vec!["rust"]);
    }

    #[test]
    fn test_text_contains_term() {
        assert!(text_contains_term("Hello World", "hello"));
        assert!(text_contains_term("Hello World", "WORLD"));
        assert!(text_contains_term("Hello World", "lo Wo"));
        assert!(!text_contains_term("Hello World", "xyz"));
        assert!(text_contains_term("Hello World", ""));
        assert!(!text_contains_term("Hi", "Hello"));
    }

    #[test]
    fn test_matches_title_or_message_body() {
        let conv = conversation_with("Trip planning", &["flights to Lisbon", "hotel options"]);
        assert!(conversation_matches(&conv, &parse_search_terms("trip")));
        assert!(conversation_matches(&conv, &parse_search_terms("lisbon")));
        assert!(!conversation_matches(&conv, &parse_search_terms("trains")));
    }

    #[test]
    fn test_terms_may_match_different_messages() {
        let conv = conversation_with("Trip planning", &["flights to Lisbon", "hotel options"]);
        assert!(conversation_matches(&conv, &parse_search_terms("lisbon+hotel")));
        assert!(!conversation_matches(&conv, &parse_search_terms("lisbon+trains")));
    }

    #[test]
    fn test_empty_terms_match_everything() {
        let conv = conversation_with("Anything", &[]);
        assert!(conversation_matches(&conv, &[]));
    }
}
