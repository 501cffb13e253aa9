//! # Feature: Local Intent Matching
//!
//! Answers familiar messages from a phrase table before anything is sent to the
//! remote model. The table starts with a handful of canned replies and grows by
//! learning from successful general-mode exchanges.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Exact and partial matching with insertion-order priority

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::completion::is_error_response;

pub const GREETING: &str = "Hi there! I'm your collaboration assistant. I can answer questions about working with creators and brands, draft content for your campaigns, or check how original a piece of writing is. What would you like to do?";

const MIN_INPUT_CHARS: usize = 3;
const MIN_RESPONSE_CHARS: usize = 20;

/// Replies available before anything has been learned, in priority order
const STATIC_PAIRS: &[(&str, &str)] = &[
    ("hello", GREETING),
    ("greetings", GREETING),
    ("thanks", "You're welcome! Let me know if there's anything else I can help you with."),
    ("goodbye", "Goodbye! Good luck with your next collaboration, and come back any time."),
    ("help", "I have three modes. General answers questions about the platform and creator partnerships, Content drafts captions, bios and pitches, and Plagiarism checks originality. Switch modes from the menu, or just ask away."),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingPair {
    pub input_pattern: String,
    pub response: String,
}

impl TrainingPair {
    pub fn new(input_pattern: &str, response: &str) -> Self {
        TrainingPair {
            input_pattern: normalize(input_pattern),
            response: response.to_string(),
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Looks up a reply for `input`.
///
/// Exact pattern equality is tried across the whole table first; only then
/// are partial matches considered. Within a pass the earliest pair wins.
pub fn find_response(pairs: &[TrainingPair], input: &str) -> Option<String> {
    let normalized = normalize(input);
    if normalized.is_empty() {
        return None;
    }

    if let Some(pair) = pairs.iter().find(|p| p.input_pattern == normalized) {
        return Some(pair.response.clone());
    }

    let tokens: Vec<&str> = normalized
        .split_whitespace()
        .filter(|token| token.chars().count() > 2)
        .collect();

    pairs
        .iter()
        .find(|p| {
            let pattern = p.input_pattern.as_str();
            normalized.contains(pattern)
                || pattern.contains(normalized.as_str())
                || tokens.iter().any(|token| pattern.contains(token))
        })
        .map(|p| p.response.clone())
}

/// Whether an exchange is worth remembering as a phrase-table entry.
pub fn is_learnable(input: &str, response: &str) -> bool {
    input.trim().chars().count() > MIN_INPUT_CHARS
        && response.trim().chars().count() > MIN_RESPONSE_CHARS
        && !is_error_response(response)
}

/// Insertion-ordered phrase table shared by every conversation of an assistant.
pub struct TrainingStore {
    pairs: RwLock<Vec<TrainingPair>>,
}

impl TrainingStore {
    /// A store preloaded with the canned replies.
    pub fn new() -> Self {
        Self::with_pairs(
            STATIC_PAIRS
                .iter()
                .map(|(pattern, response)| TrainingPair::new(pattern, response))
                .collect(),
        )
    }

    pub fn with_pairs(pairs: Vec<TrainingPair>) -> Self {
        TrainingStore {
            pairs: RwLock::new(pairs),
        }
    }

    pub async fn find_response(&self, input: &str) -> Option<String> {
        let pairs = self.pairs.read().await;
        find_response(&pairs, input)
    }

    /// Remembers `input -> response` if the exchange qualifies.
    ///
    /// A pattern that already exists (ignoring case) keeps its position and
    /// gets the new response.
    pub async fn learn(&self, input: &str, response: &str) -> bool {
        if !is_learnable(input, response) {
            return false;
        }

        let pair = TrainingPair::new(input, response);
        let mut pairs = self.pairs.write().await;
        match pairs.iter_mut().find(|p| p.input_pattern == pair.input_pattern) {
            Some(existing) => {
                debug!("Updating learned response for '{}'", pair.input_pattern);
                existing.response = pair.response;
            }
            None => {
                debug!("Learned new pattern '{}'", pair.input_pattern);
                pairs.push(pair);
            }
        }
        true
    }

    pub async fn len(&self) -> usize {
        self.pairs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pairs.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<TrainingPair> {
        self.pairs.read().await.clone()
    }
}

impl Default for TrainingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionError;

    fn pairs(entries: &[(&str, &str)]) -> Vec<TrainingPair> {
        entries.iter().map(|(p, r)| TrainingPair::new(p, r)).collect()
    }

    #[test]
    fn test_exact_match_ignores_case_and_whitespace() {
        let table = pairs(&[("hello", "greeting"), ("pricing", "rates")]);
        assert_eq!(find_response(&table, "  HeLLo "), Some("greeting".to_string()));
        assert_eq!(find_response(&table, "pricing"), Some("rates".to_string()));
    }

    #[test]
    fn test_exact_match_beats_earlier_partial() {
        let table = pairs(&[("media kit tips", "partial"), ("media kit", "exact")]);
        assert_eq!(find_response(&table, "media kit"), Some("exact".to_string()));
    }

    #[test]
    fn test_partial_match_by_containment() {
        let table = pairs(&[("brand deal", "deals")]);
        assert_eq!(find_response(&table, "about a brand deal please"), Some("deals".to_string()));
        assert_eq!(find_response(&table, "brand"), Some("deals".to_string()));
    }

    #[test]
    fn test_partial_match_by_token() {
        let table = pairs(&[("how do sponsored posts work", "sponsorship")]);
        assert_eq!(
            find_response(&table, "explain sponsored content"),
            Some("sponsorship".to_string())
        );
    }

    #[test]
    fn test_short_tokens_do_not_match() {
        let table = pairs(&[("how do sponsored posts work", "sponsorship")]);
        // "do" and "it" are too short to count as tokens
        assert_eq!(find_response(&table, "do it"), None);
    }

    #[test]
    fn test_partial_match_prefers_insertion_order() {
        let table = pairs(&[("campaign budget", "first"), ("campaign brief", "second")]);
        assert_eq!(find_response(&table, "campaign ideas"), Some("first".to_string()));
    }

    #[test]
    fn test_no_match() {
        let table = pairs(&[("hello", "greeting")]);
        assert_eq!(find_response(&table, "idea"), None);
        assert_eq!(find_response(&table, "   "), None);
    }

    #[test]
    fn test_is_learnable() {
        let long_reply = "Most creators charge per post based on audience size.";
        assert!(is_learnable("creator rates", long_reply));
        assert!(!is_learnable("hey", long_reply));
        assert!(!is_learnable("creator rates", "Too short."));
        assert!(!is_learnable(
            "creator rates",
            CompletionError::Network("fetch failed".into()).user_message()
        ));
    }

    #[tokio::test]
    async fn test_store_is_seeded_with_greeting() {
        let store = TrainingStore::new();
        assert_eq!(store.len().await, STATIC_PAIRS.len());
        assert_eq!(store.find_response("hello").await.as_deref(), Some(GREETING));
    }

    #[tokio::test]
    async fn test_learn_appends_and_overwrites() {
        let store = TrainingStore::with_pairs(Vec::new());
        assert!(store.is_empty().await);

        assert!(store.learn("Creator Rates", "Rates depend on reach and engagement.").await);
        assert!(store.learn("pricing tiers", "Tiers are usually bronze, silver and gold.").await);
        assert!(store.learn("creator rates", "Rates mostly depend on engagement quality.").await);

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].input_pattern, "creator rates");
        assert_eq!(snapshot[0].response, "Rates mostly depend on engagement quality.");
        assert_eq!(snapshot[1].input_pattern, "pricing tiers");
    }

    #[tokio::test]
    async fn test_learn_rejects_unqualified_exchanges() {
        let store = TrainingStore::with_pairs(Vec::new());
        assert!(!store.learn("ok", "A perfectly long and helpful response.").await);
        assert!(!store.learn("creator rates", "short").await);
        assert!(store.is_empty().await);
    }
}
