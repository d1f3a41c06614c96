//! Request/response shapes that flow through the cache.
//!
//! `UpstreamRequest` models the shape the gateway's chat-completion handler
//! would hand to the cache; `CanonicalRequest` is what the [`Normalizer`]
//! produces from it. Keeping these distinct (rather than caching the
//! upstream type directly) is what lets the fingerprinter hash a stable,
//! minimal representation instead of whatever incidental fields a given
//! provider's payload happens to carry.
//!
//! [`Normalizer`]: crate::cache::normalizer::Normalizer

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single typed part of a multi-part message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: String },
}

/// Message content: either a plain string or an ordered sequence of parts.
///
/// Both forms must survive normalisation without flattening into each
/// other, so round-trip equality holds for whichever shape the caller sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Sum of character lengths across all text content, used by the
    /// pattern detector's query-length tally.
    pub fn char_len(&self) -> usize {
        match self {
            MessageContent::Text(s) => s.chars().count(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => text.chars().count(),
                    ContentPart::ImageUrl { .. } => 0,
                })
                .sum(),
        }
    }

    /// Flattened text, used by the tokenizer. Image parts contribute nothing.
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// A single chat message. Role is preserved verbatim; it is not inferred or
/// collapsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Developer,
}

/// The upstream request as the gateway's handler would see it, before
/// normalisation. Unlike `CanonicalRequest`, absent generation settings are
/// represented directly as `Option::None` rather than omitted from a map;
/// the normalizer is what collapses that into the canonical, "only the keys
/// that were actually set" form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
}

/// Canonical, stably-serialisable form of a request. Two canonical requests
/// are value-equal iff their serialised forms are byte-equal — `BTreeMap`
/// gives us a deterministic field order for free, and `#[serde(skip...)]`
/// isn't needed anywhere because every field that survives normalisation is
/// meant to participate in the hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// Only keys the caller actually set. Values are serialised via
    /// `serde_json::Value` so the map can hold floats, ints, or (in
    /// principle) richer settings without widening this struct.
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl CanonicalRequest {
    /// Stable serialisation used by the fingerprinter. `serde_json` over a
    /// `BTreeMap`-backed struct already produces a deterministic byte
    /// sequence for a given logical value, which is what "stable
    /// serialisation" in the data model requires.
    pub fn to_stable_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Sum of character lengths across all messages' text content.
    pub fn estimated_query_length(&self) -> usize {
        self.messages.iter().map(|m| m.content.char_len()).sum()
    }

    /// First user message's content as text, truncated to `n` chars. Used
    /// only by the fingerprinter's composite fallback.
    pub fn first_user_text(&self, n: usize) -> String {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_text())
            .map(|s| s.chars().take(n).collect())
            .unwrap_or_default()
    }
}

/// The response a provider returned, as cached. The cache treats the body
/// as opaque bytes plus a content type so it never has to understand any
/// particular provider's response schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub id: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub provider: String,
}
