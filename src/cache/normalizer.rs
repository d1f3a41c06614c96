//! Converts an upstream chat-completion request into a [`CanonicalRequest`].

use std::collections::BTreeMap;

use serde_json::json;

use crate::types::{CanonicalRequest, UpstreamRequest};

/// Stateless; kept as a unit struct so call sites read `Normalizer::normalize(..)`
/// the same way `CacheKeys`'s static methods read in the gateway this cache
/// was extracted from.
pub struct Normalizer;

impl Normalizer {
    /// Only settings the caller explicitly provided are carried into the
    /// canonical form's `settings` map; an absent setting is omitted, not
    /// defaulted to `null`, so two requests that differ only in whether a
    /// field was present at all still produce different fingerprints.
    pub fn normalize(req: &UpstreamRequest) -> CanonicalRequest {
        let mut settings = BTreeMap::new();
        if let Some(t) = req.temperature {
            settings.insert("temperature".to_string(), json!(t));
        }
        if let Some(mt) = req.max_tokens {
            settings.insert("max_tokens".to_string(), json!(mt));
        }
        if let Some(tp) = req.top_p {
            settings.insert("top_p".to_string(), json!(tp));
        }
        if let Some(fp) = req.frequency_penalty {
            settings.insert("frequency_penalty".to_string(), json!(fp));
        }
        if let Some(pp) = req.presence_penalty {
            settings.insert("presence_penalty".to_string(), json!(pp));
        }

        CanonicalRequest {
            model: req.model.clone(),
            messages: req.messages.clone(),
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, MessageContent, Role};

    fn base_request() -> UpstreamRequest {
        UpstreamRequest {
            model: "gpt-4o".to_string(),
            messages: vec![Message {
                role: Role::User,
                content: MessageContent::Text("Hello, world!".to_string()),
            }],
            temperature: None,
            max_tokens: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
        }
    }

    #[test]
    fn omits_absent_settings() {
        let canonical = Normalizer::normalize(&base_request());
        assert!(canonical.settings.is_empty());
    }

    #[test]
    fn includes_only_present_settings() {
        let mut req = base_request();
        req.temperature = Some(0.7);
        let canonical = Normalizer::normalize(&req);
        assert_eq!(canonical.settings.len(), 1);
        assert_eq!(canonical.settings["temperature"], json!(0.7));
    }

    #[test]
    fn preserves_message_order_and_roles() {
        let mut req = base_request();
        req.messages.push(Message {
            role: Role::Assistant,
            content: MessageContent::Text("Hi!".to_string()),
        });
        let canonical = Normalizer::normalize(&req);
        assert_eq!(canonical.messages.len(), 2);
        assert_eq!(canonical.messages[0].role, Role::User);
        assert_eq!(canonical.messages[1].role, Role::Assistant);
    }

    #[test]
    fn preserves_multipart_content_without_flattening() {
        use crate::types::ContentPart;
        let mut req = base_request();
        req.messages[0].content = MessageContent::Parts(vec![
            ContentPart::Text { text: "part one".to_string() },
            ContentPart::Text { text: "part two".to_string() },
        ]);
        let canonical = Normalizer::normalize(&req);
        match &canonical.messages[0].content {
            MessageContent::Parts(parts) => assert_eq!(parts.len(), 2),
            MessageContent::Text(_) => panic!("expected parts to survive normalisation"),
        }
    }

    #[test]
    fn identical_inputs_normalize_identically() {
        let a = Normalizer::normalize(&base_request());
        let b = Normalizer::normalize(&base_request());
        assert_eq!(a.to_stable_bytes().unwrap(), b.to_stable_bytes().unwrap());
    }
}
