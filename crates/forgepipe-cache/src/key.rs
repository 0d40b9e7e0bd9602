//! Cache key construction: a `blake3` hash over the provider, model, the
//! canonicalized message list, and a temperature bucket.

use serde::Serialize;
use std::fmt;

/// A message as seen by the cache -- deliberately minimal so this crate does
/// not need to depend on `forgepipe-providers`' richer message type.
#[derive(Debug, Clone, Serialize)]
pub struct CacheableMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bucket a temperature value so that near-identical temperatures (e.g. a
/// float rounding artifact) still land in the same cache bucket. One decimal
/// place is ample precision for LLM sampling temperature.
#[must_use]
pub fn temperature_bucket(temperature: f64) -> i64 {
    (temperature * 10.0).round() as i64
}

/// Build a cache key from the request shape. Canonical JSON serialization
/// (sorted map keys via `serde_json`'s default `BTreeMap`-style object when
/// values are plain structs) keeps the hash stable across equivalent
/// representations produced by different call sites.
#[must_use]
pub fn cache_key(
    provider: &str,
    model: &str,
    messages: &[CacheableMessage],
    temperature: f64,
) -> CacheKey {
    #[derive(Serialize)]
    struct KeyInput<'a> {
        provider: &'a str,
        model: &'a str,
        messages: &'a [CacheableMessage],
        temperature_bucket: i64,
    }

    let input = KeyInput {
        provider,
        model,
        messages,
        temperature_bucket: temperature_bucket(temperature),
    };
    // `serde_json::to_vec` on a struct with named fields (rather than a
    // generic `Value`) serializes fields in declaration order deterministically,
    // which is sufficient here since the shape is fixed at compile time.
    let bytes = serde_json::to_vec(&input).expect("cache key input is always serializable");
    CacheKey(blake3::hash(&bytes).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: &str, content: &str) -> CacheableMessage {
        CacheableMessage {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn identical_requests_produce_identical_keys() {
        let messages = vec![msg("user", "hello")];
        let a = cache_key("acme-llm", "v1", &messages, 0.2);
        let b = cache_key("acme-llm", "v1", &messages, 0.2);
        assert_eq!(a, b);
    }

    #[test]
    fn different_messages_produce_different_keys() {
        let a = cache_key("acme-llm", "v1", &[msg("user", "hello")], 0.2);
        let b = cache_key("acme-llm", "v1", &[msg("user", "goodbye")], 0.2);
        assert_ne!(a, b);
    }

    #[test]
    fn nearby_temperatures_share_a_bucket() {
        assert_eq!(temperature_bucket(0.20), temperature_bucket(0.204));
        assert_ne!(temperature_bucket(0.2), temperature_bucket(0.3));
    }
}
