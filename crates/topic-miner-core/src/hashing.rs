//! Stable identifiers: content hash, URL hash, topic signature, config hash.
//!
//! Every function here is pure. Downstream consumers join items to topics and
//! runs to configurations on these strings, so the normalization, truncation
//! and JSON layout rules below must not change without a migration.
//!
//! JSON digests use sorted object keys and the `", "` / `": "` separators, with
//! non-ASCII characters written verbatim.

use std::io;

use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

/// Keywords that participate in a topic signature.
pub const SIGNATURE_KEYWORDS: usize = 10;
/// Publisher domains that participate in a topic signature.
pub const SIGNATURE_DOMAINS: usize = 5;

/// Configuration fields that feed [`config_hash`]. Anything else (output
/// paths, storage, watchlists) may change without changing the hash.
pub const CONFIG_HASH_KEYS: [&str; 4] = ["lookback_days", "clustering", "feeds", "dedupe_strategy"];

/// SHA-256 over lower-cased, whitespace-collapsed `title + " " + summary`.
///
/// The ASCII separators U+001C..=U+001F also count as whitespace.
pub fn content_hash(title: &str, summary: &str) -> String {
    let joined = format!("{} {}", title.to_lowercase(), summary.to_lowercase());
    let normalized = joined
        .split(is_separator)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    sha256_hex(normalized.as_bytes())
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || ('\x1c'..='\x1f').contains(&c)
}

/// First 16 hex characters of the SHA-256 of a canonical URL.
pub fn url_hash(canonical_url: &str) -> String {
    let mut hash = sha256_hex(canonical_url.as_bytes());
    hash.truncate(16);
    hash
}

/// Stable topic signature from ranked keywords and ranked publisher domains.
///
/// Only the first [`SIGNATURE_KEYWORDS`] keywords and [`SIGNATURE_DOMAINS`]
/// domains are used. Inputs are truncated, never reordered: callers must pass
/// lists that are already ranked.
pub fn topic_signature<K, D>(keywords: &[K], domains: &[D]) -> String
where
    K: AsRef<str>,
    D: AsRef<str>,
{
    let kw: Vec<&str> = keywords
        .iter()
        .take(SIGNATURE_KEYWORDS)
        .map(AsRef::as_ref)
        .collect();
    let publishers: Vec<&str> = domains
        .iter()
        .take(SIGNATURE_DOMAINS)
        .map(AsRef::as_ref)
        .collect();

    digest_json(&json!({ "kw": kw, "pub": publishers }))
}

/// 16-hex-character digest over the stable subset of a serialized config.
///
/// `config` is the whole configuration as a JSON object; only the keys in
/// [`CONFIG_HASH_KEYS`] that are present contribute.
pub fn config_hash(config: &Value) -> String {
    let mut stable = Map::new();
    if let Value::Object(fields) = config {
        for key in CONFIG_HASH_KEYS {
            if let Some(value) = fields.get(key) {
                stable.insert(key.to_string(), value.clone());
            }
        }
    }

    let mut hash = digest_json(&Value::Object(stable));
    hash.truncate(16);
    hash
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn digest_json(value: &Value) -> String {
    let mut hasher = Sha256::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut hasher, SpacedFormatter);
    sort_keys(value)
        .serialize(&mut ser)
        .expect("a JSON value with string keys always serializes into a hasher");
    hex::encode(hasher.finalize())
}

/// Rebuild objects with keys inserted in sorted order, so the layout does not
/// depend on whether `serde_json` preserves insertion order.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&fields[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(values) => Value::Array(values.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Compact JSON with a space after `,` and `:`.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_lower_hex(s: &str) -> bool {
        s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
    }

    #[test]
    fn test_content_hash_normalizes_case_and_whitespace() {
        let a = content_hash("Market  Update", " Stocks\trise\n");
        let b = content_hash("market update", "stocks rise");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_content_hash_treats_ascii_separators_as_whitespace() {
        let plain = content_hash("chip export", "curbs");
        assert_eq!(content_hash("chip\x1cexport", "curbs"), plain);
        assert_eq!(content_hash("chip\x1d\x1e export\x1f", "curbs"), plain);
        assert_eq!(content_hash("chip\u{3000}export", "\u{a0}curbs"), plain);
        assert_ne!(content_hash("chip\x1bexport", "curbs"), plain);
    }

    #[test]
    fn test_content_hash_known_digest() {
        // sha256("hello world")
        assert_eq!(
            content_hash("Hello", "World"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_content_hash_field_order_matters() {
        assert_ne!(content_hash("a", "b"), content_hash("b", "a"));
    }

    #[test]
    fn test_url_hash_is_16_hex() {
        let h = url_hash("https://example.com/article1");
        assert_eq!(h.len(), 16);
        assert!(is_lower_hex(&h));
        assert_ne!(h, url_hash("https://example.com/article2"));
    }

    #[test]
    fn test_signature_stability() {
        let keywords = ["market", "stocks", "rally", "trading", "investors"];
        let domains = ["reuters.com", "bloomberg.com", "ft.com"];
        assert_eq!(
            topic_signature(&keywords, &domains),
            topic_signature(&keywords, &domains)
        );
    }

    #[test]
    fn test_signature_different_inputs() {
        let sig1 = topic_signature(&["market", "stocks"], &["reuters.com"]);
        let sig2 = topic_signature(&["economy", "growth"], &["bloomberg.com"]);
        assert_ne!(sig1, sig2);
    }

    #[test]
    fn test_signature_order_sensitive() {
        let sig1 = topic_signature(&["a", "b"], &["x.com"]);
        let sig2 = topic_signature(&["b", "a"], &["x.com"]);
        assert_ne!(sig1, sig2);
    }

    #[test]
    fn test_signature_truncation() {
        let keywords_long: Vec<String> = (0..20).map(|i| format!("kw{}", i)).collect();
        let domains_long: Vec<String> = (0..10).map(|i| format!("domain{}.com", i)).collect();

        let sig1 = topic_signature(&keywords_long, &domains_long);
        let sig2 = topic_signature(&keywords_long[..10], &domains_long[..5]);
        assert_eq!(sig1, sig2);

        let mut changed = keywords_long.clone();
        changed[9] = "other".to_string();
        assert_ne!(sig1, topic_signature(&changed, &domains_long));
    }

    #[test]
    fn test_signature_format() {
        let sig = topic_signature(&["test"], &["test.com"]);
        assert_eq!(sig.len(), 64);
        assert!(is_lower_hex(&sig));
    }

    #[test]
    fn test_signature_json_layout() {
        let value = json!({ "pub": ["x.com"], "kw": ["a", "台積電"] });
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
        sort_keys(&value).serialize(&mut ser).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            r#"{"kw": ["a", "台積電"], "pub": ["x.com"]}"#
        );
    }

    #[test]
    fn test_signature_empty_inputs() {
        let empty: [&str; 0] = [];
        let sig = topic_signature(&empty, &empty);
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn test_config_hash_ignores_unlisted_fields() {
        let a = json!({
            "lookback_days": 7,
            "dedupe_strategy": "url_then_hash",
            "feeds": [{"name": "wire", "url": "https://wire.test/rss"}],
            "output_dir": "out"
        });
        let b = json!({
            "lookback_days": 7,
            "dedupe_strategy": "url_then_hash",
            "feeds": [{"name": "wire", "url": "https://wire.test/rss"}],
            "output_dir": "/tmp/elsewhere",
            "watchlist_tickers": ["TSM"]
        });
        assert_eq!(config_hash(&a), config_hash(&b));
        assert_eq!(config_hash(&a).len(), 16);
    }

    #[test]
    fn test_config_hash_tracks_listed_fields() {
        let a = json!({ "lookback_days": 7 });
        let b = json!({ "lookback_days": 3 });
        assert_ne!(config_hash(&a), config_hash(&b));
    }
}
