//! URL canonicalization and publisher domain extraction.
//!
//! Canonical URLs are the Phase 1 dedup key and the input to the item id, so
//! two links to the same article must normalize to the same string:
//!
//! - scheme and host lower-cased (the `url` crate does this on parse)
//! - fragment removed
//! - tracking parameters removed, case-insensitively
//! - remaining parameters sorted by key, first value per key

use anyhow::{Context, Result};
use url::Url;

/// Query parameters that only identify a campaign or referrer.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "msclkid",
    "_ga",
    "mc_cid",
    "mc_eid",
    "ref",
    "source",
    "campaign_id",
    "ad_id",
];

/// Canonical form of `raw`. Fails when `raw` is not an absolute URL.
pub fn normalize_url(raw: &str) -> Result<String> {
    let mut parsed =
        Url::parse(raw.trim()).with_context(|| format!("Invalid URL: {}", raw.trim()))?;
    parsed.set_fragment(None);

    if parsed.query().is_some() {
        let mut clean_pairs: Vec<(String, String)> = Vec::new();
        for (key, value) in parsed.query_pairs() {
            if TRACKING_PARAMS.contains(&key.to_lowercase().as_str()) {
                continue;
            }
            if clean_pairs.iter().any(|(k, _)| k.as_str() == key.as_ref()) {
                continue;
            }
            clean_pairs.push((key.into_owned(), value.into_owned()));
        }
        clean_pairs.sort_by(|a, b| a.0.cmp(&b.0));

        if clean_pairs.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(clean_pairs);
        }
    }

    Ok(parsed.to_string())
}

/// Public suffixes with more than one label. Hosts under any other suffix
/// keep their last two labels.
const MULTI_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "me.uk", "com.au", "net.au", "org.au", "edu.au",
    "com.tw", "org.tw", "net.tw", "gov.tw", "edu.tw", "idv.tw", "com.hk", "org.hk", "com.cn",
    "net.cn", "org.cn", "com.sg", "com.my", "co.jp", "ne.jp", "or.jp", "co.kr", "or.kr",
    "co.nz", "co.in", "co.za", "com.br", "com.mx", "com.ar", "com.tr",
];

/// Maps URLs to their registrable publisher domain (`www.` stripped,
/// lower-cased), e.g. `https://finance.yahoo.com/x` to `yahoo.com` and
/// `https://www.bbc.co.uk/news` to `bbc.co.uk`.
#[derive(Debug, Clone)]
pub struct DomainExtractor {
    suffixes: Vec<String>,
}

impl Default for DomainExtractor {
    fn default() -> Self {
        Self::new(&[] as &[&str])
    }
}

impl DomainExtractor {
    /// Built-in suffix list plus `extra_suffixes`.
    pub fn new<S: AsRef<str>>(extra_suffixes: &[S]) -> Self {
        let mut suffixes: Vec<String> = MULTI_LABEL_SUFFIXES
            .iter()
            .map(|s| s.to_string())
            .chain(
                extra_suffixes
                    .iter()
                    .map(|s| s.as_ref().trim().trim_matches('.').to_lowercase()),
            )
            .filter(|s| !s.is_empty())
            .collect();
        // Longest suffix first so `com.tw` wins over a configured `tw`.
        suffixes.sort_by(|a, b| {
            b.matches('.')
                .count()
                .cmp(&a.matches('.').count())
                .then_with(|| a.cmp(b))
        });
        suffixes.dedup();
        Self { suffixes }
    }

    /// Publisher domain of `url`, or `None` when it has no host.
    pub fn extract(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        match parsed.host()? {
            url::Host::Domain(host) => Some(self.registrable(host)),
            ip => Some(ip.to_string()),
        }
    }

    fn registrable(&self, host: &str) -> String {
        let host = host.trim_end_matches('.').to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(host.as_str());
        let labels: Vec<&str> = host.split('.').collect();

        let suffix_labels = self
            .suffixes
            .iter()
            .find(|suffix| {
                host.len() > suffix.len()
                    && host.ends_with(suffix.as_str())
                    && host.as_bytes()[host.len() - suffix.len() - 1] == b'.'
            })
            .map(|suffix| suffix.matches('.').count() + 1)
            .unwrap_or(1);

        let keep = (suffix_labels + 1).min(labels.len());
        labels[labels.len() - keep..].join(".")
    }
}
