//! Best-effort CFP link enrichment against the WikiCFP directory.
//!
//! Strictly cosmetic: the digest shows `<url|name>` when a lookup succeeds
//! and the plain item name otherwise. Every failure mode (HTTP, parse,
//! ambiguous search results) is absorbed here and never reaches the user.
//! Successful lookups are cached for the life of the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::debug;

/// Process-lifetime get/put cache. Injected rather than global so tests can
/// seed it with controlled contents.
#[derive(Debug, Default)]
pub struct LinkCache {
    entries: Mutex<HashMap<String, String>>,
}

impl LinkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn put(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }
}

/// Resolve a conference name to a public submission link, if one is known.
/// Implementations must be silent about failures: `None` means "no link",
/// whatever the reason.
#[async_trait]
pub trait SubmissionLinkSource: Send + Sync {
    async fn lookup(&self, conference: &str) -> Option<String>;
}

/// Enrichment turned off: every lookup misses.
#[derive(Default)]
pub struct NoopLinkSource;

#[async_trait]
impl SubmissionLinkSource for NoopLinkSource {
    async fn lookup(&self, _conference: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Error)]
enum LookupError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no directory entry matched")]
    NotFound,
    #[error("{0} directory entries matched; query not specific enough")]
    Ambiguous(usize),
}

pub struct WikiCfpDirectory {
    http: reqwest::Client,
    base_url: String,
    /// Follow the directory entry through to the conference's own CFP page.
    resolve_true_link: bool,
    event_cache: Arc<LinkCache>,
    link_cache: Arc<LinkCache>,
}

impl WikiCfpDirectory {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64, resolve_true_link: bool) -> Self {
        Self::with_caches(
            base_url,
            timeout_secs,
            resolve_true_link,
            Arc::new(LinkCache::new()),
            Arc::new(LinkCache::new()),
        )
    }

    /// `event_cache` is keyed by conference name and holds directory entry
    /// URLs; `link_cache` is keyed by entry URL and holds the conference's
    /// own CFP link.
    pub fn with_caches(
        base_url: impl Into<String>,
        timeout_secs: u64,
        resolve_true_link: bool,
        event_cache: Arc<LinkCache>,
        link_cache: Arc<LinkCache>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .unwrap_or_default();

        Self { http, base_url: base_url.into(), resolve_true_link, event_cache, link_cache }
    }

    async fn event_page_url(&self, conference: &str) -> Result<String, LookupError> {
        if let Some(cached) = self.event_cache.get(conference) {
            return Ok(cached);
        }

        let query = conference.replace(' ', "+");
        let url = format!("{}/cfp/servlet/tool.search?q={query}&year=a", self.base_url);
        let body = self.http.get(&url).send().await?.error_for_status()?.text().await?;

        let matches = extract_event_links(&body, conference, &self.base_url);
        match matches.len() {
            0 => Err(LookupError::NotFound),
            1 => {
                let event_url = matches.into_iter().next().unwrap_or_default();
                self.event_cache.put(conference, &event_url);
                Ok(event_url)
            }
            // Several plausible entries means the stored name was not
            // specific enough; guessing would linkify the wrong CFP.
            n => Err(LookupError::Ambiguous(n)),
        }
    }

    async fn true_cfp_url(&self, event_url: &str) -> Result<String, LookupError> {
        if let Some(cached) = self.link_cache.get(event_url) {
            return Ok(cached);
        }

        let body = self.http.get(event_url).send().await?.error_for_status()?.text().await?;
        let link = extract_external_link(&body).ok_or(LookupError::NotFound)?;
        self.link_cache.put(event_url, &link);
        Ok(link)
    }
}

#[async_trait]
impl SubmissionLinkSource for WikiCfpDirectory {
    async fn lookup(&self, conference: &str) -> Option<String> {
        let event_url = match self.event_page_url(conference).await {
            Ok(url) => url,
            Err(error) => {
                debug!(conference, error = %error, "cfp directory lookup failed");
                return None;
            }
        };

        if self.resolve_true_link {
            // Entry page unreachable or linkless: the entry itself is still
            // a useful link.
            if let Ok(link) = self.true_cfp_url(&event_url).await {
                return Some(link);
            }
        }

        Some(event_url)
    }
}

fn event_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        RegexBuilder::new(r#"<a\s+href="(/cfp/servlet/event\.showcfp\?[^"]*)"[^>]*>([^<]+)</a>"#)
            .case_insensitive(true)
            .build()
            .expect("event link pattern compiles")
    })
}

fn external_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        RegexBuilder::new(r#"Link:.*?<a\s+href="(https?://[^"]+)""#)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .expect("external link pattern compiles")
    })
}

/// Directory search results whose anchor text mentions the conference.
fn extract_event_links(html: &str, conference: &str, base_url: &str) -> Vec<String> {
    let needle = conference.to_lowercase();

    event_link_pattern()
        .captures_iter(html)
        .filter(|captures| captures[2].to_lowercase().contains(&needle))
        .map(|captures| format!("{base_url}{}", &captures[1]))
        .collect()
}

/// The "Link:" row on an entry page, pointing at the conference's own site.
fn extract_external_link(html: &str) -> Option<String> {
    external_link_pattern().captures(html).map(|captures| captures[1].to_string())
}
