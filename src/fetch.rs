//! Page fetchers for the `fetch_page` tool.
//!
//! - [`CorpusFetcher`] serves full documents from the loaded corpus.
//! - [`HttpFetcher`] retrieves raw page text from a URL template such as
//!   `https://en.wikipedia.org/w/index.php?title={id}&action=raw`.
//!
//! Both distinguish a missing source ([`FetchError::NotFound`]) from a
//! failure worth retrying ([`FetchError::Transient`]).

use async_trait::async_trait;
use ragbench_core::models::Document;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::traits::{FetchError, Fetcher};

/// In-memory fetcher over the corpus documents, keyed by id.
pub struct CorpusFetcher {
    pages: HashMap<String, String>,
}

impl CorpusFetcher {
    pub fn new(docs: &[Document]) -> Self {
        Self {
            pages: docs
                .iter()
                .map(|d| (d.id.clone(), d.text.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl Fetcher for CorpusFetcher {
    async fn fetch(&self, source_id: &str) -> Result<String, FetchError> {
        self.pages
            .get(source_id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(source_id.to_string()))
    }
}

/// HTTP fetcher substituting the source id into `{id}` of a URL template.
pub struct HttpFetcher {
    client: reqwest::Client,
    url_template: String,
}

impl HttpFetcher {
    pub fn new(url_template: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url_template: url_template.to_string(),
        })
    }

    pub fn url_for(&self, source_id: &str) -> String {
        self.url_template.replace("{id}", &encode_id(source_id))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source_id: &str) -> Result<String, FetchError> {
        let url = self.url_for(source_id);
        debug!(url = %url, "fetching page");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("{}: {}", url, e)))?;

        let status = response.status();
        if status.as_u16() == 404 || status.as_u16() == 410 {
            return Err(FetchError::NotFound(source_id.to_string()));
        }
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(FetchError::Transient(format!("{} returned {}", url, status)));
        }
        if !status.is_success() {
            return Err(FetchError::NotFound(format!(
                "{} ({} returned {})",
                source_id, url, status
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::Transient(format!("{}: {}", url, e)))?;
        if text.trim().is_empty() {
            return Err(FetchError::NotFound(source_id.to_string()));
        }
        Ok(text)
    }
}

/// Percent-encode a source id for use in a URL, keeping `/` and unreserved
/// characters. Spaces become `_`, the convention of wiki-style titles.
fn encode_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        match b {
            b' ' => out.push('_'),
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_corpus_fetcher() {
        let docs = vec![Document::new("guides/a.md", "alpha")];
        let f = CorpusFetcher::new(&docs);
        assert_eq!(f.fetch("guides/a.md").await.unwrap(), "alpha");
        assert_eq!(
            f.fetch("missing.md").await,
            Err(FetchError::NotFound("missing.md".to_string()))
        );
    }

    #[test]
    fn test_url_template_substitution() {
        let f = HttpFetcher::new(
            "https://en.wikipedia.org/w/index.php?title={id}&action=raw",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            f.url_for("Grace Hopper"),
            "https://en.wikipedia.org/w/index.php?title=Grace_Hopper&action=raw"
        );
        assert_eq!(f.url_for("C++"), "https://en.wikipedia.org/w/index.php?title=C%2B%2B&action=raw");
    }

    #[test]
    fn test_encode_id_multibyte() {
        assert_eq!(encode_id("Zürich"), "Z%C3%BCrich");
        assert_eq!(encode_id("docs/intro.md"), "docs/intro.md");
    }
}
