// src/source.rs
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::config::SyncConfig;
use crate::sync::types::{Category, Item, ItemSource};

/// Readwise Reader v3 `list` client. One page per fetch; the look-back
/// window is sized so steady-state traffic fits a single page.
pub struct ReadwiseSource {
    base_url: String,
    token: String,
    page_size: u32,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Vec<Item>,
}

impl ReadwiseSource {
    pub fn new(cfg: &SyncConfig) -> Self {
        Self {
            base_url: cfg.readwise_base_url.clone(),
            token: cfg.readwise_token.clone(),
            page_size: cfg.page_size,
            client: Client::new(),
            timeout: cfg.http_timeout,
            max_retries: cfg.max_retries,
        }
    }
}

#[async_trait]
impl ItemSource for ReadwiseSource {
    async fn fetch(&self, category: Category, updated_after: DateTime<Utc>) -> Result<Vec<Item>> {
        let updated_after = updated_after.to_rfc3339_opts(SecondsFormat::Secs, true);
        let page_size = self.page_size.to_string();
        let query = [
            ("category", category.as_str()),
            ("withHtmlContent", "true"),
            ("updatedAfter", updated_after.as_str()),
            ("page_size", page_size.as_str()),
        ];

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .get(&self.base_url)
                .header("Authorization", format!("Token {}", self.token))
                .timeout(self.timeout)
                .query(&query)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            crate::backoff::sleep(attempt).await;
                            continue;
                        }
                        return Err(anyhow!("source HTTP error for {category}: {e}"));
                    }
                    let body: ListResponse = rsp
                        .json()
                        .await
                        .with_context(|| format!("decoding {category} list response"))?;
                    return Ok(body.results);
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        crate::backoff::sleep(attempt).await;
                        continue;
                    }
                    return Err(anyhow!("source request failed for {category}: {e}"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_response_decodes_reader_payload() {
        // Unknown fields and fractional-second timestamps must not trip the
        // decoder; content fields may be missing entirely.
        let raw = r#"{
            "count": 2,
            "nextPageCursor": null,
            "results": [
                {
                    "id": "01gwfvp9pyaabcdef",
                    "title": "A piece",
                    "author": "Someone",
                    "url": "https://example.test/a",
                    "html_content": "<p>hello</p>",
                    "updated_at": "2024-05-01T10:00:00.123456+00:00",
                    "reading_progress": 0.25
                },
                {
                    "id": "01gwfvp9pyzzzzzzz",
                    "title": null,
                    "author": null,
                    "url": null,
                    "updated_at": "2024-05-02T08:30:00Z"
                }
            ]
        }"#;
        let parsed: ListResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].id, "01gwfvp9pyaabcdef");
        assert_eq!(parsed.results[0].body(), Some("<p>hello</p>"));
        assert!(parsed.results[1].body().is_none());
        assert!(parsed.results[1].updated_epoch() > parsed.results[0].updated_epoch());
    }

    #[test]
    fn empty_results_default() {
        let parsed: ListResponse = serde_json::from_str(r#"{"count": 0}"#).unwrap();
        assert!(parsed.results.is_empty());
    }
}
