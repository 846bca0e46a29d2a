// src/watermark.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::config::SyncConfig;
use crate::sync::types::WatermarkStore;

/// Remote key-value store holding the last-completed-run timestamp
/// (`GetValue`/`UpdateValue` under an app key). Failures propagate: the run
/// must not guess a window.
pub struct KeyValueWatermark {
    base_url: String,
    app_key: String,
    key: String,
    client: Client,
    timeout: Duration,
}

impl KeyValueWatermark {
    pub fn new(cfg: &SyncConfig) -> Self {
        Self {
            base_url: cfg.kv_base_url.trim_end_matches('/').to_string(),
            app_key: cfg.kv_app_key.clone(),
            key: cfg.watermark_key.clone(),
            client: Client::new(),
            timeout: cfg.http_timeout,
        }
    }
}

#[async_trait]
impl WatermarkStore for KeyValueWatermark {
    async fn get(&self) -> Result<Option<i64>> {
        let url = format!("{}/GetValue/{}/{}", self.base_url, self.app_key, self.key);
        let body = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .context("watermark read request")?
            .error_for_status()
            .context("watermark read status")?
            .text()
            .await
            .context("watermark read body")?;

        // The store returns a JSON-ish scalar: `null` when never set,
        // otherwise the epoch, possibly quoted.
        let value = body.trim().trim_matches('"').trim();
        if value.is_empty() || value == "null" {
            return Ok(None);
        }
        let epoch = value
            .parse::<i64>()
            .with_context(|| format!("watermark store returned a non-numeric value: {value:?}"))?;
        Ok(Some(epoch))
    }

    async fn set(&self, epoch_seconds: i64) -> Result<()> {
        let url = format!(
            "{}/UpdateValue/{}/{}/{}",
            self.base_url, self.app_key, self.key, epoch_seconds
        );
        self.client
            .post(&url)
            .timeout(self.timeout)
            .send()
            .await
            .context("watermark write request")?
            .error_for_status()
            .context("watermark write status")?;
        Ok(())
    }
}
