// src/ledger.rs
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::SyncConfig;
use crate::sync::types::{LedgerStatus, ProcessedLedger};

/// Sheet-backed processed-set ledger. Membership is checked with
/// `GET ?sheet=<name>&value=<id>` and recorded with `POST ?sheet=<name>`
/// carrying `{"value": "<id>"}`.
pub struct SheetLedger {
    endpoint: String,
    sheet: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

#[derive(Deserialize)]
struct MembershipResponse {
    #[serde(rename = "isPresent", default)]
    is_present: bool,
}

#[derive(Serialize)]
struct InsertPayload<'a> {
    value: &'a str,
}

impl SheetLedger {
    pub fn new(cfg: &SyncConfig) -> Self {
        Self {
            endpoint: cfg.ledger_endpoint.clone(),
            sheet: cfg.ledger_sheet.clone(),
            client: Client::new(),
            timeout: cfg.http_timeout,
            max_retries: cfg.max_retries,
        }
    }

    async fn query_membership(&self, id: &str) -> Result<bool> {
        let rsp = self
            .client
            .get(&self.endpoint)
            .timeout(self.timeout)
            .query(&[("sheet", self.sheet.as_str()), ("value", id)])
            .send()
            .await?
            .error_for_status()?;
        let body: MembershipResponse = rsp.json().await?;
        Ok(body.is_present)
    }
}

#[async_trait]
impl ProcessedLedger for SheetLedger {
    /// Never errors: a failed check degrades to `Unknown`, which the caller
    /// treats as not-processed. Dropping an item silently is the one thing
    /// this store must not do.
    async fn contains(&self, id: &str) -> LedgerStatus {
        match self.query_membership(id).await {
            Ok(true) => LedgerStatus::Present,
            Ok(false) => LedgerStatus::Absent,
            Err(e) => {
                warn!(id = %id, error = ?e, "ledger membership check failed");
                LedgerStatus::Unknown
            }
        }
    }

    async fn insert(&self, id: &str) -> Result<()> {
        let payload = InsertPayload { value: id };
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.endpoint)
                .timeout(self.timeout)
                .query(&[("sheet", self.sheet.as_str())])
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            crate::backoff::sleep(attempt).await;
                            continue;
                        }
                        return Err(anyhow!("ledger insert HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        crate::backoff::sleep(attempt).await;
                        continue;
                    }
                    return Err(anyhow!("ledger insert request failed: {e}"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_response_tolerates_missing_flag() {
        let yes: MembershipResponse = serde_json::from_str(r#"{"isPresent": true}"#).unwrap();
        assert!(yes.is_present);
        let no: MembershipResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(!no.is_present);
    }
}
