// src/sync/mod.rs
pub mod types;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::sync::types::{
    Category, DeliveryChannel, Item, ItemSource, LedgerStatus, Materializer, ProcessedLedger,
    WatermarkStore,
};

/// Outcome counters for one run, returned for the end-of-run log line and
/// for tests. `watermark` is the value stored at the end of the run (or the
/// untouched prior value on an empty batch).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub fetched: usize,
    pub candidates: usize,
    pub delivered: usize,
    pub skipped_no_content: usize,
    pub failed: usize,
    pub watermark: Option<i64>,
}

enum ItemOutcome {
    Delivered,
    NoContent,
}

/// Drives one full sync pass: watermark read, per-category fetch, candidate
/// selection, per-item materialize/deliver/record, watermark advance.
///
/// Single-threaded and sequential by design; the scheduler guarantees at
/// most one run is active at a time.
pub struct SyncOrchestrator {
    cfg: SyncConfig,
    source: Box<dyn ItemSource>,
    ledger: Box<dyn ProcessedLedger>,
    watermark: Box<dyn WatermarkStore>,
    materializer: Box<dyn Materializer>,
    delivery: Box<dyn DeliveryChannel>,
}

impl SyncOrchestrator {
    pub fn new(
        cfg: SyncConfig,
        source: Box<dyn ItemSource>,
        ledger: Box<dyn ProcessedLedger>,
        watermark: Box<dyn WatermarkStore>,
        materializer: Box<dyn Materializer>,
        delivery: Box<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            cfg,
            source,
            ledger,
            watermark,
            materializer,
            delivery,
        }
    }

    /// One run. Fetch and watermark read/write failures abort it (the
    /// watermark stays put, so the next run re-derives the same window);
    /// per-item failures are logged and do not stop the batch.
    pub async fn run(&self) -> Result<RunReport> {
        let watermark = self.watermark.get().await.context("reading watermark")?;
        info!(watermark = ?watermark, "starting sync run");

        let batch = self.collect_candidates(watermark).await?;
        let fetched = batch.fetched;

        if batch.items.is_empty() {
            info!(fetched, "no new items, watermark untouched");
            return Ok(RunReport {
                fetched,
                watermark,
                ..RunReport::default()
            });
        }

        info!(candidates = batch.items.len(), "processing candidate batch");

        let mut report = RunReport {
            fetched,
            candidates: batch.items.len(),
            ..RunReport::default()
        };

        // The watermark must end up past every *attempted* item, delivered
        // or not, so a permanently failing item is not re-fetched forever.
        let mut latest_epoch = watermark.unwrap_or(0);

        for (item, category) in &batch.items {
            match self.process_item(item, *category).await {
                Ok(ItemOutcome::Delivered) => {
                    report.delivered += 1;
                    info!(id = %item.id, category = %category, "item delivered");
                }
                Ok(ItemOutcome::NoContent) => {
                    report.skipped_no_content += 1;
                    info!(id = %item.id, category = %category, "no content, skipped");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(id = %item.id, category = %category, error = ?e, "item failed");
                }
            }
            latest_epoch = latest_epoch.max(item.updated_epoch());
        }

        self.watermark
            .set(latest_epoch)
            .await
            .context("advancing watermark")?;
        report.watermark = Some(latest_epoch);

        info!(
            delivered = report.delivered,
            skipped = report.skipped_no_content,
            failed = report.failed,
            watermark = latest_epoch,
            "sync run complete"
        );
        Ok(report)
    }

    /// Fetch each configured category over the look-back window, sort it
    /// ascending by `updated_at`, and keep items that are both newer than
    /// the watermark and not recorded in the ledger. Categories are visited
    /// in configuration order and the batch is *not* re-sorted globally.
    async fn collect_candidates(&self, watermark: Option<i64>) -> Result<CandidateBatch> {
        let updated_after = Utc::now() - Duration::days(self.cfg.look_back_days);
        let mut batch = CandidateBatch::default();

        for &category in &self.cfg.categories {
            let mut items = self
                .source
                .fetch(category, updated_after)
                .await
                .with_context(|| format!("fetching {category} items"))?;
            items.sort_by_key(Item::updated_epoch);
            info!(category = %category, count = items.len(), "fetched");
            batch.fetched += items.len();

            for item in items {
                if !passes_watermark(item.updated_epoch(), watermark) {
                    continue;
                }
                match self.ledger.contains(&item.id).await {
                    LedgerStatus::Present => continue,
                    LedgerStatus::Absent => {}
                    LedgerStatus::Unknown => {
                        // Fail open: a duplicate delivery is recoverable, a
                        // silently dropped item is not.
                        warn!(id = %item.id, "ledger check failed, treating as unprocessed");
                    }
                }
                batch.items.push((item, category));
            }
        }
        Ok(batch)
    }

    async fn process_item(&self, item: &Item, category: Category) -> Result<ItemOutcome> {
        let artifact = match self
            .materializer
            .materialize(item, category)
            .await
            .context("materializing item")?
        {
            Some(a) => a,
            None => return Ok(ItemOutcome::NoContent),
        };

        self.delivery
            .deliver(&artifact)
            .await
            .context("delivering artifact")?;

        // Only a confirmed delivery earns a ledger entry; a failed insert
        // leaves the item eligible for re-delivery next run.
        self.ledger
            .insert(&item.id)
            .await
            .context("recording delivery in ledger")?;

        Ok(ItemOutcome::Delivered)
    }
}

#[derive(Default)]
struct CandidateBatch {
    items: Vec<(Item, Category)>,
    fetched: usize,
}

/// Watermark filter: strictly newer than the stored value; no bound at all
/// on the first-ever run.
fn passes_watermark(epoch: i64, watermark: Option<i64>) -> bool {
    watermark.map_or(true, |w| epoch > w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(id: &str, epoch: i64) -> Item {
        Item {
            id: id.to_string(),
            title: Some("T".into()),
            author: None,
            url: None,
            content: Some("body".into()),
            html_content: None,
            updated_at: Utc.timestamp_opt(epoch, 0).unwrap(),
        }
    }

    #[test]
    fn watermark_filter_is_strict() {
        assert!(passes_watermark(11, Some(10)));
        assert!(!passes_watermark(10, Some(10)));
        assert!(!passes_watermark(9, Some(10)));
        assert!(passes_watermark(0, None));
    }

    #[test]
    fn body_prefers_html_content_and_skips_blank() {
        let mut it = item("a", 1);
        it.html_content = Some("<p>hi</p>".into());
        assert_eq!(it.body(), Some("<p>hi</p>"));

        it.html_content = Some("   ".into());
        assert_eq!(it.body(), Some("body"));

        it.content = None;
        assert_eq!(it.body(), None);
    }

    #[test]
    fn category_order_is_stable() {
        let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["pdf", "article", "email", "rss", "twitter"]);
    }
}
