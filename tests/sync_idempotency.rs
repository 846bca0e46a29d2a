// tests/sync_idempotency.rs
// The ledger is the authoritative per-item guard: present means never
// re-deliver, unknown fails open toward delivery, and the watermark filter
// is strictly greater-than.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use readwise_epub_sync::{
    ArtifactHandle, Category, DeliveryChannel, Item, ItemSource, LedgerStatus, Materializer,
    ProcessedLedger, SyncConfig, SyncOrchestrator, WatermarkStore,
};

fn item(id: &str, epoch: i64) -> Item {
    Item {
        id: id.to_string(),
        title: Some(format!("Title {id}")),
        author: None,
        url: None,
        content: Some("body".to_string()),
        html_content: None,
        updated_at: Utc.timestamp_opt(epoch, 0).unwrap(),
    }
}

struct StubSource(Vec<Item>);

#[async_trait]
impl ItemSource for StubSource {
    async fn fetch(&self, category: Category, _after: DateTime<Utc>) -> Result<Vec<Item>> {
        if category == Category::Article {
            Ok(self.0.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

/// Ledger with scripted membership answers per id; anything unscripted is
/// absent. Inserts are recorded.
#[derive(Clone, Default)]
struct ScriptedLedger {
    present: HashSet<String>,
    unknown: HashSet<String>,
    contains_calls: Arc<Mutex<Vec<String>>>,
    inserts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ProcessedLedger for ScriptedLedger {
    async fn contains(&self, id: &str) -> LedgerStatus {
        self.contains_calls.lock().unwrap().push(id.to_string());
        if self.unknown.contains(id) {
            LedgerStatus::Unknown
        } else if self.present.contains(id) {
            LedgerStatus::Present
        } else {
            LedgerStatus::Absent
        }
    }
    async fn insert(&self, id: &str) -> Result<()> {
        self.inserts.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

#[derive(Clone)]
struct FakeWatermark {
    value: Option<i64>,
    sets: Arc<Mutex<Vec<i64>>>,
}

#[async_trait]
impl WatermarkStore for FakeWatermark {
    async fn get(&self) -> Result<Option<i64>> {
        Ok(self.value)
    }
    async fn set(&self, epoch_seconds: i64) -> Result<()> {
        self.sets.lock().unwrap().push(epoch_seconds);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct FakeMaterializer {
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Materializer for FakeMaterializer {
    async fn materialize(&self, item: &Item, _category: Category) -> Result<Option<ArtifactHandle>> {
        self.calls.lock().unwrap().push(item.id.clone());
        Ok(Some(ArtifactHandle {
            local_path: PathBuf::from(format!("/tmp/{}.epub", item.id)),
            remote_name: format!("{}.epub", item.id),
        }))
    }
}

#[derive(Clone, Default)]
struct FakeDelivery {
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl DeliveryChannel for FakeDelivery {
    async fn deliver(&self, artifact: &ArtifactHandle) -> Result<()> {
        self.calls.lock().unwrap().push(artifact.remote_name.clone());
        Ok(())
    }
}

fn run_parts(
    items: Vec<Item>,
    ledger: ScriptedLedger,
    watermark: Option<i64>,
) -> (SyncOrchestrator, FakeWatermark, FakeMaterializer, FakeDelivery) {
    let cfg = SyncConfig {
        categories: vec![Category::Article],
        ..SyncConfig::default()
    };
    let wm = FakeWatermark {
        value: watermark,
        sets: Arc::default(),
    };
    let mat = FakeMaterializer::default();
    let del = FakeDelivery::default();
    let orch = SyncOrchestrator::new(
        cfg,
        Box::new(StubSource(items)),
        Box::new(ledger),
        Box::new(wm.clone()),
        Box::new(mat.clone()),
        Box::new(del.clone()),
    );
    (orch, wm, mat, del)
}

#[tokio::test]
async fn already_recorded_items_are_never_redelivered() {
    let ledger = ScriptedLedger {
        present: HashSet::from(["done".to_string()]),
        ..ScriptedLedger::default()
    };
    let inserts = ledger.inserts.clone();
    let (orch, wm, mat, del) = run_parts(vec![item("done", 1_000)], ledger, None);

    let report = orch.run().await.unwrap();

    assert_eq!(report.candidates, 0);
    assert!(mat.calls.lock().unwrap().is_empty());
    assert!(del.calls.lock().unwrap().is_empty());
    assert!(inserts.lock().unwrap().is_empty());
    // Empty batch: watermark untouched.
    assert!(wm.sets.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_membership_fails_open_to_delivery() {
    let ledger = ScriptedLedger {
        unknown: HashSet::from(["maybe".to_string()]),
        ..ScriptedLedger::default()
    };
    let inserts = ledger.inserts.clone();
    let (orch, _wm, mat, del) = run_parts(vec![item("maybe", 1_000)], ledger, None);

    let report = orch.run().await.unwrap();

    assert_eq!(report.delivered, 1);
    assert_eq!(*mat.calls.lock().unwrap(), vec!["maybe"]);
    assert_eq!(*del.calls.lock().unwrap(), vec!["maybe.epub"]);
    assert_eq!(*inserts.lock().unwrap(), vec!["maybe"]);
}

#[tokio::test]
async fn item_at_exactly_the_watermark_is_excluded() {
    let ledger = ScriptedLedger::default();
    let contains_calls = ledger.contains_calls.clone();
    let (orch, wm, mat, _del) = run_parts(
        vec![item("at", 1_000), item("after", 1_001)],
        ledger,
        Some(1_000),
    );

    let report = orch.run().await.unwrap();

    assert_eq!(report.candidates, 1);
    assert_eq!(*mat.calls.lock().unwrap(), vec!["after"]);
    // The watermark filter runs before the ledger check, so the excluded
    // item never costs a membership call.
    assert_eq!(*contains_calls.lock().unwrap(), vec!["after"]);
    assert_eq!(*wm.sets.lock().unwrap(), vec![1_001]);
}
