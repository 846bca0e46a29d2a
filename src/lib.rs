// src/lib.rs
// Public library surface for integration tests (and potential reuse).

mod backoff;
pub mod config;
pub mod epub;
pub mod ftp;
pub mod ledger;
pub mod source;
pub mod sync;
pub mod watermark;

// ---- Re-exports for stable public API ----
pub use crate::config::SyncConfig;
pub use crate::sync::types::{
    ArtifactHandle, Category, DeliveryChannel, Item, ItemSource, LedgerStatus, Materializer,
    ProcessedLedger, WatermarkStore,
};
pub use crate::sync::{RunReport, SyncOrchestrator};
