//! Readwise Reader → EPUB sync — binary entrypoint.
//! Builds the collaborators from environment configuration, runs one sync
//! pass, and reports the outcome through the exit status.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use readwise_epub_sync::config::SyncConfig;
use readwise_epub_sync::epub::EpubMaterializer;
use readwise_epub_sync::ftp::FtpDelivery;
use readwise_epub_sync::ledger::SheetLedger;
use readwise_epub_sync::source::ReadwiseSource;
use readwise_epub_sync::sync::SyncOrchestrator;
use readwise_epub_sync::watermark::KeyValueWatermark;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("readwise_epub_sync=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env in local/dev; no-op when the scheduler provides the env.
    let _ = dotenvy::dotenv();
    init_tracing();

    // One caught failure at the run boundary: log it and exit non-zero, do
    // not propagate a crash.
    if let Err(e) = run().await {
        tracing::error!(error = ?e, "sync run failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cfg = SyncConfig::from_env()?;

    let orchestrator = SyncOrchestrator::new(
        cfg.clone(),
        Box::new(ReadwiseSource::new(&cfg)),
        Box::new(SheetLedger::new(&cfg)),
        Box::new(KeyValueWatermark::new(&cfg)),
        Box::new(EpubMaterializer::new(&cfg)),
        Box::new(FtpDelivery::new(&cfg)),
    );

    orchestrator.run().await?;
    Ok(())
}
