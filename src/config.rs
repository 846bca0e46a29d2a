// src/config.rs
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::sync::types::Category;

/// Immutable process configuration, built once from the environment in
/// `main` and passed into the orchestrator and collaborators at
/// construction. Nothing here is read again after startup.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    // Remote item source (Readwise Reader v3)
    pub readwise_token: String,
    pub readwise_base_url: String,
    pub page_size: u32,

    // Candidate window
    pub categories: Vec<Category>,
    pub look_back_days: i64,

    // Processed-set ledger (sheet-backed HTTP endpoint)
    pub ledger_endpoint: String,
    pub ledger_sheet: String,

    // Watermark store (remote key-value API)
    pub kv_base_url: String,
    pub kv_app_key: String,
    pub watermark_key: String,

    // Delivery target
    pub ftp_host: String,
    pub ftp_port: u16,
    pub ftp_user: String,
    pub ftp_pass: String,
    pub ftp_dir: String,

    // Materialization
    pub work_dir: PathBuf,
    pub kepubify_bin: Option<String>,

    // Transport policy
    pub http_timeout: Duration,
    pub max_retries: u8,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            readwise_token: String::new(),
            readwise_base_url: "https://readwise.io/api/v3/list/".to_string(),
            page_size: 100,
            categories: Category::ALL.to_vec(),
            look_back_days: 7,
            ledger_endpoint: String::new(),
            ledger_sheet: "_Processed_Articles".to_string(),
            kv_base_url: "https://keyvalue.immanuel.co/api/KeyVal".to_string(),
            kv_app_key: String::new(),
            watermark_key: "lastUpdatedAt".to_string(),
            ftp_host: String::new(),
            ftp_port: 21,
            ftp_user: String::new(),
            ftp_pass: String::new(),
            ftp_dir: String::new(),
            work_dir: std::env::temp_dir(),
            kepubify_bin: None,
            http_timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }
}

impl SyncConfig {
    /// Build from environment variables. Secrets and endpoints are required;
    /// everything else has a documented default (see README).
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let categories = match std::env::var("SYNC_CATEGORIES") {
            Ok(raw) => parse_categories(&raw)?,
            Err(_) => defaults.categories,
        };

        Ok(Self {
            readwise_token: required("READWISE_TOKEN")?,
            readwise_base_url: optional("READWISE_BASE_URL", defaults.readwise_base_url),
            page_size: parsed("PAGE_SIZE", defaults.page_size)?,
            categories,
            look_back_days: parsed("LOOK_BACK_DAYS", defaults.look_back_days)?,
            ledger_endpoint: required("LEDGER_ENDPOINT")?,
            ledger_sheet: optional("LEDGER_SHEET", defaults.ledger_sheet),
            kv_base_url: optional("KV_BASE_URL", defaults.kv_base_url),
            kv_app_key: required("KV_APP_KEY")?,
            watermark_key: optional("WATERMARK_KEY", defaults.watermark_key),
            ftp_host: required("FTP_HOST")?,
            ftp_port: parsed("FTP_PORT", defaults.ftp_port)?,
            ftp_user: required("FTP_USER")?,
            ftp_pass: required("FTP_PASS")?,
            ftp_dir: optional("FTP_DIR", defaults.ftp_dir),
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            kepubify_bin: std::env::var("KEPUBIFY_BIN").ok().filter(|s| !s.is_empty()),
            http_timeout: Duration::from_secs(parsed("HTTP_TIMEOUT_SECS", 10u64)?),
            max_retries: parsed("MAX_RETRIES", defaults.max_retries)?,
        })
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var {key}"))
}

fn optional(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|s| !s.is_empty()).unwrap_or(default)
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing env var {key}={raw}")),
        Err(_) => Ok(default),
    }
}

/// Parse a comma-separated category list, rejecting unknown names rather
/// than silently dropping them.
fn parse_categories(raw: &str) -> Result<Vec<Category>> {
    let mut out = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let cat =
            Category::parse(part).ok_or_else(|| anyhow!("unknown category in SYNC_CATEGORIES: {part}"))?;
        if !out.contains(&cat) {
            out.push(cat);
        }
    }
    if out.is_empty() {
        return Err(anyhow!("SYNC_CATEGORIES is set but names no category"));
    }
    Ok(out)
}
