// src/epub.rs
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use epub_builder::{EpubBuilder, EpubContent, ZipLibrary};
use html_escape::{encode_double_quoted_attribute, encode_text};
use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::Html;
use tracing::warn;

use crate::config::SyncConfig;
use crate::sync::types::{ArtifactHandle, Category, Item, Materializer};

/// Turns one item into a single-chapter EPUB in the work dir, optionally
/// rewritten for Kobo by an external converter binary. Deterministic per
/// item: same input, same file name, same content apart from the imported
/// timestamp line.
pub struct EpubMaterializer {
    work_dir: PathBuf,
    kepubify_bin: Option<String>,
}

impl EpubMaterializer {
    pub fn new(cfg: &SyncConfig) -> Self {
        Self {
            work_dir: cfg.work_dir.clone(),
            kepubify_bin: cfg.kepubify_bin.clone(),
        }
    }

    /// Conversion is best-effort: any failure (spawn, exit status, missing
    /// output) falls back to the plain EPUB and is never an item failure.
    async fn convert_to_kepub(&self, bin: &str, epub_path: &Path) -> PathBuf {
        let status = tokio::process::Command::new(bin)
            .arg(epub_path)
            .current_dir(&self.work_dir)
            .status()
            .await;

        match status {
            Ok(s) if s.success() => {
                let converted = converted_path(epub_path);
                if converted.exists() {
                    return converted;
                }
                warn!(path = %epub_path.display(), "converter succeeded but output is missing");
                epub_path.to_path_buf()
            }
            Ok(s) => {
                warn!(status = ?s, "kepub conversion failed, delivering plain epub");
                epub_path.to_path_buf()
            }
            Err(e) => {
                warn!(error = ?e, bin = %bin, "could not run kepub converter");
                epub_path.to_path_buf()
            }
        }
    }
}

#[async_trait]
impl Materializer for EpubMaterializer {
    async fn materialize(
        &self,
        item: &Item,
        category: Category,
    ) -> Result<Option<ArtifactHandle>> {
        let Some(body) = item.body() else {
            return Ok(None);
        };

        let title = item.title.as_deref().unwrap_or("Untitled");
        let author = item.author.as_deref().unwrap_or("Readwise Reader");
        let document = build_document(item, category, body);

        let stem = format!(
            "{} - {} - {}",
            sanitize_component(title),
            sanitize_component(author),
            sanitize_component(&item.id)
        );
        let epub_path = self.work_dir.join(format!("{stem}.epub"));
        write_epub(&epub_path, title, author, &document)
            .with_context(|| format!("writing epub for {}", item.id))?;

        let local_path = match &self.kepubify_bin {
            Some(bin) => self.convert_to_kepub(bin, &epub_path).await,
            None => epub_path,
        };

        let remote_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{stem}.epub"));

        Ok(Some(ArtifactHandle {
            local_path,
            remote_name,
        }))
    }
}

/// Name the converter emits next to its input: `{stem}_converted.kepub.epub`.
fn converted_path(epub_path: &Path) -> PathBuf {
    let stem = epub_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    epub_path.with_file_name(format!("{stem}_converted.kepub.epub"))
}

// epub-builder reports errors as eyre reports, which `?` cannot hand to
// anyhow; convert at each call site.
fn write_epub(path: &Path, title: &str, author: &str, document: &str) -> Result<()> {
    let zip = ZipLibrary::new().map_err(|e| anyhow!("initializing epub zip: {e}"))?;
    let mut builder = EpubBuilder::new(zip).map_err(|e| anyhow!("initializing epub builder: {e}"))?;
    builder
        .metadata("title", title)
        .and_then(|b| b.metadata("author", author))
        .and_then(|b| b.metadata("lang", "en"))
        .map_err(|e| anyhow!("setting epub metadata: {e}"))?;
    builder
        .add_content(EpubContent::new("chapter.xhtml", document.as_bytes()).title(title))
        .map_err(|e| anyhow!("adding epub chapter: {e}"))?;

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    builder
        .generate(&mut file)
        .map_err(|e| anyhow!("generating epub: {e}"))?;
    Ok(())
}

/// Re-serialize the fetched body through an HTML parse so unbalanced tags
/// and stray ampersands cannot leave the chapter unreadable.
fn clean_body(body: &str) -> String {
    Html::parse_fragment(body).root_element().inner_html()
}

/// Chapter document: an escaped metadata header, then the cleaned body.
fn build_document(item: &Item, category: Category, body: &str) -> String {
    let title = encode_text(item.title.as_deref().unwrap_or("Untitled"));
    let url = item.url.as_deref().unwrap_or("");
    let url_attr = encode_double_quoted_attribute(url);
    let url_text = encode_text(url);
    let imported = Utc::now().format("%d/%m/%Y %H:%M:%S");
    let body = clean_body(body);

    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\">\n\
         <head><title>{title}</title></head>\n\
         <body>\n\
         <h1>{title}</h1>\n\
         <p><strong>Category:</strong> {category}</p>\n\
         <p><strong>URL:</strong> <a href=\"{url_attr}\">{url_text}</a></p>\n\
         <p><strong>Imported:</strong> {imported}</p>\n\
         <hr/>\n\
         {body}\n\
         </body>\n\
         </html>\n"
    )
}

/// Collapse anything outside `[A-Za-z0-9 _-]` to a single underscore so
/// title/author fragments are safe in file names on any filesystem.
fn sanitize_component(s: &str) -> String {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9 _-]+").unwrap());
    re.replace_all(s, "_").trim().to_string()
}
