// src/ftp.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use suppaftp::types::FileType;
use suppaftp::FtpStream;

use crate::config::SyncConfig;
use crate::sync::types::{ArtifactHandle, DeliveryChannel};

/// FTP delivery. The control/data protocol client is blocking, so each
/// upload runs on the blocking pool; one connection per artifact keeps the
/// channel stateless across items.
pub struct FtpDelivery {
    host: String,
    port: u16,
    user: String,
    pass: String,
    dir: String,
    max_retries: u8,
}

impl FtpDelivery {
    pub fn new(cfg: &SyncConfig) -> Self {
        Self {
            host: cfg.ftp_host.clone(),
            port: cfg.ftp_port,
            user: cfg.ftp_user.clone(),
            pass: cfg.ftp_pass.clone(),
            dir: cfg.ftp_dir.clone(),
            max_retries: cfg.max_retries,
        }
    }

    async fn upload_once(&self, artifact: &ArtifactHandle) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let user = self.user.clone();
        let pass = self.pass.clone();
        let dir = self.dir.clone();
        let local_path = artifact.local_path.clone();
        let remote_name = artifact.remote_name.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut ftp = FtpStream::connect(&addr)
                .with_context(|| format!("connecting to {addr}"))?;
            ftp.login(&user, &pass).context("ftp login")?;
            if !dir.is_empty() {
                ftp.cwd(&dir)
                    .with_context(|| format!("changing to remote dir {dir}"))?;
            }
            ftp.transfer_type(FileType::Binary)
                .context("switching to binary transfer")?;

            let mut file = std::fs::File::open(&local_path)
                .with_context(|| format!("opening {}", local_path.display()))?;
            ftp.put_file(&remote_name, &mut file)
                .with_context(|| format!("storing {remote_name}"))?;

            // Best effort; the upload already succeeded.
            let _ = ftp.quit();
            Ok(())
        })
        .await
        .context("ftp upload task")?
    }
}

#[async_trait]
impl DeliveryChannel for FtpDelivery {
    async fn deliver(&self, artifact: &ArtifactHandle) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.upload_once(artifact).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if attempt < self.max_retries {
                        crate::backoff::sleep(attempt).await;
                        continue;
                    }
                    return Err(anyhow!("ftp delivery failed after {attempt} attempts: {e:#}"));
                }
            }
        }
    }
}
