use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, warn};

/// Disk-backed store for uploads that live only as long as one request.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub async fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create upload dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    #[cfg(test)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn put_object(
        &self,
        original_name: &str,
        body: Bytes,
        content_type: &str,
    ) -> anyhow::Result<UploadedImage> {
        let path = self.dir.join(object_name(original_name));
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write upload {}", path.display()))?;
        debug!(path = %path.display(), size = body.len(), "upload stored");
        Ok(UploadedImage {
            path: Some(path),
            mime_type: content_type.to_string(),
            size: body.len(),
        })
    }
}

/// A stored upload. The file is removed by [`UploadedImage::release`], or on drop
/// when the request is abandoned before reaching it.
#[derive(Debug)]
pub struct UploadedImage {
    path: Option<PathBuf>,
    pub mime_type: String,
    pub size: usize,
}

impl UploadedImage {
    #[cfg(test)]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn read(&self) -> anyhow::Result<Bytes> {
        let path = self.path.as_ref().context("upload already released")?;
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("read upload {}", path.display()))?;
        Ok(Bytes::from(data))
    }

    pub async fn release(mut self) {
        if let Some(path) = self.path.take() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "upload removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(error = %e, path = %path.display(), "failed to remove upload"),
            }
        }
    }
}

// Only reached when a request is abandoned before `release`.
impl Drop for UploadedImage {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_abandoned(&path));
            }
            Err(_) => remove_abandoned(&path),
        }
    }
}

fn remove_abandoned(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(error = %e, path = %path.display(), "failed to remove abandoned upload");
        }
    }
}

fn object_name(original_name: &str) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("food-{}-{}-{}", millis, suffix, sanitize_file_name(original_name))
}

fn sanitize_file_name(name: &str) -> String {
    lazy_static! {
        static ref UNSAFE: Regex = Regex::new(r"[^A-Za-z0-9._-]").unwrap();
    }
    // keep only the final path component
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned = UNSAFE.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.chars().take(100).collect()
    }
}
