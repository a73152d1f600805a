use anyhow::{Result, bail};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

const STAGING_DIR: &str = "staging";
const PUBLIC_DIR: &str = "public";

/// On-disk blob storage for lecture recordings and avatars.
///
/// Uploads land in `{dir}/staging/{owner}/{upload_id}` and are appended to
/// in order, so an interrupted upload resumes from its current length.
/// Promoting an upload moves it under `{dir}/public/`, from where it is
/// served by relative path.
pub struct MediaStore {
    dir: PathBuf,
    /// Held by every operation that changes a staged upload, so an offset
    /// check and the write that follows it cannot interleave.
    writer: Mutex<()>,
}

/// Result of appending bytes to a staged upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    Written { bytes_received: u64 },
    /// The write did not start where the upload currently ends.
    OffsetMismatch { expected: u64 },
    NotFound,
}

/// A blob that is now publicly reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

impl MediaStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(dir.join(STAGING_DIR)).await?;
        fs::create_dir_all(dir.join(PUBLIC_DIR)).await?;
        info!("Media storage directory: {}", dir.display());
        Ok(Self {
            dir,
            writer: Mutex::new(()),
        })
    }

    fn staged_path(&self, owner: &str, upload_id: &str) -> Result<PathBuf> {
        let owner = checked_relative(owner)?;
        let upload_id = checked_relative(upload_id)?;
        Ok(self.dir.join(STAGING_DIR).join(owner).join(upload_id))
    }

    /// Absolute path of a public blob, or `None` if `rel` tries to escape
    /// the public directory.
    pub fn public_path(&self, rel: &str) -> Option<PathBuf> {
        checked_relative(rel).ok().map(|rel| self.dir.join(PUBLIC_DIR).join(rel))
    }

    /// Start an empty staged upload.
    pub async fn create_upload(&self, owner: &str, upload_id: &str) -> Result<()> {
        let path = self.staged_path(owner, upload_id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::File::create(&path).await?;
        Ok(())
    }

    /// Bytes received so far, or `None` for an unknown upload.
    pub async fn upload_size(&self, owner: &str, upload_id: &str) -> Result<Option<u64>> {
        let path = self.staged_path(owner, upload_id)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Append `data` to a staged upload. `offset` must equal the bytes
    /// already received.
    pub async fn append(
        &self,
        owner: &str,
        upload_id: &str,
        offset: u64,
        data: &[u8],
    ) -> Result<Append> {
        let _guard = self.writer.lock().await;
        let Some(current) = self.upload_size(owner, upload_id).await? else {
            return Ok(Append::NotFound);
        };
        if offset != current {
            return Ok(Append::OffsetMismatch { expected: current });
        }

        let path = self.staged_path(owner, upload_id)?;
        let mut file = fs::OpenOptions::new().append(true).open(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(Append::Written {
            bytes_received: current + data.len() as u64,
        })
    }

    /// Move a staged upload to `dest` under the public directory.
    /// Empty uploads are refused.
    pub async fn promote(&self, owner: &str, upload_id: &str, dest: &str) -> Result<StoredBlob> {
        let _guard = self.writer.lock().await;
        let src = self.staged_path(owner, upload_id)?;
        let Some(target) = self.public_path(dest) else {
            bail!("Invalid media path: {}", dest);
        };

        let size = fs::metadata(&src).await?.len();
        if size == 0 {
            bail!("Upload {} is empty", upload_id);
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&src, &target).await?;
        let sha256 = file_sha256(&target).await?;

        info!("Promoted upload {} to {} ({} bytes)", upload_id, dest, size);
        Ok(StoredBlob {
            path: dest.to_string(),
            size,
            sha256,
        })
    }

    /// Undo a [`promote`](Self::promote): move `dest` back to staging so the
    /// upload can be referenced again.
    pub async fn restore(&self, owner: &str, upload_id: &str, dest: &str) -> Result<()> {
        let _guard = self.writer.lock().await;
        let staged = self.staged_path(owner, upload_id)?;
        let Some(src) = self.public_path(dest) else {
            bail!("Invalid media path: {}", dest);
        };
        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&src, &staged).await?;
        warn!("Restored upload {} from {}", upload_id, dest);
        Ok(())
    }

    /// Write a whole blob straight to the public directory.
    pub async fn put(&self, dest: &str, data: &[u8]) -> Result<StoredBlob> {
        let Some(target) = self.public_path(dest) else {
            bail!("Invalid media path: {}", dest);
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, data).await?;

        Ok(StoredBlob {
            path: dest.to_string(),
            size: data.len() as u64,
            sha256: hex::encode(Sha256::digest(data)),
        })
    }

    /// Drop a staged upload that will not be used.
    pub async fn discard_upload(&self, owner: &str, upload_id: &str) -> Result<()> {
        let _guard = self.writer.lock().await;
        let path = self.staged_path(owner, upload_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Upload {} already gone", upload_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Public URL for a blob stored at `rel`.
pub fn public_url(base: &str, rel: &str) -> String {
    format!("{}/media/{}", base.trim_end_matches('/'), rel)
}

/// Accepts only plain relative paths (no `..`, no root, no prefixes).
fn checked_relative(rel: &str) -> Result<&Path> {
    let path = Path::new(rel);
    if rel.is_empty() || !path.components().all(|c| matches!(c, Component::Normal(_))) {
        bail!("Invalid media path: {}", rel);
    }
    Ok(path)
}

async fn file_sha256(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
