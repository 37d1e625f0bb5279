use anyhow::{Result, bail};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// Manages on-disk photo storage.
///
/// Blobs live at `{dir}/{relative path}`; relative paths are produced by
/// [`crate::format::photo_path`] and [`crate::format::cover_path`] and are the
/// keys stored in the database.
pub struct PhotoStore {
    dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub path: String,
    pub sha256: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct BlobEntry {
    pub path: String,
    pub modified: SystemTime,
}

impl PhotoStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Photo storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Absolute location of a blob. Rejects anything but plain relative
    /// components so a stored path can never escape the storage directory.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let rel_path = Path::new(rel);
        if rel.is_empty()
            || !rel_path
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            bail!("Invalid storage path: {:?}", rel);
        }
        Ok(self.dir.join(rel_path))
    }

    /// Write a blob and return its digest. The data lands in a temporary file
    /// first and is renamed into place, so readers never see a partial blob.
    pub async fn put(&self, rel: &str, data: &[u8]) -> Result<StoredBlob> {
        let path = self.resolve(rel)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension(format!("{}.part", Uuid::new_v4().simple()));
        if let Err(e) = write_then_rename(&tmp, &path, data).await {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove temp file {}: {}", tmp.display(), cleanup);
                }
            }
            return Err(e.into());
        }

        let mut hasher = Sha256::new();
        hasher.update(data);

        Ok(StoredBlob {
            path: rel.to_string(),
            sha256: hex::encode(hasher.finalize()),
            size: data.len() as u64,
        })
    }

    /// `None` when the blob does not exist.
    pub async fn read(&self, rel: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(rel)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a blob from disk. Already-missing blobs are not an error.
    pub async fn delete(&self, rel: &str) -> Result<()> {
        let path = self.resolve(rel)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted blob {}", rel);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob {} already gone", rel);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Every finished blob under the storage directory, as relative paths.
    /// In-flight `.part` files are skipped.
    pub async fn list_blobs(&self) -> Result<Vec<BlobEntry>> {
        let mut blobs = Vec::new();
        let mut pending = vec![self.dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !file_type.is_file() || path.extension().is_some_and(|ext| ext == "part") {
                    continue;
                }
                let Ok(rel) = path.strip_prefix(&self.dir) else {
                    continue;
                };
                let Some(rel) = rel.to_str() else {
                    warn!("Skipping non UTF-8 blob path {}", path.display());
                    continue;
                };
                let modified = entry.metadata().await?.modified()?;
                blobs.push(BlobEntry {
                    path: rel.replace(std::path::MAIN_SEPARATOR, "/"),
                    modified,
                });
            }
        }

        Ok(blobs)
    }
}

async fn write_then_rename(tmp: &Path, dest: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(data).await?;
    file.flush().await?;
    drop(file);
    fs::rename(tmp, dest).await
}
