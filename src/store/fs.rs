//! Directory-backed content store
//!
//! Layout:
//! ```text
//! <root>/
//!   blobs/<algorithm>/<hex>
//!   index.json   // reference -> descriptor
//! ```
//! Blobs and the index are written to a temporary file first and renamed into place, so
//! a reader never sees partial content.

use crate::error::TransferError;
use crate::image::Descriptor;
use crate::store::{ContentStore, verify_content};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

pub const BLOBS_DIR: &str = "blobs";
pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreIndex {
    #[serde(default)]
    references: BTreeMap<String, Descriptor>,
}

#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    index: Mutex<StoreIndex>,
}

impl FsStore {
    /// Open the store at `root`, creating the directory layout if needed.
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self, TransferError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(BLOBS_DIR)).await?;

        let index_path = root.join(INDEX_FILE);
        let index = match fs::read(&index_path).await {
            Ok(contents) => {
                serde_json::from_slice(&contents).map_err(|source| TransferError::Malformed {
                    digest: index_path.display().to_string(),
                    source,
                })?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreIndex::default(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            root,
            index: Mutex::new(index),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, descriptor: &Descriptor) -> PathBuf {
        self.root
            .join(BLOBS_DIR)
            .join(descriptor.digest.algorithm().as_str())
            .join(descriptor.digest.hex())
    }

    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), TransferError> {
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).await?;
        let tmp = parent.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
        fs::write(&tmp, data).await?;
        if let Err(err) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for FsStore {
    async fn exists(&self, descriptor: &Descriptor) -> Result<bool, TransferError> {
        Ok(fs::try_exists(self.blob_path(descriptor)).await?)
    }

    async fn fetch(&self, descriptor: &Descriptor) -> Result<Vec<u8>, TransferError> {
        match fs::read(self.blob_path(descriptor)).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(TransferError::NotFound(descriptor.digest.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn push(&self, descriptor: &Descriptor, data: &[u8]) -> Result<(), TransferError> {
        verify_content(descriptor, data)?;
        if self.exists(descriptor).await? {
            return Ok(());
        }
        self.write_atomic(&self.blob_path(descriptor), data).await
    }

    async fn tag(&self, descriptor: &Descriptor, reference: &str) -> Result<(), TransferError> {
        if !self.exists(descriptor).await? {
            return Err(TransferError::NotFound(descriptor.digest.to_string()));
        }

        let mut index = self.index.lock().await;
        let mut updated = StoreIndex {
            references: index.references.clone(),
        };
        updated
            .references
            .insert(reference.to_string(), descriptor.clone());
        let serialized = serde_json::to_vec_pretty(&updated).map_err(|source| {
            TransferError::Malformed {
                digest: INDEX_FILE.to_string(),
                source,
            }
        })?;
        self.write_atomic(&self.root.join(INDEX_FILE), &serialized)
            .await?;

        // only visible once it is on disk
        *index = updated;
        Ok(())
    }

    async fn resolve(&self, reference: &str) -> Result<Descriptor, TransferError> {
        self.index
            .lock()
            .await
            .references
            .get(reference)
            .cloned()
            .ok_or_else(|| TransferError::NotFound(format!("reference {}", reference)))
    }
}
