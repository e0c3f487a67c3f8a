//! Local content-addressable stores
//!
//! Pulled images land in a [`ContentStore`]; pushes read the artifact graph back out of
//! it. Content is keyed by digest, and references (tags or digests) map to the
//! descriptor of a root node.

pub mod fs;

use crate::error::TransferError;
use crate::image::{Descriptor, Digest};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub use fs::FsStore;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Whether content for `descriptor` is present.
    async fn exists(&self, descriptor: &Descriptor) -> Result<bool, TransferError>;

    /// Read the content for `descriptor`.
    async fn fetch(&self, descriptor: &Descriptor) -> Result<Vec<u8>, TransferError>;

    /// Store `data` under `descriptor` after checking its digest and size.
    async fn push(&self, descriptor: &Descriptor, data: &[u8]) -> Result<(), TransferError>;

    /// Point `reference` at `descriptor`.
    async fn tag(&self, descriptor: &Descriptor, reference: &str) -> Result<(), TransferError>;

    /// Look up the descriptor a reference points at.
    async fn resolve(&self, reference: &str) -> Result<Descriptor, TransferError>;
}

pub(crate) fn verify_content(descriptor: &Descriptor, data: &[u8]) -> Result<(), TransferError> {
    if descriptor.size >= 0 && descriptor.size as u64 != data.len() as u64 {
        return Err(TransferError::SizeMismatch {
            digest: descriptor.digest.to_string(),
            expected: descriptor.size as u64,
            actual: data.len() as u64,
        });
    }
    descriptor.digest.verify(data)
}

/// In-memory store for short-lived staging
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<Digest, Vec<u8>>>,
    refs: RwLock<HashMap<String, Descriptor>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn exists(&self, descriptor: &Descriptor) -> Result<bool, TransferError> {
        Ok(self.blobs.read().await.contains_key(&descriptor.digest))
    }

    async fn fetch(&self, descriptor: &Descriptor) -> Result<Vec<u8>, TransferError> {
        self.blobs
            .read()
            .await
            .get(&descriptor.digest)
            .cloned()
            .ok_or_else(|| TransferError::NotFound(descriptor.digest.to_string()))
    }

    async fn push(&self, descriptor: &Descriptor, data: &[u8]) -> Result<(), TransferError> {
        verify_content(descriptor, data)?;
        self.blobs
            .write()
            .await
            .entry(descriptor.digest.clone())
            .or_insert_with(|| data.to_vec());
        Ok(())
    }

    async fn tag(&self, descriptor: &Descriptor, reference: &str) -> Result<(), TransferError> {
        if !self.exists(descriptor).await? {
            return Err(TransferError::NotFound(descriptor.digest.to_string()));
        }
        self.refs
            .write()
            .await
            .insert(reference.to_string(), descriptor.clone());
        Ok(())
    }

    async fn resolve(&self, reference: &str) -> Result<Descriptor, TransferError> {
        self.refs
            .read()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| TransferError::NotFound(format!("reference {}", reference)))
    }
}
