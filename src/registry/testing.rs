//! In-memory transfer engine for unit tests

use crate::error::TransferError;
use crate::image::{Descriptor, Digest};
use crate::registry::transport::TransferEngine;
use crate::store::ContentStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub(crate) struct FakeEngine {
    manifests: Mutex<HashMap<Digest, (Descriptor, Vec<u8>)>>,
    remote_tags: Mutex<HashMap<String, Digest>>,
    pushed: Mutex<Vec<Descriptor>>,
    tag_calls: Mutex<Vec<String>>,
    fetches: AtomicUsize,
    copy_out_error: Mutex<Option<TransferError>>,
    tag_error: Mutex<Option<TransferError>>,
}

impl FakeEngine {
    pub(crate) fn add_manifest(&self, media_type: &str, body: &str) -> Descriptor {
        let descriptor = Descriptor::for_content(media_type, body.as_bytes());
        self.manifests.lock().unwrap().insert(
            descriptor.digest.clone(),
            (descriptor.clone(), body.as_bytes().to_vec()),
        );
        descriptor
    }

    pub(crate) fn add_tag(&self, tag: &str, descriptor: &Descriptor) {
        self.remote_tags
            .lock()
            .unwrap()
            .insert(tag.to_string(), descriptor.digest.clone());
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn pushed(&self) -> Vec<Descriptor> {
        self.pushed.lock().unwrap().clone()
    }

    pub(crate) fn tag_calls(&self) -> Vec<String> {
        self.tag_calls.lock().unwrap().clone()
    }

    pub(crate) fn fail_copy_out(&self, err: TransferError) {
        *self.copy_out_error.lock().unwrap() = Some(err);
    }

    pub(crate) fn fail_tag(&self, err: TransferError) {
        *self.tag_error.lock().unwrap() = Some(err);
    }

    fn lookup(&self, digest: &Digest) -> Result<(Descriptor, Vec<u8>), TransferError> {
        self.manifests
            .lock()
            .unwrap()
            .get(digest)
            .cloned()
            .ok_or_else(|| TransferError::NotFound(digest.to_string()))
    }
}

#[async_trait]
impl TransferEngine for FakeEngine {
    async fn resolve(&self, _repository: &str, reference: &str) -> Result<Descriptor, TransferError> {
        let digest = match reference.parse::<Digest>() {
            Ok(digest) => digest,
            Err(_) => self
                .remote_tags
                .lock()
                .unwrap()
                .get(reference)
                .cloned()
                .ok_or_else(|| TransferError::NotFound(reference.to_string()))?,
        };
        Ok(self.lookup(&digest)?.0)
    }

    async fn fetch_manifest(&self, _repository: &str, digest: &Digest) -> Result<Vec<u8>, TransferError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.lookup(digest)?.1)
    }

    async fn copy_in(
        &self,
        repository: &str,
        reference: &str,
        store: &dyn ContentStore,
    ) -> Result<Descriptor, TransferError> {
        let descriptor = self.resolve(repository, reference).await?;
        let (_, body) = self.lookup(&descriptor.digest)?;
        store.push(&descriptor, &body).await?;
        store.tag(&descriptor, reference).await?;
        Ok(descriptor)
    }

    async fn copy_out_graph(
        &self,
        store: &dyn ContentStore,
        root: &Descriptor,
        _repository: &str,
    ) -> Result<(), TransferError> {
        if let Some(err) = self.copy_out_error.lock().unwrap().take() {
            return Err(err);
        }
        let body = store.fetch(root).await?;
        self.manifests
            .lock()
            .unwrap()
            .insert(root.digest.clone(), (root.clone(), body));
        self.pushed.lock().unwrap().push(root.clone());
        Ok(())
    }

    async fn tag(&self, _repository: &str, descriptor: &Descriptor, tag: &str) -> Result<(), TransferError> {
        self.tag_calls.lock().unwrap().push(tag.to_string());
        if let Some(err) = self.tag_error.lock().unwrap().take() {
            return Err(err);
        }
        self.add_tag(tag, descriptor);
        Ok(())
    }
}
