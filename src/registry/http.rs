//! [`TransferEngine`] over the OCI distribution HTTP API
//!
//! - manifests: `HEAD`/`GET`/`PUT /v2/<name>/manifests/<reference>`
//! - blobs: `HEAD`/`GET /v2/<name>/blobs/<digest>`, monolithic upload via
//!   `POST /v2/<name>/blobs/uploads/` then `PUT <location>?digest=<digest>`
//!
//! Graph copies walk depth first and skip nodes the destination already has.

use crate::error::TransferError;
use crate::error::handlers::response_error;
use crate::image::manifest::successors;
use crate::image::{Descriptor, Digest, Manifest, media_type};
use crate::registry::transport::{RegistryHandle, TransferEngine};
use crate::store::ContentStore;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, LOCATION};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

const DOCKER_CONTENT_DIGEST: &str = "docker-content-digest";
const BLOB_CONTENT_TYPE: &str = "application/octet-stream";

type BoxedCopy<'a> = Pin<Box<dyn Future<Output = Result<(), TransferError>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct HttpTransferEngine {
    handle: RegistryHandle,
}

/// Only the field needed to recover a media type from a manifest body
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaTypeProbe {
    #[serde(default)]
    media_type: Option<String>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

/// Content type without parameters
fn content_type(headers: &HeaderMap) -> Option<String> {
    header_str(headers, CONTENT_TYPE.as_str())
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
        .filter(|value| !value.is_empty())
}

impl HttpTransferEngine {
    pub fn new(handle: RegistryHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &RegistryHandle {
        &self.handle
    }

    /// GET a manifest and describe it from the response and body.
    async fn get_manifest(&self, repository: &str, reference: &str) -> Result<(Descriptor, Vec<u8>), TransferError> {
        let url = self.handle.endpoint(repository, "manifests", reference)?;
        let response = self
            .handle
            .request(Method::GET, url)
            .await?
            .header(ACCEPT, media_type::manifest_accept_header())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error(response).await);
        }

        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        let digest = match reference.parse::<Digest>() {
            Ok(expected) => {
                expected.verify(&body)?;
                expected
            }
            Err(_) => {
                let computed = Digest::from_bytes(&body);
                if let Some(advertised) = header_str(&headers, DOCKER_CONTENT_DIGEST)
                    .and_then(|d| d.parse::<Digest>().ok())
                {
                    advertised.verify(&body)?;
                    advertised
                } else {
                    computed
                }
            }
        };

        let media_type = content_type(&headers)
            .filter(|value| media_type::is_manifest_like(value))
            .or_else(|| {
                serde_json::from_slice::<MediaTypeProbe>(&body)
                    .ok()
                    .and_then(|probe| probe.media_type)
            })
            .unwrap_or_default();

        Ok((Descriptor::new(media_type, digest, body.len() as i64), body))
    }

    async fn fetch_blob(&self, repository: &str, descriptor: &Descriptor) -> Result<Vec<u8>, TransferError> {
        let url = self
            .handle
            .endpoint(repository, "blobs", &descriptor.digest.to_string())?;
        let response = self.handle.request(Method::GET, url).await?.send().await?;
        if !response.status().is_success() {
            return Err(response_error(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// HEAD the manifest or blob endpoint for a descriptor.
    async fn exists_remote(&self, repository: &str, descriptor: &Descriptor) -> Result<bool, TransferError> {
        let kind = if descriptor.is_manifest_like() { "manifests" } else { "blobs" };
        let url = self
            .handle
            .endpoint(repository, kind, &descriptor.digest.to_string())?;
        let mut request = self.handle.request(Method::HEAD, url).await?;
        if descriptor.is_manifest_like() {
            request = request.header(ACCEPT, media_type::manifest_accept_header());
        }
        let response = request.send().await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(response_error(response).await),
        }
    }

    async fn push_blob(&self, repository: &str, descriptor: &Descriptor, data: Vec<u8>) -> Result<(), TransferError> {
        let start = self.handle.base_url().join(&format!("/v2/{}/blobs/uploads/", repository))?;
        let response = self.handle.request(Method::POST, start).await?.send().await?;
        if !response.status().is_success() {
            return Err(response_error(response).await);
        }

        let location = header_str(response.headers(), LOCATION.as_str())
            .ok_or(TransferError::MissingHeader("Location"))?;
        let mut upload = self.handle.base_url().join(location)?;
        upload
            .query_pairs_mut()
            .append_pair("digest", &descriptor.digest.to_string());

        let response = self
            .handle
            .request(Method::PUT, upload)
            .await?
            .header(CONTENT_TYPE, BLOB_CONTENT_TYPE)
            .header(CONTENT_LENGTH, data.len())
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error(response).await);
        }
        tracing::debug!(digest = %descriptor.digest, "Blob uploaded");
        Ok(())
    }

    async fn put_manifest(
        &self,
        repository: &str,
        reference: &str,
        media_type: &str,
        data: Vec<u8>,
    ) -> Result<(), TransferError> {
        let url = self.handle.endpoint(repository, "manifests", reference)?;
        let response = self
            .handle
            .request(Method::PUT, url)
            .await?
            .header(CONTENT_TYPE, media_type)
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error(response).await);
        }
        tracing::debug!(repository, reference, "Manifest uploaded");
        Ok(())
    }

    /// Store `node` and everything below it, children first.
    fn copy_node_in<'a>(
        &'a self,
        repository: &'a str,
        node: Descriptor,
        content: Vec<u8>,
        store: &'a dyn ContentStore,
    ) -> BoxedCopy<'a> {
        Box::pin(async move {
            let children = successors(&node, &content).map_err(|source| TransferError::Malformed {
                digest: node.digest.to_string(),
                source,
            })?;

            let subject = serde_json::from_slice::<Manifest>(&content)
                .ok()
                .and_then(|manifest| manifest.subject);

            for child in children {
                if store.exists(&child).await? {
                    tracing::debug!(digest = %child.digest, "Already in local store");
                    continue;
                }
                if child.is_manifest_like() {
                    let data = match self.fetch_manifest(repository, &child.digest).await {
                        Ok(data) => data,
                        // a referrer's subject need not live in the same repository
                        Err(err) if err.status() == Some(404) && subject.as_ref() == Some(&child) => {
                            tracing::debug!(digest = %child.digest, "Subject not in registry, skipping");
                            continue;
                        }
                        Err(err) => return Err(err),
                    };
                    self.copy_node_in(repository, child, data, store).await?;
                } else {
                    let data = self.fetch_blob(repository, &child).await?;
                    store.push(&child, &data).await?;
                }
            }

            store.push(&node, &content).await
        })
    }

    /// Upload `node` and everything below it that the registry lacks, children first.
    fn copy_node_out<'a>(
        &'a self,
        store: &'a dyn ContentStore,
        node: Descriptor,
        repository: &'a str,
    ) -> BoxedCopy<'a> {
        Box::pin(async move {
            if self.exists_remote(repository, &node).await? {
                tracing::debug!(digest = %node.digest, "Already in registry");
                return Ok(());
            }

            let content = store.fetch(&node).await?;
            if !node.is_manifest_like() {
                return self.push_blob(repository, &node, content).await;
            }

            let children = successors(&node, &content).map_err(|source| TransferError::Malformed {
                digest: node.digest.to_string(),
                source,
            })?;
            for child in children {
                self.copy_node_out(store, child, repository).await?;
            }

            self.put_manifest(repository, &node.digest.to_string(), &node.media_type, content)
                .await
        })
    }
}

#[async_trait]
impl TransferEngine for HttpTransferEngine {
    async fn resolve(&self, repository: &str, reference: &str) -> Result<Descriptor, TransferError> {
        let url = self.handle.endpoint(repository, "manifests", reference)?;
        let response = self
            .handle
            .request(Method::HEAD, url)
            .await?
            .header(ACCEPT, media_type::manifest_accept_header())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error(response).await);
        }

        let headers = response.headers();
        let digest = header_str(headers, DOCKER_CONTENT_DIGEST).and_then(|d| d.parse::<Digest>().ok());
        let size = header_str(headers, CONTENT_LENGTH.as_str()).and_then(|s| s.parse::<i64>().ok());
        let media_type = content_type(headers);

        if let (Some(digest), Some(size), Some(media_type)) = (digest, size, media_type) {
            if let Ok(expected) = reference.parse::<Digest>() {
                if expected != digest {
                    return Err(TransferError::DigestMismatch {
                        expected: expected.to_string(),
                        actual: digest.to_string(),
                    });
                }
            }
            return Ok(Descriptor::new(media_type, digest, size));
        }

        // registries that omit the digest on HEAD still answer GET
        tracing::debug!(repository, reference, "Incomplete HEAD response, falling back to GET");
        let (descriptor, _) = self.get_manifest(repository, reference).await?;
        Ok(descriptor)
    }

    async fn fetch_manifest(&self, repository: &str, digest: &Digest) -> Result<Vec<u8>, TransferError> {
        let (_, body) = self.get_manifest(repository, &digest.to_string()).await?;
        Ok(body)
    }

    async fn copy_in(
        &self,
        repository: &str,
        reference: &str,
        store: &dyn ContentStore,
    ) -> Result<Descriptor, TransferError> {
        let root = self.resolve(repository, reference).await?;
        let content = self.fetch_manifest(repository, &root.digest).await?;
        self.copy_node_in(repository, root.clone(), content, store).await?;
        store.tag(&root, reference).await?;
        Ok(root)
    }

    async fn copy_out_graph(
        &self,
        store: &dyn ContentStore,
        root: &Descriptor,
        repository: &str,
    ) -> Result<(), TransferError> {
        self.copy_node_out(store, root.clone(), repository).await
    }

    async fn tag(&self, repository: &str, descriptor: &Descriptor, tag: &str) -> Result<(), TransferError> {
        let content = self.fetch_manifest(repository, &descriptor.digest).await?;
        self.put_manifest(repository, tag, &descriptor.media_type, content).await
    }
}
