//! Registry client façade
//!
//! A [`RegistryClient`] is bound to one registry for its lifetime. Construction builds
//! the [`RegistryHandle`] and, for managed ECR hosts, installs ECR credentials; the
//! handle is not re-authorized afterwards except through its credential supplier's own
//! expiry check.

use crate::config::ClientConfig;
use crate::error::handlers::classify_push_failure;
use crate::error::{RegistryError, Result, TransferError};
use crate::image::{Descriptor, Digest, Manifest};
use crate::registry::auth::{self, AuthProvider, TokenExchange};
use crate::registry::http::HttpTransferEngine;
use crate::registry::transport::{RegistryHandle, TransferEngine};
use crate::registry::validator::{self, IndexVersion, ManifestValidator};
use crate::store::ContentStore;
use tracing::info;

#[derive(Debug)]
pub struct RegistryClient<E = HttpTransferEngine> {
    engine: E,
}

impl RegistryClient<HttpTransferEngine> {
    /// Connect to `registry` with configuration from the environment.
    pub async fn init(registry: &str) -> Result<Self> {
        Self::init_with_config(registry, &ClientConfig::from_env()).await
    }

    pub async fn init_with_config(registry: &str, config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        info!(registry, "Initializing registry client");
        let mut handle = RegistryHandle::new(registry, config)?;
        if auth::is_ecr_registry(registry) {
            AuthProvider::from_config(config)
                .await
                .authorize(&mut handle)
                .await?;
        }
        Ok(Self::with_engine(HttpTransferEngine::new(handle)))
    }

    /// Like [`init_with_config`](Self::init_with_config), exchanging managed-registry
    /// credentials through `exchange` instead of the AWS SDK.
    pub async fn init_with_exchange<X>(registry: &str, config: &ClientConfig, exchange: X) -> Result<Self>
    where
        X: TokenExchange + 'static,
    {
        config.validate()?;
        info!(registry, "Initializing registry client");
        let mut handle = RegistryHandle::new(registry, config)?;
        if auth::is_ecr_registry(registry) {
            AuthProvider::new(exchange, config.refresh_skew())
                .authorize(&mut handle)
                .await?;
        }
        Ok(Self::with_engine(HttpTransferEngine::new(handle)))
    }

    pub fn handle(&self) -> &RegistryHandle {
        self.engine.handle()
    }
}

impl<E: TransferEngine> RegistryClient<E> {
    pub fn with_engine(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Pull an image into `store`. `reference` may be a tag or a digest and is also the
    /// label the root gets in the store.
    pub async fn pull(&self, repository: &str, store: &dyn ContentStore, reference: &str) -> Result<Descriptor> {
        info!(repository, reference, "Pulling image");
        let descriptor = self
            .engine
            .copy_in(repository, reference, store)
            .await
            .map_err(|e| RegistryError::transfer("pull", repository, reference, e))?;

        if let Ok(requested) = reference.parse::<Digest>() {
            if requested != descriptor.digest {
                return Err(RegistryError::transfer(
                    "pull",
                    repository,
                    reference,
                    TransferError::DigestMismatch {
                        expected: requested.to_string(),
                        actual: descriptor.digest.to_string(),
                    },
                ));
            }
        }
        Ok(descriptor)
    }

    /// Push the artifact graph rooted at `root` from `store`, then tag it when `tag` is
    /// non-empty.
    ///
    /// Fails with [`RegistryError::UnsupportedRegistry`] when the registry rejects the
    /// artifact manifest schema, and with [`RegistryError::Tag`] when only tagging failed.
    pub async fn push(&self, store: &dyn ContentStore, root: &Descriptor, repository: &str, tag: &str) -> Result<()> {
        info!(repository, digest = %root.digest, "Pushing artifact");
        self.engine
            .copy_out_graph(store, root, repository)
            .await
            .map_err(|e| classify_push_failure(repository, &root.digest.to_string(), e))?;

        if !tag.is_empty() {
            info!(repository, tag, "Tagging index with {}", tag);
            self.engine
                .tag(repository, root, tag)
                .await
                .map_err(|source| RegistryError::Tag {
                    repository: repository.to_string(),
                    tag: tag.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Resolve a reference to its descriptor without fetching the body.
    pub async fn head_manifest(&self, repository: &str, reference: &str) -> Result<Descriptor> {
        self.engine
            .resolve(repository, reference)
            .await
            .map_err(|e| RegistryError::transfer("head manifest", repository, reference, e))
    }

    /// Fetch and decode the manifest for `digest`; tags are rejected.
    pub async fn get_manifest(&self, repository: &str, digest: &str) -> Result<Manifest> {
        let digest = parse_digest(digest)?;
        validator::load_manifest(&self.engine, repository, &digest).await
    }

    /// Check that `digest` names an artifact of a shape `version` accepts.
    pub async fn validate_image_digest(&self, repository: &str, digest: &str, version: IndexVersion) -> Result<()> {
        let digest = parse_digest(digest)?;
        ManifestValidator::new(&self.engine)
            .validate(repository, &digest, version)
            .await
    }
}

fn parse_digest(digest: &str) -> Result<Digest> {
    digest
        .parse()
        .map_err(|_| RegistryError::InvalidDigest(digest.to_string()))
}
