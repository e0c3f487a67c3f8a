//! Transfer seam between the registry client and the wire
//!
//! [`TransferEngine`] is the contract the client façade relies on: resolving references,
//! fetching manifests and copying artifact graphs between a registry and a local
//! [`ContentStore`]. [`RegistryHandle`] carries the endpoint, HTTP client and credentials
//! an engine talks through.

use crate::config::ClientConfig;
use crate::error::{AuthError, RegistryError, TransferError};
use crate::image::{Descriptor, Digest};
use crate::registry::token_manager::{Anonymous, CredentialSupplier, StaticCredentials};
use crate::store::ContentStore;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use std::sync::Arc;
use url::Url;

/// Graph transfer operations against one registry
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Resolve a tag or digest to the descriptor of the manifest it names.
    async fn resolve(&self, repository: &str, reference: &str) -> Result<Descriptor, TransferError>;

    /// Raw manifest bytes for a digest, verified against it.
    async fn fetch_manifest(&self, repository: &str, digest: &Digest) -> Result<Vec<u8>, TransferError>;

    /// Copy the graph named by `reference` into `store`, labelling the root with
    /// `reference`. Returns the resolved root descriptor.
    async fn copy_in(
        &self,
        repository: &str,
        reference: &str,
        store: &dyn ContentStore,
    ) -> Result<Descriptor, TransferError>;

    /// Copy the graph rooted at `root` from `store` to the registry.
    async fn copy_out_graph(
        &self,
        store: &dyn ContentStore,
        root: &Descriptor,
        repository: &str,
    ) -> Result<(), TransferError>;

    /// Point `tag` at an existing remote manifest.
    async fn tag(&self, repository: &str, descriptor: &Descriptor, tag: &str) -> Result<(), TransferError>;
}

/// Endpoint and credentials for one registry.
///
/// Credentials are installed while the owning client is constructed and stay fixed
/// afterwards; clones share the same supplier.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    host: String,
    base_url: Url,
    http: Client,
    credentials: Arc<dyn CredentialSupplier>,
}

impl RegistryHandle {
    /// Build a handle for `registry`, a host with optional port and optional scheme.
    pub fn new(registry: &str, config: &ClientConfig) -> Result<Self, RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidRegistry {
            host: registry.to_string(),
            reason,
        };

        if registry.trim().is_empty() {
            return Err(invalid("registry host cannot be empty".to_string()));
        }

        let address = if registry.contains("://") {
            registry.to_string()
        } else {
            format!("{}://{}", config.scheme(), registry)
        };
        let base_url = Url::parse(&address).map_err(|e| invalid(e.to_string()))?;
        if base_url.path() != "/" && !base_url.path().is_empty() {
            return Err(invalid("registry address must not contain a path".to_string()));
        }
        let host = match (base_url.host_str(), base_url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(invalid("registry address has no host".to_string())),
        };

        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(config.skip_tls)
            .build()
            .map_err(|e| invalid(format!("failed to create HTTP client: {}", e)))?;

        let credentials: Arc<dyn CredentialSupplier> = match &config.credentials {
            Some(auth) => Arc::new(StaticCredentials::basic_auth(&auth.username, &auth.password)),
            None => Arc::new(Anonymous),
        };

        Ok(Self {
            host,
            base_url,
            http,
            credentials,
        })
    }

    /// Registry host, with port when one was given
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn set_credentials(&mut self, credentials: Arc<dyn CredentialSupplier>) {
        self.credentials = credentials;
    }

    /// Current `Authorization` header, refreshed by the supplier when needed.
    pub async fn authorization_header(&self) -> Result<Option<HeaderValue>, AuthError> {
        match self.credentials.authorization().await? {
            Some(token) => Ok(Some(token.header_value()?)),
            None => Ok(None),
        }
    }

    /// `/v2/<repository>/<kind>/<reference>` on this registry
    pub(crate) fn endpoint(&self, repository: &str, kind: &str, reference: &str) -> Result<Url, TransferError> {
        Ok(self
            .base_url
            .join(&format!("/v2/{}/{}/{}", repository, kind, reference))?)
    }

    /// Start a request carrying the current authorization.
    pub(crate) async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, TransferError> {
        let mut request = self.http.request(method, url);
        if let Some(header) = self.authorization_header().await? {
            request = request.header(AUTHORIZATION, header);
        }
        Ok(request)
    }
}
