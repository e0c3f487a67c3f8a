//! Registry module for OCI/Docker registry interactions
//!
//! [`RegistryClient`] is the entry point: it pulls images into a local store, pushes
//! artifact graphs back, resolves and fetches manifests, and validates image digests.
//! Managed ECR registries are authorized transparently at construction.

pub mod auth;
pub mod client;
pub mod http;
pub mod token_manager;
pub mod transport;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AuthProvider, EcrTokenExchange, TokenExchange, is_ecr_registry};
pub use client::RegistryClient;
pub use http::HttpTransferEngine;
pub use token_manager::{AuthToken, CachedCredentials, CredentialSupplier, StaticCredentials};
pub use transport::{RegistryHandle, TransferEngine};
pub use validator::{IndexVersion, ManifestValidator};
