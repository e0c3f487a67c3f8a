//! Artifact shape validation
//!
//! Decides whether a digest names an image the index builder can work with:
//!
//! - [`IndexVersion::V1`]: the digest must be a single-platform image manifest.
//! - [`IndexVersion::V2`]: an image index is tried first (a cheap `HEAD`), then an image
//!   manifest. When both fail the manifest failure is returned and the index failure is
//!   dropped, so callers always see a manifest-shaped error message even when the
//!   artifact was meant to be an index.

use crate::error::{RegistryError, Result, ValidationError};
use crate::image::media_type::{self, IMAGE_CONFIG_MEDIA_TYPES, INDEX_MEDIA_TYPES};
use crate::image::{Descriptor, Digest, Manifest};
use crate::registry::transport::TransferEngine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which artifact shapes are accepted for an image digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexVersion {
    /// Image manifests only
    V1,
    /// Image manifests or image indexes
    V2,
}

impl FromStr for IndexVersion {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            v if v.eq_ignore_ascii_case("v1") => Ok(IndexVersion::V1),
            v if v.eq_ignore_ascii_case("v2") => Ok(IndexVersion::V2),
            other => Err(ValidationError::UnsupportedPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for IndexVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexVersion::V1 => f.write_str("V1"),
            IndexVersion::V2 => f.write_str("V2"),
        }
    }
}

/// Manifest must carry one of the image config media types.
pub fn check_manifest(manifest: &Manifest) -> std::result::Result<(), ValidationError> {
    let config_type = &manifest.config.media_type;
    if config_type.is_empty() {
        return Err(ValidationError::EmptyConfigMediaType);
    }
    if !media_type::is_image_config_media_type(config_type) {
        return Err(ValidationError::UnexpectedConfigMediaType {
            actual: config_type.clone(),
            expected: IMAGE_CONFIG_MEDIA_TYPES,
        });
    }
    Ok(())
}

/// Descriptor must carry one of the index media types.
pub fn check_index(descriptor: &Descriptor) -> std::result::Result<(), ValidationError> {
    if !media_type::is_index_media_type(&descriptor.media_type) {
        return Err(ValidationError::NotAnIndex {
            actual: descriptor.media_type.clone(),
            expected: INDEX_MEDIA_TYPES,
        });
    }
    Ok(())
}

/// Fetch a manifest by digest and decode it.
pub(crate) async fn load_manifest<E>(engine: &E, repository: &str, digest: &Digest) -> Result<Manifest>
where
    E: TransferEngine + ?Sized,
{
    let bytes = engine
        .fetch_manifest(repository, digest)
        .await
        .map_err(|e| RegistryError::transfer("get manifest", repository, &digest.to_string(), e))?;

    serde_json::from_slice(&bytes).map_err(|source| RegistryError::Decode {
        digest: digest.to_string(),
        source,
    })
}

pub struct ManifestValidator<'a, E: ?Sized> {
    engine: &'a E,
}

impl<'a, E: TransferEngine + ?Sized> ManifestValidator<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    fn invalid(repository: &str, digest: &Digest, source: ValidationError) -> RegistryError {
        RegistryError::Validation {
            repository: repository.to_string(),
            digest: digest.to_string(),
            source,
        }
    }

    /// The digest names an image manifest with a recognized config type.
    pub async fn validate_as_manifest(&self, repository: &str, digest: &Digest) -> Result<()> {
        let manifest = load_manifest(self.engine, repository, digest).await?;
        check_manifest(&manifest).map_err(|e| Self::invalid(repository, digest, e))
    }

    /// The digest names an image index; only the descriptor is resolved.
    pub async fn validate_as_index(&self, repository: &str, digest: &Digest) -> Result<()> {
        let descriptor = self
            .engine
            .resolve(repository, &digest.to_string())
            .await
            .map_err(|e| RegistryError::transfer("head manifest", repository, &digest.to_string(), e))?;
        check_index(&descriptor).map_err(|e| Self::invalid(repository, digest, e))
    }

    pub async fn validate(&self, repository: &str, digest: &Digest, version: IndexVersion) -> Result<()> {
        match version {
            IndexVersion::V1 => {
                self.validate_as_manifest(repository, digest).await?;
                tracing::info!(repository, %digest, "Validated image manifest");
                Ok(())
            }
            IndexVersion::V2 => {
                match self.validate_as_index(repository, digest).await {
                    Ok(()) => {
                        tracing::info!(repository, %digest, "Validated image index");
                        return Ok(());
                    }
                    Err(err) => {
                        tracing::debug!(repository, %digest, error = %err, "Not an image index");
                    }
                }
                self.validate_as_manifest(repository, digest).await?;
                tracing::info!(repository, %digest, "Validated image manifest");
                Ok(())
            }
        }
    }
}
