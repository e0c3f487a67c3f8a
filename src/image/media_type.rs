//! Recognized media types
//!
//! Values must match what registries return byte for byte.

pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const OCI_ARTIFACT_MANIFEST: &str = "application/vnd.oci.artifact.manifest.v1+json";

pub const DOCKER_IMAGE_CONFIG: &str = "application/vnd.docker.container.image.v1+json";
pub const OCI_IMAGE_CONFIG: &str = "application/vnd.oci.image.config.v1+json";

/// Config media types of runnable images
pub const IMAGE_CONFIG_MEDIA_TYPES: &[&str] = &[DOCKER_IMAGE_CONFIG, OCI_IMAGE_CONFIG];

/// Multi-platform index media types
pub const INDEX_MEDIA_TYPES: &[&str] = &[DOCKER_MANIFEST_LIST, OCI_INDEX];

/// Single-manifest media types, including artifact manifests
pub const MANIFEST_MEDIA_TYPES: &[&str] = &[DOCKER_MANIFEST, OCI_MANIFEST, OCI_ARTIFACT_MANIFEST];

pub fn is_image_config_media_type(media_type: &str) -> bool {
    IMAGE_CONFIG_MEDIA_TYPES.contains(&media_type)
}

pub fn is_index_media_type(media_type: &str) -> bool {
    INDEX_MEDIA_TYPES.contains(&media_type)
}

pub fn is_manifest_media_type(media_type: &str) -> bool {
    MANIFEST_MEDIA_TYPES.contains(&media_type)
}

/// Anything fetched through the manifests endpoint rather than the blobs endpoint
pub fn is_manifest_like(media_type: &str) -> bool {
    is_manifest_media_type(media_type) || is_index_media_type(media_type)
}

/// `Accept` header value for manifest requests
pub fn manifest_accept_header() -> String {
    [
        DOCKER_MANIFEST,
        DOCKER_MANIFEST_LIST,
        OCI_MANIFEST,
        OCI_INDEX,
        OCI_ARTIFACT_MANIFEST,
    ]
    .join(", ")
}
