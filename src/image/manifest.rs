//! OCI descriptor, manifest and index shapes

use crate::image::digest::Digest;
use crate::image::media_type;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Content-addressed pointer to a blob or manifest.
///
/// Two descriptors are equal when their digests are equal; the remaining fields are
/// informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    pub digest: Digest,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
    }
}

impl Eq for Descriptor {}

impl Descriptor {
    pub fn new(media_type: impl Into<String>, digest: Digest, size: i64) -> Self {
        Self {
            media_type: media_type.into(),
            digest,
            size,
            artifact_type: None,
            annotations: None,
            platform: None,
        }
    }

    /// Describe `data` with the given media type.
    pub fn for_content(media_type: impl Into<String>, data: &[u8]) -> Self {
        Self::new(media_type, Digest::from_bytes(data), data.len() as i64)
    }

    pub fn is_manifest_like(&self) -> bool {
        media_type::is_manifest_like(&self.media_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    pub architecture: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Config of a manifest; absent on index-shaped bodies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDescriptor {
    #[serde(default)]
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
    #[serde(default)]
    pub size: i64,
}

impl ConfigDescriptor {
    pub fn descriptor(&self) -> Option<Descriptor> {
        self.digest
            .clone()
            .map(|digest| Descriptor::new(self.media_type.clone(), digest, self.size))
    }
}

/// Single-platform image or artifact manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    #[serde(default)]
    pub config: ConfigDescriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Descriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl Manifest {
    /// Config, layers, then subject.
    pub fn successors(&self) -> Vec<Descriptor> {
        let mut successors = Vec::with_capacity(self.layers.len() + 2);
        successors.extend(self.config.descriptor());
        successors.extend(self.layers.iter().cloned());
        successors.extend(self.subject.clone());
        successors
    }
}

/// Multi-platform image index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIndex {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Descriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl ImageIndex {
    pub fn successors(&self) -> Vec<Descriptor> {
        let mut successors = self.manifests.clone();
        successors.extend(self.subject.clone());
        successors
    }
}

/// Direct children of a manifest-like node, decided by its media type.
pub fn successors(descriptor: &Descriptor, content: &[u8]) -> Result<Vec<Descriptor>, serde_json::Error> {
    if media_type::is_index_media_type(&descriptor.media_type) {
        Ok(serde_json::from_slice::<ImageIndex>(content)?.successors())
    } else if media_type::is_manifest_media_type(&descriptor.media_type) {
        Ok(serde_json::from_slice::<Manifest>(content)?.successors())
    } else {
        Ok(Vec::new())
    }
}
