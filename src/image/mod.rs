//! Content model shared by the registry client, the transfer engine and the local store
//!
//! - [`Digest`] parses and computes `<algorithm>:<hex>` content hashes
//! - [`Descriptor`], [`Manifest`] and [`ImageIndex`] mirror the OCI image-spec JSON shapes
//! - [`media_type`] holds the recognized media-type vocabulary

pub mod digest;
pub mod manifest;
pub mod media_type;

pub use digest::Digest;
pub use manifest::{Descriptor, ImageIndex, Manifest, Platform};
