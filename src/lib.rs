//! SOCI registry client library
//!
//! Pulls container images into a local content store, publishes derived index
//! artifacts back to the registry they came from, and checks that an image digest has
//! the shape an index version expects.

pub mod cli;
pub mod config;
pub mod error;
pub mod image;
pub mod logging;
pub mod registry;
pub mod store;

pub use config::{AuthConfig, ClientConfig};
pub use error::{AuthError, RegistryError, Result, TransferError, ValidationError};
pub use image::{Descriptor, Digest, ImageIndex, Manifest};
pub use registry::{IndexVersion, RegistryClient};
pub use store::{ContentStore, FsStore, MemoryStore};
