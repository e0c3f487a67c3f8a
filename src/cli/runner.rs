//! Runs one subcommand against a registry

use crate::cli::args::{Args, Command};
use crate::config::ClientConfig;
use crate::error::{RegistryError, Result};
use crate::registry::{IndexVersion, RegistryClient};
use crate::store::{ContentStore, FsStore};
use serde::Serialize;

pub struct Runner {
    args: Args,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    /// Environment configuration with command-line overrides
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env();
        if self.args.insecure {
            config.insecure = true;
        }
        if self.args.skip_tls {
            config.skip_tls = true;
        }
        config
    }

    pub async fn run(&self) -> Result<()> {
        let index_version = self.index_version()?;
        let client = RegistryClient::init_with_config(&self.args.registry, &self.config()).await?;

        match &self.args.command {
            Command::Pull {
                repository,
                reference,
            } => {
                let store = self.open_store().await?;
                let descriptor = client.pull(repository, &store, reference).await?;
                print_json(&descriptor)
            }
            Command::Push {
                repository,
                reference,
                tag,
            } => {
                let store = self.open_store().await?;
                let root = store.resolve(reference).await.map_err(|source| RegistryError::Store {
                    path: self.args.store.display().to_string(),
                    source,
                })?;
                match client.push(&store, &root, repository, tag).await {
                    Err(err) if err.is_unsupported_registry() => {
                        tracing::warn!(repository, "Registry does not support OCI artifacts, skipping publish");
                        Ok(())
                    }
                    other => other,
                }
            }
            Command::Head {
                repository,
                reference,
            } => print_json(&client.head_manifest(repository, reference).await?),
            Command::Manifest { repository, digest } => {
                print_json(&client.get_manifest(repository, digest).await?)
            }
            Command::Validate { repository, digest, .. } => {
                let version = index_version.unwrap_or(IndexVersion::V2);
                client.validate_image_digest(repository, digest, version).await?;
                println!("{}@{} is a valid {} image", repository, digest, version);
                Ok(())
            }
        }
    }

    /// Policy for `validate`, checked before any registry or cloud call is made.
    fn index_version(&self) -> Result<Option<IndexVersion>> {
        match &self.args.command {
            Command::Validate {
                repository,
                digest,
                index_version,
            } => index_version
                .parse()
                .map(Some)
                .map_err(|source| RegistryError::Validation {
                    repository: repository.clone(),
                    digest: digest.clone(),
                    source,
                }),
            _ => Ok(None),
        }
    }

    async fn open_store(&self) -> Result<FsStore> {
        FsStore::open(&self.args.store)
            .await
            .map_err(|source| RegistryError::Store {
                path: self.args.store.display().to_string(),
                source,
            })
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| RegistryError::Config(format!("failed to render output: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}
