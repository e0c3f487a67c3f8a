//! Command-line argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "soci-registry")]
#[command(about = "Pull images and publish SOCI index artifacts to OCI registries")]
#[command(version)]
pub struct Args {
    /// Registry host, e.g. 123456789012.dkr.ecr.us-west-2.amazonaws.com
    #[arg(long = "registry", short = 'r')]
    pub registry: String,

    /// Local content store directory
    #[arg(long = "store", short = 's', default_value = ".soci-store")]
    pub store: PathBuf,

    /// Use plain HTTP
    #[arg(long = "insecure")]
    pub insecure: bool,

    /// Skip TLS certificate verification
    #[arg(long = "skip-tls", short = 'k')]
    pub skip_tls: bool,

    #[arg(long = "verbose", short = 'v', help = "Enable debug logging")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pull an image into the local store
    Pull {
        repository: String,
        /// Tag or digest
        reference: String,
    },
    /// Push an artifact from the local store
    Push {
        repository: String,
        /// Local reference of the artifact root
        reference: String,
        /// Remote tag to apply after the push
        #[arg(long = "tag", short = 't', default_value = "")]
        tag: String,
    },
    /// Resolve a reference to its descriptor
    Head {
        repository: String,
        reference: String,
    },
    /// Print the manifest for a digest
    Manifest {
        repository: String,
        digest: String,
    },
    /// Check that a digest is an image the index version accepts
    Validate {
        repository: String,
        digest: String,
        #[arg(long = "index-version", default_value = "V2")]
        index_version: String,
    },
}
