//! Command line interface
//!
//! Argument parsing and the runner that maps each subcommand onto a
//! [`RegistryClient`](crate::registry::RegistryClient) operation.

pub mod args;
pub mod runner;

pub use args::{Args, Command};
pub use runner::Runner;
