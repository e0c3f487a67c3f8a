use clap::Parser;
use soci_registry::cli::{Args, Runner};
use soci_registry::logging;
use soci_registry::registry::auth;
use std::error::Error;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    auth::check_patterns();

    let args = Args::parse();
    logging::init(args.verbose);

    match Runner::new(args).run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            let mut source = err.source();
            while let Some(cause) = source {
                tracing::error!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
