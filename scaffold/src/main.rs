#![allow(clippy::result_large_err)]

use apollo_scaffold::cli::{Cli, main_entrypoint};
use clap::{CommandFactory, error::ErrorKind};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::builder()
				.with_default_directive(LevelFilter::INFO.into())
				.from_env_lossy(),
		)
		.with_target(false)
		.init();

	if let Err(e) = main_entrypoint().await {
		let mut cmd = Cli::command();
		cmd.error(ErrorKind::InvalidValue, e).exit();
	}
}
