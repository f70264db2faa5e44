#![allow(clippy::result_large_err)]

use std::{
	fmt::Display,
	path::{Path, PathBuf},
	str::FromStr,
	sync::Arc,
};

use anyhow::{Context, anyhow};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
pub use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use alias::ImportAlias;
pub use config::{InstallOptions, Preferences};
pub use errors::*;
pub(crate) use fs::*;
pub use fs::{LINE_ENDING, get_abs_path};
pub use install::{InstallFlags, PackageManager};
pub use materialize::{MaterializeReport, Materializer};
pub use templates::*;

pub mod alias;
pub mod cli;
pub mod config;
pub mod errors;
pub(crate) mod fs;
pub mod install;
pub mod layout;
pub mod manifest;
pub mod materialize;
pub mod templates;

/// Returns [`AppError::Cancelled`] if the token has been triggered.
pub(crate) fn check_cancelled(cancel: &CancellationToken) -> AppResult {
	if cancel.is_cancelled() {
		Err(AppError::Cancelled)
	} else {
		Ok(())
	}
}
