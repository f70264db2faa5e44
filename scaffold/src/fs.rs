use std::{
	io,
	path::{Path, PathBuf},
};

use tokio::task::spawn_blocking;
use walkdir::WalkDir;

use crate::*;

#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

pub(crate) fn get_parent_dir(path: &Path) -> AppResult<&Path> {
	path.parent()
		.with_context(|| format!("Could not get the parent directory of `{}`", path.display()))
		.map_err(AppError::from)
}

/// Makes a path absolute without requiring it to exist.
pub fn get_abs_path(path: &Path) -> AppResult<PathBuf> {
	std::path::absolute(path).map_err(|e| AppError::PathCanonicalization {
		path: path.to_path_buf(),
		source: e,
	})
}

/// Lists every entry below `dir` (dotfiles included, `dir` itself excluded) as paths relative to `dir`.
///
/// The listing is a snapshot: entries created afterwards are not part of it.
pub(crate) async fn list_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
	let dir = dir.to_path_buf();

	spawn_blocking(move || {
		let mut entries = Vec::new();

		for entry in WalkDir::new(&dir).min_depth(1).sort_by_file_name() {
			let entry = entry.map_err(io::Error::other)?;

			if let Ok(rel_path) = entry.path().strip_prefix(&dir) {
				entries.push(rel_path.to_path_buf());
			}
		}

		Ok(entries)
	})
	.await
	.map_err(io::Error::other)?
}
