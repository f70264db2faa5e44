use std::{io, sync::LazyLock};

use regex::Regex;

use crate::*;

/// The name of the source directory.
pub const SRC_DIR: &str = "src";

/// The top-level directories that are moved into the source directory when it is enabled.
pub const SOURCE_ROOTS: [&str; 4] = ["app", "pages", "styles", "lib"];

/// The styling config whose content globs point to the source roots.
pub const STYLING_CONFIG: &str = "tailwind.config.js";

static CONTENT_GLOB_REGEX: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\./(\w+)/\*\*/\*\.\{js,ts,jsx,tsx,mdx\}")
		.expect("Failed to initialize the content glob regex")
});

/// The page that shows the "Get started by editing" hint, along with the literal path it mentions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFile {
	/// The path of the file, relative to the project root, after the restructure.
	pub path: PathBuf,
	/// The self-referencing path in its content.
	pub token: &'static str,
	pub replacement: &'static str,
}

impl EntryFile {
	pub fn for_template(selector: &TemplateSelector) -> Self {
		let (dir, stem, token, replacement) = if selector.is_app_router() {
			("app", "page", "app/page", "src/app/page")
		} else {
			("pages", "index", "pages/index", "src/pages/index")
		};

		Self {
			path: Path::new(SRC_DIR)
				.join(dir)
				.join(format!("{stem}.{}", selector.mode.page_extension())),
			token,
			replacement,
		}
	}
}

/// Prepends `src/` to the first path segment of every content glob in a tailwind config.
pub fn rewrite_content_globs(content: &str) -> String {
	CONTENT_GLOB_REGEX
		.replace_all(content, "./src/${1}/**/*.{js,ts,jsx,tsx,mdx}")
		.into_owned()
}

/// Moves the conventional source roots under `root/src` and patches the files that mention their old location.
pub async fn restructure(
	root: &Path,
	selector: &TemplateSelector,
	styling: bool,
	cancel: &CancellationToken,
) -> AppResult {
	let src_dir = root.join(SRC_DIR);

	tokio::fs::create_dir_all(&src_dir)
		.await
		.map_err(|e| AppError::RestructureFailure {
			path: src_dir.clone(),
			source: e,
		})?;

	for name in SOURCE_ROOTS {
		check_cancelled(cancel)?;

		let from = root.join(name);

		match tokio::fs::rename(&from, src_dir.join(name)).await {
			Ok(()) => debug!("Moved {name} into {SRC_DIR}"),
			Err(e) if e.kind() == io::ErrorKind::NotFound => {}
			Err(e) => {
				return Err(AppError::RestructureFailure {
					path: from,
					source: e,
				});
			}
		}
	}

	let entry = EntryFile::for_template(selector);

	patch_file(&root.join(&entry.path), |content| {
		content.replacen(entry.token, entry.replacement, 1)
	})
	.await?;

	if styling {
		patch_file(&root.join(STYLING_CONFIG), rewrite_content_globs).await?;
	}

	Ok(())
}

async fn patch_file(path: &Path, patch: impl FnOnce(&str) -> String) -> AppResult {
	let patch_error = |e| AppError::RestructureFailure {
		path: path.to_path_buf(),
		source: e,
	};

	let content = tokio::fs::read_to_string(path)
		.await
		.map_err(patch_error)?;

	tokio::fs::write(path, patch(&content))
		.await
		.map_err(patch_error)
}
