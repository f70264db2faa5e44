use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::*;

/// The lint config, excluded when linting is disabled.
pub const LINT_CONFIG: &str = "eslintrc.json";

/// The styling engine config and its post-processing config, excluded when styling is disabled.
pub const STYLING_CONFIGS: [&str; 2] = ["tailwind.config.js", "postcss.config.js"];

/// Template file names that are renamed when written to the target directory.
pub const RENAMES: [(&str, &str); 3] = [
	("gitignore", ".gitignore"),
	("eslintrc.json", ".eslintrc.json"),
	("README-template.md", "README.md"),
];

/// The set of rules that decide which template files are copied and under which name.
#[derive(Debug, Clone)]
pub struct CopySpec {
	patterns: Vec<String>,
	include: GlobSet,
	exclude: GlobSet,
}

impl CopySpec {
	/// Builds the spec for the given options. Everything is included, minus the configs of disabled tools.
	pub fn new(linting: bool, styling: bool) -> AppResult<Self> {
		let mut patterns = vec!["**".to_string()];

		if !linting {
			patterns.push(format!("!{LINT_CONFIG}"));
		}

		if !styling {
			patterns.extend(STYLING_CONFIGS.iter().map(|name| format!("!{name}")));
		}

		Self::from_patterns(patterns)
	}

	/// Builds a spec from a list of glob patterns. Patterns starting with `!` are exclusions.
	pub fn from_patterns(patterns: Vec<String>) -> AppResult<Self> {
		let mut include = GlobSetBuilder::new();
		let mut exclude = GlobSetBuilder::new();

		for pattern in &patterns {
			let (builder, glob) = match pattern.strip_prefix('!') {
				Some(negated) => (&mut exclude, negated),
				None => (&mut include, pattern.as_str()),
			};

			builder.add(
				Glob::new(glob).with_context(|| format!("Could not parse glob pattern `{pattern}`"))?,
			);
		}

		Ok(Self {
			include: include
				.build()
				.context("Could not build the include globset")?,
			exclude: exclude
				.build()
				.context("Could not build the exclude globset")?,
			patterns,
		})
	}

	pub fn patterns(&self) -> &[String] {
		&self.patterns
	}

	/// Checks a path relative to the template root against the filter.
	pub fn includes(&self, rel_path: &Path) -> bool {
		self.include.is_match(rel_path) && !self.exclude.is_match(rel_path)
	}

	/// Applies the rename table to a single file name.
	pub fn rename(file_name: &str) -> &str {
		RENAMES
			.iter()
			.find(|(from, _)| *from == file_name)
			.map_or(file_name, |(_, to)| *to)
	}

	/// The path (relative to the target root) that a template file is written to.
	pub fn target_path(&self, rel_path: &Path) -> PathBuf {
		match rel_path.file_name().and_then(|name| name.to_str()) {
			Some(name) => rel_path.with_file_name(Self::rename(name)),
			None => rel_path.to_path_buf(),
		}
	}
}

/// Copies every file of the template at `source` that passes the filter into `root`, keeping the directory structure.
///
/// Returns the written paths, relative to `root`. A failure aborts the copy without removing what was already written.
pub async fn copy_template(
	source: &Path,
	root: &Path,
	spec: &CopySpec,
	cancel: &CancellationToken,
) -> AppResult<Vec<PathBuf>> {
	tokio::fs::create_dir_all(root)
		.await
		.map_err(|e| AppError::CopyFailure {
			path: root.to_path_buf(),
			source: e,
		})?;

	let entries = list_entries(source)
		.await
		.map_err(|e| AppError::CopyFailure {
			path: source.to_path_buf(),
			source: e,
		})?;

	let mut copied = Vec::new();

	for rel_path in entries {
		check_cancelled(cancel)?;

		let from = source.join(&rel_path);

		let copy_error = |e| AppError::CopyFailure {
			path: from.clone(),
			source: e,
		};

		let metadata = tokio::fs::metadata(&from)
			.await
			.map_err(copy_error)?;

		if !metadata.is_file() || !spec.includes(&rel_path) {
			continue;
		}

		let target_rel = spec.target_path(&rel_path);
		let to = root.join(&target_rel);

		if let Some(parent) = to.parent() {
			tokio::fs::create_dir_all(parent)
				.await
				.map_err(copy_error)?;
		}

		tokio::fs::copy(&from, &to)
			.await
			.map_err(copy_error)?;

		debug!("Copied {}", target_rel.display());

		copied.push(target_rel);
	}

	Ok(copied)
}

#[cfg(test)]
mod test {
	use std::fs::{File, create_dir_all, read_to_string, write};

	use pretty_assertions::assert_eq;

	use super::*;

	fn create_template(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
		create_dir_all(dir.join("pages/api"))?;

		for file in [
			"gitignore",
			"eslintrc.json",
			"README-template.md",
			"tailwind.config.js",
			"postcss.config.js",
			"tsconfig.json",
			".env.example",
			"pages/index.tsx",
			"pages/api/README-template.md",
		] {
			File::create(dir.join(file))?;
		}

		write(dir.join("pages/index.tsx"), "export default function Home() {}")?;

		Ok(())
	}

	#[tokio::test]
	async fn copies_everything_with_renames() -> Result<(), Box<dyn std::error::Error>> {
		let source = tempfile::tempdir()?;
		let target = tempfile::tempdir()?;
		let root = target.path().join("my-app");

		create_template(source.path())?;

		let spec = CopySpec::new(true, true)?;

		let mut copied = copy_template(source.path(), &root, &spec, &CancellationToken::new()).await?;
		copied.sort();

		let expected: Vec<PathBuf> = [
			".env.example",
			".eslintrc.json",
			".gitignore",
			"README.md",
			"pages/api/README.md",
			"pages/index.tsx",
			"postcss.config.js",
			"tailwind.config.js",
			"tsconfig.json",
		]
		.into_iter()
		.map(PathBuf::from)
		.collect();

		assert_eq!(copied, expected);

		for path in &expected {
			assert!(root.join(path).is_file(), "{} is missing", path.display());
		}

		assert_eq!(
			read_to_string(root.join("pages/index.tsx"))?,
			"export default function Home() {}"
		);

		Ok(())
	}

	#[tokio::test]
	async fn excludes_disabled_tools() -> Result<(), Box<dyn std::error::Error>> {
		let source = tempfile::tempdir()?;
		let root = tempfile::tempdir()?;

		create_template(source.path())?;

		let spec = CopySpec::new(false, false)?;

		assert_eq!(
			spec.patterns(),
			[
				"**",
				"!eslintrc.json",
				"!tailwind.config.js",
				"!postcss.config.js"
			]
		);

		copy_template(source.path(), root.path(), &spec, &CancellationToken::new()).await?;

		for absent in [
			".eslintrc.json",
			"eslintrc.json",
			"tailwind.config.js",
			"postcss.config.js",
		] {
			assert!(!root.path().join(absent).exists(), "{absent} was copied");
		}

		assert!(root.path().join(".gitignore").is_file());
		assert!(root.path().join("tsconfig.json").is_file());

		Ok(())
	}

	#[test]
	fn rename_table() {
		assert_eq!(CopySpec::rename("gitignore"), ".gitignore");
		assert_eq!(CopySpec::rename("eslintrc.json"), ".eslintrc.json");
		assert_eq!(CopySpec::rename("README-template.md"), "README.md");
		assert_eq!(CopySpec::rename("README.md"), "README.md");
		assert_eq!(CopySpec::rename("my-gitignore"), "my-gitignore");
	}

	#[tokio::test]
	async fn missing_source_fails_with_copy_error() {
		let target = tempfile::tempdir().unwrap();

		let result = copy_template(
			&target.path().join("nope"),
			&target.path().join("out"),
			&CopySpec::new(true, true).unwrap(),
			&CancellationToken::new(),
		)
		.await;

		assert!(matches!(result, Err(AppError::CopyFailure { .. })));
	}

	#[tokio::test]
	async fn stops_when_cancelled() -> Result<(), Box<dyn std::error::Error>> {
		let source = tempfile::tempdir()?;
		let root = tempfile::tempdir()?;

		create_template(source.path())?;

		let cancel = CancellationToken::new();
		cancel.cancel();

		let result = copy_template(source.path(), root.path(), &CopySpec::new(true, true)?, &cancel).await;

		assert!(matches!(result, Err(AppError::Cancelled)));
		assert!(!root.path().join(".gitignore").exists());

		Ok(())
	}
}
