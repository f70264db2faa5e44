pub mod gate;

use std::{io, sync::LazyLock};

use regex::Regex;
use tokio::task::JoinSet;

use crate::{alias::gate::ConcurrencyGate, *};

/// The import alias configured in the templates.
pub const DEFAULT_IMPORT_ALIAS: &str = "@/*";

/// The literal token substituted in file contents when a custom alias is chosen.
pub const DEFAULT_ALIAS_PREFIX: &str = "@/";

/// The maximum number of files that are rewritten at the same time.
pub const MAX_CONCURRENT_REWRITES: usize = 8;

/// The files that hold the alias mapping. They are patched separately and never rewritten.
pub const LANGUAGE_CONFIGS: [&str; 2] = ["tsconfig.json", "jsconfig.json"];

const DEFAULT_MAPPING: &str = r#""@/*": ["./*"]"#;
const SRC_DIR_MAPPING: &str = r#""@/*": ["./src/*"]"#;
const DEFAULT_MAPPING_KEY: &str = r#""@/*":"#;

static IMPORT_ALIAS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"^[^\s"*\\]+/\*$"#).expect("Failed to initialize the import alias regex")
});

/// An import alias in the `<prefix>/*` form, such as `@/*` or `~/*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImportAlias(String);

impl ImportAlias {
	pub fn new(alias: impl Into<String>) -> AppResult<Self> {
		let alias = alias.into();

		if IMPORT_ALIAS_REGEX.is_match(&alias) {
			Ok(Self(alias))
		} else {
			Err(AppError::InvalidImportAlias(alias))
		}
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// The alias without its wildcard, as it appears in import statements (`~/*` becomes `~/`).
	pub fn prefix(&self) -> String {
		self.0.replace('*', "")
	}

	pub fn is_default(&self) -> bool {
		self.0 == DEFAULT_IMPORT_ALIAS
	}
}

impl Default for ImportAlias {
	fn default() -> Self {
		Self(DEFAULT_IMPORT_ALIAS.to_string())
	}
}

impl Display for ImportAlias {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for ImportAlias {
	type Err = AppError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s.trim())
	}
}

impl TryFrom<String> for ImportAlias {
	type Error = AppError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl From<ImportAlias> for String {
	fn from(value: ImportAlias) -> Self {
		value.0
	}
}

/// Applies the two alias substitutions to the contents of a `tsconfig.json`/`jsconfig.json` file.
///
/// The source dir mapping must be applied first, because the second replacement removes the default key it looks for.
pub fn patch_alias_mapping(content: &str, alias: &ImportAlias, use_src_dir: bool) -> String {
	let content = if use_src_dir {
		content.replacen(DEFAULT_MAPPING, SRC_DIR_MAPPING, 1)
	} else {
		content.to_string()
	};

	content.replacen(DEFAULT_MAPPING_KEY, &format!("\"{alias}\":"), 1)
}

/// Patches the language config file selected by `mode` in place.
pub async fn patch_language_config(
	root: &Path,
	mode: TemplateMode,
	alias: &ImportAlias,
	use_src_dir: bool,
) -> AppResult {
	let path = root.join(mode.config_file());

	let patch_error = |e| AppError::ConfigPatchFailure {
		path: path.clone(),
		source: e,
	};

	let content = tokio::fs::read_to_string(&path)
		.await
		.map_err(patch_error)?;

	tokio::fs::write(&path, patch_alias_mapping(&content, alias, use_src_dir))
		.await
		.map_err(patch_error)?;

	debug!("Patched {}", path.display());

	Ok(())
}

/// One entry below the root whose content may reference the default alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
	pub rel_path: PathBuf,
}

enum TaskError {
	Cancelled,
	Failed(FileFailure),
}

impl FileTask {
	/// Returns `true` if the file was modified.
	async fn run(
		self,
		root: &Path,
		from: &str,
		to: &str,
		gate: &ConcurrencyGate,
		cancel: &CancellationToken,
	) -> Result<bool, TaskError> {
		let path = root.join(&self.rel_path);

		let fail = |e: io::Error| {
			TaskError::Failed(FileFailure {
				path: path.clone(),
				source: e,
			})
		};

		let _permit = tokio::select! {
			biased;
			() = cancel.cancelled() => return Err(TaskError::Cancelled),
			permit = gate.acquire() => permit.map_err(|e| fail(io::Error::other(e)))?,
		};

		if !tokio::fs::metadata(&path)
			.await
			.map_err(fail)?
			.is_file()
		{
			return Ok(false);
		}

		let bytes = tokio::fs::read(&path).await.map_err(fail)?;

		let Ok(content) = String::from_utf8(bytes) else {
			debug!("Skipping non-text file {}", self.rel_path.display());
			return Ok(false);
		};

		if !content.contains(from) {
			return Ok(false);
		}

		tokio::fs::write(&path, content.replace(from, to))
			.await
			.map_err(fail)?;

		debug!("Rewrote the import alias in {}", self.rel_path.display());

		Ok(true)
	}
}

/// Rewrites the default import alias across a whole tree, with bounded concurrency.
#[derive(Debug, Clone)]
pub struct AliasRewriter {
	alias: ImportAlias,
	gate: Arc<ConcurrencyGate>,
}

impl AliasRewriter {
	pub fn new(alias: ImportAlias) -> Self {
		Self::with_gate(alias, Arc::new(ConcurrencyGate::new(MAX_CONCURRENT_REWRITES)))
	}

	pub const fn with_gate(alias: ImportAlias, gate: Arc<ConcurrencyGate>) -> Self {
		Self { alias, gate }
	}

	pub fn gate(&self) -> &ConcurrencyGate {
		&self.gate
	}

	/// Lists the tasks for every entry below `root`, except the language config files.
	pub async fn collect_tasks(root: &Path) -> io::Result<Vec<FileTask>> {
		Ok(list_entries(root)
			.await?
			.into_iter()
			.filter(|rel_path| !LANGUAGE_CONFIGS.iter().any(|c| rel_path == Path::new(c)))
			.map(|rel_path| FileTask { rel_path })
			.collect())
	}

	/// Replaces every occurrence of the default alias prefix with the configured one, in the contents of every file below `root`.
	///
	/// Failed files do not stop the others. Once every task has settled, all failures are reported together.
	/// Returns the number of modified files.
	pub async fn rewrite_tree(&self, root: &Path, cancel: &CancellationToken) -> AppResult<usize> {
		let tasks = Self::collect_tasks(root)
			.await
			.map_err(|e| AppError::RewriteFailure {
				failures: vec![FileFailure {
					path: root.to_path_buf(),
					source: e,
				}],
			})?;

		let to = self.alias.prefix();

		info!(
			"Rewriting `{DEFAULT_ALIAS_PREFIX}` to `{to}` in {} entries",
			tasks.len()
		);

		let mut set = JoinSet::new();

		for task in tasks {
			let root = root.to_path_buf();
			let to = to.clone();
			let gate = self.gate.clone();
			let cancel = cancel.clone();

			set.spawn(async move {
				task.run(&root, DEFAULT_ALIAS_PREFIX, &to, &gate, &cancel)
					.await
			});
		}

		let mut rewritten = 0;
		let mut cancelled = false;
		let mut failures: Vec<FileFailure> = Vec::new();

		while let Some(joined) = set.join_next().await {
			match joined {
				Ok(Ok(modified)) => {
					if modified {
						rewritten += 1;
					}
				}
				Ok(Err(TaskError::Cancelled)) => cancelled = true,
				Ok(Err(TaskError::Failed(failure))) => failures.push(failure),
				Err(e) => failures.push(FileFailure {
					path: root.to_path_buf(),
					source: io::Error::other(e),
				}),
			}
		}

		if cancelled {
			return Err(AppError::Cancelled);
		}

		if !failures.is_empty() {
			failures.sort_by(|a, b| a.path.cmp(&b.path));

			return Err(AppError::RewriteFailure { failures });
		}

		Ok(rewritten)
	}
}

#[cfg(test)]
mod test {
	use std::fs::{create_dir_all, read_to_string, write};

	use indoc::indoc;
	use pretty_assertions::assert_eq;

	use super::*;

	const TSCONFIG: &str = indoc! {r#"
    {
      "compilerOptions": {
        "paths": {
          "@/*": ["./*"]
        }
      }
    }
  "#};

	fn alias(s: &str) -> ImportAlias {
		ImportAlias::new(s).unwrap()
	}

	#[test]
	fn alias_validation() {
		for valid in ["@/*", "~/*", "#app/*", "@scope/lib/*"] {
			assert!(ImportAlias::new(valid).is_ok(), "{valid} should be valid");
		}

		for invalid in ["@", "~/", "/*", "foo/*/bar", "a b/*", "\"x\"/*", r"a\/*", ""] {
			assert!(
				matches!(ImportAlias::new(invalid), Err(AppError::InvalidImportAlias(_))),
				"{invalid} should be invalid"
			);
		}

		assert_eq!(alias("~/*").prefix(), "~/");
		assert!(alias("@/*").is_default());
		assert!(!alias("~/*").is_default());
	}

	#[test]
	fn mapping_patch_with_src_dir_and_custom_alias() {
		let patched = patch_alias_mapping(TSCONFIG, &alias("~/*"), true);

		assert!(patched.contains(r#""~/*": ["./src/*"]"#));
		assert!(!patched.contains(r#""~/*": ["./*"]"#));
		assert!(!patched.contains("@/"));
	}

	#[test]
	fn mapping_patch_variants() {
		assert_eq!(patch_alias_mapping(TSCONFIG, &alias("@/*"), false), TSCONFIG);

		assert!(
			patch_alias_mapping(TSCONFIG, &alias("@/*"), true).contains(r#""@/*": ["./src/*"]"#)
		);

		assert!(
			patch_alias_mapping(TSCONFIG, &alias("#root/*"), false)
				.contains(r##""#root/*": ["./*"]"##)
		);
	}

	#[tokio::test]
	async fn patches_the_config_selected_by_mode() -> Result<(), Box<dyn std::error::Error>> {
		let root = tempfile::tempdir()?;

		write(root.path().join("jsconfig.json"), TSCONFIG)?;
		write(root.path().join("tsconfig.json"), TSCONFIG)?;

		patch_language_config(root.path(), TemplateMode::Js, &alias("~/*"), true).await?;

		assert!(read_to_string(root.path().join("jsconfig.json"))?.contains(r#""~/*": ["./src/*"]"#));
		assert_eq!(read_to_string(root.path().join("tsconfig.json"))?, TSCONFIG);

		Ok(())
	}

	#[tokio::test]
	async fn missing_config_is_a_patch_failure() {
		let root = tempfile::tempdir().unwrap();

		let result = patch_language_config(root.path(), TemplateMode::Ts, &alias("~/*"), false).await;

		assert!(matches!(result, Err(AppError::ConfigPatchFailure { .. })));
	}

	#[tokio::test]
	async fn rewrite_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
		let root = tempfile::tempdir()?;
		let page = root.path().join("pages/index.tsx");

		create_dir_all(root.path().join("pages"))?;
		write(
			&page,
			indoc! {r#"
        import Button from "@/components/button";
        import { db } from "@/lib/couchbase";
      "#},
		)?;

		let rewriter = AliasRewriter::new(alias("~/*"));
		let expected = indoc! {r#"
      import Button from "~/components/button";
      import { db } from "~/lib/couchbase";
    "#};

		assert_eq!(rewriter.rewrite_tree(root.path(), &CancellationToken::new()).await?, 1);
		assert_eq!(read_to_string(&page)?, expected);

		assert_eq!(rewriter.rewrite_tree(root.path(), &CancellationToken::new()).await?, 0);
		assert_eq!(read_to_string(&page)?, expected);

		Ok(())
	}

	#[tokio::test]
	async fn skips_language_configs() -> Result<(), Box<dyn std::error::Error>> {
		let root = tempfile::tempdir()?;

		create_dir_all(root.path().join("nested"))?;

		for config in LANGUAGE_CONFIGS {
			write(root.path().join(config), TSCONFIG)?;
		}
		// Only the root configs are excluded
		write(root.path().join("nested/tsconfig.json"), TSCONFIG)?;
		write(root.path().join(".env"), "ALIAS=@/")?;

		AliasRewriter::new(alias("#/*"))
			.rewrite_tree(root.path(), &CancellationToken::new())
			.await?;

		for config in LANGUAGE_CONFIGS {
			assert_eq!(read_to_string(root.path().join(config))?, TSCONFIG);
		}

		assert!(read_to_string(root.path().join("nested/tsconfig.json"))?.contains(r##""#/*""##));
		assert_eq!(read_to_string(root.path().join(".env"))?, "ALIAS=#/");

		Ok(())
	}

	#[tokio::test]
	async fn bounded_concurrency() -> Result<(), Box<dyn std::error::Error>> {
		let root = tempfile::tempdir()?;

		for i in 0..100 {
			let dir = root.path().join(format!("dir{}", i % 7));
			create_dir_all(&dir)?;
			write(dir.join(format!("file{i}.ts")), format!("import x{i} from \"@/x{i}\";"))?;
		}

		let gate = Arc::new(ConcurrencyGate::new(MAX_CONCURRENT_REWRITES));
		let rewriter = AliasRewriter::with_gate(alias("~/*"), gate.clone());

		let rewritten = rewriter
			.rewrite_tree(root.path(), &CancellationToken::new())
			.await?;

		assert_eq!(rewritten, 100);
		// Directories are admitted too, then skipped after the stat check
		assert_eq!(gate.admitted(), 107);
		assert!(gate.peak() <= MAX_CONCURRENT_REWRITES);
		assert!(gate.peak() >= 1);
		assert_eq!(gate.in_flight(), 0);

		Ok(())
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn failures_are_aggregated() -> Result<(), Box<dyn std::error::Error>> {
		let root = tempfile::tempdir()?;

		write(root.path().join("ok.ts"), "import a from \"@/a\";")?;
		std::os::unix::fs::symlink(root.path().join("gone1"), root.path().join("broken1.ts"))?;
		std::os::unix::fs::symlink(root.path().join("gone2"), root.path().join("broken2.ts"))?;

		let rewriter = AliasRewriter::new(alias("~/*"));

		let result = rewriter
			.rewrite_tree(root.path(), &CancellationToken::new())
			.await;

		match result {
			Err(AppError::RewriteFailure { failures }) => {
				let paths: Vec<_> = failures.iter().map(|f| f.path.clone()).collect();

				assert_eq!(
					paths,
					vec![root.path().join("broken1.ts"), root.path().join("broken2.ts")]
				);
			}
			other => panic!("Expected a rewrite failure, got {other:?}"),
		}

		// The sibling was still rewritten
		assert_eq!(read_to_string(root.path().join("ok.ts"))?, "import a from \"~/a\";");
		assert_eq!(rewriter.gate().in_flight(), 0);

		Ok(())
	}

	#[tokio::test]
	async fn cancelled_rewrite() -> Result<(), Box<dyn std::error::Error>> {
		let root = tempfile::tempdir()?;

		write(root.path().join("a.ts"), "import a from \"@/a\";")?;

		let cancel = CancellationToken::new();
		cancel.cancel();

		let result = AliasRewriter::new(alias("~/*"))
			.rewrite_tree(root.path(), &cancel)
			.await;

		assert!(matches!(result, Err(AppError::Cancelled)));
		assert_eq!(read_to_string(root.path().join("a.ts"))?, "import a from \"@/a\";");

		Ok(())
	}
}
