pub mod preferences;

use merge::Merge;

use crate::*;

/// The name of the app, used for the preferences directory.
pub const APP_NAME: &str = "create-apollo-couchbase-server";

/// Entries that may already be present in the project root without being considered conflicts.
pub const ALLOWED_ROOT_ENTRIES: [&str; 20] = [
	".DS_Store",
	".git",
	".gitattributes",
	".gitignore",
	".gitlab-ci.yml",
	".hg",
	".hgcheck",
	".hgignore",
	".idea",
	".npmignore",
	".travis.yml",
	".vscode",
	".yarn",
	"LICENSE",
	"Thumbs.db",
	"docs",
	"mkdocs.yml",
	"npm-debug.log",
	"yarn-debug.log",
	"yarn-error.log",
];

/// The choices that can be remembered between runs.
///
/// Every field is optional so that different sources can be layered on top of each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, Merge)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
	/// Use the typescript variant of the template.
	#[merge(strategy = merge::option::overwrite_none)]
	#[serde(skip_serializing_if = "Option::is_none")]
	pub typescript: Option<bool>,

	/// Include the lint config and its dependencies.
	#[merge(strategy = merge::option::overwrite_none)]
	#[serde(skip_serializing_if = "Option::is_none")]
	pub eslint: Option<bool>,

	/// Include the styling configs and their dependencies.
	#[merge(strategy = merge::option::overwrite_none)]
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tailwind: Option<bool>,

	/// Move the source roots into `src/`.
	#[merge(strategy = merge::option::overwrite_none)]
	#[serde(skip_serializing_if = "Option::is_none")]
	pub src_dir: Option<bool>,

	#[merge(strategy = merge::option::overwrite_none)]
	#[serde(skip_serializing_if = "Option::is_none")]
	pub import_alias: Option<ImportAlias>,

	#[merge(strategy = merge::option::overwrite_none)]
	#[serde(skip_serializing_if = "Option::is_none")]
	pub template: Option<String>,
}

impl Preferences {
	pub fn defaults() -> Self {
		Self {
			typescript: Some(true),
			eslint: Some(true),
			tailwind: Some(true),
			src_dir: Some(false),
			import_alias: Some(ImportAlias::default()),
			template: Some(DEFAULT_TEMPLATE.to_string()),
		}
	}

	/// Combines the layers, from the highest to the lowest priority, on top of the defaults.
	#[must_use]
	pub fn layered(overrides: Self, stored: Self) -> Self {
		let mut preferences = overrides;

		preferences.merge(stored);
		preferences.merge(Self::defaults());

		preferences
	}

	pub fn mode(&self) -> TemplateMode {
		if self.typescript.unwrap_or(true) {
			TemplateMode::Ts
		} else {
			TemplateMode::Js
		}
	}

	pub fn template_selector(&self) -> TemplateSelector {
		TemplateSelector::new(
			self.template.as_deref().unwrap_or(DEFAULT_TEMPLATE),
			self.mode(),
		)
	}
}

/// The validated set of options for a single materialization.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
	/// The name of the project, taken from the last component of the root.
	pub app_name: String,
	/// Absolute path of the directory that will hold the project.
	pub root: PathBuf,
	pub template: TemplateSelector,
	pub package_manager: PackageManager,
	pub is_online: bool,
	pub styling: bool,
	pub linting: bool,
	pub use_src_dir: bool,
	pub import_alias: ImportAlias,
}

impl InstallOptions {
	/// Builds the options from fully layered preferences, checking that the root can receive the project.
	pub async fn new(root: &Path, preferences: &Preferences, flags: InstallFlags) -> AppResult<Self> {
		let root = get_abs_path(root)?;

		let app_name = root
			.file_name()
			.and_then(|name| name.to_str())
			.with_context(|| format!("Could not get a project name from `{}`", root.display()))?
			.to_string();

		check_root_is_empty(&root).await?;

		Ok(Self {
			app_name,
			template: preferences.template_selector(),
			package_manager: flags.package_manager,
			is_online: flags.is_online,
			styling: preferences.tailwind.unwrap_or(true),
			linting: preferences.eslint.unwrap_or(true),
			use_src_dir: preferences.src_dir.unwrap_or(false),
			import_alias: preferences.import_alias.clone().unwrap_or_default(),
			root,
		})
	}

	pub const fn install_flags(&self) -> InstallFlags {
		InstallFlags {
			package_manager: self.package_manager,
			is_online: self.is_online,
		}
	}
}

fn is_allowed_root_entry(name: &str) -> bool {
	ALLOWED_ROOT_ENTRIES.contains(&name)
		|| name.ends_with(".iml")
		|| name.starts_with("npm-debug.log")
		|| name.starts_with("yarn-debug.log")
		|| name.starts_with("yarn-error.log")
}

/// Fails with [`AppError::RootNotEmpty`] if `root` holds entries that could conflict with the template files.
///
/// A missing root is fine.
pub async fn check_root_is_empty(root: &Path) -> AppResult {
	let read_error = |e| AppError::ReadError {
		path: root.to_path_buf(),
		source: e,
	};

	let metadata = match tokio::fs::metadata(root).await {
		Ok(metadata) => metadata,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
		Err(e) => return Err(read_error(e)),
	};

	if !metadata.is_dir() {
		return Err(AppError::RootNotEmpty {
			path: root.to_path_buf(),
			conflicts: vec![root.display().to_string()],
		});
	}

	let mut entries = tokio::fs::read_dir(root).await.map_err(read_error)?;
	let mut conflicts = Vec::new();

	while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
		let name = entry.file_name().to_string_lossy().into_owned();

		if !is_allowed_root_entry(&name) {
			conflicts.push(name);
		}
	}

	if conflicts.is_empty() {
		Ok(())
	} else {
		conflicts.sort();

		Err(AppError::RootNotEmpty {
			path: root.to_path_buf(),
			conflicts,
		})
	}
}
