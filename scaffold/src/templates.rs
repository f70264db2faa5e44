pub mod copy;

use std::path::Component;

use crate::*;

/// The name of the template used when none is specified.
pub const DEFAULT_TEMPLATE: &str = "default";

/// The language variant of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TemplateMode {
	/// Plain javascript.
	Js,
	/// Typescript.
	#[default]
	Ts,
}

impl TemplateMode {
	/// The language config file holding the import alias mapping.
	pub const fn config_file(self) -> &'static str {
		match self {
			Self::Js => "jsconfig.json",
			Self::Ts => "tsconfig.json",
		}
	}

	/// The extension of the generated page files.
	pub const fn page_extension(self) -> &'static str {
		match self {
			Self::Js => "js",
			Self::Ts => "tsx",
		}
	}

	/// Returns `true` if the mode is [`Ts`].
	///
	/// [`Ts`]: TemplateMode::Ts
	#[must_use]
	pub const fn is_typed(self) -> bool {
		matches!(self, Self::Ts)
	}
}

impl Display for TemplateMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Js => write!(f, "js"),
			Self::Ts => write!(f, "ts"),
		}
	}
}

/// Identifies a template variant on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSelector {
	pub name: String,
	pub mode: TemplateMode,
}

impl TemplateSelector {
	pub fn new(name: impl Into<String>, mode: TemplateMode) -> Self {
		Self {
			name: name.into(),
			mode,
		}
	}

	/// Templates whose name starts with `app` use the app-based routing convention.
	pub fn is_app_router(&self) -> bool {
		self.name.starts_with("app")
	}

	/// Returns the same selector pointing to the default template.
	#[must_use]
	pub fn with_default_template(&self) -> Self {
		Self::new(DEFAULT_TEMPLATE, self.mode)
	}
}

/// Resolves [`TemplateSelector`]s to directories below a templates root.
#[derive(Debug, Clone)]
pub struct TemplateLocator {
	root: PathBuf,
}

impl Default for TemplateLocator {
	fn default() -> Self {
		Self::bundled()
	}
}

impl TemplateLocator {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// The templates that ship with this crate.
	///
	/// The path is fixed at build time, so a binary moved away from its source tree needs an explicit templates root.
	pub fn bundled() -> Self {
		Self::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates"))
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Returns the path to the template source directory, failing with [`AppError::TemplateNotFound`] if it does not exist.
	pub async fn locate(&self, selector: &TemplateSelector) -> AppResult<PathBuf> {
		let path = self
			.root
			.join(&selector.name)
			.join(selector.mode.to_string());

		let not_found = || AppError::TemplateNotFound {
			name: selector.name.clone(),
			mode: selector.mode,
			path: path.clone(),
		};

		// Names must stay inside the templates root
		let mut name_components = Path::new(&selector.name).components();
		if !matches!(
			(name_components.next(), name_components.next()),
			(Some(Component::Normal(_)), None)
		) {
			return Err(not_found());
		}

		match tokio::fs::metadata(&path).await {
			Ok(metadata) if metadata.is_dir() => Ok(path),
			_ => Err(not_found()),
		}
	}
}
