use crate::{
	alias::{AliasRewriter, patch_language_config},
	install::{DependencyInstaller, PackageManagerInstaller},
	layout::restructure,
	manifest::ProjectManifest,
	templates::copy::{CopySpec, copy_template},
	*,
};

/// What a successful materialization produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeReport {
	/// The template that was actually used, which differs from the requested one after a fallback.
	pub template: TemplateSelector,
	/// The copied files, relative to the root.
	pub copied: Vec<PathBuf>,
	/// How many files had their import alias rewritten.
	pub rewritten: usize,
	pub manifest: ProjectManifest,
	pub manifest_path: PathBuf,
	/// Whether the installer was invoked.
	pub installed: bool,
}

/// Runs every stage that turns a template into a ready project, in order.
#[derive(Clone)]
pub struct Materializer {
	locator: TemplateLocator,
	installer: Arc<dyn DependencyInstaller>,
	fallback_to_default: bool,
	skip_install: bool,
}

impl std::fmt::Debug for Materializer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Materializer")
			.field("locator", &self.locator)
			.field("fallback_to_default", &self.fallback_to_default)
			.field("skip_install", &self.skip_install)
			.finish_non_exhaustive()
	}
}

impl Default for Materializer {
	fn default() -> Self {
		Self::new(TemplateLocator::bundled(), Arc::new(PackageManagerInstaller))
	}
}

impl Materializer {
	pub fn new(locator: TemplateLocator, installer: Arc<dyn DependencyInstaller>) -> Self {
		Self {
			locator,
			installer,
			fallback_to_default: false,
			skip_install: false,
		}
	}

	/// Uses the default template when the requested one does not exist.
	#[must_use]
	pub const fn fallback_to_default(mut self, enabled: bool) -> Self {
		self.fallback_to_default = enabled;
		self
	}

	/// Writes the manifest without installing the dependencies.
	#[must_use]
	pub const fn skip_install(mut self, enabled: bool) -> Self {
		self.skip_install = enabled;
		self
	}

	async fn locate(&self, selector: &TemplateSelector) -> AppResult<(TemplateSelector, PathBuf)> {
		match self.locator.locate(selector).await {
			Ok(path) => Ok((selector.clone(), path)),
			Err(AppError::TemplateNotFound { path, .. })
				if self.fallback_to_default && selector.name != DEFAULT_TEMPLATE =>
			{
				warn!(
					"Template `{}` not found at `{}`, using `{DEFAULT_TEMPLATE}` instead",
					selector.name,
					path.display()
				);

				let fallback = selector.with_default_template();
				let path = self.locator.locate(&fallback).await?;

				Ok((fallback, path))
			}
			Err(e) => Err(e),
		}
	}

	/// Materializes the template described by `options` into `options.root`.
	///
	/// A failure or a cancellation leaves whatever was already written in place.
	pub async fn materialize(
		&self,
		options: &InstallOptions,
		cancel: &CancellationToken,
	) -> AppResult<MaterializeReport> {
		let root = options.root.as_path();

		let (template, source) = self.locate(&options.template).await?;

		check_cancelled(cancel)?;

		info!(
			"Copying the `{}` template ({}) into {}",
			template.name,
			template.mode,
			root.display()
		);

		let copy_spec = CopySpec::new(options.linting, options.styling)?;
		let copied = copy_template(&source, root, &copy_spec, cancel).await?;

		check_cancelled(cancel)?;

		patch_language_config(
			root,
			template.mode,
			&options.import_alias,
			options.use_src_dir,
		)
		.await?;

		let rewritten = if options.import_alias.is_default() {
			0
		} else {
			AliasRewriter::new(options.import_alias.clone())
				.rewrite_tree(root, cancel)
				.await?
		};

		if options.use_src_dir {
			check_cancelled(cancel)?;

			info!("Moving the source directories into `src`");

			restructure(root, &template, options.styling, cancel).await?;
		}

		check_cancelled(cancel)?;

		let manifest = ProjectManifest::build(options);
		let manifest_path = manifest.write(root).await?;

		debug!("Wrote {}", manifest_path.display());

		let installed = if self.skip_install {
			info!("Skipping the installation of the dependencies");
			false
		} else {
			check_cancelled(cancel)?;

			info!(
				"Installing dependencies with {}:\n{}",
				options.package_manager,
				manifest
					.dependencies
					.iter()
					.map(|dep| format!("- {dep}"))
					.collect::<Vec<_>>()
					.join("\n")
			);

			self.installer
				.install(
					root,
					&manifest.dependencies,
					options.install_flags(),
					cancel,
				)
				.await?;

			true
		};

		Ok(MaterializeReport {
			template,
			copied,
			rewritten,
			manifest,
			manifest_path,
			installed,
		})
	}
}
