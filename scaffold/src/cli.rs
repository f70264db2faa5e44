
use clap::{ArgGroup, Parser};

use crate::{
	config::preferences::{
		JsonFilePreferenceStore, MemoryPreferenceStore, PreferenceStore, load_preferences,
		save_preferences,
	},
	install::{DependencyInstaller, PackageManagerInstaller, is_online},
	*,
};

pub async fn main_entrypoint() -> AppResult {
	let cli = Cli::parse();

	let store: Box<dyn PreferenceStore> = match JsonFilePreferenceStore::from_default_location() {
		Some(store) => Box::new(store),
		None => {
			warn!("Could not find a config directory, preferences will not be saved");
			Box::new(MemoryPreferenceStore::default())
		}
	};

	let cancel = CancellationToken::new();
	let trigger = cancel.clone();

	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			trigger.cancel();
		}
	});

	match cli
		.execute(store.as_ref(), Arc::new(PackageManagerInstaller), &cancel)
		.await?
	{
		CliOutcome::PreferencesReset => println!("Preferences reset successfully"),
		CliOutcome::Created(report) => print_success(&report),
	}

	Ok(())
}

/// What a run of the cli did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliOutcome {
	/// The saved preferences were cleared. No project was created.
	PreferencesReset,
	Created(MaterializeReport),
}

fn print_success(report: &MaterializeReport) {
	let name = &report.manifest.package_json.name;
	let root = report
		.manifest_path
		.parent()
		.unwrap_or(&report.manifest_path);

	println!("Success! Created {name} at {}", root.display());

	if !report.installed {
		println!("The dependencies were not installed. Add them with your package manager of choice:");

		for dep in &report.manifest.dependencies {
			println!("  - {dep}");
		}
	}
}

/// Creates a new Apollo server backed by Couchbase.
#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "create-apollo-couchbase-server", version, about)]
#[command(group(ArgGroup::new("package_manager").args(["use_npm", "use_pnpm", "use_yarn"])))]
pub struct Cli {
	/// The directory of the new project. Its last component is used as the project name.
	#[arg(required_unless_present = "reset_preferences")]
	pub project_directory: Option<PathBuf>,

	/// Initialize as a typescript project. (default)
	#[arg(long, alias = "typescript", conflicts_with = "js")]
	pub ts: bool,

	/// Initialize as a javascript project.
	#[arg(long, alias = "javascript")]
	pub js: bool,

	/// Initialize with the tailwind config. (default)
	#[arg(long, conflicts_with = "no_tailwind")]
	pub tailwind: bool,

	#[arg(long)]
	pub no_tailwind: bool,

	/// Initialize with the eslint config. (default)
	#[arg(long, conflicts_with = "no_eslint")]
	pub eslint: bool,

	#[arg(long)]
	pub no_eslint: bool,

	/// Initialize inside a `src/` directory.
	#[arg(long, conflicts_with = "no_src_dir")]
	pub src_dir: bool,

	#[arg(long)]
	pub no_src_dir: bool,

	/// Specify the import alias to use. [default: "@/*"]
	#[arg(long, value_name = "PREFIX/*")]
	pub import_alias: Option<ImportAlias>,

	/// The name of the template to use. [default: "default"]
	#[arg(long, short)]
	pub template: Option<String>,

	/// Use the default template if the selected one cannot be found.
	#[arg(long)]
	pub fallback_to_default: bool,

	/// The directory containing the templates. [default: the `templates` directory of the source tree this binary was built from, which must still exist]
	#[arg(long, value_name = "DIR")]
	pub templates_dir: Option<PathBuf>,

	/// Bootstrap the project using npm.
	#[arg(long)]
	pub use_npm: bool,

	/// Bootstrap the project using pnpm.
	#[arg(long)]
	pub use_pnpm: bool,

	/// Bootstrap the project using yarn.
	#[arg(long)]
	pub use_yarn: bool,

	/// Only write the project files, without installing the dependencies.
	#[arg(long)]
	pub skip_install: bool,

	/// Forget the preferences saved by previous runs, without creating a project.
	#[arg(long)]
	pub reset_preferences: bool,
}

const fn flag_pair(yes: bool, no: bool) -> Option<bool> {
	match (yes, no) {
		(true, _) => Some(true),
		(_, true) => Some(false),
		_ => None,
	}
}

impl Cli {
	/// The preferences set explicitly with flags.
	pub fn overrides(&self) -> Preferences {
		Preferences {
			typescript: flag_pair(self.ts, self.js),
			eslint: flag_pair(self.eslint, self.no_eslint),
			tailwind: flag_pair(self.tailwind, self.no_tailwind),
			src_dir: flag_pair(self.src_dir, self.no_src_dir),
			import_alias: self.import_alias.clone(),
			template: self.template.clone(),
		}
	}

	/// The package manager selected with flags, or the one that launched the process.
	pub fn package_manager(&self) -> PackageManager {
		if self.use_npm {
			PackageManager::Npm
		} else if self.use_pnpm {
			PackageManager::Pnpm
		} else if self.use_yarn {
			PackageManager::Yarn
		} else {
			PackageManager::detect()
		}
	}

	/// Resolves the options against the stored preferences, materializes the project and saves the preferences.
	///
	/// With `--reset-preferences`, the store is cleared and nothing else happens.
	pub async fn execute(
		self,
		store: &dyn PreferenceStore,
		installer: Arc<dyn DependencyInstaller>,
		cancel: &CancellationToken,
	) -> AppResult<CliOutcome> {
		if self.reset_preferences {
			store.clear()?;
			info!("The saved preferences have been reset");

			return Ok(CliOutcome::PreferencesReset);
		}

		let project_directory = self
			.project_directory
			.as_deref()
			.context("A project directory is required")?;

		let stored = load_preferences(store)?;
		let preferences = Preferences::layered(self.overrides(), stored);

		debug!("Resolved preferences: {preferences:?}");

		let package_manager = self.package_manager();

		let is_online = if self.skip_install || matches!(package_manager, PackageManager::Npm) {
			true
		} else {
			is_online().await
		};

		if !is_online {
			warn!("You appear to be offline. Falling back to the local cache");
		}

		let options = InstallOptions::new(
			project_directory,
			&preferences,
			InstallFlags {
				package_manager,
				is_online,
			},
		)
		.await?;

		let locator = self
			.templates_dir
			.map_or_else(TemplateLocator::bundled, TemplateLocator::new);

		let report = Materializer::new(locator, installer)
			.fallback_to_default(self.fallback_to_default)
			.skip_install(self.skip_install)
			.materialize(&options, cancel)
			.await?;

		// Remember the template that was used, not the one that was missing
		let used = Preferences {
			template: Some(report.template.name.clone()),
			..preferences
		};

		save_preferences(store, &used)?;

		Ok(CliOutcome::Created(report))
	}
}
