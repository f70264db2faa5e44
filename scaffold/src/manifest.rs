use indexmap::IndexMap;
use package_json::{JsPackageType, PackageJson};

use crate::*;

/// The name of the generated manifest file.
pub const MANIFEST_FILE: &str = "package.json";

/// Dependencies installed in every project.
pub const BASE_DEPENDENCIES: [&str; 6] = [
	"apollo-couchbase",
	"couchbase",
	"graphql",
	"@graphql-codegen/cli",
	"@graphql-codegen/typescript-resolvers",
	"nodemon",
];

/// Type definitions and compiler, only for typescript projects.
pub const TYPED_DEPENDENCIES: [&str; 2] = ["typescript", "@types/node"];

pub const STYLING_DEPENDENCIES: [&str; 3] = ["tailwindcss", "postcss", "autoprefixer"];

pub const LINTING_DEPENDENCIES: [&str; 1] = ["eslint"];

/// The package descriptor of the generated project, along with the dependencies to install into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectManifest {
	pub package_json: PackageJson,
	/// Package names without versions, in the order in which their groups were added.
	pub dependencies: Vec<String>,
}

impl ProjectManifest {
	pub fn build(options: &InstallOptions) -> Self {
		let mode = options.template.mode;

		let package_json = PackageJson {
			name: options.app_name.clone(),
			version: "0.0.1".to_string(),
			private: true,
			keywords: Vec::new(),
			author: String::new(),
			license: "ISC".to_string(),
			main: "dist/index.js".to_string(),
			type_: JsPackageType::Module,
			scripts: scripts(mode),
			metadata: IndexMap::new(),
		};

		let mut dependencies: Vec<&str> = BASE_DEPENDENCIES.to_vec();

		if mode.is_typed() {
			dependencies.extend(TYPED_DEPENDENCIES);
		}

		if options.styling {
			dependencies.extend(STYLING_DEPENDENCIES);
		}

		if options.linting {
			dependencies.extend(LINTING_DEPENDENCIES);
		}

		Self {
			package_json,
			dependencies: dependencies.into_iter().map(str::to_string).collect(),
		}
	}

	/// Writes the `package.json` file into `root`, replacing it in a single rename.
	pub async fn write(&self, root: &Path) -> AppResult<PathBuf> {
		let path = root.join(MANIFEST_FILE);
		let staging_path = root.join(format!(".{MANIFEST_FILE}.tmp"));

		let content = self
			.package_json
			.to_pretty_string(LINE_ENDING)
			.map_err(|e| AppError::SerializationError {
				file: path.clone(),
				error: e.to_string(),
			})?;

		let write_error = |e| AppError::ManifestWriteFailure {
			path: path.clone(),
			source: e,
		};

		tokio::fs::write(&staging_path, content)
			.await
			.map_err(write_error)?;

		tokio::fs::rename(&staging_path, &path)
			.await
			.map_err(write_error)?;

		Ok(path)
	}
}

fn scripts(mode: TemplateMode) -> IndexMap<String, String> {
	let server_entry = if mode.is_typed() {
		"src/index.ts"
	} else {
		"src/index.js"
	};

	[
		("init", "npm run generate-graphql-types".to_string()),
		("dev", format!("nodemon -r dotenv/config {server_entry}")),
		(
			"generate-graphql-types",
			"graphql-codegen --config codegen.ts".to_string(),
		),
		("generate-resource", "generate-resource".to_string()),
		(
			"postgenerate-resource",
			"npm run generate-graphql-types".to_string(),
		),
	]
	.into_iter()
	.map(|(name, command)| (name.to_string(), command))
	.collect()
}
