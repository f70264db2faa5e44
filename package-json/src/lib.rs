use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;

/// A struct representing the contents of the `package.json` file of a generated project.
///
/// Fields are serialized in declaration order, which is the order in which they appear in the output file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct PackageJson {
	/// The name of the package.
	pub name: String,

	/// Version must be parsable by node-semver, which is bundled with npm as a dependency.
	pub version: String,

	/// If set to true, then npm will refuse to publish it.
	pub private: bool,

	/// This helps people discover your package, as it's listed in 'npm search'.
	pub keywords: Vec<String>,

	/// The author of this package.
	pub author: String,

	/// You should specify a license for your package so that people know how they are permitted to use it, and any restrictions you're placing on it.
	pub license: String,

	/// The main field is a module ID that is the primary entry point to your program.
	pub main: String,

	/// When set to `module`, the type field allows a package to specify all .js files within are ES modules. If the `type` field is omitted or set to `commonjs`, all .js files are treated as CommonJS.
	#[serde(rename = "type")]
	pub type_: JsPackageType,

	/// A map of shell scripts to launch from the root of the package. Insertion order is preserved.
	pub scripts: IndexMap<String, String>,

	/// Any other field, such as the dependency maps added by a package manager after installation.
	#[serde(skip_serializing_if = "IndexMap::is_empty")]
	#[serde(flatten)]
	pub metadata: IndexMap<String, Value>,
}

impl Default for PackageJson {
	fn default() -> Self {
		Self {
			name: String::new(),
			version: "0.1.0".to_string(),
			private: true,
			keywords: Vec::new(),
			author: String::new(),
			license: "ISC".to_string(),
			main: "index.js".to_string(),
			type_: JsPackageType::Module,
			scripts: IndexMap::new(),
			metadata: IndexMap::new(),
		}
	}
}

impl PackageJson {
	/// Serializes the manifest with 2-space indentation, followed by the given line ending.
	pub fn to_pretty_string(&self, line_ending: &str) -> serde_json::Result<String> {
		let mut content = serde_json::to_string_pretty(self)?;

		content.push_str(line_ending);

		Ok(content)
	}
}

/// The type of JS package.
#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
pub enum JsPackageType {
	#[serde(rename = "module")]
	#[default]
	Module,
	#[serde(rename = "commonjs")]
	CommonJs,
}

impl Display for JsPackageType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Module => write!(f, "module"),
			Self::CommonJs => write!(f, "commonjs"),
		}
	}
}
