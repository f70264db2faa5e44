use std::{io, path::PathBuf};

use thiserror::Error;

use crate::templates::TemplateMode;

pub type AppResult<T = ()> = Result<T, AppError>;

/// The kinds of errors that can occur while scaffolding a project.
#[derive(Debug, Error)]
pub enum AppError {
	// Materialization stages
	#[error("Could not find the template `{name}` ({mode}) at `{path}`")]
	TemplateNotFound {
		name: String,
		mode: TemplateMode,
		path: PathBuf,
	},

	#[error("Failed to copy the template file `{path}`: {source}")]
	CopyFailure { path: PathBuf, source: io::Error },

	#[error("Failed to patch the config file `{path}`: {source}")]
	ConfigPatchFailure { path: PathBuf, source: io::Error },

	#[error("Failed to rewrite the import alias in {} file(s):\n{}", .failures.len(), format_failures(.failures))]
	RewriteFailure { failures: Vec<FileFailure> },

	#[error("Failed to move `{path}` into the source directory: {source}")]
	RestructureFailure { path: PathBuf, source: io::Error },

	#[error("Failed to write the manifest `{path}`: {source}")]
	ManifestWriteFailure { path: PathBuf, source: io::Error },

	#[error("`{command}` has failed: {reason}")]
	InstallFailure { command: String, reason: String },

	#[error("The operation was cancelled")]
	Cancelled,

	// Invalid values
	#[error("The directory `{path}` contains files that could conflict:\n{}", .conflicts.join("\n"))]
	RootNotEmpty {
		path: PathBuf,
		conflicts: Vec<String>,
	},

	#[error("Invalid import alias `{0}`. Import alias must follow the pattern <prefix>/*")]
	InvalidImportAlias(String),

	// I/O errors
	#[error("Could not create the dir `{path}`: {source}")]
	DirCreation { path: PathBuf, source: io::Error },

	#[error("Failed to create or write to the file `{path}`: {source}")]
	WriteError { path: PathBuf, source: io::Error },

	#[error("Could not read the contents of `{path}`: {source}")]
	ReadError { path: PathBuf, source: io::Error },

	#[error("Failed to resolve the absolute path of `{path}`: {source}")]
	PathCanonicalization { path: PathBuf, source: io::Error },

	// Serde errors
	#[error("Error while serializing the content for `{file}`: {error}")]
	SerializationError { file: PathBuf, error: String },

	#[error("Error while deserializing the contents of `{file}`: {error}")]
	DeserializationError { file: PathBuf, error: String },

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

/// A single failed file task, collected while rewriting the import alias.
#[derive(Debug)]
pub struct FileFailure {
	pub path: PathBuf,
	pub source: io::Error,
}

fn format_failures(failures: &[FileFailure]) -> String {
	failures
		.iter()
		.map(|f| format!("  - `{}`: {}", f.path.display(), f.source))
		.collect::<Vec<_>>()
		.join("\n")
}
