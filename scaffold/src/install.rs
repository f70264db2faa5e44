use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::process::Command;

use crate::*;

/// The registry host probed to decide whether installs can reach the network.
pub const REGISTRY_HOST: &str = "registry.yarnpkg.com:443";

const ONLINE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// A js package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
	#[default]
	Npm,
	Pnpm,
	Yarn,
}

impl Display for PackageManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Npm => write!(f, "npm"),
			Self::Pnpm => write!(f, "pnpm"),
			Self::Yarn => write!(f, "yarn"),
		}
	}
}

impl PackageManager {
	/// Guesses the package manager from the user agent that package managers set when running a binary (`npm_config_user_agent`).
	pub fn from_user_agent(user_agent: Option<&str>) -> Self {
		match user_agent {
			Some(agent) if agent.starts_with("yarn") => Self::Yarn,
			Some(agent) if agent.starts_with("pnpm") => Self::Pnpm,
			_ => Self::Npm,
		}
	}

	pub fn detect() -> Self {
		Self::from_user_agent(std::env::var("npm_config_user_agent").ok().as_deref())
	}
}

/// Checks whether the package registry can be resolved.
pub async fn is_online() -> bool {
	match tokio::time::timeout(ONLINE_CHECK_TIMEOUT, tokio::net::lookup_host(REGISTRY_HOST)).await {
		Ok(Ok(mut addrs)) => addrs.next().is_some(),
		Ok(Err(e)) => {
			debug!("Could not resolve {REGISTRY_HOST}: {e}");
			false
		}
		Err(_) => {
			debug!("Timed out while resolving {REGISTRY_HOST}");
			false
		}
	}
}

/// The settings that affect how dependencies are installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallFlags {
	pub package_manager: PackageManager,
	pub is_online: bool,
}

/// Installs a list of packages into a project root.
#[async_trait]
pub trait DependencyInstaller: Send + Sync {
	async fn install(
		&self,
		root: &Path,
		dependencies: &[String],
		flags: InstallFlags,
		cancel: &CancellationToken,
	) -> AppResult;
}

/// A fully resolved package manager invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCommand {
	pub program: String,
	pub args: Vec<String>,
	pub envs: Vec<(&'static str, &'static str)>,
}

impl Display for InstallCommand {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.program)?;

		for arg in &self.args {
			write!(f, " {arg}")?;
		}

		Ok(())
	}
}

impl InstallCommand {
	pub fn new(dependencies: &[String], flags: InstallFlags) -> Self {
		let mut args: Vec<String> = match flags.package_manager {
			PackageManager::Npm => ["install", "--save-exact", "--loglevel", "error"]
				.into_iter()
				.map(str::to_string)
				.collect(),
			PackageManager::Pnpm => vec!["add".to_string(), "--save-exact".to_string()],
			PackageManager::Yarn => vec!["add".to_string(), "--exact".to_string()],
		};

		if !flags.is_online && !matches!(flags.package_manager, PackageManager::Npm) {
			args.push("--offline".to_string());
		}

		args.extend(dependencies.iter().cloned());

		Self {
			program: flags.package_manager.to_string(),
			args,
			envs: vec![
				("ADBLOCK", "1"),
				("NODE_ENV", "development"),
				("DISABLE_OPENCOLLECTIVE", "1"),
			],
		}
	}

	/// Runs the command in `cwd`, forwarding its output to the terminal. The child is killed if `cancel` is triggered.
	pub async fn run(&self, cwd: &Path, cancel: &CancellationToken) -> AppResult {
		let install_error = |reason: String| AppError::InstallFailure {
			command: self.to_string(),
			reason,
		};

		let mut child = Command::new(&self.program)
			.args(&self.args)
			.envs(self.envs.iter().copied())
			.current_dir(cwd)
			.stdin(Stdio::inherit())
			.stdout(Stdio::inherit())
			.stderr(Stdio::inherit())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| install_error(format!("Failed to launch the process: {e}")))?;

		let status = tokio::select! {
			biased;
			() = cancel.cancelled() => {
				child
					.kill()
					.await
					.map_err(|e| install_error(format!("Failed to stop the process: {e}")))?;

				return Err(AppError::Cancelled);
			}
			status = child.wait() => status.map_err(|e| install_error(e.to_string()))?,
		};

		if status.success() {
			Ok(())
		} else {
			Err(install_error(format!(
				"Exited with code {}",
				status
					.code()
					.map_or_else(|| "unknown".to_string(), |c| c.to_string())
			)))
		}
	}
}

/// Installs dependencies by launching the selected package manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageManagerInstaller;

#[async_trait]
impl DependencyInstaller for PackageManagerInstaller {
	async fn install(
		&self,
		root: &Path,
		dependencies: &[String],
		flags: InstallFlags,
		cancel: &CancellationToken,
	) -> AppResult {
		if dependencies.is_empty() {
			return Ok(());
		}

		let command = InstallCommand::new(dependencies, flags);

		info!("Running `{command}`");

		command.run(root, cancel).await
	}
}
