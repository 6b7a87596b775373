//! Process configuration, loaded once from a JSON document at startup.
//!
//! Read-to-string plus `serde_json::from_str`, raising a typed error instead
//! of panicking on a missing or malformed file.

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

const CONFIG_ENV_VAR: &str = "S3_REPO_CFG";
const CONFIG_DOTFILE: &str = ".s3repo.cfg";

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
	pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
	pub default_bucket: String,
	pub backup_bucket: String,
	#[serde(default)]
	pub region: Option<String>,
	#[serde(default)]
	pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FsConfig {
	pub published_stale_seconds: i64,
	pub unpublished_stale_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
	pub local: BackupLocalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupLocalConfig {
	pub path: PathBuf,
}

/// The single configuration document recognized at process start.
///
/// Dotted keys in the JSON document (`s3.default_bucket`,
/// `fs.published_stale_seconds`, `backup.local.path`) are nested objects —
/// serde maps `s3`/`fs`/`backup` onto [`S3Config`], [`FsConfig`],
/// [`BackupConfig`] respectively.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoConfig {
	pub database: DatabaseConfig,
	pub s3_access_key: String,
	pub s3_secret_key: String,
	pub s3: S3Config,
	pub local_root: PathBuf,
	pub fs: FsConfig,
	pub backup: BackupConfig,
	pub num_backups: u32,
}

impl RepoConfig {
	/// Resolves the configuration path: `$S3_REPO_CFG`, else `~/.s3repo.cfg`.
	pub fn config_path() -> CoreResult<PathBuf> {
		if let Ok(from_env) = env::var(CONFIG_ENV_VAR) {
			return Ok(PathBuf::from(from_env));
		}

		dirs::home_dir()
			.map(|home| home.join(CONFIG_DOTFILE))
			.ok_or_else(|| {
				CoreError::NoConfiguration(format!(
					"neither ${CONFIG_ENV_VAR} nor a resolvable home directory is set"
				))
			})
	}

	/// Loads configuration from the resolved path.
	pub fn load() -> CoreResult<Self> {
		let path = Self::config_path()?;
		Self::load_from(&path)
	}

	/// Loads configuration from an explicit path, for tests and tooling.
	pub fn load_from(path: &Path) -> CoreResult<Self> {
		if !path.exists() {
			return Err(CoreError::NoConfiguration(format!(
				"configuration file not found at {}",
				path.display()
			)));
		}

		let content = std::fs::read_to_string(path)?;
		let config: Self = serde_json::from_str(&content).map_err(|err| {
			CoreError::NoConfiguration(format!(
				"configuration at {} failed to parse: {err}",
				path.display()
			))
		})?;

		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = r#"{
		"database": { "url": "postgres://localhost/s3repo" },
		"s3_access_key": "AKIA...",
		"s3_secret_key": "secret",
		"s3": { "default_bucket": "content", "backup_bucket": "content-backups" },
		"local_root": "/var/lib/s3repo/cache",
		"fs": { "published_stale_seconds": 86400, "unpublished_stale_seconds": 3600 },
		"backup": { "local": { "path": "/var/lib/s3repo/backup-staging" } },
		"num_backups": 10
	}"#;

	#[test]
	fn parses_a_well_formed_document() {
		let config: RepoConfig = serde_json::from_str(SAMPLE).expect("valid config parses");
		assert_eq!(config.database.url, "postgres://localhost/s3repo");
		assert_eq!(config.s3.default_bucket, "content");
		assert_eq!(config.s3.region, None);
		assert_eq!(config.fs.published_stale_seconds, 86400);
		assert_eq!(config.num_backups, 10);
	}

	#[test]
	fn load_from_reports_no_configuration_for_a_missing_path() {
		let err = RepoConfig::load_from(Path::new("/nonexistent/path/to/.s3repo.cfg")).unwrap_err();
		assert!(matches!(err, CoreError::NoConfiguration(_)));
	}

	#[test]
	fn load_from_reports_no_configuration_for_malformed_json() {
		let dir = tempfile::tempdir().expect("tempdir");
		let path = dir.path().join("bad.cfg");
		std::fs::write(&path, "{ not json").unwrap();

		let err = RepoConfig::load_from(&path).unwrap_err();
		assert!(matches!(err, CoreError::NoConfiguration(_)));
	}
}
