//! Shared test fixture: a fresh `s3_repo` schema against a real Postgres
//! instance reached via `TEST_DATABASE_URL`, and an in-memory
//! [`s3repo_core::ObjectStore`] double standing in for the S3-compatible
//! backend — only the object store, an external collaborator this crate
//! never links an SDK for, is faked.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use sea_orm::{ConnectionTrait, Database};
use tempfile::TempDir;

use s3repo_core::config::{BackupConfig, BackupLocalConfig, DatabaseConfig, FsConfig, RepoConfig, S3Config};
use s3repo_core::{CoreError, CoreResult, ObjectStore, RepoContext};

#[derive(Default)]
pub struct InMemoryObjectStore {
	objects: Mutex<HashMap<(String, String), Bytes>>,
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
	async fn put(&self, bucket: &str, key: &str, bytes: Bytes) -> CoreResult<()> {
		self.objects
			.lock()
			.insert((bucket.to_owned(), key.to_owned()), bytes);
		Ok(())
	}

	async fn get(&self, bucket: &str, key: &str) -> CoreResult<Bytes> {
		self.objects
			.lock()
			.get(&(bucket.to_owned(), key.to_owned()))
			.cloned()
			.ok_or_else(|| CoreError::DownloadFailed(0, format!("no object at {bucket}/{key}")))
	}

	async fn delete(&self, bucket: &str, key: &str) -> CoreResult<()> {
		self.objects.lock().remove(&(bucket.to_owned(), key.to_owned()));
		Ok(())
	}

	async fn list(&self, bucket: &str, prefix: &str) -> CoreResult<Vec<String>> {
		Ok(self
			.objects
			.lock()
			.keys()
			.filter(|(b, k)| b == bucket && k.starts_with(prefix))
			.map(|(_, k)| k.clone())
			.collect())
	}
}

impl InMemoryObjectStore {
	/// Corrupts a stored object's bytes in place, for digest-mismatch tests.
	pub fn corrupt(&self, bucket: &str, key: &str) {
		if let Some(bytes) = self.objects.lock().get_mut(&(bucket.to_owned(), key.to_owned())) {
			let mut mutated = bytes.to_vec();
			mutated.push(0xFF);
			*bytes = Bytes::from(mutated);
		}
	}
}

/// A connected [`RepoContext`] against a freshly-reset `s3_repo` schema,
/// paired with the temp directory backing its local cache so the directory
/// lives as long as the context does.
pub struct TestEnv {
	pub ctx: RepoContext,
	pub store: Arc<InMemoryObjectStore>,
	_local_root: TempDir,
}

/// Connects to `TEST_DATABASE_URL`, drops and recreates the `s3_repo`
/// schema, and returns a ready [`TestEnv`]. Returns `None` (after printing
/// a notice) when the variable is unset, so the test suite degrades
/// gracefully without a database available.
pub async fn fresh_env() -> Option<TestEnv> {
	fresh_env_with_staleness(3600, 3600).await
}

/// Like [`fresh_env`], but with explicit `fs.published_stale_seconds` /
/// `fs.unpublished_stale_seconds`, for maintenance tests that need files to
/// read as immediately stale without sleeping.
pub async fn fresh_env_with_staleness(
	published_stale_seconds: i64,
	unpublished_stale_seconds: i64,
) -> Option<TestEnv> {
	let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
		eprintln!("skipping: TEST_DATABASE_URL is not set");
		return None;
	};

	let db = Database::connect(&url)
		.await
		.expect("connect to TEST_DATABASE_URL");
	db.execute_unprepared("DROP SCHEMA IF EXISTS s3_repo CASCADE")
		.await
		.expect("reset s3_repo schema");

	let local_root = tempfile::tempdir().expect("create temp local_root");

	let config = RepoConfig {
		database: DatabaseConfig { url: url.clone() },
		s3_access_key: "test-access-key".to_owned(),
		s3_secret_key: "test-secret-key".to_owned(),
		s3: S3Config {
			default_bucket: "default-bucket".to_owned(),
			backup_bucket: "backup-bucket".to_owned(),
			region: None,
			endpoint: None,
		},
		local_root: local_root.path().to_path_buf(),
		fs: FsConfig {
			published_stale_seconds,
			unpublished_stale_seconds,
		},
		backup: BackupConfig {
			local: BackupLocalConfig {
				path: local_root.path().join("backup-local"),
			},
		},
		num_backups: 3,
	};

	let store = Arc::new(InMemoryObjectStore::default());
	let ctx = RepoContext::connect(config)
		.await
		.expect("connect RepoContext")
		.with_object_store(store.clone());

	Some(TestEnv {
		ctx,
		store,
		_local_root: local_root,
	})
}
