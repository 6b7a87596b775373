//! `RepoContext` — the explicit handle every operation in this crate takes.
//!
//! Connects, configures, and hands back a pooled `DatabaseConnection` the
//! way a single shared database handle normally would, but carries an
//! object-store handle, identity caches, and the offline flag as explicit
//! fields on the struct rather than behind a process-global.

use std::env;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sea_orm::{
	ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection,
	DatabaseTransaction, DbErr, ExecResult, QueryResult, Statement, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::config::RepoConfig;
use crate::error::{CoreError, CoreResult};
use crate::migration::Migrator;
use crate::object_store::ObjectStore;
use crate::registry::IdentityCache;

/// The connection a call actually runs against: the pooled connection when
/// no ambient transaction is open, or the open transaction when one is —
/// transparently, so `lifecycle`/`tags`/`registry` never branch on which.
///
/// Cloning a `Txn` variant clones the `Arc`, not the transaction; the
/// transaction itself is consumed exactly once, by [`RepoContext::commit`]
/// or [`RepoContext::rollback`].
#[derive(Clone)]
pub enum ActiveConnection {
	Pool(DatabaseConnection),
	Txn(Arc<DatabaseTransaction>),
}

#[async_trait]
impl ConnectionTrait for ActiveConnection {
	fn get_database_backend(&self) -> DatabaseBackend {
		match self {
			ActiveConnection::Pool(db) => db.get_database_backend(),
			ActiveConnection::Txn(txn) => txn.get_database_backend(),
		}
	}

	async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
		match self {
			ActiveConnection::Pool(db) => db.execute(stmt).await,
			ActiveConnection::Txn(txn) => txn.execute(stmt).await,
		}
	}

	async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
		match self {
			ActiveConnection::Pool(db) => db.execute_unprepared(sql).await,
			ActiveConnection::Txn(txn) => txn.execute_unprepared(sql).await,
		}
	}

	async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
		match self {
			ActiveConnection::Pool(db) => db.query_one(stmt).await,
			ActiveConnection::Txn(txn) => txn.query_one(stmt).await,
		}
	}

	async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
		match self {
			ActiveConnection::Pool(db) => db.query_all(stmt).await,
			ActiveConnection::Txn(txn) => txn.query_all(stmt).await,
		}
	}
}

/// Object store that answers every call with success and empty results,
/// selected when offline mode is active. Lives here (not in `s3repo-store`)
/// because `RepoContext` needs it unconditionally, even if the `s3repo-store`
/// crate is never linked in.
struct NullObjectStore;

#[async_trait::async_trait]
impl ObjectStore for NullObjectStore {
	async fn put(&self, _bucket: &str, _key: &str, _bytes: bytes::Bytes) -> CoreResult<()> {
		Ok(())
	}

	async fn get(&self, bucket: &str, key: &str) -> CoreResult<bytes::Bytes> {
		Err(crate::error::CoreError::DownloadFailed(
			0,
			format!("offline mode: no object store configured for {bucket}/{key}"),
		))
	}

	async fn delete(&self, _bucket: &str, _key: &str) -> CoreResult<()> {
		Ok(())
	}

	async fn list(&self, _bucket: &str, _prefix: &str) -> CoreResult<Vec<String>> {
		Ok(Vec::new())
	}
}

/// Shared state for one process's interaction with the repository: a
/// database connection, an object-store handle, the loaded configuration,
/// and per-process identity caches for buckets/paths/hosts.
pub struct RepoContext {
	db: DatabaseConnection,
	/// The caller's ambient transaction, opened by [`Self::begin`]. `None`
	/// means every call through [`Self::db`] runs directly against the pool.
	active_txn: Mutex<Option<Arc<DatabaseTransaction>>>,
	object_store: Arc<dyn ObjectStore>,
	config: RepoConfig,
	offline: bool,
	pub(crate) identity_cache: IdentityCache,
}

impl RepoContext {
	/// Connects to the database named in `config`, applying any pending
	/// migrations, and selects the object store per the `OFFLINE` env var
	/// read once here.
	pub async fn connect(config: RepoConfig) -> CoreResult<Self> {
		let offline = env::var("OFFLINE").map(|v| v == "1").unwrap_or(false);

		let mut opt = ConnectOptions::new(config.database.url.clone());
		opt.max_connections(10)
			.min_connections(1)
			.connect_timeout(Duration::from_secs(8))
			.idle_timeout(Duration::from_secs(8 * 60))
			.sqlx_logging(false);

		let db = Database::connect(opt).await?;
		Migrator::up(&db, None).await?;
		info!("connected to repository database and applied migrations");

		let object_store: Arc<dyn ObjectStore> = if offline {
			Arc::new(NullObjectStore)
		} else {
			Arc::new(NullObjectStore) // overridden by `with_object_store` once s3repo-store constructs the real client
		};

		Ok(Self {
			db,
			active_txn: Mutex::new(None),
			object_store,
			config,
			offline,
			identity_cache: IdentityCache::default(),
		})
	}

	/// Builds a context around an already-open connection, for tests.
	pub fn from_parts(
		db: DatabaseConnection,
		object_store: Arc<dyn ObjectStore>,
		config: RepoConfig,
		offline: bool,
	) -> Self {
		Self {
			db,
			active_txn: Mutex::new(None),
			object_store,
			config,
			offline,
			identity_cache: IdentityCache::default(),
		}
	}

	/// Swaps in a concrete object-store implementation (the `s3repo-store`
	/// crate's `OpendalObjectStore`, typically), unless offline mode forces
	/// the null store regardless of what's passed.
	pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
		if !self.offline {
			self.object_store = store;
		}
		self
	}

	/// The connection every operation in this crate actually queries
	/// through: the caller's ambient transaction if one is open via
	/// [`Self::begin`], otherwise the pooled connection directly.
	pub fn db(&self) -> ActiveConnection {
		match self.active_txn.lock().as_ref() {
			Some(txn) => ActiveConnection::Txn(Arc::clone(txn)),
			None => ActiveConnection::Pool(self.db.clone()),
		}
	}

	pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
		&self.object_store
	}

	pub fn config(&self) -> &RepoConfig {
		&self.config
	}

	pub fn is_offline(&self) -> bool {
		self.offline
	}

	/// Opens the ambient transaction every subsequent mutating call through
	/// this context runs against, until [`Self::commit`] or [`Self::rollback`].
	/// Fails with [`CoreError::ApiMisuse`] if one is already open — nesting is
	/// not supported, matching the one-transaction-per-call-chain contract.
	pub async fn begin(&self) -> CoreResult<()> {
		if self.active_txn.lock().is_some() {
			return Err(CoreError::ApiMisuse(
				"an ambient transaction is already open on this context".into(),
			));
		}
		let txn = self.db.begin().await?;
		*self.active_txn.lock() = Some(Arc::new(txn));
		Ok(())
	}

	/// Commits the ambient transaction opened by [`Self::begin`]. A no-op if
	/// none is open.
	pub async fn commit(&self) -> CoreResult<()> {
		let Some(txn) = self.active_txn.lock().take() else {
			return Ok(());
		};
		let txn = Arc::try_unwrap(txn).map_err(|_| {
			CoreError::ApiMisuse(
				"ambient transaction committed while another call still holds it".into(),
			)
		})?;
		txn.commit().await?;
		Ok(())
	}

	/// Rolls back the ambient transaction opened by [`Self::begin`] and
	/// clears the identity cache, so no caller observes a bucket/path/host id
	/// that existed only inside the rolled-back transaction. A no-op (beyond
	/// the cache clear) if no transaction is open.
	pub async fn rollback(&self) -> CoreResult<()> {
		let txn = self.active_txn.lock().take();
		self.identity_cache.clear();
		let Some(txn) = txn else {
			return Ok(());
		};
		let txn = Arc::try_unwrap(txn).map_err(|_| {
			CoreError::ApiMisuse(
				"ambient transaction rolled back while another call still holds it".into(),
			)
		})?;
		txn.rollback().await?;
		Ok(())
	}

	pub fn in_transaction(&self) -> bool {
		self.active_txn.lock().is_some()
	}

	/// Runs `body` atomically: inside the caller's ambient transaction if one
	/// is already open, so it commits/rolls back with everything else the
	/// caller is doing; otherwise inside a transaction scoped to `body` alone,
	/// committed on success and rolled back on error.
	pub async fn atomically<F, Fut, T>(&self, body: F) -> CoreResult<T>
	where
		F: FnOnce(ActiveConnection) -> Fut,
		Fut: Future<Output = CoreResult<T>>,
	{
		if self.in_transaction() {
			return body(self.db()).await;
		}

		let txn = Arc::new(self.db.begin().await?);
		match body(ActiveConnection::Txn(Arc::clone(&txn))).await {
			Ok(value) => {
				let txn = Arc::try_unwrap(txn).map_err(|_| {
					CoreError::ApiMisuse(
						"scoped transaction still referenced at commit time".into(),
					)
				})?;
				txn.commit().await?;
				Ok(value)
			}
			Err(err) => {
				if let Ok(txn) = Arc::try_unwrap(txn) {
					let _ = txn.rollback().await;
				}
				Err(err)
			}
		}
	}
}
