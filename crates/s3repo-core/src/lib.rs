//! s3repo-core — the metadata-and-lifecycle engine of the content
//! repository: entities, the bucket/path/host registry, the tag catalog,
//! the file lifecycle engine, the tag-predicate query engine, the
//! maintenance loops, and backup/restore.
//!
//! This crate never links an object-store SDK; it depends only on
//! [`object_store::ObjectStore`]. Concrete backends live in `s3repo-store`.

pub mod backup;
pub mod config;
pub mod context;
pub mod entities;
pub mod entity_ops;
pub mod error;
pub mod lifecycle;
pub mod maintenance;
pub mod migration;
pub mod object_store;
pub mod query;
pub mod registry;
pub mod tags;

pub use config::RepoConfig;
pub use context::RepoContext;
pub use error::{CoreError, CoreResult};
pub use lifecycle::AddFileOptions;
pub use object_store::ObjectStore;
pub use query::TagPredicate;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Statement};
use sea_orm_migration::MigratorTrait;

use entities::{file, path};

/// `get_file(path) -> current File | ∅`: resolves the `Path` row, then its
/// unique `published ∧ ¬expired` row, if any.
pub async fn get_file(ctx: &RepoContext, local_path: &str) -> CoreResult<Option<file::Model>> {
	let Some(path_row) = path::Entity::find()
		.filter(path::Column::LocalPath.eq(local_path))
		.one(&ctx.db())
		.await?
	else {
		return Ok(None);
	};

	let current = file::Entity::find()
		.filter(file::Column::PathId.eq(path_row.path_id))
		.filter(file::Column::Published.eq(true))
		.filter(file::Column::DateExpired.is_null())
		.one(&ctx.db())
		.await?;

	Ok(current)
}

/// Creates the repository's schema from nothing. Fails with
/// [`CoreError::RepoAlreadyExists`] if the `files` table is already present
/// — ordinary migrations are idempotent and happy to run again, but this
/// entry point is the explicit "first run" contract.
pub async fn create_repository<C: ConnectionTrait>(db: &C) -> CoreResult<()> {
	let exists = db
		.query_one(Statement::from_string(
			db.get_database_backend(),
			"SELECT to_regclass('s3_repo.files') IS NOT NULL AS exists_flag".to_owned(),
		))
		.await?
		.map(|row| row.try_get::<bool>("", "exists_flag").unwrap_or(false))
		.unwrap_or(false);

	if exists {
		return Err(CoreError::RepoAlreadyExists);
	}

	migration::Migrator::up(db, None).await?;
	Ok(())
}
