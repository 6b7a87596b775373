//! Derived views used by the query engine and the maintenance loops.
//!
//! These have no sea_query column/table primitives worth reaching for —
//! they're expressed the way the partial unique index is, as raw SQL run
//! through `execute_unprepared`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		let db = manager.get_connection();

		db.execute_unprepared(
			"CREATE VIEW s3_repo.current_files AS \
			 SELECT * FROM s3_repo.files WHERE published AND date_expired IS NULL",
		)
		.await?;

		db.execute_unprepared(
			"CREATE VIEW s3_repo.all_file_tags AS \
			 SELECT file_id, tag_id FROM s3_repo.file_tags \
			 UNION \
			 SELECT f.file_id, pt.tag_id \
			 FROM s3_repo.files f \
			 JOIN s3_repo.path_tags pt ON pt.path_id = f.path_id",
		)
		.await?;

		db.execute_unprepared(
			"CREATE VIEW s3_repo.current_file_tags AS \
			 SELECT aft.file_id, aft.tag_id \
			 FROM s3_repo.all_file_tags aft \
			 JOIN s3_repo.current_files cf ON cf.file_id = aft.file_id",
		)
		.await?;

		db.execute_unprepared(
			"CREATE VIEW s3_repo.deletable_files AS \
			 SELECT f.* FROM s3_repo.files f \
			 WHERE NOT f.published \
			   AND f.date_expired IS NOT NULL \
			   AND NOT EXISTS ( \
			       SELECT 1 FROM s3_repo.downloads d WHERE d.file_id = f.file_id \
			   )",
		)
		.await?;

		// overflow_bytes is NULL for hosts with no configured cap — there is
		// nothing to overflow against, and maintain_current_host treats a
		// NULL/non-positive overflow as "nothing to evict".
		db.execute_unprepared(
			"CREATE VIEW s3_repo.host_cache_stats AS \
			 SELECT \
			     h.host_id, \
			     COALESCE(SUM(f.file_size), 0)::bigint AS cache_bytes, \
			     CASE WHEN h.max_cache_bytes IS NULL THEN NULL \
			          ELSE COALESCE(SUM(f.file_size), 0)::bigint - h.max_cache_bytes \
			     END AS overflow_bytes \
			 FROM s3_repo.hosts h \
			 LEFT JOIN s3_repo.downloads d ON d.host_id = h.host_id \
			 LEFT JOIN s3_repo.files f ON f.file_id = d.file_id \
			 GROUP BY h.host_id, h.max_cache_bytes",
		)
		.await?;

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		let db = manager.get_connection();
		db.execute_unprepared("DROP VIEW IF EXISTS s3_repo.host_cache_stats")
			.await?;
		db.execute_unprepared("DROP VIEW IF EXISTS s3_repo.deletable_files")
			.await?;
		db.execute_unprepared("DROP VIEW IF EXISTS s3_repo.current_file_tags")
			.await?;
		db.execute_unprepared("DROP VIEW IF EXISTS s3_repo.all_file_tags")
			.await?;
		db.execute_unprepared("DROP VIEW IF EXISTS s3_repo.current_files")
			.await?;
		Ok(())
	}
}
