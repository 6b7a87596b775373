//! The two maintenance loops: per-host cache eviction and cluster-wide
//! expire/delete sweeps.
//!
//! Both loops route their deletions through [`crate::lifecycle`] rather than
//! raw `DELETE`s, so object-store cleanup and local-file removal stay in one
//! place.

use chrono::{Duration, Utc};
use sea_orm::{ActiveValue::Set, DatabaseBackend, EntityTrait, FromQueryResult, Statement, Value};
use tracing::{info, warn};

use crate::context::RepoContext;
use crate::entities::file;
use crate::entity_ops::update as update_entity;
use crate::error::CoreResult;
use crate::lifecycle;
use crate::registry;

#[derive(Debug, FromQueryResult)]
struct HostCacheStats {
	cache_bytes: i64,
	overflow_bytes: Option<i64>,
}

/// Summary of what one `maintain_current_host` pass did, for logging and
/// tests — the loop itself never fails outright on a single file's error;
/// it logs and continues.
#[derive(Debug, Default)]
pub struct HostMaintenanceReport {
	pub stale_evicted: u32,
	pub overflow_evicted: u32,
	pub errors: u32,
}

/// `maintain_current_host` — evicts stale local copies, then evicts by
/// ascending `last_access` until `overflow_bytes <= 0`.
pub async fn maintain_current_host(ctx: &RepoContext) -> CoreResult<HostMaintenanceReport> {
	let host_id = registry::current_host(ctx).await?;
	let mut report = HostMaintenanceReport::default();

	let stats = HostCacheStats::find_by_statement(Statement::from_sql_and_values(
		DatabaseBackend::Postgres,
		"SELECT cache_bytes, overflow_bytes FROM s3_repo.host_cache_stats WHERE host_id = $1",
		[Value::Int(Some(host_id))],
	))
	.one(&ctx.db())
	.await?;

	let mut overflow = stats.and_then(|s| s.overflow_bytes).unwrap_or(0);

	let now = Utc::now();
	let published_cutoff =
		now - Duration::seconds(ctx.config().fs.published_stale_seconds);
	let unpublished_cutoff =
		now - Duration::seconds(ctx.config().fs.unpublished_stale_seconds);

	// One OR-predicate over every file potentially stale to this host: either
	// this host's own Download row on it has gone stale by last_access
	// (covers published files, and unpublished drafts this host downloaded
	// from elsewhere), or it is this host's own never-published draft that
	// has aged out by date_created regardless of whether any host ever
	// downloaded it. Dispatched per-row on `published`, not pre-split into
	// two disjoint queries, so an unpublished file downloaded from a
	// different origin but stale by this host's own last_access is never
	// silently excluded from both branches.
	let stale_files = file::Entity::find()
		.from_raw_sql(Statement::from_sql_and_values(
			DatabaseBackend::Postgres,
			"SELECT f.* FROM s3_repo.files f \
			 LEFT OUTER JOIN ( \
			     SELECT * FROM s3_repo.downloads WHERE host_id = $1 \
			 ) dl ON dl.file_id = f.file_id \
			 WHERE dl.last_access < $2 \
			    OR ( \
			        NOT f.published \
			        AND f.origin = $1 \
			        AND f.date_published IS NULL \
			        AND f.date_created < $3 \
			    )",
			[
				Value::Int(Some(host_id)),
				Value::ChronoDateTimeUtc(Some(Box::new(published_cutoff))),
				Value::ChronoDateTimeUtc(Some(Box::new(unpublished_cutoff))),
			],
		))
		.all(&ctx.db())
		.await?;

	for target in stale_files.iter() {
		// A published file just drops its local copy. An unpublished draft is
		// reclaimed outright, but it may carry this host's own Download row
		// (the very row whose last_access matched it above), and `purge`
		// refuses to delete a file any Download row still references — so
		// unlink first to drop this host's row, then purge. If some other
		// host still holds a Download row after that, purge correctly fails
		// and the file is left for that host's own maintenance pass.
		let result = if target.published {
			lifecycle::unlink(ctx, target).await
		} else {
			match lifecycle::unlink(ctx, target).await {
				Ok(()) => lifecycle::purge(ctx, target).await,
				Err(err) => Err(err),
			}
		};

		match result {
			Ok(()) => {
				report.stale_evicted += 1;
				overflow -= target.file_size.unwrap_or(0);
			}
			Err(err) => {
				warn!(file_id = target.file_id, error = %err, "failed to evict stale file");
				report.errors += 1;
			}
		}
	}

	if overflow > 0 {
		let host_local = file::Entity::find()
			.from_raw_sql(Statement::from_sql_and_values(
				DatabaseBackend::Postgres,
				"SELECT f.* FROM s3_repo.files f \
				 JOIN s3_repo.downloads d ON d.file_id = f.file_id \
				 WHERE d.host_id = $1 \
				 ORDER BY d.last_access ASC",
				[Value::Int(Some(host_id))],
			))
			.all(&ctx.db())
			.await?;

		for target in host_local.iter() {
			if overflow <= 0 {
				break;
			}
			match lifecycle::unlink(ctx, target).await {
				Ok(()) => {
					report.overflow_evicted += 1;
					overflow -= target.file_size.unwrap_or(0);
				}
				Err(err) => {
					warn!(file_id = target.file_id, error = %err, "failed to unlink file during overflow eviction");
					report.errors += 1;
				}
			}
		}
	}

	info!(
		host_id,
		stale_evicted = report.stale_evicted,
		overflow_evicted = report.overflow_evicted,
		errors = report.errors,
		"maintain_current_host complete"
	);

	Ok(report)
}

/// Summary of one `maintain_database` pass.
#[derive(Debug, Default)]
pub struct DatabaseMaintenanceReport {
	pub expired: u32,
	pub deleted: u32,
}

/// `maintain_database` — expire-if-superseded, then delete-if-deletable,
/// each in its own transaction so either phase alone is safe to run
/// concurrently from multiple hosts.
pub async fn maintain_database(ctx: &RepoContext) -> CoreResult<DatabaseMaintenanceReport> {
	let mut report = DatabaseMaintenanceReport::default();

	report.expired = ctx
		.atomically(|conn| async move {
			let superseded = file::Entity::find()
				.from_raw_sql(Statement::from_string(
					DatabaseBackend::Postgres,
					"SELECT f.* FROM s3_repo.files f \
					 WHERE f.published \
					   AND NOT EXISTS (SELECT 1 FROM s3_repo.current_files cf WHERE cf.file_id = f.file_id)"
						.to_owned(),
				))
				.all(&conn)
				.await?;

			let mut expired = 0u32;
			for target in superseded.iter() {
				let active_model = file::ActiveModel {
					file_id: Set(target.file_id),
					published: Set(false),
					date_expired: Set(target.date_expired.or_else(|| Some(Utc::now()))),
					..Default::default()
				};
				update_entity::<file::Entity, _>(&conn, active_model).await?;
				expired += 1;
			}
			Ok(expired)
		})
		.await?;

	report.deleted = ctx
		.atomically(|conn| async move {
			let deletable = file::Entity::find()
				.from_raw_sql(Statement::from_string(
					DatabaseBackend::Postgres,
					"SELECT * FROM s3_repo.deletable_files".to_owned(),
				))
				.all(&conn)
				.await?;

			let mut deleted = 0u32;
			for target in deletable.iter() {
				file::Entity::delete_by_id(target.file_id).exec(&conn).await?;
				deleted += 1;
			}
			Ok(deleted)
		})
		.await?;

	info!(
		expired = report.expired,
		deleted = report.deleted,
		"maintain_database complete"
	);

	Ok(report)
}
