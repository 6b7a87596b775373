//! Backup and restore of the metadata tables, dumped through the object
//! store like any other tracked file.
//!
//! Backup objects live under `s3repo_backups/YYYYMMDDHHMMSS.sql.gz`, so the
//! lexicographically greatest key is always the newest. Restore re-records
//! its own artifact's row with `file_size = -1`, since no digest computed
//! before the dump it describes can match those bytes after the fact.

use std::io::{Read, Write};

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use tracing::{info, warn};

use crate::context::RepoContext;
use crate::entities::{bucket, download, file, file_tag, host, path, path_tag, tag};
use crate::error::{CoreError, CoreResult};
use crate::lifecycle::{self, AddFileOptions};

const BACKUP_PREFIX: &str = "s3repo_backups/";
const NULL_MARKER: &str = "\\N";

fn field(value: impl ToString) -> String {
	value.to_string()
}

fn opt_field<T: ToString>(value: &Option<T>) -> String {
	match value {
		Some(v) => v.to_string(),
		None => NULL_MARKER.to_owned(),
	}
}

fn write_section(out: &mut String, table: &str, header: &[&str], rows: Vec<Vec<String>>) {
	out.push_str(&format!("-- TABLE: {table}\n"));
	out.push_str(&header.join("\t"));
	out.push('\n');
	for row in rows {
		out.push_str(&row.join("\t"));
		out.push('\n');
	}
}

/// Builds the flat, tab-delimited dump of every metadata table, in the
/// declared field order, then gzips it.
async fn build_dump(ctx: &RepoContext) -> CoreResult<Vec<u8>> {
	let db = ctx.db();
	let db = &db;
	let mut text = String::new();

	let buckets = bucket::Entity::find().all(db).await?;
	write_section(
		&mut text,
		"buckets",
		&["bucket_id", "bucket_name"],
		buckets
			.iter()
			.map(|r| vec![field(r.bucket_id), r.bucket_name.clone()])
			.collect(),
	);

	let paths = path::Entity::find().all(db).await?;
	write_section(
		&mut text,
		"paths",
		&["path_id", "local_path"],
		paths
			.iter()
			.map(|r| vec![field(r.path_id), r.local_path.clone()])
			.collect(),
	);

	let hosts = host::Entity::find().all(db).await?;
	write_section(
		&mut text,
		"hosts",
		&["host_id", "hostname", "max_cache_bytes"],
		hosts
			.iter()
			.map(|r| vec![field(r.host_id), r.hostname.clone(), opt_field(&r.max_cache_bytes)])
			.collect(),
	);

	let tags = tag::Entity::find().all(db).await?;
	write_section(
		&mut text,
		"tags",
		&["tag_id", "tag_name"],
		tags.iter()
			.map(|r| vec![field(r.tag_id), r.tag_name.clone()])
			.collect(),
	);

	let files = file::Entity::find().all(db).await?;
	write_section(&mut text, "files", file::BACKUP_COLUMNS, files.iter().map(file_row).collect());

	let file_tags = file_tag::Entity::find().all(db).await?;
	write_section(
		&mut text,
		"file_tags",
		&["file_id", "tag_id", "date_tagged"],
		file_tags
			.iter()
			.map(|r| vec![field(r.file_id), field(r.tag_id), field(r.date_tagged)])
			.collect(),
	);

	let path_tags = path_tag::Entity::find().all(db).await?;
	write_section(
		&mut text,
		"path_tags",
		&["path_id", "tag_id", "date_tagged"],
		path_tags
			.iter()
			.map(|r| vec![field(r.path_id), field(r.tag_id), field(r.date_tagged)])
			.collect(),
	);

	let downloads = download::Entity::find().all(db).await?;
	write_section(
		&mut text,
		"downloads",
		&["file_id", "host_id", "downloaded_at", "last_access"],
		downloads
			.iter()
			.map(|r| {
				vec![
					field(r.file_id),
					field(r.host_id),
					field(r.downloaded_at),
					field(r.last_access),
				]
			})
			.collect(),
	);

	let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
	encoder.write_all(text.as_bytes())?;
	Ok(encoder.finish()?)
}

fn file_row(row: &file::Model) -> Vec<String> {
	vec![
		field(row.file_id),
		field(row.bucket_id),
		row.object_key.clone(),
		field(row.path_id),
		field(row.origin),
		field(row.guid),
		opt_field(&row.md5),
		opt_field(&row.b64),
		opt_field(&row.file_size),
		field(row.published),
		field(row.date_created),
		opt_field(&row.date_uploaded),
		opt_field(&row.date_published),
		opt_field(&row.date_archived),
		opt_field(&row.date_expired),
	]
}

/// `backup_db` — registers the backup artifact's own `File` row first, so
/// the dump built right after contains that row too, then writes the dump
/// locally, publishes the artifact, and prunes backups beyond
/// `config.num_backups`.
pub async fn backup_db(ctx: &RepoContext) -> CoreResult<file::Model> {
	let timestamp = Utc::now().format("%Y%m%d%H%M%S");
	let object_key = format!("{BACKUP_PREFIX}{timestamp}.sql.gz");
	let backup_bucket = ctx.config().s3.backup_bucket.clone();

	let added = lifecycle::add_file(
		ctx,
		&object_key,
		AddFileOptions {
			bucket: Some(backup_bucket.clone()),
			object_key: Some(object_key.clone()),
			..Default::default()
		},
	)
	.await?;

	let dump = build_dump(ctx).await?;

	let local_path = ctx.config().local_root.join(&backup_bucket).join(&object_key);
	if let Some(parent) = local_path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(&local_path, &dump)?;

	let published = lifecycle::publish(ctx, &added).await?;

	if let Err(err) = prune_old_backups(ctx, &backup_bucket).await {
		warn!(error = %err, "failed to prune old backups");
	}

	Ok(published)
}

async fn prune_old_backups(ctx: &RepoContext, backup_bucket: &str) -> CoreResult<()> {
	let num_backups = ctx.config().num_backups as usize;
	let mut objects = ctx.object_store().list(backup_bucket, BACKUP_PREFIX).await?;
	objects.sort();

	if objects.len() <= num_backups {
		return Ok(());
	}

	let to_remove = &objects[..objects.len() - num_backups];
	for key in to_remove {
		ctx.object_store().delete(backup_bucket, key).await?;
		info!(object_key = %key, "pruned old backup beyond num_backups");
	}

	Ok(())
}

/// `restore_db` — finds the newest backup object, downloads it, and
/// bulk-loads every table inside one transaction. The restore artifact
/// itself is re-recorded with `file_size = -1`, since its own digest cannot
/// match bytes that embed pre-dump state.
pub async fn restore_db(ctx: &RepoContext) -> CoreResult<()> {
	let backup_bucket = ctx.config().s3.backup_bucket.clone();
	let mut objects = ctx
		.object_store()
		.list(&backup_bucket, BACKUP_PREFIX)
		.await?;
	objects.sort();

	let latest = objects.pop().ok_or(CoreError::NoBackups)?;

	let compressed = ctx
		.object_store()
		.get(&backup_bucket, &latest)
		.await
		.map_err(|err| CoreError::DownloadFailed(0, err.to_string()))?;

	let mut decoder = flate2::read::GzDecoder::new(&compressed[..]);
	let mut text = String::new();
	decoder.read_to_string(&mut text)?;

	ctx.atomically(|conn| async move { load_dump(&conn, &text).await })
		.await?;

	record_restore_artifact(ctx, &backup_bucket, &latest).await?;

	Ok(())
}

/// Parses the tab-delimited dump and bulk-inserts every row, table by
/// table, in declared order so foreign keys resolve.
async fn load_dump<C: sea_orm::ConnectionTrait>(db: &C, text: &str) -> CoreResult<()> {
	let mut lines = text.lines().peekable();
	let mut current_table: Option<String> = None;
	let mut header: Vec<String> = Vec::new();
	let mut rows: Vec<Vec<String>> = Vec::new();

	while let Some(line) = lines.next() {
		if let Some(table) = line.strip_prefix("-- TABLE: ") {
			if let Some(prev) = current_table.take() {
				load_table(db, &prev, &header, std::mem::take(&mut rows)).await?;
			}
			current_table = Some(table.to_owned());
			header = lines
				.next()
				.unwrap_or_default()
				.split('\t')
				.map(str::to_owned)
				.collect();
			continue;
		}
		if current_table.is_some() && !line.is_empty() {
			rows.push(line.split('\t').map(str::to_owned).collect());
		}
	}
	if let Some(table) = current_table {
		load_table(db, &table, &header, rows).await?;
	}

	Ok(())
}

async fn load_table<C: sea_orm::ConnectionTrait>(
	db: &C,
	table: &str,
	_header: &[String],
	rows: Vec<Vec<String>>,
) -> CoreResult<()> {
	if rows.is_empty() {
		return Ok(());
	}

	match table {
		"buckets" => {
			for row in rows {
				bucket::Entity::insert(bucket::ActiveModel {
					bucket_id: Set(parse_field(table, "bucket_id", &row[0])?),
					bucket_name: Set(row[1].clone()),
				})
				.exec_without_returning(db)
				.await?;
			}
		}
		"paths" => {
			for row in rows {
				path::Entity::insert(path::ActiveModel {
					path_id: Set(parse_field(table, "path_id", &row[0])?),
					local_path: Set(row[1].clone()),
				})
				.exec_without_returning(db)
				.await?;
			}
		}
		"hosts" => {
			for row in rows {
				host::Entity::insert(host::ActiveModel {
					host_id: Set(parse_field(table, "host_id", &row[0])?),
					hostname: Set(row[1].clone()),
					max_cache_bytes: Set(parse_opt_i64(table, "max_cache_bytes", &row[2])?),
				})
				.exec_without_returning(db)
				.await?;
			}
		}
		"tags" => {
			for row in rows {
				tag::Entity::insert(tag::ActiveModel {
					tag_id: Set(parse_field(table, "tag_id", &row[0])?),
					tag_name: Set(row[1].clone()),
				})
				.exec_without_returning(db)
				.await?;
			}
		}
		"files" => {
			for row in rows {
				file::Entity::insert(file::ActiveModel {
					file_id: Set(parse_field(table, "file_id", &row[0])?),
					bucket_id: Set(parse_field(table, "bucket_id", &row[1])?),
					object_key: Set(row[2].clone()),
					path_id: Set(parse_field(table, "path_id", &row[3])?),
					origin: Set(parse_field(table, "origin", &row[4])?),
					guid: Set(parse_field(table, "guid", &row[5])?),
					md5: Set(parse_opt_string(&row[6])),
					b64: Set(parse_opt_string(&row[7])),
					file_size: Set(parse_opt_i64(table, "file_size", &row[8])?),
					published: Set(parse_field(table, "published", &row[9])?),
					date_created: Set(parse_datetime(table, "date_created", &row[10])?),
					date_uploaded: Set(parse_opt_datetime(table, "date_uploaded", &row[11])?),
					date_published: Set(parse_opt_datetime(table, "date_published", &row[12])?),
					date_archived: Set(parse_opt_datetime(table, "date_archived", &row[13])?),
					date_expired: Set(parse_opt_datetime(table, "date_expired", &row[14])?),
				})
				.exec_without_returning(db)
				.await?;
			}
		}
		"file_tags" => {
			for row in rows {
				file_tag::Entity::insert(file_tag::ActiveModel {
					file_id: Set(parse_field(table, "file_id", &row[0])?),
					tag_id: Set(parse_field(table, "tag_id", &row[1])?),
					date_tagged: Set(parse_datetime(table, "date_tagged", &row[2])?),
				})
				.exec_without_returning(db)
				.await?;
			}
		}
		"path_tags" => {
			for row in rows {
				path_tag::Entity::insert(path_tag::ActiveModel {
					path_id: Set(parse_field(table, "path_id", &row[0])?),
					tag_id: Set(parse_field(table, "tag_id", &row[1])?),
					date_tagged: Set(parse_datetime(table, "date_tagged", &row[2])?),
				})
				.exec_without_returning(db)
				.await?;
			}
		}
		"downloads" => {
			for row in rows {
				download::Entity::insert(download::ActiveModel {
					file_id: Set(parse_field(table, "file_id", &row[0])?),
					host_id: Set(parse_field(table, "host_id", &row[1])?),
					downloaded_at: Set(parse_datetime(table, "downloaded_at", &row[2])?),
					last_access: Set(parse_datetime(table, "last_access", &row[3])?),
				})
				.exec_without_returning(db)
				.await?;
			}
		}
		other => {
			warn!(table = other, "unrecognized table in backup dump, skipping");
		}
	}

	Ok(())
}

/// Parses one required field, surfacing a corrupt/truncated dump as
/// `CoreError::RestoreCorrupt` instead of silently defaulting — a restore
/// that can't trust its own values is worse than one that fails loudly.
fn parse_field<T>(table: &str, column: &str, raw: &str) -> CoreResult<T>
where
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	raw.parse()
		.map_err(|err| CoreError::RestoreCorrupt(format!("{table}.{column}: invalid value {raw:?}: {err}")))
}

fn parse_datetime(table: &str, column: &str, raw: &str) -> CoreResult<chrono::DateTime<Utc>> {
	parse_field(table, column, raw)
}

fn parse_opt_string(raw: &str) -> Option<String> {
	(raw != NULL_MARKER).then(|| raw.to_owned())
}

fn parse_opt_i64(table: &str, column: &str, raw: &str) -> CoreResult<Option<i64>> {
	if raw == NULL_MARKER {
		return Ok(None);
	}
	parse_field(table, column, raw).map(Some)
}

fn parse_opt_datetime(table: &str, column: &str, raw: &str) -> CoreResult<Option<chrono::DateTime<Utc>>> {
	if raw == NULL_MARKER {
		return Ok(None);
	}
	parse_field(table, column, raw).map(Some)
}

/// Reinserts the just-restored-from backup row with `file_size = -1`, since
/// its digest cannot match bytes whose own dump necessarily predates them.
async fn record_restore_artifact(
	ctx: &RepoContext,
	backup_bucket: &str,
	object_key: &str,
) -> CoreResult<()> {
	let bucket_row = bucket::Entity::find()
		.filter(bucket::Column::BucketName.eq(backup_bucket))
		.one(&ctx.db())
		.await?;

	let Some(bucket_row) = bucket_row else {
		warn!(object_key, backup_bucket, "backup bucket row not found after restore");
		return Ok(());
	};

	let file_row = file::Entity::find()
		.filter(file::Column::BucketId.eq(bucket_row.bucket_id))
		.filter(file::Column::ObjectKey.eq(object_key))
		.one(&ctx.db())
		.await?;

	match file_row {
		Some(row) => {
			let active_model = file::ActiveModel {
				file_id: Set(row.file_id),
				file_size: Set(Some(-1)),
				..Default::default()
			};
			crate::entity_ops::update::<file::Entity, _>(&ctx.db(), active_model).await?;
		}
		None => {
			warn!(object_key, backup_bucket, "restore artifact row not found after restore");
		}
	}

	Ok(())
}
