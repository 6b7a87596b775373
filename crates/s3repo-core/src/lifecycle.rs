//! File lifecycle engine: creation, upload, publish/expire, purge,
//! download/unlink, and the local byte-stream operations.
//!
//! Every transition (`upload`/`publish`/`expire`/`purge`/`download`/`unlink`/
//! `open`/`touch`) returns a typed `CoreResult` rather than raising; local
//! cache writes use the usual write-to-temp-then-rename pattern for an
//! atomic update on one filesystem.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::Utc;
use md5::{Digest, Md5};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ActiveValue::Set, ColumnTrait, Condition, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::context::RepoContext;
use crate::entities::{bucket, download, file};
use crate::entity_ops::{find_or_create, update as update_entity};
use crate::error::{CoreError, CoreResult};
use crate::registry;

/// Optional overrides for [`add_file`]; anything left `None` defaults to
/// `object_key` of `{local_path}/{epoch_seconds}`, a fresh `guid`, and
/// `origin` set to the current host.
#[derive(Default)]
pub struct AddFileOptions {
	pub bucket: Option<String>,
	pub object_key: Option<String>,
	pub origin_host_id: Option<i32>,
	pub guid: Option<Uuid>,
}

async fn bucket_name(ctx: &RepoContext, bucket_id: i32) -> CoreResult<String> {
	let row = bucket::Entity::find_by_id(bucket_id)
		.one(&ctx.db())
		.await?
		.ok_or_else(|| {
			CoreError::Database(sea_orm::DbErr::RecordNotFound(format!(
				"bucket {bucket_id} does not exist"
			)))
		})?;
	Ok(row.bucket_name)
}

/// `{local_root}/{bucket}/{object_key}`.
fn local_cache_path(ctx: &RepoContext, bucket: &str, object_key: &str) -> PathBuf {
	ctx.config().local_root.join(bucket).join(object_key)
}

/// Writes `bytes` to a temp path alongside `dest` and renames into place —
/// atomic on any filesystem where rename is atomic within one directory.
fn atomic_write(dest: &Path, bytes: &[u8]) -> CoreResult<()> {
	if let Some(parent) = dest.parent() {
		std::fs::create_dir_all(parent)?;
	}
	let tmp = dest.with_extension("tmp-upload");
	std::fs::write(&tmp, bytes)?;
	std::fs::rename(&tmp, dest)?;
	Ok(())
}

/// Streams a local file once, computing its md5 hex digest, the base64
/// encoding of the raw digest, and its size.
fn compute_digest(path: &Path) -> CoreResult<(String, String, i64)> {
	use std::io::Read;

	let mut reader = std::fs::File::open(path)?;
	let mut hasher = Md5::new();
	let mut buf = [0u8; 64 * 1024];
	let mut size: i64 = 0;

	loop {
		let read = reader.read(&mut buf)?;
		if read == 0 {
			break;
		}
		hasher.update(&buf[..read]);
		size += read as i64;
	}

	let digest = hasher.finalize();
	let md5_hex = hex::encode(digest.as_slice());
	let b64 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, digest.as_slice());

	Ok((md5_hex, b64, size))
}

/// `add_file(path, bucket=default, key=default, **kwargs)`.
pub async fn add_file(
	ctx: &RepoContext,
	local_path: &str,
	opts: AddFileOptions,
) -> CoreResult<file::Model> {
	let path_id = registry::find_or_create_path(ctx, local_path).await?;

	let bucket_name = opts
		.bucket
		.unwrap_or_else(|| ctx.config().s3.default_bucket.clone());
	let bucket_id = registry::find_or_create_bucket(ctx, &bucket_name).await?;

	let origin = match opts.origin_host_id {
		Some(id) => id,
		None => registry::current_host(ctx).await?,
	};

	let object_key = opts.object_key.unwrap_or_else(|| {
		format!("{local_path}/{}", Utc::now().timestamp())
	});
	let candidate_guid = opts.guid.unwrap_or_else(Uuid::new_v4);
	let now = Utc::now();

	let active_model = file::ActiveModel {
		bucket_id: Set(bucket_id),
		object_key: Set(object_key.clone()),
		path_id: Set(path_id),
		origin: Set(origin),
		guid: Set(candidate_guid),
		md5: Set(None),
		b64: Set(None),
		file_size: Set(None),
		published: Set(false),
		date_created: Set(now),
		date_uploaded: Set(None),
		date_published: Set(None),
		date_archived: Set(None),
		date_expired: Set(None),
		..Default::default()
	};

	let key_condition = Condition::all()
		.add(file::Column::BucketId.eq(bucket_id))
		.add(file::Column::ObjectKey.eq(object_key.clone()));

	let upsert = find_or_create::<file::Entity, _>(
		&ctx.db(),
		key_condition,
		vec![file::Column::BucketId, file::Column::ObjectKey],
		active_model,
	)
	.await?;

	let winner = upsert.into_inner();
	if winner.guid != candidate_guid {
		return Err(CoreError::ConcurrentInsertion {
			bucket_id,
			object_key,
		});
	}

	Ok(winner)
}

/// `upload` — idempotent; a no-op if the file is already uploaded.
pub async fn upload(ctx: &RepoContext, target: &file::Model) -> CoreResult<file::Model> {
	if target.date_uploaded.is_some() {
		return Ok(target.clone());
	}

	let bucket = bucket_name(ctx, target.bucket_id).await?;
	let local_path = local_cache_path(ctx, &bucket, &target.object_key);

	if !local_path.exists() {
		return Err(CoreError::FileMissingLocally(target.file_id));
	}

	let (md5_hex, b64, size) = compute_digest(&local_path)?;
	let bytes = std::fs::read(&local_path)?;

	ctx.object_store()
		.put(&bucket, &target.object_key, Bytes::from(bytes))
		.await
		.map_err(|err| CoreError::UploadFailed(target.file_id, err.to_string()))?;

	let now = Utc::now();
	let active_model = file::ActiveModel {
		file_id: Set(target.file_id),
		md5: Set(Some(md5_hex)),
		b64: Set(Some(b64)),
		file_size: Set(Some(size)),
		date_uploaded: Set(Some(now)),
		..Default::default()
	};

	update_entity::<file::Entity, _>(&ctx.db(), active_model).await
}

/// `publish` — re-publishing a currently published, non-expired file does
/// not move `date_published`; it only re-runs the (idempotent) upload.
///
/// At most one `published ∧ ¬expired` File may exist per Path, so taking
/// over as the current version first expires whichever other File at this
/// Path currently holds that title — atomically with the publish itself, so
/// no reader ever observes two current versions at once.
pub async fn publish(ctx: &RepoContext, target: &file::Model) -> CoreResult<file::Model> {
	let needs_publish = target.date_expired.is_some() || !target.published;

	let current = if needs_publish {
		ctx.atomically(|conn| async move {
			let superseded = file::Entity::find()
				.filter(file::Column::PathId.eq(target.path_id))
				.filter(file::Column::Published.eq(true))
				.filter(file::Column::DateExpired.is_null())
				.filter(file::Column::FileId.ne(target.file_id))
				.all(&conn)
				.await?;

			for previous in superseded {
				let active_model = file::ActiveModel {
					file_id: Set(previous.file_id),
					published: Set(false),
					date_expired: Set(previous.date_expired.or_else(|| Some(Utc::now()))),
					..Default::default()
				};
				update_entity::<file::Entity, _>(&conn, active_model).await?;
			}

			let now = Utc::now();
			let active_model = file::ActiveModel {
				file_id: Set(target.file_id),
				published: Set(true),
				date_expired: Set(None),
				date_published: Set(Some(now)),
				..Default::default()
			};
			update_entity::<file::Entity, _>(&conn, active_model).await
		})
		.await?
	} else {
		target.clone()
	};

	upload(ctx, &current).await
}

/// `expire` — sets `published = false`; `date_expired` is set once, on the
/// first expiration, and never moved afterwards.
pub async fn expire(ctx: &RepoContext, target: &file::Model) -> CoreResult<file::Model> {
	let active_model = file::ActiveModel {
		file_id: Set(target.file_id),
		published: Set(false),
		date_expired: Set(target.date_expired.or_else(|| Some(Utc::now()))),
		..Default::default()
	};

	update_entity::<file::Entity, _>(&ctx.db(), active_model).await
}

/// `purge` — fails with `PurgingPublished` on a currently published file, or
/// `PurgingReferenced` if any `Download` row still references it: `downloads`
/// cascades on `file_id`, so deleting a referenced file would silently
/// destroy another host's Download row out from under it.
pub async fn purge(ctx: &RepoContext, target: &file::Model) -> CoreResult<()> {
	if target.published {
		return Err(CoreError::PurgingPublished(target.file_id));
	}

	let still_downloaded = download::Entity::find()
		.filter(download::Column::FileId.eq(target.file_id))
		.one(&ctx.db())
		.await?
		.is_some();
	if still_downloaded {
		return Err(CoreError::PurgingReferenced(target.file_id));
	}

	let bucket = bucket_name(ctx, target.bucket_id).await?;

	if target.date_uploaded.is_some() {
		ctx.object_store()
			.delete(&bucket, &target.object_key)
			.await?;
	}

	let local_path = local_cache_path(ctx, &bucket, &target.object_key);
	if local_path.exists() {
		std::fs::remove_file(&local_path)?;
	}

	file::Entity::delete_by_id(target.file_id)
		.exec(&ctx.db())
		.await?;

	Ok(())
}

/// `download` — fetches bytes from the object store if absent locally,
/// verifying the digest, and records a `Download` row for the current host.
pub async fn download(ctx: &RepoContext, target: &file::Model) -> CoreResult<file::Model> {
	if target.date_uploaded.is_none() {
		return Err(CoreError::FileNotUploaded(target.file_id));
	}

	let bucket = bucket_name(ctx, target.bucket_id).await?;
	let local_path = local_cache_path(ctx, &bucket, &target.object_key);

	if !local_path.exists() {
		let bytes = ctx
			.object_store()
			.get(&bucket, &target.object_key)
			.await
			.map_err(|err| CoreError::DownloadFailed(target.file_id, err.to_string()))?;

		let mut hasher = Md5::new();
		hasher.update(&bytes);
		let actual = hex::encode(hasher.finalize().as_slice());

		if let Some(expected) = &target.md5 {
			if expected != &actual {
				return Err(CoreError::DownloadMismatch {
					file_id: target.file_id,
					expected: expected.clone(),
					actual,
				});
			}
		}

		atomic_write(&local_path, &bytes)?;
	}

	let host_id = registry::current_host(ctx).await?;
	let now = Utc::now();

	download::Entity::insert(download::ActiveModel {
		file_id: Set(target.file_id),
		host_id: Set(host_id),
		downloaded_at: Set(now),
		last_access: Set(now),
	})
	.on_conflict(
		OnConflict::columns([download::Column::FileId, download::Column::HostId])
			.update_column(download::Column::LastAccess)
			.to_owned(),
	)
	.exec_without_returning(&ctx.db())
	.await?;

	Ok(target.clone())
}

/// `unlink` — removes the local copy and its `Download` row; database state
/// for the `File` row itself is unchanged.
pub async fn unlink(ctx: &RepoContext, target: &file::Model) -> CoreResult<()> {
	let bucket = bucket_name(ctx, target.bucket_id).await?;
	let local_path = local_cache_path(ctx, &bucket, &target.object_key);
	if local_path.exists() {
		std::fs::remove_file(&local_path)?;
	}

	let host_id = registry::current_host(ctx).await?;
	download::Entity::delete_many()
		.filter(download::Column::FileId.eq(target.file_id))
		.filter(download::Column::HostId.eq(host_id))
		.exec(&ctx.db())
		.await?;

	Ok(())
}

async fn touch_last_access(ctx: &RepoContext, file_id: i32) -> CoreResult<()> {
	let host_id = registry::current_host(ctx).await?;
	download::Entity::update_many()
		.col_expr(download::Column::LastAccess, Expr::value(Utc::now()))
		.filter(download::Column::FileId.eq(file_id))
		.filter(download::Column::HostId.eq(host_id))
		.exec(&ctx.db())
		.await?;
	Ok(())
}

/// `open('r')` — downloads first, then returns a reader that transparently
/// decompresses `.gz` object keys, bumping the `Download` row's last access.
pub async fn open_for_read(
	ctx: &RepoContext,
	target: &file::Model,
) -> CoreResult<Box<dyn std::io::Read + Send>> {
	download(ctx, target).await?;
	touch_last_access(ctx, target.file_id).await?;

	let bucket = bucket_name(ctx, target.bucket_id).await?;
	let local_path = local_cache_path(ctx, &bucket, &target.object_key);
	let raw = std::fs::File::open(&local_path)?;

	if target.object_key.ends_with(".gz") {
		Ok(Box::new(flate2::read::GzDecoder::new(raw)))
	} else {
		Ok(Box::new(raw))
	}
}

/// `open('w')` — ensures the parent directory exists and returns a writer,
/// bumping the `Download` row's last access.
pub async fn open_for_write(
	ctx: &RepoContext,
	target: &file::Model,
) -> CoreResult<Box<dyn std::io::Write + Send>> {
	let bucket = bucket_name(ctx, target.bucket_id).await?;
	let local_path = local_cache_path(ctx, &bucket, &target.object_key);

	if let Some(parent) = local_path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	touch_last_access(ctx, target.file_id).await?;
	Ok(Box::new(std::fs::File::create(&local_path)?))
}

/// `touch` — creates the parent directory and an empty local file if one
/// does not already exist, for bytes produced out-of-band.
pub async fn touch(ctx: &RepoContext, target: &file::Model) -> CoreResult<()> {
	let bucket = bucket_name(ctx, target.bucket_id).await?;
	let local_path = local_cache_path(ctx, &bucket, &target.object_key);

	if let Some(parent) = local_path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	if !local_path.exists() {
		std::fs::File::create(&local_path)?;
	}

	Ok(())
}
