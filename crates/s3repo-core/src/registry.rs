//! Bucket / Path / Host registry — thin `find_or_create` wrappers over the
//! small dimension tables, backed by an in-memory identity cache.
//!
//! [`IdentityCache`] memoizes a process's own bucket/path/host ids behind a
//! `parking_lot::Mutex` per map; plain `std::sync::Mutex` would do as well
//! here since the critical sections are a single `HashMap` lookup or insert,
//! but `parking_lot` is already the workspace's mutex of choice.

use std::collections::HashMap;

use parking_lot::Mutex;
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait};

use crate::context::RepoContext;
use crate::entities::{bucket, host, path};
use crate::entity_ops::find_or_create;
use crate::error::CoreResult;

/// Per-process memoization for the four memoizable entities — Bucket, Path,
/// Host, and (in [`crate::tags`]) Tag. Cleared on transaction rollback so a
/// caller never observes an id that was rolled back.
#[derive(Default)]
pub struct IdentityCache {
	buckets: Mutex<HashMap<String, i32>>,
	paths: Mutex<HashMap<String, i32>>,
	hosts: Mutex<HashMap<String, i32>>,
	current_host: Mutex<Option<i32>>,
}

impl IdentityCache {
	pub fn clear(&self) {
		self.buckets.lock().clear();
		self.paths.lock().clear();
		self.hosts.lock().clear();
		*self.current_host.lock() = None;
	}
}

/// `Bucket.find_or_create(name)`.
pub async fn find_or_create_bucket(ctx: &RepoContext, name: &str) -> CoreResult<i32> {
	if let Some(id) = ctx.identity_cache.buckets.lock().get(name).copied() {
		return Ok(id);
	}

	let upsert = find_or_create::<bucket::Entity, _>(
		&ctx.db(),
		bucket::Column::BucketName.eq(name),
		vec![bucket::Column::BucketName],
		bucket::ActiveModel {
			bucket_name: Set(name.to_owned()),
			..Default::default()
		},
	)
	.await?;

	let id = upsert.get().bucket_id;
	ctx.identity_cache.buckets.lock().insert(name.to_owned(), id);
	Ok(id)
}

/// `Path.find_or_create(local_path)`.
pub async fn find_or_create_path(ctx: &RepoContext, local_path: &str) -> CoreResult<i32> {
	if let Some(id) = ctx.identity_cache.paths.lock().get(local_path).copied() {
		return Ok(id);
	}

	let upsert = find_or_create::<path::Entity, _>(
		&ctx.db(),
		path::Column::LocalPath.eq(local_path),
		vec![path::Column::LocalPath],
		path::ActiveModel {
			local_path: Set(local_path.to_owned()),
			..Default::default()
		},
	)
	.await?;

	let id = upsert.get().path_id;
	ctx.identity_cache
		.paths
		.lock()
		.insert(local_path.to_owned(), id);
	Ok(id)
}

/// `Host.find_or_create(hostname)`, with an explicit cache entry so repeated
/// calls for the same hostname within one process never round-trip.
pub async fn find_or_create_host(ctx: &RepoContext, hostname: &str) -> CoreResult<i32> {
	if let Some(id) = ctx.identity_cache.hosts.lock().get(hostname).copied() {
		return Ok(id);
	}

	let upsert = find_or_create::<host::Entity, _>(
		&ctx.db(),
		host::Column::Hostname.eq(hostname),
		vec![host::Column::Hostname],
		host::ActiveModel {
			hostname: Set(hostname.to_owned()),
			max_cache_bytes: Set(None),
			..Default::default()
		},
	)
	.await?;

	let id = upsert.get().host_id;
	ctx.identity_cache
		.hosts
		.lock()
		.insert(hostname.to_owned(), id);
	Ok(id)
}

/// Resolves and memoizes the process's own host row for its lifetime,
/// reading the system hostname once.
pub async fn current_host(ctx: &RepoContext) -> CoreResult<i32> {
	if let Some(id) = *ctx.identity_cache.current_host.lock() {
		return Ok(id);
	}

	let hostname = hostname::get()
		.map(|os_string| os_string.to_string_lossy().into_owned())
		.unwrap_or_else(|_| "unknown-host".to_owned());

	let id = find_or_create_host(ctx, &hostname).await?;
	*ctx.identity_cache.current_host.lock() = Some(id);
	Ok(id)
}

/// Deletes a host row; its `Download` rows cascade per the foreign key.
pub async fn decommission_host(ctx: &RepoContext, host_id: i32) -> CoreResult<u64> {
	let result = host::Entity::delete_by_id(host_id).exec(&ctx.db()).await?;
	ctx.identity_cache.clear();
	Ok(result.rows_affected)
}
