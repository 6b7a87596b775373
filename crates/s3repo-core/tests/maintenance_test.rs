//! The per-host maintenance loop purges stale unpublished drafts from its
//! own origin and evicts by ascending `last_access` once over its
//! configured cache cap.

mod helpers;

use chrono::{Duration, Utc};
use sea_orm::{ActiveValue::Set, EntityTrait};

use s3repo_core::entities::{download, file, host};
use s3repo_core::lifecycle::{self, AddFileOptions};
use s3repo_core::registry;

#[tokio::test]
async fn stale_unpublished_drafts_from_own_origin_are_purged() {
	let Some(env) = helpers::fresh_env_with_staleness(3600, -3600).await else {
		return;
	};
	let ctx = &env.ctx;

	let draft = lifecycle::add_file(ctx, "scratch/work", AddFileOptions::default())
		.await
		.expect("add_file");
	assert!(!draft.published);

	let report = s3repo_core::maintenance::maintain_current_host(ctx)
		.await
		.expect("maintain_current_host");

	assert_eq!(report.stale_evicted, 1);
	assert_eq!(report.errors, 0);

	let gone = file::Entity::find_by_id(draft.file_id)
		.one(&ctx.db())
		.await
		.unwrap();
	assert!(gone.is_none(), "stale draft is purged, not merely unlinked");
}

/// An unpublished draft that originated at a different host, but that this
/// host downloaded and let go stale by its own `last_access`, matches
/// neither a published-only nor an own-origin-draft predicate alone — it
/// must be caught by the `last_access` branch regardless of `published` or
/// `origin`, or its local cache bytes (and row, once unreferenced) leak.
#[tokio::test]
async fn cross_host_draft_stale_by_last_access_is_purged() {
	// unpublished_stale_seconds pushed far enough out that `date_created`
	// (just now) can never itself read as stale, isolating this case to the
	// `last_access` branch; published_stale_seconds pushed negative so any
	// last_access at all reads as stale.
	let Some(env) = helpers::fresh_env_with_staleness(-3600, 3600).await else {
		return;
	};
	let ctx = &env.ctx;

	let this_host = registry::current_host(ctx).await.expect("current_host");
	let other_host = registry::find_or_create_host(ctx, "other-host")
		.await
		.expect("find_or_create_host");

	let draft = lifecycle::add_file(
		ctx,
		"scratch/elsewhere",
		AddFileOptions {
			origin_host_id: Some(other_host),
			..Default::default()
		},
	)
	.await
	.expect("add_file");
	assert!(!draft.published);
	assert_ne!(draft.origin, this_host);

	// Simulate this host having downloaded the draft long enough ago that
	// its last_access is now stale, without going through lifecycle::upload
	// (the draft was never uploaded).
	download::Entity::insert(download::ActiveModel {
		file_id: Set(draft.file_id),
		host_id: Set(this_host),
		downloaded_at: Set(Utc::now() - Duration::seconds(7200)),
		last_access: Set(Utc::now() - Duration::seconds(7200)),
	})
	.exec(&ctx.db())
	.await
	.expect("insert stale download row");

	let report = s3repo_core::maintenance::maintain_current_host(ctx)
		.await
		.expect("maintain_current_host");

	assert_eq!(report.stale_evicted, 1);
	assert_eq!(report.errors, 0);

	let gone = file::Entity::find_by_id(draft.file_id)
		.one(&ctx.db())
		.await
		.unwrap();
	assert!(
		gone.is_none(),
		"cross-host draft stale by last_access is purged, not left behind"
	);
}

#[tokio::test]
async fn overflow_evicts_local_copies_by_ascending_last_access() {
	let Some(env) = helpers::fresh_env().await else {
		return;
	};
	let ctx = &env.ctx;

	let host_id = registry::current_host(ctx).await.expect("current_host");

	let mut uploaded = Vec::new();
	for (path, bytes) in [
		("cache/first", b"0123456789".as_slice()),
		("cache/second", b"9876543210".as_slice()),
	] {
		let added = lifecycle::add_file(ctx, path, AddFileOptions::default())
			.await
			.expect("add_file");
		let dest = ctx
			.config()
			.local_root
			.join(&ctx.config().s3.default_bucket)
			.join(&added.object_key);
		std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
		std::fs::write(&dest, bytes).unwrap();
		let u = lifecycle::upload(ctx, &added).await.expect("upload");
		lifecycle::download(ctx, &u).await.expect("download onto this host");
		uploaded.push(u);
	}

	// Cap this host's cache well below the 20 bytes now resident, forcing
	// eviction of at least the oldest (first-downloaded) copy.
	host::Entity::update(host::ActiveModel {
		host_id: Set(host_id),
		max_cache_bytes: Set(Some(5)),
		..Default::default()
	})
	.exec(&ctx.db())
	.await
	.expect("cap host cache");

	let report = s3repo_core::maintenance::maintain_current_host(ctx)
		.await
		.expect("maintain_current_host");

	assert!(report.overflow_evicted >= 1, "at least the oldest copy is evicted");
	assert_eq!(report.errors, 0);

	let first_dest = ctx
		.config()
		.local_root
		.join(&ctx.config().s3.default_bucket)
		.join(&uploaded[0].object_key);
	assert!(!first_dest.exists(), "oldest download is evicted first");
}
