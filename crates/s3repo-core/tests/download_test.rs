//! Downloading verifies the digest, and `unlink` followed by
//! `open_for_read` transparently re-downloads.

mod helpers;

use std::io::Read;

use s3repo_core::lifecycle::{self, AddFileOptions};

#[tokio::test]
async fn download_detects_a_corrupted_object() {
	let Some(env) = helpers::fresh_env().await else {
		return;
	};
	let ctx = &env.ctx;

	let added = lifecycle::add_file(ctx, "archive/box", AddFileOptions::default())
		.await
		.expect("add_file");

	let bucket = ctx.config().s3.default_bucket.clone();
	let dest = ctx.config().local_root.join(&bucket).join(&added.object_key);
	std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
	std::fs::write(&dest, b"pristine bytes").unwrap();

	let uploaded = lifecycle::upload(ctx, &added).await.expect("upload");

	// Remove the local cache copy so the next download has to fetch from the
	// (corrupted) object store rather than short-circuiting on a local hit.
	std::fs::remove_file(&dest).unwrap();
	env.store.corrupt(&bucket, &uploaded.object_key);

	let err = lifecycle::download(ctx, &uploaded)
		.await
		.expect_err("corrupted object must fail digest verification");
	assert!(matches!(err, s3repo_core::CoreError::DownloadMismatch { .. }));
}

#[tokio::test]
async fn unlink_then_open_for_read_transparently_redownloads() {
	let Some(env) = helpers::fresh_env().await else {
		return;
	};
	let ctx = &env.ctx;

	let added = lifecycle::add_file(ctx, "archive/crate", AddFileOptions::default())
		.await
		.expect("add_file");

	let bucket = ctx.config().s3.default_bucket.clone();
	let dest = ctx.config().local_root.join(&bucket).join(&added.object_key);
	std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
	std::fs::write(&dest, b"round trip bytes").unwrap();

	let uploaded = lifecycle::upload(ctx, &added).await.expect("upload");
	let published = lifecycle::publish(ctx, &uploaded).await.expect("publish");

	lifecycle::unlink(ctx, &published).await.expect("unlink");
	assert!(!dest.exists(), "unlink removes the local cache copy");

	let mut reader = lifecycle::open_for_read(ctx, &published)
		.await
		.expect("open_for_read re-downloads transparently");
	let mut contents = Vec::new();
	reader.read_to_end(&mut contents).expect("read");
	assert_eq!(contents, b"round trip bytes");
	assert!(dest.exists(), "open_for_read restores the local cache copy");
}
