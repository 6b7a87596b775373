//! Backup/restore round-trip: every metadata table survives a dump and
//! reload, and the restore artifact's own row is re-recorded with the
//! `file_size = -1` sentinel.

mod helpers;

use sea_orm::{ConnectionTrait, EntityTrait};

use s3repo_core::backup;
use s3repo_core::entities::file;
use s3repo_core::lifecycle::{self, AddFileOptions};
use s3repo_core::tags;
use s3repo_core::{CoreError, ObjectStore};

#[tokio::test]
async fn backup_then_restore_repopulates_every_table() {
	let Some(env) = helpers::fresh_env().await else {
		return;
	};
	let ctx = &env.ctx;

	let added = lifecycle::add_file(ctx, "reports/quarterly", AddFileOptions::default())
		.await
		.expect("add_file");
	let dest = ctx
		.config()
		.local_root
		.join(&ctx.config().s3.default_bucket)
		.join(&added.object_key);
	std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
	std::fs::write(&dest, b"quarterly numbers").unwrap();

	let uploaded = lifecycle::upload(ctx, &added).await.expect("upload");
	let published = lifecycle::publish(ctx, &uploaded).await.expect("publish");
	tags::tag_file(ctx, published.file_id, &["finance".to_owned()])
		.await
		.expect("tag_file");

	let backup_file = backup::backup_db(ctx).await.expect("backup_db");

	ctx.db()
		.execute_unprepared(
			"TRUNCATE s3_repo.downloads, s3_repo.file_tags, s3_repo.path_tags, \
			 s3_repo.files, s3_repo.tags, s3_repo.hosts, s3_repo.paths, s3_repo.s3_buckets CASCADE",
		)
		.await
		.expect("wipe tables before restore");

	backup::restore_db(ctx).await.expect("restore_db");

	let restored = file::Entity::find_by_id(published.file_id)
		.one(&ctx.db())
		.await
		.unwrap()
		.expect("original file row restored");
	assert!(restored.published);
	assert_eq!(restored.md5, published.md5);

	let restored_backup_row = file::Entity::find_by_id(backup_file.file_id)
		.one(&ctx.db())
		.await
		.unwrap()
		.expect("backup artifact row restored");
	assert_eq!(
		restored_backup_row.file_size,
		Some(-1),
		"restore artifact is re-recorded with the file_size = -1 sentinel"
	);
}

#[tokio::test]
async fn restore_surfaces_corrupt_rows_instead_of_defaulting() {
	let Some(env) = helpers::fresh_env().await else {
		return;
	};
	let ctx = &env.ctx;

	lifecycle::add_file(ctx, "reports/monthly", AddFileOptions::default())
		.await
		.expect("add_file");

	backup::backup_db(ctx).await.expect("backup_db");

	// Corrupt the one backup object in the store: replace the default
	// bucket's row's bucket_id field with unparseable text, simulating a
	// truncated/bit-flipped dump.
	let backup_bucket = ctx.config().s3.backup_bucket.clone();
	let mut objects = env.store.list(&backup_bucket, "s3repo_backups/").await.unwrap();
	objects.sort();
	let key = objects.pop().expect("one backup object");

	let compressed = env.store.get(&backup_bucket, &key).await.expect("fetch backup bytes");
	let mut decoder = flate2::read::GzDecoder::new(&compressed[..]);
	let mut text = String::new();
	std::io::Read::read_to_string(&mut decoder, &mut text).expect("gunzip dump");

	let default_bucket = &ctx.config().s3.default_bucket;
	let corrupted: String = text
		.lines()
		.map(|line| {
			if line.ends_with(&format!("\t{default_bucket}")) {
				format!("not-a-number\t{default_bucket}")
			} else {
				line.to_owned()
			}
		})
		.collect::<Vec<_>>()
		.join("\n")
		+ "\n";
	assert_ne!(corrupted, text, "fixture must actually mutate the buckets row");

	let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
	std::io::Write::write_all(&mut encoder, corrupted.as_bytes()).unwrap();
	let regzipped = encoder.finish().unwrap();
	env.store.put(&backup_bucket, &key, regzipped.into()).await.unwrap();

	let err = backup::restore_db(ctx).await.expect_err("corrupt dump must not restore silently");
	assert!(
		matches!(err, CoreError::RestoreCorrupt(_)),
		"expected RestoreCorrupt, got {err:?}"
	);
}
