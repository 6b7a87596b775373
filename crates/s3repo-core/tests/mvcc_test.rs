//! Two versions at one path: only the newer is current, and publishing the
//! second expires the first.

mod helpers;

use sea_orm::EntityTrait;

use s3repo_core::entities::file;
use s3repo_core::lifecycle::{self, AddFileOptions};

async fn write_and_publish(
	ctx: &s3repo_core::RepoContext,
	path: &str,
	key: &str,
	contents: &[u8],
) -> file::Model {
	let added = lifecycle::add_file(
		ctx,
		path,
		AddFileOptions {
			object_key: Some(key.to_owned()),
			..Default::default()
		},
	)
	.await
	.expect("add_file");

	let dest = ctx
		.config()
		.local_root
		.join(&ctx.config().s3.default_bucket)
		.join(&added.object_key);
	std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
	std::fs::write(&dest, contents).expect("write local bytes");

	lifecycle::publish(ctx, &added).await.expect("publish")
}

#[tokio::test]
async fn only_the_newest_version_is_current_and_the_older_expires() {
	let Some(env) = helpers::fresh_env().await else {
		return;
	};
	let ctx = &env.ctx;

	let f1 = write_and_publish(ctx, "releases/build", "releases/build/f1", b"v1").await;
	let f2 = write_and_publish(ctx, "releases/build", "releases/build/f2", b"v2").await;

	assert_ne!(f1.file_id, f2.file_id);
	assert!(f1.path_id == f2.path_id, "both versions share the same Path");

	let f1_after = file::Entity::find_by_id(f1.file_id)
		.one(&ctx.db())
		.await
		.unwrap()
		.unwrap();
	let f2_after = file::Entity::find_by_id(f2.file_id)
		.one(&ctx.db())
		.await
		.unwrap()
		.unwrap();

	assert!(!f1_after.published, "f1 was expired when f2 published, clearing its flag");
	assert!(f1_after.date_expired.is_some(), "f1 was expired when f2 published");
	assert!(f2_after.published);
	assert!(f2_after.date_expired.is_none());

	let current = s3repo_core::get_file(ctx, "releases/build")
		.await
		.unwrap()
		.expect("a current version exists");
	assert_eq!(current.file_id, f2.file_id);
}
