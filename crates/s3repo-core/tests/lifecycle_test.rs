//! Create, publish, expire, republish.

mod helpers;

use s3repo_core::lifecycle::{self, AddFileOptions};

#[tokio::test]
async fn create_publish_expire_republish_preserves_date_published() {
	let Some(env) = helpers::fresh_env().await else {
		return;
	};
	let ctx = &env.ctx;

	let created = lifecycle::add_file(ctx, "docs/report", AddFileOptions::default())
		.await
		.expect("add_file");
	assert!(!created.published);
	assert!(created.date_published.is_none());

	let dest = ctx.config().local_root.join(&env_bucket(ctx)).join(&created.object_key);
	std::fs::create_dir_all(dest.parent().unwrap()).expect("create parent dir for local bytes");
	std::fs::write(&dest, b"hello world").expect("write local bytes for upload");

	let published = lifecycle::publish(ctx, &created).await.expect("publish");
	assert!(published.published);
	assert!(published.date_expired.is_none());
	let first_publish = published.date_published.expect("date_published set");

	let expired = lifecycle::expire(ctx, &published).await.expect("expire");
	assert!(!expired.published);
	assert!(expired.date_expired.is_some());

	let republished = lifecycle::publish(ctx, &expired).await.expect("republish");
	assert!(republished.published);
	assert!(republished.date_expired.is_none());
	assert_eq!(
		republished.date_published,
		Some(first_publish),
		"date_published must not move on republish"
	);
}

fn env_bucket(ctx: &s3repo_core::RepoContext) -> String {
	ctx.config().s3.default_bucket.clone()
}
