//! Tagging files/paths and searching with `any`/`all`/`exclude` predicates,
//! including the `APIMisuse` case.

mod helpers;

use s3repo_core::error::CoreError;
use s3repo_core::lifecycle::{self, AddFileOptions};
use s3repo_core::query::{self, TagPredicate};
use s3repo_core::tags;

#[tokio::test]
async fn find_tagged_any_all_and_exclude_predicates() {
	let Some(env) = helpers::fresh_env().await else {
		return;
	};
	let ctx = &env.ctx;

	let red = lifecycle::add_file(ctx, "fruit/apple", AddFileOptions::default())
		.await
		.expect("add_file red");
	let green = lifecycle::add_file(ctx, "fruit/lime", AddFileOptions::default())
		.await
		.expect("add_file green");
	let both = lifecycle::add_file(ctx, "fruit/watermelon", AddFileOptions::default())
		.await
		.expect("add_file both");

	tags::tag_file(ctx, red.file_id, &["red".to_owned()].to_vec())
		.await
		.expect("tag red");
	tags::tag_file(ctx, green.file_id, &["green".to_owned()])
		.await
		.expect("tag green");
	tags::tag_file(
		ctx,
		both.file_id,
		&["red".to_owned(), "green".to_owned()],
	)
	.await
	.expect("tag both");

	// any=[red]: red and both, not green.
	let any_red = query::find_tagged(
		ctx,
		TagPredicate {
			any: vec!["red".to_owned()],
			..Default::default()
		},
	)
	.await
	.expect("find_tagged any=red");
	let mut any_ids: Vec<i32> = any_red.iter().map(|f| f.file_id).collect();
	any_ids.sort_unstable();
	let mut expected = vec![red.file_id, both.file_id];
	expected.sort_unstable();
	assert_eq!(any_ids, expected);

	// all=[red, green]: only the watermelon.
	let all_both = query::find_tagged(
		ctx,
		TagPredicate {
			all: vec!["red".to_owned(), "green".to_owned()],
			..Default::default()
		},
	)
	.await
	.expect("find_tagged all=red,green");
	assert_eq!(all_both.len(), 1);
	assert_eq!(all_both[0].file_id, both.file_id);

	// any=[red,green] exclude=[green]: only the plain red one.
	let red_not_green = query::find_tagged(
		ctx,
		TagPredicate {
			any: vec!["red".to_owned(), "green".to_owned()],
			exclude: vec!["green".to_owned()],
			..Default::default()
		},
	)
	.await
	.expect("find_tagged any minus exclude");
	assert_eq!(red_not_green.len(), 1);
	assert_eq!(red_not_green[0].file_id, red.file_id);

	// exclude alone, with no any/all, is an API misuse regardless of whether
	// the excluded name is even known to the tag catalog.
	let err = query::find_tagged(
		ctx,
		TagPredicate {
			exclude: vec!["never-tagged-anything".to_owned()],
			..Default::default()
		},
	)
	.await
	.expect_err("exclude without any/all must be rejected");
	assert!(matches!(err, CoreError::ApiMisuse(_)));
}
