//! Tag predicate compiler: turns an `any`/`all`/`exclude` name-set predicate
//! into parameterized SQL, run against `current_file_tags` (published files)
//! or `all_file_tags` (drafts too).

use sea_orm::{DatabaseBackend, EntityTrait, Statement, Value};

use crate::context::RepoContext;
use crate::entities::file;
use crate::error::{CoreError, CoreResult};
use crate::tags;

/// A tag predicate for [`find_tagged`]. Name-sets are resolved to tag ids
/// via [`tags::find_ids`] — an unknown name contributes no rows, it does
/// not error.
#[derive(Debug, Clone, Default)]
pub struct TagPredicate {
	pub any: Vec<String>,
	pub all: Vec<String>,
	pub exclude: Vec<String>,
	pub published: bool,
}

fn push_in_list(ids: &[i32], params: &mut Vec<Value>) -> String {
	let placeholders: Vec<String> = ids
		.iter()
		.map(|id| {
			params.push(Value::Int(Some(*id)));
			format!("${}", params.len())
		})
		.collect();
	format!("({})", placeholders.join(", "))
}

/// `find_tagged(any, all, exclude, published)`.
pub async fn find_tagged(
	ctx: &RepoContext,
	predicate: TagPredicate,
) -> CoreResult<Vec<file::Model>> {
	let any_ids = tags::find_ids(&ctx.db(), &predicate.any).await?;
	let all_ids = tags::find_ids(&ctx.db(), &predicate.all).await?;
	let exclude_ids = tags::find_ids(&ctx.db(), &predicate.exclude).await?;

	let has_positive = !predicate.any.is_empty() || !predicate.all.is_empty();

	if !predicate.exclude.is_empty() && !has_positive {
		return Err(CoreError::ApiMisuse(
			"exclude cannot be used without any or all — it would scan every tagged file".into(),
		));
	}

	let source_view = if predicate.published {
		"s3_repo.current_file_tags"
	} else {
		"s3_repo.all_file_tags"
	};

	// Empty predicate: every file in the source view.
	if !has_positive && exclude_ids.is_empty() {
		let sql = format!(
			"SELECT f.* FROM s3_repo.files f \
			 WHERE f.file_id IN (SELECT DISTINCT file_id FROM {source_view})"
		);
		let stmt = Statement::from_string(DatabaseBackend::Postgres, sql);
		return Ok(file::Entity::find()
			.from_raw_sql(stmt)
			.all(&ctx.db())
			.await?);
	}

	// A positive predicate (any/all) was given but none of its names resolved
	// to an existing tag — there is nothing left that could match.
	if has_positive && any_ids.is_empty() && all_ids.is_empty() {
		return Ok(Vec::new());
	}

	let mut params: Vec<Value> = Vec::new();

	let mut hint_ids: Vec<i32> = any_ids
		.iter()
		.chain(all_ids.iter())
		.chain(exclude_ids.iter())
		.copied()
		.collect();
	hint_ids.sort_unstable();
	hint_ids.dedup();
	let hint_list = push_in_list(&hint_ids, &mut params);

	let mut having_clauses = Vec::new();
	if !all_ids.is_empty() {
		let list = push_in_list(&all_ids, &mut params);
		having_clauses.push(format!(
			"AND SUM(CASE WHEN tag_id IN {list} THEN 1 ELSE 0 END) = {}",
			all_ids.len()
		));
	}
	if !any_ids.is_empty() {
		let list = push_in_list(&any_ids, &mut params);
		having_clauses.push(format!(
			"AND SUM(CASE WHEN tag_id IN {list} THEN 1 ELSE 0 END) >= 1"
		));
	}
	if !exclude_ids.is_empty() {
		let list = push_in_list(&exclude_ids, &mut params);
		having_clauses.push(format!(
			"AND SUM(CASE WHEN tag_id IN {list} THEN 1 ELSE 0 END) = 0"
		));
	}

	let sql = format!(
		"SELECT f.* FROM s3_repo.files f \
		 WHERE f.file_id IN ( \
		   SELECT file_id FROM {source_view} \
		   WHERE tag_id IN {hint_list} \
		   GROUP BY file_id \
		   HAVING TRUE {having} \
		 )",
		having = having_clauses.join(" "),
	);

	let stmt = Statement::from_sql_and_values(DatabaseBackend::Postgres, sql, params);
	Ok(file::Entity::find()
		.from_raw_sql(stmt)
		.all(&ctx.db())
		.await?)
}
