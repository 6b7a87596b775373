//! Tag catalog: interning, attaching/detaching tags, and the `tag_date`
//! convention for canonical date tags.
//!
//! The date-tag fan-out table: hour tags hour+day+week+month, day tags
//! day+week+month, week tags only week, month tags only month. Interning
//! goes through `find_or_create_ids`'s single round trip rather than one
//! `find_or_create` per name.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Timelike, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::context::RepoContext;
use crate::entities::{file_tag, path_tag, tag};
use crate::error::CoreResult;

/// `Tag.find_ids(names)` — existing ids only; unknown names are omitted.
/// Used when querying, where a name nobody ever tagged with must contribute
/// no rows rather than fail.
pub async fn find_ids<C: ConnectionTrait>(db: &C, names: &[String]) -> CoreResult<Vec<i32>> {
	if names.is_empty() {
		return Ok(Vec::new());
	}

	let rows = tag::Entity::find()
		.filter(tag::Column::TagName.is_in(names.iter().cloned()))
		.all(db)
		.await?;

	Ok(rows.into_iter().map(|row| row.tag_id).collect())
}

/// `Tag.find_or_create_ids(names)` — bulk intern: one `INSERT ... ON
/// CONFLICT (tag_name) DO NOTHING`, then one `SELECT` for every id. Used
/// when tagging, where every name must end up with an id regardless of
/// whether it already existed.
pub async fn find_or_create_ids<C: ConnectionTrait>(
	db: &C,
	names: &[String],
) -> CoreResult<Vec<i32>> {
	if names.is_empty() {
		return Ok(Vec::new());
	}

	let dedup: HashSet<&String> = names.iter().collect();
	let active_models = dedup
		.iter()
		.map(|name| tag::ActiveModel {
			tag_name: Set((*name).clone()),
			..Default::default()
		})
		.collect::<Vec<_>>();

	tag::Entity::insert_many(active_models)
		.on_conflict(OnConflict::column(tag::Column::TagName).do_nothing().to_owned())
		.exec_without_returning(db)
		.await?;

	find_ids(db, names).await
}

/// `file.tag_file(*names)`. Idempotent: re-tagging an already-tagged name
/// neither raises nor duplicates the `(file_id, tag_id)` row.
pub async fn tag_file(ctx: &RepoContext, file_id: i32, names: &[String]) -> CoreResult<()> {
	let tag_ids = find_or_create_ids(&ctx.db(), names).await?;
	let now: DateTime<Utc> = Utc::now();

	let active_models = tag_ids
		.into_iter()
		.map(|tag_id| file_tag::ActiveModel {
			file_id: Set(file_id),
			tag_id: Set(tag_id),
			date_tagged: Set(now),
		})
		.collect::<Vec<_>>();

	if active_models.is_empty() {
		return Ok(());
	}

	file_tag::Entity::insert_many(active_models)
		.on_conflict(
			OnConflict::columns([file_tag::Column::FileId, file_tag::Column::TagId])
				.do_nothing()
				.to_owned(),
		)
		.exec_without_returning(&ctx.db())
		.await?;

	Ok(())
}

pub async fn untag_file(ctx: &RepoContext, file_id: i32, names: &[String]) -> CoreResult<()> {
	let tag_ids = find_ids(&ctx.db(), names).await?;
	if tag_ids.is_empty() {
		return Ok(());
	}

	file_tag::Entity::delete_many()
		.filter(file_tag::Column::FileId.eq(file_id))
		.filter(file_tag::Column::TagId.is_in(tag_ids))
		.exec(&ctx.db())
		.await?;

	Ok(())
}

/// `path.tag_path(*names)`. Tags attach to every version at the path.
pub async fn tag_path(ctx: &RepoContext, path_id: i32, names: &[String]) -> CoreResult<()> {
	let tag_ids = find_or_create_ids(&ctx.db(), names).await?;
	let now: DateTime<Utc> = Utc::now();

	let active_models = tag_ids
		.into_iter()
		.map(|tag_id| path_tag::ActiveModel {
			path_id: Set(path_id),
			tag_id: Set(tag_id),
			date_tagged: Set(now),
		})
		.collect::<Vec<_>>();

	if active_models.is_empty() {
		return Ok(());
	}

	path_tag::Entity::insert_many(active_models)
		.on_conflict(
			OnConflict::columns([path_tag::Column::PathId, path_tag::Column::TagId])
				.do_nothing()
				.to_owned(),
		)
		.exec_without_returning(&ctx.db())
		.await?;

	Ok(())
}

pub async fn untag_path(ctx: &RepoContext, path_id: i32, names: &[String]) -> CoreResult<()> {
	let tag_ids = find_ids(&ctx.db(), names).await?;
	if tag_ids.is_empty() {
		return Ok(());
	}

	path_tag::Entity::delete_many()
		.filter(path_tag::Column::PathId.eq(path_id))
		.filter(path_tag::Column::TagId.is_in(tag_ids))
		.exec(&ctx.db())
		.await?;

	Ok(())
}

/// Granularity passed to [`tag_date`]. Each variant fans out to itself plus
/// every coarser granularity (`Hour` tags hour+day+week+month; `Week` tags
/// only week).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DateGranularity {
	Hour,
	Day,
	Week,
	Month,
}

impl DateGranularity {
	fn fan_out(self) -> &'static [DateGranularity] {
		use DateGranularity::*;
		match self {
			Hour => &[Hour, Day, Week, Month],
			Day => &[Day, Week, Month],
			Week => &[Week],
			Month => &[Month],
		}
	}
}

fn week_start(at: DateTime<Utc>) -> DateTime<Utc> {
	let days_from_monday = at.weekday().num_days_from_monday() as i64;
	at.date_naive()
		.and_hms_opt(0, 0, 0)
		.expect("midnight is always valid")
		.and_utc()
		- chrono::Duration::days(days_from_monday)
}

fn canonical_tag(period: DateTime<Utc>, granularity: DateGranularity) -> String {
	match granularity {
		DateGranularity::Hour => format!(
			"hour={:04}-{:02}-{:02} {:02}:00:00",
			period.year(),
			period.month(),
			period.day(),
			period.hour()
		),
		DateGranularity::Day => format!(
			"day={:04}-{:02}-{:02}",
			period.year(),
			period.month(),
			period.day()
		),
		DateGranularity::Week => {
			let start = week_start(period);
			format!(
				"week={:04}-{:02}-{:02}",
				start.year(),
				start.month(),
				start.day()
			)
		}
		DateGranularity::Month => format!("month={:04}-{:02}-01", period.year(), period.month()),
	}
}

/// `path.tag_date(period, granularity)` — tags the path with the canonical
/// date-tag strings for `granularity` and every coarser granularity.
pub async fn tag_date(
	ctx: &RepoContext,
	path_id: i32,
	period: DateTime<Utc>,
	granularity: DateGranularity,
) -> CoreResult<()> {
	let names: Vec<String> = granularity
		.fan_out()
		.iter()
		.map(|g| canonical_tag(period, *g))
		.collect();

	tag_path(ctx, path_id, &names).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
		Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
	}

	#[test]
	fn hour_fans_out_to_every_coarser_granularity() {
		let period = at(2026, 7, 27, 14);
		let names: Vec<String> = DateGranularity::Hour
			.fan_out()
			.iter()
			.map(|g| canonical_tag(period, *g))
			.collect();
		assert_eq!(
			names,
			vec![
				"hour=2026-07-27 14:00:00",
				"day=2026-07-27",
				"week=2026-07-27",
				"month=2026-07-01",
			]
		);
	}

	#[test]
	fn week_fans_out_to_itself_only() {
		assert_eq!(DateGranularity::Week.fan_out(), &[DateGranularity::Week]);
	}

	#[test]
	fn week_start_is_the_preceding_monday() {
		// 2026-07-27 is a Monday; 2026-07-30 (Thursday) should roll back to it.
		let monday = at(2026, 7, 27, 0);
		assert_eq!(canonical_tag(monday, DateGranularity::Week), "week=2026-07-27");

		let thursday = at(2026, 7, 30, 9);
		assert_eq!(canonical_tag(thursday, DateGranularity::Week), "week=2026-07-27");
	}

	#[test]
	fn month_tag_always_points_at_the_first() {
		assert_eq!(canonical_tag(at(2026, 7, 27, 3), DateGranularity::Month), "month=2026-07-01");
	}
}
