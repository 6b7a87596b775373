//! File entity — one row per immutable artifact.
//!
//! `published` is a denormalized flag kept in lockstep with
//! `date_published`/`date_expired` by the lifecycle engine (see
//! [`crate::lifecycle`]); invariant 2 of the data model ties the three
//! together and is enforced at the call sites, not the database.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "files", schema_name = "s3_repo")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub file_id: i32,
	pub bucket_id: i32,
	pub object_key: String,
	pub path_id: i32,
	pub origin: i32,
	pub guid: Uuid,
	pub md5: Option<String>,
	pub b64: Option<String>,
	pub file_size: Option<i64>,
	pub published: bool,
	pub date_created: DateTimeUtc,
	pub date_uploaded: Option<DateTimeUtc>,
	pub date_published: Option<DateTimeUtc>,
	pub date_archived: Option<DateTimeUtc>,
	pub date_expired: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(
		belongs_to = "super::bucket::Entity",
		from = "Column::BucketId",
		to = "super::bucket::Column::BucketId"
	)]
	Bucket,
	#[sea_orm(
		belongs_to = "super::path::Entity",
		from = "Column::PathId",
		to = "super::path::Column::PathId"
	)]
	Path,
	#[sea_orm(
		belongs_to = "super::host::Entity",
		from = "Column::Origin",
		to = "super::host::Column::HostId"
	)]
	OriginHost,
	#[sea_orm(has_many = "super::file_tag::Entity")]
	FileTag,
	#[sea_orm(has_many = "super::download::Entity")]
	Download,
}

impl Related<super::bucket::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Bucket.def()
	}
}

impl Related<super::path::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Path.def()
	}
}

impl Related<super::file_tag::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::FileTag.def()
	}
}

impl Related<super::download::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Download.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}

/// Declared column order, the contract for `COPY`-style backup/restore
/// (design note 4 — kept as a static list instead of runtime reflection).
pub const BACKUP_COLUMNS: &[&str] = &[
	"file_id",
	"bucket_id",
	"object_key",
	"path_id",
	"origin",
	"guid",
	"md5",
	"b64",
	"file_size",
	"published",
	"date_created",
	"date_uploaded",
	"date_published",
	"date_archived",
	"date_expired",
];
