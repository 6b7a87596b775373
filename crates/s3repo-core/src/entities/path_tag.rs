//! PathTag — tags attached to every version at a Path.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "path_tags", schema_name = "s3_repo")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub path_id: i32,
	#[sea_orm(primary_key, auto_increment = false)]
	pub tag_id: i32,
	pub date_tagged: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(
		belongs_to = "super::path::Entity",
		from = "Column::PathId",
		to = "super::path::Column::PathId"
	)]
	Path,
	#[sea_orm(
		belongs_to = "super::tag::Entity",
		from = "Column::TagId",
		to = "super::tag::Column::TagId"
	)]
	Tag,
}

impl Related<super::path::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Path.def()
	}
}

impl Related<super::tag::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Tag.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
