//! Tag entity — an interned, opaque string attached to files and/or paths.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tags", schema_name = "s3_repo")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub tag_id: i32,
	#[sea_orm(unique)]
	pub tag_name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(has_many = "super::file_tag::Entity")]
	FileTag,
	#[sea_orm(has_many = "super::path_tag::Entity")]
	PathTag,
}

impl Related<super::file_tag::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::FileTag.def()
	}
}

impl Related<super::path_tag::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::PathTag.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
