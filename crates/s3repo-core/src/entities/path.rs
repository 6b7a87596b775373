//! Path entity — a canonical client-visible key, independent of the
//! object-store key, shared by every historical version at that logical path.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "paths", schema_name = "s3_repo")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub path_id: i32,
	#[sea_orm(unique)]
	pub local_path: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(has_many = "super::file::Entity")]
	File,
	#[sea_orm(has_many = "super::path_tag::Entity")]
	PathTag,
}

impl Related<super::file::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::File.def()
	}
}

impl Related<super::path_tag::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::PathTag.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
