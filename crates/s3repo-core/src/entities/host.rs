//! Host entity — one participating machine sharing the repository database.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "hosts", schema_name = "s3_repo")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub host_id: i32,
	#[sea_orm(unique)]
	pub hostname: String,
	pub max_cache_bytes: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(has_many = "super::download::Entity")]
	Download,
}

impl Related<super::download::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Download.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
