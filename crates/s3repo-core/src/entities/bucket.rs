//! Bucket entity — a logical object-store namespace.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "s3_buckets", schema_name = "s3_repo")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub bucket_id: i32,
	#[sea_orm(unique)]
	pub bucket_name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
