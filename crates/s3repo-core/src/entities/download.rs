//! Download — per-(file, host) proof that a host currently holds local bytes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "downloads", schema_name = "s3_repo")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub file_id: i32,
	#[sea_orm(primary_key, auto_increment = false)]
	pub host_id: i32,
	pub downloaded_at: DateTimeUtc,
	pub last_access: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(
		belongs_to = "super::file::Entity",
		from = "Column::FileId",
		to = "super::file::Column::FileId"
	)]
	File,
	#[sea_orm(
		belongs_to = "super::host::Entity",
		from = "Column::HostId",
		to = "super::host::Column::HostId"
	)]
	Host,
}

impl Related<super::file::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::File.def()
	}
}

impl Related<super::host::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Host.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}
