//! Database migrations for the `s3_repo` schema.

use sea_orm_migration::prelude::*;

mod m20240101_000001_create_schema;
mod m20240102_000001_create_views;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
	fn migrations() -> Vec<Box<dyn MigrationTrait>> {
		vec![
			Box::new(m20240101_000001_create_schema::Migration),
			Box::new(m20240102_000001_create_views::Migration),
		]
	}
}
