//! Creates the `s3_repo` schema and its base tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

fn schema() -> Alias {
	Alias::new("s3_repo")
}

fn tbl<I: IntoIden>(table: I) -> (Alias, I) {
	(schema(), table)
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.get_connection()
			.execute_unprepared("CREATE SCHEMA IF NOT EXISTS s3_repo")
			.await?;

		manager
			.create_table(
				Table::create()
					.table(tbl(Buckets::Table))
					.if_not_exists()
					.col(
						ColumnDef::new(Buckets::BucketId)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(
						ColumnDef::new(Buckets::BucketName)
							.string()
							.not_null()
							.unique_key(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(tbl(Paths::Table))
					.if_not_exists()
					.col(
						ColumnDef::new(Paths::PathId)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(
						ColumnDef::new(Paths::LocalPath)
							.string()
							.not_null()
							.unique_key(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(tbl(Hosts::Table))
					.if_not_exists()
					.col(
						ColumnDef::new(Hosts::HostId)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(
						ColumnDef::new(Hosts::Hostname)
							.string()
							.not_null()
							.unique_key(),
					)
					.col(ColumnDef::new(Hosts::MaxCacheBytes).big_integer())
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(tbl(Tags::Table))
					.if_not_exists()
					.col(
						ColumnDef::new(Tags::TagId)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(
						ColumnDef::new(Tags::TagName)
							.string()
							.not_null()
							.unique_key(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(tbl(Files::Table))
					.if_not_exists()
					.col(
						ColumnDef::new(Files::FileId)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(ColumnDef::new(Files::BucketId).integer().not_null())
					.col(ColumnDef::new(Files::ObjectKey).string().not_null())
					.col(ColumnDef::new(Files::PathId).integer().not_null())
					.col(ColumnDef::new(Files::Origin).integer().not_null())
					.col(ColumnDef::new(Files::Guid).uuid().not_null())
					.col(ColumnDef::new(Files::Md5).string())
					.col(ColumnDef::new(Files::B64).string())
					.col(ColumnDef::new(Files::FileSize).big_integer())
					.col(
						ColumnDef::new(Files::Published)
							.boolean()
							.not_null()
							.default(false),
					)
					.col(
						ColumnDef::new(Files::DateCreated)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(ColumnDef::new(Files::DateUploaded).timestamp_with_time_zone())
					.col(ColumnDef::new(Files::DatePublished).timestamp_with_time_zone())
					.col(ColumnDef::new(Files::DateArchived).timestamp_with_time_zone())
					.col(ColumnDef::new(Files::DateExpired).timestamp_with_time_zone())
					.foreign_key(
						ForeignKey::create()
							.from_tbl(tbl(Files::Table))
							.from_col(Files::BucketId)
							.to_tbl(tbl(Buckets::Table))
							.to_col(Buckets::BucketId),
					)
					.foreign_key(
						ForeignKey::create()
							.from_tbl(tbl(Files::Table))
							.from_col(Files::PathId)
							.to_tbl(tbl(Paths::Table))
							.to_col(Paths::PathId),
					)
					.foreign_key(
						ForeignKey::create()
							.from_tbl(tbl(Files::Table))
							.from_col(Files::Origin)
							.to_tbl(tbl(Hosts::Table))
							.to_col(Hosts::HostId),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("unq_bucket_object_key")
					.table(tbl(Files::Table))
					.col(Files::BucketId)
					.col(Files::ObjectKey)
					.unique()
					.to_owned(),
			)
			.await?;

		// Invariant 3: at most one published+non-expired File per Path.
		manager
			.get_connection()
			.execute_unprepared(
				"CREATE UNIQUE INDEX unq_current_file_per_path \
				 ON s3_repo.files (path_id) \
				 WHERE published AND date_expired IS NULL",
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(tbl(FileTags::Table))
					.if_not_exists()
					.col(ColumnDef::new(FileTags::FileId).integer().not_null())
					.col(ColumnDef::new(FileTags::TagId).integer().not_null())
					.col(
						ColumnDef::new(FileTags::DateTagged)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.primary_key(Index::create().col(FileTags::FileId).col(FileTags::TagId))
					.foreign_key(
						ForeignKey::create()
							.from_tbl(tbl(FileTags::Table))
							.from_col(FileTags::FileId)
							.to_tbl(tbl(Files::Table))
							.to_col(Files::FileId)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.foreign_key(
						ForeignKey::create()
							.from_tbl(tbl(FileTags::Table))
							.from_col(FileTags::TagId)
							.to_tbl(tbl(Tags::Table))
							.to_col(Tags::TagId),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(tbl(PathTags::Table))
					.if_not_exists()
					.col(ColumnDef::new(PathTags::PathId).integer().not_null())
					.col(ColumnDef::new(PathTags::TagId).integer().not_null())
					.col(
						ColumnDef::new(PathTags::DateTagged)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.primary_key(Index::create().col(PathTags::PathId).col(PathTags::TagId))
					.foreign_key(
						ForeignKey::create()
							.from_tbl(tbl(PathTags::Table))
							.from_col(PathTags::PathId)
							.to_tbl(tbl(Paths::Table))
							.to_col(Paths::PathId)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.foreign_key(
						ForeignKey::create()
							.from_tbl(tbl(PathTags::Table))
							.from_col(PathTags::TagId)
							.to_tbl(tbl(Tags::Table))
							.to_col(Tags::TagId),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(tbl(Downloads::Table))
					.if_not_exists()
					.col(ColumnDef::new(Downloads::FileId).integer().not_null())
					.col(ColumnDef::new(Downloads::HostId).integer().not_null())
					.col(
						ColumnDef::new(Downloads::DownloadedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(Downloads::LastAccess)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.primary_key(
						Index::create()
							.col(Downloads::FileId)
							.col(Downloads::HostId),
					)
					.foreign_key(
						ForeignKey::create()
							.from_tbl(tbl(Downloads::Table))
							.from_col(Downloads::FileId)
							.to_tbl(tbl(Files::Table))
							.to_col(Files::FileId)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.foreign_key(
						ForeignKey::create()
							.from_tbl(tbl(Downloads::Table))
							.from_col(Downloads::HostId)
							.to_tbl(tbl(Hosts::Table))
							.to_col(Hosts::HostId)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.to_owned(),
			)
			.await?;

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(tbl(Downloads::Table)).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(tbl(PathTags::Table)).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(tbl(FileTags::Table)).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(tbl(Files::Table)).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(tbl(Tags::Table)).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(tbl(Hosts::Table)).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(tbl(Paths::Table)).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(tbl(Buckets::Table)).to_owned())
			.await?;
		Ok(())
	}
}

#[derive(DeriveIden)]
enum Buckets {
	#[sea_orm(iden = "s3_buckets")]
	Table,
	BucketId,
	BucketName,
}

#[derive(DeriveIden)]
enum Paths {
	Table,
	PathId,
	LocalPath,
}

#[derive(DeriveIden)]
enum Hosts {
	Table,
	HostId,
	Hostname,
	MaxCacheBytes,
}

#[derive(DeriveIden)]
enum Tags {
	Table,
	TagId,
	TagName,
}

#[derive(DeriveIden)]
enum Files {
	Table,
	FileId,
	BucketId,
	ObjectKey,
	PathId,
	Origin,
	Guid,
	Md5,
	B64,
	FileSize,
	Published,
	DateCreated,
	DateUploaded,
	DatePublished,
	DateArchived,
	DateExpired,
}

#[derive(DeriveIden)]
enum FileTags {
	Table,
	FileId,
	TagId,
	DateTagged,
}

#[derive(DeriveIden)]
enum PathTags {
	Table,
	PathId,
	TagId,
	DateTagged,
}

#[derive(DeriveIden)]
enum Downloads {
	Table,
	FileId,
	HostId,
	DownloadedAt,
	LastAccess,
}
