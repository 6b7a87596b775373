//! Sea-ORM entity definitions for the `s3_repo` schema.
//!
//! One module per table, mirroring the declared field order of each table —
//! the same order backup/restore `COPY` through.

pub mod bucket;
pub mod download;
pub mod file;
pub mod file_tag;
pub mod host;
pub mod path;
pub mod path_tag;
pub mod tag;

pub use bucket::Entity as Bucket;
pub use download::Entity as Download;
pub use file::Entity as File;
pub use file_tag::Entity as FileTag;
pub use host::Entity as Host;
pub use path::Entity as Path;
pub use path_tag::Entity as PathTag;
pub use tag::Entity as Tag;
