//! Semantic error kinds shared across the entity layer, lifecycle engine,
//! query engine, and maintenance loops.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
	#[error("repository already exists at this schema")]
	RepoAlreadyExists,

	#[error("no backups found to restore from")]
	NoBackups,

	#[error("file {0} has not been uploaded")]
	FileNotUploaded(i32),

	#[error("concurrent insertion raced this operation for bucket {bucket_id} object key {object_key}")]
	ConcurrentInsertion { bucket_id: i32, object_key: String },

	#[error("file {0} has no local bytes to upload")]
	FileMissingLocally(i32),

	#[error("upload of file {0} failed: {1}")]
	UploadFailed(i32, String),

	#[error("download of file {0} failed: {1}")]
	DownloadFailed(i32, String),

	#[error("downloaded bytes for file {file_id} do not match recorded digest (expected {expected}, got {actual})")]
	DownloadMismatch {
		file_id: i32,
		expected: String,
		actual: String,
	},

	#[error("cannot purge file {0} while it is published")]
	PurgingPublished(i32),

	#[error("cannot purge file {0} while a Download row still references it")]
	PurgingReferenced(i32),

	#[error("no configuration found: {0}")]
	NoConfiguration(String),

	#[error("API misuse: {0}")]
	ApiMisuse(String),

	#[error("row lock unavailable for {0}")]
	LockUnavailable(String),

	#[error("backup dump is corrupt: {0}")]
	RestoreCorrupt(String),

	#[error("database error: {0}")]
	Database(#[from] sea_orm::DbErr),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
