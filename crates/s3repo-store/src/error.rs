//! Object-store specific failures, kept separate from [`s3repo_core::CoreError`]
//! so this crate's retry/backoff logic has something concrete to classify
//! before the [`s3repo_core::ObjectStore`] boundary flattens everything into
//! `CoreError::UploadFailed`/`DownloadFailed`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
	#[error("object {bucket}/{key} not found")]
	NotFound { bucket: String, key: String },

	#[error("object store operation timed out")]
	Timeout,

	#[error("object store backend error: {0}")]
	Backend(#[from] opendal::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
	/// Whether this failure is worth retrying: network timeouts and the
	/// backend's own notion of a transient/5xx-shaped error. Digest
	/// mismatches never reach this type — they are a core-layer concern,
	/// checked only after bytes are already in hand.
	pub fn is_transient(&self) -> bool {
		match self {
			StoreError::Timeout => true,
			StoreError::NotFound { .. } => false,
			StoreError::Backend(err) => matches!(
				err.kind(),
				opendal::ErrorKind::Unexpected
					| opendal::ErrorKind::RateLimited
					| opendal::ErrorKind::ConnectionReset
					| opendal::ErrorKind::Unavailable
			),
		}
	}
}
