//! The object-store seam. `s3repo-core` depends only on this trait; concrete
//! backends (`opendal`-backed, or a no-op for offline mode) live in
//! `s3repo-store` so the entity/lifecycle layer never pulls in an S3 SDK.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CoreResult;

/// A content-addressed blob store keyed by `(bucket, object_key)`.
///
/// Implementations are process-wide and safe to share behind an `Arc` across
/// tasks; the underlying client's own connection pooling handles concurrency.
#[async_trait]
pub trait ObjectStore: Send + Sync {
	async fn put(&self, bucket: &str, key: &str, bytes: Bytes) -> CoreResult<()>;

	async fn get(&self, bucket: &str, key: &str) -> CoreResult<Bytes>;

	async fn delete(&self, bucket: &str, key: &str) -> CoreResult<()>;

	async fn list(&self, bucket: &str, prefix: &str) -> CoreResult<Vec<String>>;
}
