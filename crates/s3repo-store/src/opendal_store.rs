//! `opendal`-backed S3-compatible implementation of
//! [`s3repo_core::ObjectStore`].
//!
//! One `opendal::Operator` per bucket is built lazily and cached, since the
//! `services-s3` builder binds a bucket at construction time while this
//! crate's trait takes the bucket per call — a process may touch several
//! buckets (the default bucket, the backup bucket, any bucket named in a
//! file's own key) in one run.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use opendal::{services::S3, Operator};
use tokio::sync::Mutex;

use s3repo_core::error::{CoreError, CoreResult};
use s3repo_core::ObjectStore;

use crate::error::StoreError;
use crate::retry::with_retry;

/// Credentials and endpoint shared by every bucket this process touches.
#[derive(Clone, Debug)]
pub struct S3Credentials {
	pub access_key: String,
	pub secret_key: String,
	pub region: Option<String>,
	pub endpoint: Option<String>,
}

pub struct OpendalObjectStore {
	credentials: S3Credentials,
	operators: Mutex<HashMap<String, Operator>>,
}

impl OpendalObjectStore {
	pub fn new(credentials: S3Credentials) -> Self {
		Self {
			credentials,
			operators: Mutex::new(HashMap::new()),
		}
	}

	async fn operator_for(&self, bucket: &str) -> Result<Operator, StoreError> {
		let mut operators = self.operators.lock().await;
		if let Some(op) = operators.get(bucket) {
			return Ok(op.clone());
		}

		let mut builder = S3::default()
			.bucket(bucket)
			.access_key_id(&self.credentials.access_key)
			.secret_access_key(&self.credentials.secret_key);

		if let Some(region) = &self.credentials.region {
			builder = builder.region(region);
		}
		if let Some(endpoint) = &self.credentials.endpoint {
			builder = builder.endpoint(endpoint);
		}

		let op = Operator::new(builder)?.finish();
		operators.insert(bucket.to_owned(), op.clone());
		Ok(op)
	}
}

#[async_trait]
impl ObjectStore for OpendalObjectStore {
	async fn put(&self, bucket: &str, key: &str, bytes: Bytes) -> CoreResult<()> {
		with_retry(&format!("put {bucket}/{key}"), || async {
			let op = self.operator_for(bucket).await?;
			op.write(key, bytes.clone()).await.map_err(StoreError::from)?;
			Ok(())
		})
		.await
		.map_err(|err| CoreError::UploadFailed(0, err.to_string()))
	}

	async fn get(&self, bucket: &str, key: &str) -> CoreResult<Bytes> {
		with_retry(&format!("get {bucket}/{key}"), || async {
			let op = self.operator_for(bucket).await?;
			match op.read(key).await {
				Ok(buf) => Ok(buf.to_bytes()),
				Err(err) if err.kind() == opendal::ErrorKind::NotFound => {
					Err(StoreError::NotFound {
						bucket: bucket.to_owned(),
						key: key.to_owned(),
					})
				}
				Err(err) => Err(StoreError::from(err)),
			}
		})
		.await
		.map_err(|err| CoreError::DownloadFailed(0, err.to_string()))
	}

	async fn delete(&self, bucket: &str, key: &str) -> CoreResult<()> {
		with_retry(&format!("delete {bucket}/{key}"), || async {
			let op = self.operator_for(bucket).await?;
			op.delete(key).await.map_err(StoreError::from)?;
			Ok(())
		})
		.await
		.map_err(|err| CoreError::DownloadFailed(0, err.to_string()))
	}

	async fn list(&self, bucket: &str, prefix: &str) -> CoreResult<Vec<String>> {
		with_retry(&format!("list {bucket}/{prefix}"), || async {
			let op = self.operator_for(bucket).await?;
			let entries = op.list(prefix).await.map_err(StoreError::from)?;
			Ok(entries.into_iter().map(|entry| entry.path().to_owned()).collect())
		})
		.await
		.map_err(|err| CoreError::DownloadFailed(0, err.to_string()))
	}
}
