//! The external object-store collaborator: a real `opendal`-backed
//! S3-compatible [`s3repo_core::ObjectStore`] implementation, plus bounded
//! retry for transient failures.
//!
//! `s3repo-core`'s offline-mode null store lives in `s3repo-core` itself
//! (it is needed unconditionally, even when this crate is never linked);
//! this crate only ships the real backend.

pub mod error;
pub mod opendal_store;
pub mod retry;

pub use error::{StoreError, StoreResult};
pub use opendal_store::{OpendalObjectStore, S3Credentials};
