//! Result store traits.

use crate::error::StoreResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::SystemTime;
use trellis_core::{ContentHash, JobId};

/// A stream of bytes read back from the store.
pub type ByteStream = Pin<Box<dyn Stream<Item = StoreResult<Bytes>> + Send>>;

/// Metadata about a published result artifact.
#[derive(Debug, Clone)]
pub struct ResultMeta {
    /// Artifact size in bytes.
    pub size: u64,
    /// Last modification time, if the backend tracks one.
    pub last_modified: Option<SystemTime>,
}

/// Storage for published job result artifacts.
///
/// Invariant: at most one published artifact exists per job id. A new
/// publish for the same id replaces the previous artifact (last writer
/// wins); readers observe either the old artifact or the new one, never a
/// partially written file.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Check whether a published artifact exists for this job.
    async fn exists(&self, job_id: &JobId) -> StoreResult<bool>;

    /// Get metadata for a published artifact.
    async fn meta(&self, job_id: &JobId) -> StoreResult<ResultMeta>;

    /// Stream a published artifact's bytes.
    async fn get_stream(&self, job_id: &JobId) -> StoreResult<ByteStream>;

    /// Delete a published artifact.
    async fn delete(&self, job_id: &JobId) -> StoreResult<()>;

    /// The deterministic path the published artifact lives at.
    fn final_path(&self, job_id: &JobId) -> PathBuf;

    /// Begin staging an upload for this job.
    async fn stage(&self, job_id: &JobId) -> StoreResult<Box<dyn StagedResult>>;

    /// Verify the store is usable.
    async fn health_check(&self) -> StoreResult<()>;
}

/// A request-scoped staging area for one upload attempt.
///
/// Every written chunk is fed into an incremental SHA-256 accumulator, so
/// sealing yields the content digest without a second pass. A staged result
/// that is dropped without being sealed or aborted removes its temporary
/// file best-effort.
#[async_trait]
pub trait StagedResult: Send {
    /// Append a chunk to the staged file and the digest accumulator.
    async fn write(&mut self, data: Bytes) -> StoreResult<()>;

    /// Flush to disk and finalize the digest. Nothing is published yet.
    async fn seal(self: Box<Self>) -> StoreResult<Box<dyn SealedResult>>;

    /// Delete the staged file.
    async fn abort(self: Box<Self>) -> StoreResult<()>;
}

/// A fully written, flushed staging file awaiting the publish decision.
#[async_trait]
pub trait SealedResult: Send {
    /// Digest of every byte written.
    fn sha256(&self) -> ContentHash;

    /// Total bytes written.
    fn bytes_written(&self) -> u64;

    /// Publish: replace any previous artifact for this job id via atomic
    /// rename. Returns the final path and artifact size.
    async fn publish(self: Box<Self>) -> StoreResult<(PathBuf, u64)>;

    /// Delete the staged file without publishing.
    async fn discard(self: Box<Self>) -> StoreResult<()>;
}
