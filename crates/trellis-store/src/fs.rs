//! Local filesystem result store.

use crate::error::{StoreError, StoreResult};
use crate::traits::{ByteStream, ResultMeta, ResultStore, SealedResult, StagedResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use trellis_core::{ContentHash, ContentHasher, JobId, RESULT_EXT, TEMP_SUFFIX};
use uuid::Uuid;

/// Chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Filesystem-backed result store rooted at the results directory.
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Create a new filesystem store, creating the root directory if absent.
    pub async fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn temp_path(&self, job_id: &JobId) -> PathBuf {
        // Unique per attempt so concurrent or retried uploads for the same
        // job never collide before the publish point.
        self.root
            .join(format!("{job_id}.{}.{TEMP_SUFFIX}", Uuid::new_v4().simple()))
    }

    fn map_not_found(e: std::io::Error, job_id: &JobId) -> StoreError {
        if e.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(job_id.to_string())
        } else {
            StoreError::Io(e)
        }
    }
}

#[async_trait]
impl ResultStore for FilesystemStore {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, job_id: &JobId) -> StoreResult<bool> {
        let path = self.final_path(job_id);
        fs::try_exists(&path).await.map_err(StoreError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn meta(&self, job_id: &JobId) -> StoreResult<ResultMeta> {
        let path = self.final_path(job_id);
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| Self::map_not_found(e, job_id))?;
        Ok(ResultMeta {
            size: metadata.len(),
            last_modified: metadata.modified().ok(),
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_stream(&self, job_id: &JobId) -> StoreResult<ByteStream> {
        use tokio::io::AsyncReadExt;

        let path = self.final_path(job_id);
        let file = fs::File::open(&path)
            .await
            .map_err(|e| Self::map_not_found(e, job_id))?;

        // Stream the artifact in chunks instead of loading it into memory
        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, job_id: &JobId) -> StoreResult<()> {
        let path = self.final_path(job_id);
        fs::remove_file(&path)
            .await
            .map_err(|e| Self::map_not_found(e, job_id))?;
        Ok(())
    }

    fn final_path(&self, job_id: &JobId) -> PathBuf {
        self.root.join(format!("{job_id}.{RESULT_EXT}"))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn stage(&self, job_id: &JobId) -> StoreResult<Box<dyn StagedResult>> {
        let temp_path = self.temp_path(job_id);
        let final_path = self.final_path(job_id);
        let file = fs::File::create(&temp_path).await?;

        Ok(Box::new(StagedFile {
            file: Some(file),
            hasher: ContentHash::hasher(),
            temp_path,
            final_path,
            bytes_written: 0,
            defused: false,
        }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StoreResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StoreError::Io(std::io::Error::new(
                e.kind(),
                format!("results directory not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("results directory is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}

/// Staged upload writing to a unique temporary file.
struct StagedFile {
    file: Option<fs::File>,
    hasher: ContentHasher,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
    defused: bool,
}

#[async_trait]
impl StagedResult for StagedFile {
    async fn write(&mut self, data: Bytes) -> StoreResult<()> {
        // file is Some until seal/abort consume the staged upload
        if let Some(file) = self.file.as_mut() {
            file.write_all(&data).await?;
        }
        self.hasher.update(&data);
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn seal(mut self: Box<Self>) -> StoreResult<Box<dyn SealedResult>> {
        // Ensure all data is flushed to disk before the publish decision
        if let Some(file) = self.file.take() {
            file.sync_all().await?;
        }
        let sha256 = std::mem::replace(&mut self.hasher, ContentHash::hasher()).finalize();
        self.defused = true;

        Ok(Box::new(SealedFile {
            sha256,
            temp_path: std::mem::take(&mut self.temp_path),
            final_path: std::mem::take(&mut self.final_path),
            bytes_written: self.bytes_written,
            defused: false,
        }))
    }

    async fn abort(mut self: Box<Self>) -> StoreResult<()> {
        drop(self.file.take());
        self.defused = true;
        let _ = fs::remove_file(&self.temp_path).await;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.defused {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

/// Flushed staging file awaiting publish or discard.
struct SealedFile {
    sha256: ContentHash,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
    defused: bool,
}

#[async_trait]
impl SealedResult for SealedFile {
    fn sha256(&self) -> ContentHash {
        self.sha256
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    async fn publish(mut self: Box<Self>) -> StoreResult<(PathBuf, u64)> {
        // Last writer wins: drop any previous artifact, then rename. The
        // rename is the publish point; the final path never holds a
        // partially written file.
        match fs::remove_file(&self.final_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(e)),
        }
        fs::rename(&self.temp_path, &self.final_path).await?;
        self.defused = true;
        Ok((std::mem::take(&mut self.final_path), self.bytes_written))
    }

    async fn discard(mut self: Box<Self>) -> StoreResult<()> {
        self.defused = true;
        let _ = fs::remove_file(&self.temp_path).await;
        Ok(())
    }
}

impl Drop for SealedFile {
    fn drop(&mut self) {
        if !self.defused {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn job(id: &str) -> JobId {
        JobId::parse(id).unwrap()
    }

    async fn read_all(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    fn temp_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().ends_with(".tmp"))
            .collect()
    }

    #[tokio::test]
    async fn test_stage_seal_publish_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).await.unwrap();
        let job_id = job("job-1");

        let mut staged = store.stage(&job_id).await.unwrap();
        staged.write(Bytes::from_static(b"hello ")).await.unwrap();
        staged.write(Bytes::from_static(b"world")).await.unwrap();
        let sealed = staged.seal().await.unwrap();

        assert_eq!(sealed.bytes_written(), 11);
        assert_eq!(sealed.sha256(), ContentHash::compute(b"hello world"));

        let (path, size) = sealed.publish().await.unwrap();
        assert_eq!(size, 11);
        assert_eq!(path, store.final_path(&job_id));
        assert!(store.exists(&job_id).await.unwrap());

        let bytes = read_all(store.get_stream(&job_id).await.unwrap()).await;
        assert_eq!(bytes, b"hello world");
        assert!(temp_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_publish_replaces_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).await.unwrap();
        let job_id = job("job-1");

        for payload in [&b"first"[..], &b"second"[..]] {
            let mut staged = store.stage(&job_id).await.unwrap();
            staged.write(Bytes::copy_from_slice(payload)).await.unwrap();
            staged.seal().await.unwrap().publish().await.unwrap();
        }

        let bytes = read_all(store.get_stream(&job_id).await.unwrap()).await;
        assert_eq!(bytes, b"second");

        // Exactly one final artifact, no leaked temp files
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries, vec![store.final_path(&job_id)]);
    }

    #[tokio::test]
    async fn test_abort_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).await.unwrap();
        let job_id = job("job-1");

        let mut staged = store.stage(&job_id).await.unwrap();
        staged.write(Bytes::from_static(b"partial")).await.unwrap();
        assert_eq!(temp_files(dir.path()).len(), 1);

        staged.abort().await.unwrap();
        assert!(temp_files(dir.path()).is_empty());
        assert!(!store.exists(&job_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_discard_after_seal_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).await.unwrap();
        let job_id = job("job-1");

        let mut staged = store.stage(&job_id).await.unwrap();
        staged.write(Bytes::from_static(b"mismatch")).await.unwrap();
        let sealed = staged.seal().await.unwrap();
        sealed.discard().await.unwrap();

        assert!(temp_files(dir.path()).is_empty());
        assert!(!store.exists(&job_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_drop_without_seal_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).await.unwrap();
        let job_id = job("job-1");

        {
            let mut staged = store.stage(&job_id).await.unwrap();
            staged.write(Bytes::from_static(b"oops")).await.unwrap();
            // dropped here without seal or abort
        }

        assert!(temp_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_empty_upload_digest() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).await.unwrap();
        let job_id = job("job-1");

        let staged = store.stage(&job_id).await.unwrap();
        let sealed = staged.seal().await.unwrap();
        assert_eq!(sealed.bytes_written(), 0);
        assert_eq!(
            sealed.sha256().to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        let (_, size) = sealed.publish().await.unwrap();
        assert_eq!(size, 0);
        assert_eq!(store.meta(&job_id).await.unwrap().size, 0);
    }

    #[tokio::test]
    async fn test_concurrent_stages_use_distinct_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).await.unwrap();
        let job_id = job("job-1");

        let mut a = store.stage(&job_id).await.unwrap();
        let mut b = store.stage(&job_id).await.unwrap();
        a.write(Bytes::from_static(b"aaaa")).await.unwrap();
        b.write(Bytes::from_static(b"bbbb")).await.unwrap();
        assert_eq!(temp_files(dir.path()).len(), 2);

        // Both publish; the last rename wins silently
        a.seal().await.unwrap().publish().await.unwrap();
        b.seal().await.unwrap().publish().await.unwrap();

        let bytes = read_all(store.get_stream(&job_id).await.unwrap()).await;
        assert_eq!(bytes, b"bbbb");
        assert!(temp_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_missing_artifact_maps_to_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).await.unwrap();
        let job_id = job("absent");

        assert!(matches!(
            store.meta(&job_id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.get_stream(&job_id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete(&job_id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
