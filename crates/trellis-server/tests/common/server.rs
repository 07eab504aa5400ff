//! Server test utilities.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use trellis_client::CoreClient;
use trellis_core::JobId;
use trellis_core::config::AppConfig;
use trellis_server::{AppState, create_router};
use trellis_store::{FilesystemStore, ResultStore};

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub results_dir: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let results_dir = temp_dir.path().join("results");

        let mut config = AppConfig::for_testing();
        config.server.results_dir = results_dir.clone();
        modifier(&mut config);

        let store: Arc<dyn ResultStore> = Arc::new(
            FilesystemStore::new(&config.server.results_dir)
                .await
                .expect("Failed to create result store"),
        );
        let core =
            Arc::new(CoreClient::from_config(&config.core).expect("Failed to create Core client"));

        let state = AppState::new(config, store, core);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            results_dir,
            _temp_dir: temp_dir,
        }
    }

    /// Issue an upload grant for a job and return the raw bearer token.
    pub fn grant_for(&self, job_id: &str) -> String {
        let job_id = JobId::parse(job_id).expect("invalid test job id");
        self.state
            .grants
            .issue(job_id, self.state.config.server.grant_ttl())
    }

    /// All files currently in the results directory.
    pub fn result_files(&self) -> Vec<PathBuf> {
        list_files(&self.results_dir)
    }

    /// Temp files currently in the results directory.
    pub fn temp_files(&self) -> Vec<PathBuf> {
        self.result_files()
            .into_iter()
            .filter(|p| p.to_string_lossy().ends_with(".tmp"))
            .collect()
    }
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.expect("read_dir entry").path()).collect(),
        Err(_) => Vec::new(),
    }
}
