//! Application state shared across handlers.

use crate::auth::UploadGrants;
use std::sync::Arc;
use trellis_client::CoreClient;
use trellis_core::config::AppConfig;
use trellis_store::ResultStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Result artifact store.
    pub store: Arc<dyn ResultStore>,
    /// Core compute service client.
    pub core: Arc<CoreClient>,
    /// Outstanding upload grants.
    pub grants: UploadGrants,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Panics
    ///
    /// Panics if configuration validation fails; the server must not come
    /// up with an invalid configuration.
    pub fn new(config: AppConfig, store: Arc<dyn ResultStore>, core: Arc<CoreClient>) -> Self {
        if let Err(error) = config.validate() {
            panic!("Invalid configuration: {error}");
        }

        Self {
            config: Arc::new(config),
            store,
            core,
            grants: UploadGrants::new(),
        }
    }
}
