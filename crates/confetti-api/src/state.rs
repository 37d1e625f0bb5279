use std::sync::Arc;

use tracing::{error, warn};

use confetti_db::Database;
use confetti_gateway::dispatcher::Dispatcher;
use confetti_storage::{PhotoStore, UrlSigner};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub store: PhotoStore,
    pub signer: UrlSigner,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    /// Quota for events created without an explicit one.
    pub default_guest_quota: u32,
    pub max_upload_bytes: usize,
}

impl AppStateInner {
    /// Run a blocking database call off the async runtime.
    pub async fn run_db<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(anyhow::anyhow!("database task failed"))
            })?
            .map_err(ApiError::Internal)
    }

    /// Best-effort blob removal; failures are left for the sweeper.
    pub async fn discard_blob(&self, path: &str) {
        if let Err(e) = self.store.delete(path).await {
            warn!("Failed to delete blob {}: {} (left for the sweeper)", path, e);
        }
    }
}
