//! Application state.

use std::sync::Arc;

use dcut_db::PgGenerationStore;
use dcut_kie::KieClient;
use dcut_storage::R2Client;

use crate::config::ApiConfig;

/// Shared application state.
///
/// Handlers are stateless; the only cross-request coordination point is
/// the database row behind `generations`.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub kie: Arc<KieClient>,
    pub storage: Arc<R2Client>,
    pub generations: Arc<PgGenerationStore>,
    /// Client for downloading provider-hosted assets during archival.
    pub http: reqwest::Client,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let kie = KieClient::from_env()?;
        let storage = R2Client::from_env().await?;

        let pool = dcut_db::connect_from_env().await?;
        dcut_db::run_migrations(&pool).await?;
        let generations = PgGenerationStore::new(pool);

        let http = reqwest::Client::builder()
            .timeout(config.archive_timeout)
            .build()?;

        Ok(Self {
            config,
            kie: Arc::new(kie),
            storage: Arc::new(storage),
            generations: Arc::new(generations),
            http,
        })
    }
}
