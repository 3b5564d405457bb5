pub mod auth;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

use std::sync::Arc;

use crate::{
    auth::SessionManager,
    config::Config,
    errors::Result,
    services::{
        AdminFacade, ApiClient, BatchDispatch, GenerationOrchestrator, MetricsService,
        ResultCollection,
    },
    storage::CredentialStore,
};

/// Every client component wired around one shared session.
pub struct StudioClient {
    pub config: Config,
    pub api: Arc<ApiClient>,
    pub session: Arc<SessionManager>,
    pub results: Arc<ResultCollection>,
    pub generation: GenerationOrchestrator,
    pub dispatch: BatchDispatch,
    pub admin: AdminFacade,
}

impl StudioClient {
    pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let metrics = MetricsService::new();
        let api = Arc::new(ApiClient::new(&config)?);

        let session = SessionManager::new(
            api.clone(),
            store,
            config.revalidation_interval(),
            metrics,
        );
        let results = Arc::new(ResultCollection::new(config.result_capacity()));

        let generation = GenerationOrchestrator::new(
            session.clone(),
            results.clone(),
            config.progress_schedule(),
            config.generation_reset_delay(),
            metrics,
        );
        let dispatch = BatchDispatch::new(session.clone(), results.clone(), metrics);
        let admin = AdminFacade::new(session.clone());

        Ok(Self {
            config,
            api,
            session,
            results,
            generation,
            dispatch,
            admin,
        })
    }

    /// Uses the file-backed credential store at `config.credentials_path`.
    pub fn from_config(config: Config) -> Result<Self> {
        let store = storage::create_store(&config);
        Self::new(config, store)
    }
}
