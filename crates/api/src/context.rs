//! Application context wiring
//!
//! Builds the repositories, provider, and services once at startup and hands
//! them to the router as shared state. Everything the handlers touch comes
//! through here; there is no ambient global state.

use std::collections::HashMap;
use std::sync::Arc;

use contendo_core::{
    CalendarProvider, ImportService, OcrExtractor, SyncEngine, SyncEngineConfig, WebhookService,
};
use contendo_domain::{ApiToken, Config, Result};
use contendo_infra::{
    DbManager, GoogleCalendarProvider, ModuleFlags, SqliteEmployeeDirectory, SqliteEventStore,
    SqliteImportBatchRepository, SqliteModuleFlags, SqliteSyncRunRepository,
    SqliteSyncStateRepository, TextExtractor,
};
use tracing::info;

/// Shared application context
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub import: Arc<ImportService>,
    pub sync: Arc<SyncEngine>,
    pub webhook: Arc<WebhookService>,
    pub module_flags: Arc<dyn ModuleFlags>,
    /// Bearer token table, keyed by the token value.
    pub tokens: HashMap<String, ApiToken>,
}

impl AppContext {
    /// Build the production context: SQLite storage, Google provider, and
    /// the external-tool OCR extractor.
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        let state_repo = Arc::new(SqliteSyncStateRepository::new(db.clone()));
        let provider: Arc<dyn CalendarProvider> =
            Arc::new(GoogleCalendarProvider::new(config.google.clone(), state_repo));
        let extractor: Arc<dyn OcrExtractor> = Arc::new(TextExtractor::new(&config.ocr));

        Ok(Self::assemble(config, db, provider, extractor))
    }

    /// Assemble a context from pre-built infrastructure pieces. Tests inject
    /// a mock provider and a canned extractor through this.
    pub fn assemble(
        config: Config,
        db: Arc<DbManager>,
        provider: Arc<dyn CalendarProvider>,
        extractor: Arc<dyn OcrExtractor>,
    ) -> Arc<Self> {
        let events = Arc::new(SqliteEventStore::new(db.clone()));
        let batches = Arc::new(SqliteImportBatchRepository::new(db.clone()));
        let employees = Arc::new(SqliteEmployeeDirectory::new(db.clone()));
        let state_repo = Arc::new(SqliteSyncStateRepository::new(db.clone()));
        let runs = Arc::new(SqliteSyncRunRepository::new(db.clone()));
        let module_flags: Arc<dyn ModuleFlags> = Arc::new(SqliteModuleFlags::new(db.clone()));

        let import =
            Arc::new(ImportService::new(batches, events.clone(), extractor, employees));
        let sync = Arc::new(SyncEngine::new(
            provider.clone(),
            events,
            runs,
            state_repo.clone(),
            SyncEngineConfig {
                max_attempts: config.sync.max_attempts,
                lookback_days: config.sync.lookback_days,
                lookahead_days: config.sync.lookahead_days,
            },
        ));
        let webhook = Arc::new(WebhookService::new(state_repo, provider));

        let tokens = config
            .auth
            .tokens
            .iter()
            .map(|t| (t.token.clone(), t.clone()))
            .collect::<HashMap<_, _>>();

        info!(tenants = tokens.len(), "application context assembled");
        Arc::new(Self { config, db, import, sync, webhook, module_flags, tokens })
    }
}
