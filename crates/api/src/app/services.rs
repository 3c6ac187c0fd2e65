//! Store and engine wiring.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use stockledger_infra::{
    AssignmentStore, DynStockLedgerEngine, EngineConfig, InMemoryAssignmentStore,
    InMemoryLedgerStore, InMemoryProductStore, LedgerStore, PostgresAssignmentStore,
    PostgresLedgerStore, PostgresProductStore, ProductStore, StockLedgerEngine,
};

use crate::config::{AppConfig, StoreBackend};

/// Shared state handed to every handler through `Extension`.
pub struct AppServices {
    pub engine: DynStockLedgerEngine,
    backend: &'static str,
}

impl AppServices {
    /// Process-local stores; state is lost on restart.
    pub fn in_memory(config: EngineConfig) -> Self {
        let products: Arc<dyn ProductStore> = Arc::new(InMemoryProductStore::new());
        let ledger: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        let assignments: Arc<dyn AssignmentStore> = Arc::new(InMemoryAssignmentStore::new());
        Self {
            engine: StockLedgerEngine::new(products, ledger, assignments, config),
            backend: "in_memory",
        }
    }

    /// Postgres stores over one pool. The schema in `migrations/` must already be applied.
    pub fn postgres(pool: PgPool, config: EngineConfig) -> Self {
        let products: Arc<dyn ProductStore> = Arc::new(PostgresProductStore::new(pool.clone()));
        let ledger: Arc<dyn LedgerStore> = Arc::new(PostgresLedgerStore::new(pool.clone()));
        let assignments: Arc<dyn AssignmentStore> = Arc::new(PostgresAssignmentStore::new(pool));
        Self {
            engine: StockLedgerEngine::new(products, ledger, assignments, config),
            backend: "postgres",
        }
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<Arc<AppServices>> {
    let engine_config = EngineConfig {
        shortfall_policy: config.shortfall_policy,
    };

    let services = match &config.store {
        StoreBackend::InMemory => {
            tracing::warn!("USE_PERSISTENT_STORES not set; using in-memory stores");
            AppServices::in_memory(engine_config)
        }
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = PgPoolOptions::new()
                .max_connections(*max_connections)
                .connect(database_url)
                .await
                .context("failed to connect to DATABASE_URL")?;
            tracing::info!(max_connections, "connected to postgres");
            AppServices::postgres(pool, engine_config)
        }
    };

    Ok(Arc::new(services))
}
