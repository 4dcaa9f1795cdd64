//! Application state wiring infra into the core services.
//!
//! The core services are generic over the `KvStore` port; `AppState` pins
//! them to the SQLite store in the data directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use flowdesk_core::event::bus::EventBus;
use flowdesk_core::report::generation::{ReportGenerator, SimulatedGenerationService};
use flowdesk_core::report::history::ReportHistoryService;
use flowdesk_core::workflow::engine::{EngineConfig, WorkflowEngine};
use flowdesk_core::workflow::executor::ExecutorRegistry;
use flowdesk_core::workflow::simulated::UuidEntropy;
use flowdesk_core::workflow::store::WorkflowStore;
use flowdesk_infra::config::load_global_config;
use flowdesk_infra::filesystem::{ensure_data_dir, resolve_data_dir};
use flowdesk_infra::sqlite::kv::SqliteKvStore;
use flowdesk_infra::sqlite::pool::{DatabasePool, database_url};
use flowdesk_types::config::{GlobalConfig, SchedulingMode};

/// Shared handle to the SQLite-backed store.
pub type SharedStore = Arc<SqliteKvStore>;

pub type ConcreteReportHistory = ReportHistoryService<SharedStore>;

pub type ConcreteReportGenerator = ReportGenerator<SharedStore, SimulatedGenerationService>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: GlobalConfig,
    pub db_pool: DatabasePool,
    pub workflows: Arc<WorkflowStore<SharedStore>>,
    pub reports: Arc<ConcreteReportHistory>,
    pub event_bus: EventBus,
}

impl AppState {
    /// Resolve the data dir, load config, open the database, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        ensure_data_dir(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_global_config(&data_dir).await;

        let db_pool = DatabasePool::new(&database_url(&data_dir))
            .await
            .context("failed to open database")?;
        let store: SharedStore = Arc::new(SqliteKvStore::new(db_pool.clone()));

        let event_bus = EventBus::default();
        let reports = ReportHistoryService::new(Arc::clone(&store))
            .with_max_reports(config.max_reports)
            .with_event_bus(event_bus.clone());

        tracing::debug!(data_dir = %data_dir.display(), "application state ready");

        Ok(Self {
            data_dir,
            workflows: Arc::new(WorkflowStore::new(store)),
            reports: Arc::new(reports),
            config,
            db_pool,
            event_bus,
        })
    }

    /// A fresh engine running the simulated integrations.
    pub fn build_engine(&self, scheduling: Option<SchedulingMode>) -> WorkflowEngine {
        let mut engine_config = EngineConfig::from(&self.config);
        if let Some(scheduling) = scheduling {
            engine_config.scheduling = scheduling;
        }
        let registry =
            ExecutorRegistry::simulated(Arc::new(UuidEntropy), self.config.simulation.clone());

        WorkflowEngine::new(registry)
            .with_config(engine_config)
            .with_event_bus(self.event_bus.clone())
    }

    pub fn report_generator(&self) -> ConcreteReportGenerator {
        ReportGenerator::new(
            Arc::clone(&self.reports),
            SimulatedGenerationService::new(Duration::from_millis(
                self.config.simulation.generation_phase_delay_ms,
            )),
        )
    }
}
