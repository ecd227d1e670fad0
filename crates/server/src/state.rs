//! Application state shared across handlers.

use crate::reconcile::{EngineResult, Reconciler, TaskQueue};
use crate::trigger::ReconcileTrigger;
use sigtrack_archive::ArtifactArchiver;
use sigtrack_core::config::AppConfig;
use sigtrack_provider::ProviderClient;
use sigtrack_records::RecordStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub records: Arc<dyn RecordStore>,
    pub provider: Arc<dyn ProviderClient>,
    pub reconciler: Arc<Reconciler>,
    /// Requests an out-of-band reconcile cycle.
    pub trigger: ReconcileTrigger,
}

impl AppState {
    /// Wire the reconciler from its collaborators.
    ///
    /// Fails if the reconcile queue limits are invalid.
    pub fn new(
        config: AppConfig,
        records: Arc<dyn RecordStore>,
        provider: Arc<dyn ProviderClient>,
        archiver: Arc<dyn ArtifactArchiver>,
    ) -> EngineResult<Self> {
        let queue = TaskQueue::from_config(&config.reconcile)?;
        let reconciler = Arc::new(Reconciler::new(
            records.clone(),
            provider.clone(),
            archiver,
            queue,
        ));

        Ok(Self {
            config: Arc::new(config),
            records,
            provider,
            reconciler,
            trigger: ReconcileTrigger::new(),
        })
    }
}
