//! The reconciler: polls the provider for every active unit and applies the
//! resulting transitions.

use super::error::{EngineError, EngineResult};
use super::queue::TaskQueue;
use super::registry::{InFlightGuard, InFlightRegistry};
use crate::metrics;
use serde::Serialize;
use sigtrack_archive::ArtifactArchiver;
use sigtrack_core::{CheckUnit, SigningStatus, UnitAction, UnitKind, plan_action};
use sigtrack_provider::ProviderClient;
use sigtrack_records::{RecordStore, SignatureRequestRepo};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::instrument;

/// Counts for one reconcile cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Units in the worklist.
    pub units: usize,
    /// Units submitted to the task queue.
    pub dispatched: usize,
    /// Units skipped because their check id was already in flight.
    pub skipped_in_flight: usize,
}

/// Result of finalizing one provider id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// No record references the id.
    Unrecognized,
    /// The unit was already signed; nothing was downloaded.
    AlreadySigned,
    /// The unit was cancelled; signed content is not captured.
    AlreadyCancelled,
    /// The artifact was archived and the unit marked signed.
    Signed { url: String },
    /// The artifact was archived, but another finalizer marked the unit first.
    LostRace,
}

impl FinalizeOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unrecognized => "unrecognized",
            Self::AlreadySigned => "already_signed",
            Self::AlreadyCancelled => "already_cancelled",
            Self::Signed { .. } => "signed",
            Self::LostRace => "lost_race",
        }
    }
}

/// What a single status check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Status unchanged (or unrecognized provider status).
    Unchanged,
    Opened,
    Cancelled,
    Finalized(FinalizeOutcome),
    /// The check failed; the unit is retried next cycle.
    Failed,
}

/// A dispatched cycle. Dropping it detaches the checks; they keep running.
#[derive(Debug)]
pub struct ReconcileRun {
    pub report: ReconcileReport,
    tasks: Vec<JoinHandle<CheckOutcome>>,
}

impl ReconcileRun {
    /// Wait for every dispatched check of this cycle.
    pub async fn wait(self) -> Vec<CheckOutcome> {
        futures::future::join_all(self.tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap_or(CheckOutcome::Failed))
            .collect()
    }
}

/// Drives the per-unit state machine against the provider.
pub struct Reconciler {
    records: Arc<dyn RecordStore>,
    provider: Arc<dyn ProviderClient>,
    archiver: Arc<dyn ArtifactArchiver>,
    in_flight: InFlightRegistry,
    queue: TaskQueue,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("archiver", &self.archiver.backend_name())
            .field("in_flight", &self.in_flight.len())
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        records: Arc<dyn RecordStore>,
        provider: Arc<dyn ProviderClient>,
        archiver: Arc<dyn ArtifactArchiver>,
        queue: TaskQueue,
    ) -> Self {
        Self {
            records,
            provider,
            archiver,
            in_flight: InFlightRegistry::new(),
            queue,
        }
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// Build the worklist of active units: primaries first, then cancellation
    /// units that have an extracted document id.
    pub async fn worklist(&self) -> EngineResult<Vec<CheckUnit>> {
        let primaries = self.records.find_pending_primary().await?;
        let cancellations = self.records.find_pending_cancellations().await?;

        let units = primaries
            .iter()
            .filter_map(|row| row.check_unit(UnitKind::Primary))
            .chain(
                cancellations
                    .iter()
                    .filter_map(|row| row.check_unit(UnitKind::Cancellation)),
            )
            .filter(|unit| unit.status.is_active())
            .collect();
        Ok(units)
    }

    /// Run one reconcile cycle.
    ///
    /// Every unit whose check id is not already in flight is claimed and
    /// submitted to the task queue. Returns once all units are submitted; the
    /// checks themselves finish in the background.
    #[instrument(skip(self))]
    pub async fn reconcile(self: &Arc<Self>) -> EngineResult<ReconcileRun> {
        metrics::RECONCILE_CYCLES.inc();
        let units = self.worklist().await?;
        let mut report = ReconcileReport {
            units: units.len(),
            ..ReconcileReport::default()
        };
        let mut tasks = Vec::with_capacity(units.len());

        if !units.is_empty() {
            tracing::info!(units = units.len(), "checking active units");
        }

        for unit in units {
            let Some(guard) = self.in_flight.try_acquire(&unit.check_id) else {
                tracing::debug!(check_id = %unit.check_id, "check already in flight, skipping");
                report.skipped_in_flight += 1;
                continue;
            };
            report.dispatched += 1;
            let engine = Arc::clone(self);
            tasks.push(tokio::spawn(async move { engine.run_check(unit, guard).await }));
        }

        metrics::UNITS_DISPATCHED.inc_by(report.dispatched as u64);
        metrics::UNITS_SKIPPED_IN_FLIGHT.inc_by(report.skipped_in_flight as u64);
        Ok(ReconcileRun { report, tasks })
    }

    /// Queue admission plus the check itself. The in-flight guard is held
    /// until this returns.
    async fn run_check(&self, unit: CheckUnit, _guard: InFlightGuard) -> CheckOutcome {
        let result = async {
            let _slot = self.queue.admit().await?;
            self.check_unit(&unit).await
        }
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::record_check_failure(e.kind());
                tracing::error!(
                    check_id = %unit.check_id,
                    record_id = %unit.record_id,
                    unit = %unit.kind,
                    error = %e,
                    "status check failed"
                );
                CheckOutcome::Failed
            }
        }
    }

    /// Check one unit against the provider and apply the planned action.
    #[instrument(skip(self, unit), fields(check_id = %unit.check_id, unit = %unit.kind))]
    pub async fn check_unit(&self, unit: &CheckUnit) -> EngineResult<CheckOutcome> {
        let payload = self.provider.get_status(&unit.check_id).await?;
        let verdict = payload.verdict();
        tracing::info!(status = %verdict.label(), "provider status");

        match plan_action(unit.kind, unit.status, &verdict) {
            UnitAction::Finalize => {
                let outcome = self.finalize(&unit.check_id).await?;
                Ok(CheckOutcome::Finalized(outcome))
            }
            UnitAction::MarkOpened => {
                self.records
                    .update_unit_status(unit.record_id, unit.kind, SigningStatus::Opened)
                    .await?;
                Ok(CheckOutcome::Opened)
            }
            UnitAction::MarkCancelled => {
                self.records
                    .update_unit_status(unit.record_id, unit.kind, SigningStatus::Cancelled)
                    .await?;
                tracing::info!(record_id = %unit.record_id, "unit cancelled");
                Ok(CheckOutcome::Cancelled)
            }
            UnitAction::Nothing => Ok(CheckOutcome::Unchanged),
        }
    }

    /// Capture, archive and persist the signed artifact for a provider id.
    ///
    /// Resolves whether the id is a record's primary or cancellation document,
    /// and touches only that unit. A unit that is already signed is left
    /// alone without downloading anything.
    #[instrument(skip(self))]
    pub async fn finalize(&self, provider_id: &str) -> EngineResult<FinalizeOutcome> {
        let outcome = self.finalize_inner(provider_id).await;
        match &outcome {
            Ok(result) => metrics::FINALIZE_OUTCOMES
                .with_label_values(&[result.label()])
                .inc(),
            Err(_) => metrics::FINALIZE_OUTCOMES
                .with_label_values(&["failed"])
                .inc(),
        }
        outcome
    }

    async fn finalize_inner(&self, provider_id: &str) -> EngineResult<FinalizeOutcome> {
        let Some(row) = self.records.find_by_provider_id(provider_id).await? else {
            tracing::debug!("no record references this id");
            return Ok(FinalizeOutcome::Unrecognized);
        };
        let Some(kind) = row.unit_kind_for(provider_id) else {
            return Ok(FinalizeOutcome::Unrecognized);
        };

        match row.unit_status(kind) {
            Some(SigningStatus::Signed) => {
                tracing::debug!(record_id = %row.id, unit = %kind, "unit already signed");
                return Ok(FinalizeOutcome::AlreadySigned);
            }
            Some(SigningStatus::Cancelled) => {
                tracing::warn!(record_id = %row.id, unit = %kind, "completed id belongs to a cancelled unit");
                return Ok(FinalizeOutcome::AlreadyCancelled);
            }
            Some(SigningStatus::Pending | SigningStatus::Opened) => {}
            None => return Ok(FinalizeOutcome::Unrecognized),
        }

        tracing::info!(record_id = %row.id, unit = %kind, "processing signed document");
        let content = self.provider.fetch_signed_content(provider_id).await?;
        let artifact = self
            .archiver
            .archive(content, &kind.archive_key_hint(provider_id))
            .await?;

        let applied = self
            .records
            .mark_unit_signed(row.id, kind, OffsetDateTime::now_utc(), &artifact.url)
            .await?;

        if applied {
            tracing::info!(record_id = %row.id, unit = %kind, url = %artifact.url, "archived signed document");
            Ok(FinalizeOutcome::Signed { url: artifact.url })
        } else {
            tracing::info!(record_id = %row.id, unit = %kind, "unit was finalized concurrently");
            Ok(FinalizeOutcome::LostRace)
        }
    }
}

/// Convenience for call sites that only log failures.
pub(crate) fn log_cycle_error(error: &EngineError) {
    metrics::record_check_failure(error.kind());
    tracing::error!(error = %error, "reconcile cycle failed");
}
