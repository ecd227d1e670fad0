//! Reconciliation of tracked units against the provider.

pub mod engine;
pub mod error;
pub mod queue;
pub mod registry;

pub use engine::{CheckOutcome, FinalizeOutcome, ReconcileReport, ReconcileRun, Reconciler};
pub use error::{EngineError, EngineResult};
pub use queue::TaskQueue;
pub use registry::{InFlightGuard, InFlightRegistry};
