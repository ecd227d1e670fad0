//! HTTP API server and reconciliation engine for the signature request tracker.
//!
//! This crate provides:
//! - The reconciler that polls the provider for active units, with an
//!   in-flight registry and a bounded, rate-limited task queue
//! - Reconcile triggers: timer, insert notifications and explicit requests
//! - The HTTP surface (request intake, listing, provider webhook, metrics)
//! - Layered configuration loading

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod reconcile;
pub mod routes;
pub mod state;
pub mod trigger;

pub use error::ApiError;
pub use reconcile::{FinalizeOutcome, ReconcileReport, Reconciler};
pub use routes::create_router;
pub use state::AppState;
pub use trigger::ReconcileTrigger;
