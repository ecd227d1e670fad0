//! Core domain types and shared logic for the signature request tracker.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Signing status and the per-unit state machine
//! - Trackable units (primary document and linked cancellation document)
//! - Signing request drafts and their validation
//! - Application configuration

pub mod config;
pub mod error;
pub mod request;
pub mod status;
pub mod unit;

pub use error::{Error, Result};
pub use request::{NewSignatureRequest, SigningRequestDraft, extract_cancellation_document_id};
pub use status::{ProviderVerdict, SigningStatus, UnitAction, plan_action};
pub use unit::{CheckUnit, UnitKind};

/// Folder (or key prefix) under which signed artifacts are archived by default.
pub const DEFAULT_ARCHIVE_FOLDER: &str = "skribble_signed_docs";

/// Suffix appended to the archive key hint of cancellation artifacts.
pub const CANCELLATION_KEY_SUFFIX: &str = "_cancellation";
