//! E-signature provider (Skribble) client for the signature request tracker.
//!
//! This crate provides:
//! - [`ProviderClient`], the operations the reconciler needs from the provider
//! - [`SkribbleClient`], a REST implementation with access token caching
//! - Webhook payload interpretation

pub mod client;
pub mod error;
pub mod webhook;

pub use client::{ProviderClient, SkribbleClient, StatusPayload};
pub use error::{ProviderError, ProviderResult};
pub use webhook::{COMPLETED_EVENT, WebhookEvent, WebhookOutcome, handle_webhook};

use sigtrack_core::config::ProviderConfig;
use std::sync::Arc;

/// Create a provider client from configuration.
pub fn from_config(config: &ProviderConfig) -> ProviderResult<Arc<dyn ProviderClient>> {
    let client = SkribbleClient::from_config(config)?;
    Ok(Arc::new(client))
}
