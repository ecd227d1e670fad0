//! Signing status and the per-unit state machine.
//!
//! Every trackable unit (a primary document or its cancellation document)
//! moves through the same lifecycle:
//!
//! ```text
//! pending ──► opened ──► signed
//!    │           │
//!    └───────────┴─────► cancelled
//! ```
//!
//! `signed` and `cancelled` are terminal. Provider responses are normalized into
//! a [`ProviderVerdict`] and turned into a [`UnitAction`] by [`plan_action`].

use crate::unit::UnitKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a trackable unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningStatus {
    /// Created, not yet seen by the signer.
    Pending,
    /// The signer opened the document.
    Opened,
    /// Signed and archived.
    Signed,
    /// Cancelled or declined on the provider side.
    Cancelled,
}

impl SigningStatus {
    /// Statuses the reconciler still polls.
    pub const ACTIVE: [SigningStatus; 2] = [SigningStatus::Pending, SigningStatus::Opened];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Opened => "opened",
            Self::Signed => "signed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Check if the unit reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Signed | Self::Cancelled)
    }

    /// Check if the unit still needs reconciliation.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    ///
    /// Re-saving the current non-terminal status is allowed (it is a no-op).
    pub fn can_transition_to(&self, next: SigningStatus) -> bool {
        match (self, next) {
            (Self::Signed | Self::Cancelled, _) => false,
            (Self::Pending, _) => true,
            (Self::Opened, Self::Pending) => false,
            (Self::Opened, _) => true,
        }
    }
}

impl fmt::Display for SigningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "opened" => Ok(Self::Opened),
            "signed" => Ok(Self::Signed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(crate::Error::InvalidStatus(other.to_string())),
        }
    }
}

/// Normalized reading of the provider's `status_overall` field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderVerdict {
    /// `SIGNED`, `COMPLETED` or `DONE`.
    Completed,
    /// `OPEN`.
    Open,
    /// `CANCELLED` or `DECLINED`.
    Cancelled,
    /// Anything else, including a missing field (`UNKNOWN`).
    Unrecognized(String),
}

impl ProviderVerdict {
    /// Classify a raw `status_overall` value. Matching is case-insensitive.
    pub fn from_overall(raw: Option<&str>) -> Self {
        let normalized = raw
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "UNKNOWN".to_string());

        match normalized.as_str() {
            "SIGNED" | "COMPLETED" | "DONE" => Self::Completed,
            "OPEN" => Self::Open,
            "CANCELLED" | "DECLINED" => Self::Cancelled,
            _ => Self::Unrecognized(normalized),
        }
    }

    /// Label used in logs and metrics.
    pub fn label(&self) -> &str {
        match self {
            Self::Completed => "completed",
            Self::Open => "open",
            Self::Cancelled => "cancelled",
            Self::Unrecognized(raw) => raw,
        }
    }
}

/// What the reconciler should do with a unit after a status check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitAction {
    /// Capture and archive the signed document.
    Finalize,
    /// Persist `opened`.
    MarkOpened,
    /// Persist `cancelled`.
    MarkCancelled,
    /// Leave the unit as it is.
    Nothing,
}

/// Decide the action for a unit given its current status and the provider verdict.
///
/// Cancellation units re-save `opened` on every `OPEN` verdict; primary units only
/// write when the status actually changes.
pub fn plan_action(kind: UnitKind, current: SigningStatus, verdict: &ProviderVerdict) -> UnitAction {
    if current.is_terminal() {
        return UnitAction::Nothing;
    }

    match verdict {
        ProviderVerdict::Completed => UnitAction::Finalize,
        ProviderVerdict::Open => match kind {
            UnitKind::Primary if current == SigningStatus::Opened => UnitAction::Nothing,
            UnitKind::Primary | UnitKind::Cancellation => UnitAction::MarkOpened,
        },
        ProviderVerdict::Cancelled => UnitAction::MarkCancelled,
        ProviderVerdict::Unrecognized(_) => UnitAction::Nothing,
    }
}
