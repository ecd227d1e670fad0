//! Trackable units.
//!
//! A tracked record carries up to two independently reconciled units: the
//! primary signing workflow and an optional cancellation workflow.

use crate::status::SigningStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Which of a record's two workflows a unit refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Primary,
    Cancellation,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Cancellation => "cancellation",
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancellation)
    }

    /// Archive key hint for a unit's signed artifact.
    ///
    /// Cancellation artifacts get a suffix so they never collide with the
    /// primary artifact of the same record.
    pub fn archive_key_hint(&self, check_id: &str) -> String {
        match self {
            Self::Primary => check_id.to_string(),
            Self::Cancellation => format!("{check_id}{}", crate::CANCELLATION_KEY_SUFFIX),
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "primary" => Ok(Self::Primary),
            "cancellation" => Ok(Self::Cancellation),
            other => Err(crate::Error::InvalidUnitKind(other.to_string())),
        }
    }
}

/// One entry of the reconciliation worklist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckUnit {
    /// Owning record.
    pub record_id: Uuid,
    /// Provider id to check (primary `documentId` or `cancellationDocumentId`).
    pub check_id: String,
    pub kind: UnitKind,
    /// Status of this unit when the worklist was built.
    pub status: SigningStatus,
}
