//! Derived transcription status of an asset

use crate::db::models::Transcription;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Review state of an asset, derived from its latest transcription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionStatus {
    NotStarted,
    InProgress,
    Submitted,
    Completed,
}

impl TranscriptionStatus {
    /// Statuses offered to transcribers
    pub const TRANSCRIBABLE: [TranscriptionStatus; 2] =
        [TranscriptionStatus::NotStarted, TranscriptionStatus::InProgress];

    /// Statuses offered to reviewers
    pub const REVIEWABLE: [TranscriptionStatus; 1] = [TranscriptionStatus::Submitted];

    pub const ALL: [TranscriptionStatus; 4] = [
        TranscriptionStatus::NotStarted,
        TranscriptionStatus::InProgress,
        TranscriptionStatus::Submitted,
        TranscriptionStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptionStatus::NotStarted => "not_started",
            TranscriptionStatus::InProgress => "in_progress",
            TranscriptionStatus::Submitted => "submitted",
            TranscriptionStatus::Completed => "completed",
        }
    }

    /// Status as a pure function of the latest revision
    ///
    /// A rejected revision sends the asset back to `InProgress`.
    pub fn derive(latest: Option<&Transcription>) -> Self {
        match latest {
            None => TranscriptionStatus::NotStarted,
            Some(t) if t.accepted_at.is_some() => TranscriptionStatus::Completed,
            Some(t) if t.rejected_at.is_some() => TranscriptionStatus::InProgress,
            Some(t) if t.submitted_at.is_some() => TranscriptionStatus::Submitted,
            Some(_) => TranscriptionStatus::InProgress,
        }
    }
}

impl fmt::Display for TranscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranscriptionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(TranscriptionStatus::NotStarted),
            "in_progress" => Ok(TranscriptionStatus::InProgress),
            "submitted" => Ok(TranscriptionStatus::Submitted),
            "completed" => Ok(TranscriptionStatus::Completed),
            other => Err(Error::Validation(format!("unknown transcription status: {}", other))),
        }
    }
}
