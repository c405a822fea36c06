//! Lifecycle states for one enrollment run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of an enrollment session.
///
/// A session moves strictly forward through the non-terminal states and ends
/// in exactly one of the three terminal states. `Failed` and `Cancelled` are
/// absorbing: once reached, no further transition happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session created, `start` not yet called.
    Idle,
    /// Establishing the transient link to the issuer endpoint.
    Connecting,
    /// Retrieving the CA profile from the trust anchor.
    ProfileFetch,
    /// Asking the issuer which names this email may claim.
    Probing,
    /// Generating the key pair for the assigned name.
    KeyGen,
    /// Certificate request submitted, challenge not yet demanded.
    Requesting,
    /// Suspended, waiting for the human-supplied one-time code.
    AwaitingCode,
    /// Code accepted, issuance in progress.
    Issuing,
    /// Credential produced.
    Completed,
    /// Terminal failure; cause reported once through the error path.
    Failed,
    /// Externally torn down; no credential, no failure report.
    Cancelled,
}

impl SessionState {
    /// Returns true if the session has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true while the session holds (or may hold) live resources.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle) && !self.is_terminal()
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::ProfileFetch => "profile_fetch",
            Self::Probing => "probing",
            Self::KeyGen => "key_gen",
            Self::Requesting => "requesting",
            Self::AwaitingCode => "awaiting_code",
            Self::Issuing => "issuing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
