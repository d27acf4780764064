//! Admission states, denial reasons, and results.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AdmissionState
// ---------------------------------------------------------------------------

/// Where a single connection attempt is in its admission check.
///
/// ```text
/// Pending → Validating → Allowed
///                      ↘ Denied
/// ```
///
/// - **Pending**: the host reported the attempt; nothing checked yet.
/// - **Validating**: waiting on a gate slot and the credential validator.
/// - **Allowed** / **Denied**: final. The host acts on the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionState {
    Pending,
    Validating,
    Allowed,
    Denied,
}

impl AdmissionState {
    /// Returns `true` once the attempt has been decided.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Allowed | Self::Denied)
    }

    /// Returns `true` if moving from `self` to `target` is legal.
    ///
    /// `Pending` may only go to `Validating`; `Validating` may only end
    /// in `Allowed` or `Denied`; final states go nowhere.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Validating)
                | (Self::Validating, Self::Allowed)
                | (Self::Validating, Self::Denied)
        )
    }
}

impl fmt::Display for AdmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Validating => write!(f, "Validating"),
            Self::Allowed => write!(f, "Allowed"),
            Self::Denied => write!(f, "Denied"),
        }
    }
}

// ---------------------------------------------------------------------------
// DenyReason
// ---------------------------------------------------------------------------

/// Why a connection was refused.
///
/// The split matters to the player: the first two they can fix by
/// re-authenticating through the server list; the last one is ours to
/// fix, and telling them their credential is bad would be a lie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No session, or the presented token doesn't match it.
    InvalidCredential,
    /// The session existed but has expired.
    SessionExpired,
    /// The session store couldn't answer in time.
    ServiceUnavailable,
}

impl DenyReason {
    /// Stable machine-readable code for the host and for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredential => "invalid_credential",
            Self::SessionExpired => "session_expired",
            Self::ServiceUnavailable => "service_unavailable",
        }
    }

    /// Text suitable for showing to the player.
    pub fn player_message(&self) -> &'static str {
        match self {
            Self::InvalidCredential => {
                "Your server list session is not valid. Please join again through the server list."
            }
            Self::SessionExpired => {
                "Your server list session has expired. Please join again through the server list."
            }
            Self::ServiceUnavailable => {
                "This server cannot accept connections right now. Please try again shortly."
            }
        }
    }

    /// Returns `true` if the player can resolve this themselves.
    pub fn is_user_correctable(&self) -> bool {
        !matches!(self, Self::ServiceUnavailable)
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// AdmissionResult
// ---------------------------------------------------------------------------

/// The gate's answer for one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionResult {
    /// The player holds a valid session.
    Allowed,
    /// The store was unavailable and the gate is configured to fail
    /// open. The player was let in without a credential check.
    AllowedUnverified,
    /// The player may not connect.
    Denied(DenyReason),
}

impl AdmissionResult {
    /// Returns `true` if the host should let the player in.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed | Self::AllowedUnverified)
    }

    /// The final [`AdmissionState`] this result corresponds to.
    pub fn state(&self) -> AdmissionState {
        if self.is_allowed() {
            AdmissionState::Allowed
        } else {
            AdmissionState::Denied
        }
    }

    /// The denial reason, if denied.
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::Denied(reason) => Some(*reason),
            _ => None,
        }
    }
}
