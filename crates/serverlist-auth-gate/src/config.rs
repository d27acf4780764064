//! Gate configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What the gate does when the session store can't answer.
///
/// Neither choice is always right, so it is a deployment setting:
/// a public server may prefer letting players in during an outage, a
/// whitelisted one may prefer keeping everyone out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutagePolicy {
    /// Deny with [`DenyReason::ServiceUnavailable`](crate::DenyReason::ServiceUnavailable).
    #[default]
    FailClosed,
    /// Allow as [`AdmissionResult::AllowedUnverified`](crate::AdmissionResult::AllowedUnverified).
    FailOpen,
}

/// Returned when parsing an unknown policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown outage policy {0:?} (expected \"fail-closed\" or \"fail-open\")")]
pub struct UnknownPolicy(pub String);

impl FromStr for OutagePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-closed" | "fail_closed" | "closed" => Ok(Self::FailClosed),
            "fail-open" | "fail_open" | "open" => Ok(Self::FailOpen),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for OutagePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailClosed => write!(f, "fail-closed"),
            Self::FailOpen => write!(f, "fail-open"),
        }
    }
}

/// Settings for an [`AdmissionGate`](crate::AdmissionGate).
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Outage behaviour.
    pub outage_policy: OutagePolicy,

    /// Upper bound on a whole admission check (waiting for a slot plus
    /// validation). Past this the attempt is treated as unavailable, so
    /// the host's own connection timeout never fires first.
    pub check_timeout: Duration,

    /// Admission checks allowed to run at once. Set to the store's pool
    /// size: more would only queue inside the pool.
    pub max_in_flight: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            outage_policy: OutagePolicy::default(),
            check_timeout: Duration::from_secs(5),
            max_in_flight: 10,
        }
    }
}
