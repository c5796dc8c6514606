//! Request and response types for the contract operation surface
//!
//! These are the payloads an outer API layer exchanges with the contract
//! service. Durations travel as milliseconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A duration serialized as whole milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationMs(pub u64);

impl DurationMs {
    /// Create from milliseconds
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Convert to a std duration
    pub const fn as_duration(self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl From<Duration> for DurationMs {
    fn from(d: Duration) -> Self {
        Self(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

impl From<DurationMs> for Duration {
    fn from(d: DurationMs) -> Self {
        d.as_duration()
    }
}

/// Opaque handle of a granted contract lease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockId(pub u64);

impl std::fmt::Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Request to acquire a contract lease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAcquireRequest {
    /// How long the lease is held before it expires
    pub duration: DurationMs,
    /// Higher values are served first
    pub priority: i64,
}

/// Response to a successful acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAcquireResponse {
    /// Handle of the granted lease
    #[serde(rename = "lockID")]
    pub lock_id: LockId,
}

/// Request to extend a held lease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractKeepaliveRequest {
    /// New time to expiry, measured from now
    pub duration: DurationMs,
    /// Handle of the lease to extend
    #[serde(rename = "lockID")]
    pub lock_id: LockId,
}

/// Request to release a held lease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractReleaseRequest {
    /// Handle of the lease to release
    #[serde(rename = "lockID")]
    pub lock_id: LockId,
}

/// Request to run one pruning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractPruneRequest {
    /// Upper bound on the pass; zero selects the configured default
    pub timeout: DurationMs,
}

/// Outcome of one pruning pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractPruneResponse {
    /// Contract size after the pass
    pub size: u64,
    /// Bytes freed by the pass
    pub pruned: u64,
    /// Prunable bytes deferred to a later pass
    pub remaining: u64,
    /// Set when the deletion was only partially applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_travel_as_millis() {
        let req = ContractAcquireRequest {
            duration: Duration::from_secs(2).into(),
            priority: 3,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"duration":2000,"priority":3}"#);
    }

    #[test]
    fn prune_response_omits_empty_error() {
        let json = serde_json::to_string(&ContractPruneResponse {
            size: 8,
            pruned: 4,
            remaining: 0,
            error: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"size":8,"pruned":4,"remaining":0}"#);
    }
}
