//! Error types for contract coordination and pruning
//!
//! Collaborator failures (`HostError`, `StoreError`) are kept separate from
//! `ContractError`, which is what the locker, the pruner and the service
//! surface to their callers.

use crate::types::{ContractId, HostKey, LockId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure reported by a host RPC client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum HostError {
    /// Could not reach the host or the session broke
    #[error("transport error: {message}")]
    Transport {
        /// Underlying cause
        message: String,
    },
    /// The host answered with an error
    #[error("host rejected request: {message}")]
    Rejected {
        /// Host-supplied reason
        message: String,
    },
    /// The host did not answer in time
    #[error("host timed out after {timeout_ms}ms")]
    Timeout {
        /// Elapsed time
        timeout_ms: u64,
    },
}

impl HostError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a rejection error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Failure reported by the contract store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StoreError {
    /// Requested entity does not exist
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing entity
        what: String,
    },
    /// The backing database failed
    #[error("store backend error: {message}")]
    Backend {
        /// Underlying cause
        message: String,
    },
    /// The store returned data that violates its contract
    #[error("store returned invalid data: {message}")]
    InvalidData {
        /// What was wrong
        message: String,
    },
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Host RPC that failed, for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcOperation {
    /// Fetching the latest revision
    LatestRevision,
    /// Fetching host settings
    Settings,
    /// Fetching a page of sector roots
    SectorRoots,
    /// Freeing sectors
    FreeSectors,
}

impl fmt::Display for RpcOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RpcOperation::LatestRevision => "fetch latest revision",
            RpcOperation::Settings => "fetch host settings",
            RpcOperation::SectorRoots => "fetch sector roots",
            RpcOperation::FreeSectors => "free sectors",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by contract locking, pruning and the service facade
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// The lease was not granted within the requested wait
    #[error("timed out after {waited_ms}ms waiting to lock {contract_id}")]
    LockTimedOut {
        /// Contract that was being locked
        contract_id: ContractId,
        /// How long the caller waited
        waited_ms: u64,
    },

    /// Keepalive or release with a token that does not hold the contract
    #[error("lease {lock_id} is not held on {contract_id}")]
    LeaseNotHeld {
        /// Contract the caller believed it held
        contract_id: ContractId,
        /// Token presented by the caller
        lock_id: LockId,
    },

    /// A revision older than one already observed was returned
    #[error("revision of {contract_id} regressed from {known} to {observed}")]
    StaleRevision {
        /// Contract whose revision regressed
        contract_id: ContractId,
        /// Highest revision number already known
        known: u64,
        /// Revision number just observed
        observed: u64,
    },

    /// The host's prices are unreasonable
    #[error("host {host_key} is gouging: {reason}")]
    HostGouging {
        /// Offending host
        host_key: HostKey,
        /// Human readable breakdown
        reason: String,
    },

    /// A host RPC failed
    #[error("failed to {operation}: {source}")]
    RemoteRpc {
        /// RPC that failed
        operation: RpcOperation,
        /// Underlying host error
        #[source]
        source: HostError,
    },

    /// The host answered with data that breaks the protocol
    #[error("host protocol violation on {contract_id}: {message}")]
    HostProtocol {
        /// Contract being operated on
        contract_id: ContractId,
        /// What was wrong
        message: String,
    },

    /// The deletion was only partially applied
    #[error("host freed {freed} of {requested} sectors")]
    PartialPrune {
        /// Sectors actually freed
        freed: u64,
        /// Sectors requested
        requested: u64,
    },

    /// The contract store failed
    #[error("contract store error: {0}")]
    Store(#[from] StoreError),

    /// Operation is not allowed on an archived contract
    #[error("contract {contract_id} is archived")]
    ContractArchived {
        /// Archived contract
        contract_id: ContractId,
    },

    /// Invalid archival transition
    #[error("cannot archive {contract_id}: {reason}")]
    InvalidArchival {
        /// Contract being archived
        contract_id: ContractId,
        /// Why the transition was refused
        reason: String,
    },

    /// A pruning pass exceeded its timeout
    #[error("pruning {contract_id} timed out after {timeout_ms}ms")]
    PruneTimedOut {
        /// Contract being pruned
        contract_id: ContractId,
        /// Configured timeout
        timeout_ms: u64,
    },
}

impl ContractError {
    /// Wrap a host error with the operation that produced it
    pub fn rpc(operation: RpcOperation, source: HostError) -> Self {
        Self::RemoteRpc { operation, source }
    }

    /// True for failures that happen before any money is spent
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ContractError::StaleRevision { .. }
                | ContractError::HostGouging { .. }
                | ContractError::RemoteRpc {
                    operation: RpcOperation::LatestRevision | RpcOperation::Settings,
                    ..
                }
        )
    }

    /// True for lock failures a caller should retry with backoff
    pub fn is_lock_contention(&self) -> bool {
        matches!(self, ContractError::LockTimedOut { .. })
    }
}
