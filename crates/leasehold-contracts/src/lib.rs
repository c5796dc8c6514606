//! # Leasehold Contracts - Locking and Pruning
//!
//! **Purpose**: Serialize revision-advancing work per contract and reconcile
//! a host's stored sectors with what the renter still references.
//!
//! # Architecture Constraints
//!
//! - YES Per-contract leases with priority ordering and passive expiry
//! - YES The sector pruning pass and its spending accounting
//! - YES Tracking of uploads in progress
//! - YES The contract operation surface (`ContractService`)
//! - NO transport, persistence or chain access (collaborator traits from
//!   `leasehold-core`)
//! - NO scheduling of passes; callers decide when to prune again
//!
//! ## Usage
//!
//! Every operation that changes a contract's revision runs while holding the
//! contract's lease. `ContractService::prune_contract` takes the lease
//! itself; code driving `SectorPruner` directly must acquire it first.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Per-contract leases
pub mod lock;

/// Sector pruning passes
pub mod prune;

/// Contract operation surface
pub mod service;

/// Uploads in progress
pub mod uploads;

pub use lock::ContractLocker;
pub use prune::{PruneResult, RevisionCursor, SectorPruner, SpendingTracker};
pub use service::ContractService;
pub use uploads::{PendingUploads, UploadId};
