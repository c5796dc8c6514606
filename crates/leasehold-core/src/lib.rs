//! # Leasehold Core - Foundation
//!
//! **Purpose**: Define the contract domain types, the error taxonomy, the
//! configuration schema and the interfaces of every external collaborator.
//!
//! # Architecture Constraints
//!
//! - YES Contract, revision, spending and usage types
//! - YES Collaborator traits (`HostClient`, `ContractStore`, `ChainState`,
//!   `GougingChecker`)
//! - YES Pure helpers (sector counts, price limit checks)
//! - NO locking or orchestration (that's `leasehold-contracts`)
//! - NO in-memory collaborator implementations (that's `leasehold-testkit`)
//!
//! ## Core Concepts
//!
//! - **Revision**: numbered contract state; numbers never go backwards
//! - **Spending**: additive cost breakdown, recorded as an append-only trail
//! - **Usage**: what a single host RPC charged

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Configuration schema and loading
pub mod config;

/// Protocol constants
pub mod constants;

/// Collaborator interfaces
pub mod effects;

/// Error types
pub mod errors;

/// Price gouging checks
pub mod gouging;

/// Domain types
pub mod types;

pub use config::{ConfigError, LeaseholdConfig, LockConfig, PruningConfig};
pub use constants::{sector_count, MAX_SECTOR_BATCH_SIZE, SECTOR_SIZE};
pub use effects::{
    ChainState, ContractRevision, ContractStore, FreeSectorsResult, HostClient, HostPrices,
    HostSettings, RenterKey, SectorRootsResult, TipState,
};
pub use errors::{ContractError, HostError, RpcOperation, StoreError};
pub use gouging::{GougingBreakdown, GougingChecker, GougingSettings, PriceLimitChecker};
pub use types::*;
