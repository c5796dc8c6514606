//! Domain types shared by every leasehold crate

pub mod api;
pub mod contract;
pub mod currency;
pub mod identifiers;
pub mod spending;

pub use api::{
    ContractAcquireRequest, ContractAcquireResponse, ContractKeepaliveRequest,
    ContractPruneRequest, ContractPruneResponse, ContractReleaseRequest, DurationMs, LockId,
};
pub use contract::{
    ArchivalReason, ContractMetadata, ContractPrunableData, ContractSize, ContractState,
    ContractUsability, ContractsPrunableData, Revision,
};
pub use currency::Currency;
pub use identifiers::{ContractId, Hash256, HostKey, ParseIdError, SectorRoot};
pub use spending::{ContractSpending, ContractSpendingRecord, Usage};
