//! Collaborator interfaces
//!
//! Everything the contract core talks to but does not implement: the host
//! RPC client, the contract store and the chain. Implementations live outside
//! this workspace; `leasehold-testkit` provides in-memory ones.

pub mod host;
pub mod store;

use async_trait::async_trait;

pub use host::{
    ContractRevision, FreeSectorsResult, HostClient, HostPrices, HostSettings, RenterKey,
    SectorRootsResult, TipState,
};
pub use store::ContractStore;

/// Access to the current chain tip
#[async_trait]
pub trait ChainState: Send + Sync {
    /// State of the current tip
    async fn tip_state(&self) -> TipState;
}
