//! Contract store effect interface
//!
//! The store is the local source of truth for which sectors are still
//! referenced. Implementations must tolerate concurrent calls for different
//! contracts; the contract lock only serializes work on one contract.

use crate::errors::StoreError;
use crate::types::{ContractId, ContractMetadata, ContractSpendingRecord, HostKey, SectorRoot};
use async_trait::async_trait;

/// Persistence operations consumed by contract maintenance
#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Positions in `roots` that no live object references
    async fn prunable_contract_roots(
        &self,
        contract_id: ContractId,
        roots: &[SectorRoot],
    ) -> Result<Vec<u64>, StoreError>;

    /// Append spending records
    async fn record_contract_spending(
        &self,
        records: Vec<ContractSpendingRecord>,
    ) -> Result<(), StoreError>;

    /// Metadata of a contract
    async fn contract(&self, contract_id: ContractId) -> Result<ContractMetadata, StoreError>;

    /// Network address of a host
    async fn host_address(&self, host_key: HostKey) -> Result<String, StoreError>;
}
