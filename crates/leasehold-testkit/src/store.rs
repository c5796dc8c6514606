//! In-memory contract store
//!
//! A sector is prunable when no object references its root. Recording
//! spending appends to an audit trail and folds the amounts into the
//! contract's metadata, moving its revision number and size forward.

use async_trait::async_trait;
use leasehold_core::{
    ContractId, ContractMetadata, ContractSpendingRecord, ContractStore, HostKey, SectorRoot,
    StoreError,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct StoreState {
    contracts: HashMap<ContractId, ContractMetadata>,
    host_addresses: HashMap<HostKey, String>,
    referenced: HashSet<SectorRoot>,
    spending: Vec<ContractSpendingRecord>,
    prunable_override: Option<Vec<u64>>,
    prunable_failure: Option<StoreError>,
    record_delay: Option<Duration>,
    prunable_calls: usize,
}

/// In-memory [`ContractStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryContractStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryContractStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace contract metadata
    pub fn insert_contract(&self, contract: ContractMetadata) {
        self.state.lock().contracts.insert(contract.id, contract);
    }

    /// Register a host's network address
    pub fn set_host_address(&self, host_key: HostKey, address: impl Into<String>) {
        self.state
            .lock()
            .host_addresses
            .insert(host_key, address.into());
    }

    /// Mark roots as referenced by a stored object
    pub fn reference(&self, roots: impl IntoIterator<Item = SectorRoot>) {
        self.state.lock().referenced.extend(roots);
    }

    /// Drop object references to roots
    pub fn unreference(&self, roots: impl IntoIterator<Item = SectorRoot>) {
        let mut state = self.state.lock();
        for root in roots {
            state.referenced.remove(&root);
        }
    }

    /// Answer `prunable_contract_roots` with these indices verbatim
    pub fn override_prunable(&self, indices: Vec<u64>) {
        self.state.lock().prunable_override = Some(indices);
    }

    /// Make `prunable_contract_roots` fail
    pub fn fail_prunable(&self, error: StoreError) {
        self.state.lock().prunable_failure = Some(error);
    }

    /// Sleep for `delay` before recording spending
    pub fn delay_records(&self, delay: Duration) {
        self.state.lock().record_delay = Some(delay);
    }

    /// Spending records in the order they were written
    pub fn spending_records(&self) -> Vec<ContractSpendingRecord> {
        self.state.lock().spending.clone()
    }

    /// Stored metadata of a contract
    pub fn contract_metadata(&self, id: ContractId) -> Option<ContractMetadata> {
        self.state.lock().contracts.get(&id).cloned()
    }

    /// Number of `prunable_contract_roots` calls
    pub fn prunable_calls(&self) -> usize {
        self.state.lock().prunable_calls
    }
}

#[async_trait]
impl ContractStore for MemoryContractStore {
    async fn prunable_contract_roots(
        &self,
        _contract_id: ContractId,
        roots: &[SectorRoot],
    ) -> Result<Vec<u64>, StoreError> {
        let mut state = self.state.lock();
        state.prunable_calls += 1;
        if let Some(err) = state.prunable_failure.clone() {
            return Err(err);
        }
        if let Some(indices) = state.prunable_override.clone() {
            return Ok(indices);
        }
        Ok(roots
            .iter()
            .enumerate()
            .filter(|(_, root)| !state.referenced.contains(*root))
            .map(|(index, _)| index as u64)
            .collect())
    }

    async fn record_contract_spending(
        &self,
        records: Vec<ContractSpendingRecord>,
    ) -> Result<(), StoreError> {
        let delay = self.state.lock().record_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        for record in records {
            if let Some(contract) = state.contracts.get_mut(&record.contract_id) {
                contract.spending += record.spending;
                if record.revision_number > contract.revision_number {
                    contract.revision_number = record.revision_number;
                    contract.size = record.size;
                }
            }
            state.spending.push(record);
        }
        Ok(())
    }

    async fn contract(&self, contract_id: ContractId) -> Result<ContractMetadata, StoreError> {
        self.state
            .lock()
            .contracts
            .get(&contract_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("contract {contract_id}")))
    }

    async fn host_address(&self, host_key: HostKey) -> Result<String, StoreError> {
        self.state
            .lock()
            .host_addresses
            .get(&host_key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("host {host_key}")))
    }
}
