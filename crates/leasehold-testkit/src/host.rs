//! In-memory host
//!
//! Behaves like a host holding a set of contracts: reads and deletions are
//! priced from the advertised settings, every paid call bumps the revision
//! number, and freeing sectors shrinks the filesize. Failures, stale
//! revisions, partial deletions and slow calls can be injected.

use async_trait::async_trait;
use leasehold_core::{
    ContractId, ContractRevision, Currency, FreeSectorsResult, HostClient, HostError, HostKey, HostPrices,
    HostSettings, RenterKey, Revision, RpcOperation, SectorRoot, SectorRootsResult, TipState,
    Usage, SECTOR_SIZE,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Number of calls made per RPC
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostCalls {
    /// `latest_revision` calls
    pub latest_revision: usize,
    /// `settings` calls
    pub settings: usize,
    /// `sector_roots` calls
    pub sector_roots: usize,
    /// `free_sectors` calls
    pub free_sectors: usize,
}

impl HostCalls {
    /// Calls that cost the renter money
    pub fn paid(&self) -> usize {
        self.sector_roots + self.free_sectors
    }

    /// All calls
    pub fn total(&self) -> usize {
        self.latest_revision + self.settings + self.paid()
    }
}

#[derive(Debug, Clone)]
struct HostContract {
    roots: Vec<SectorRoot>,
    revision: Revision,
}

impl HostContract {
    fn charge(&mut self, usage: Usage) {
        self.revision.revision_number += 1;
        self.revision.renter_funds = self.revision.renter_funds.saturating_sub(usage.renter_cost());
        self.revision.missed_host_value += usage.renter_cost();
    }
}

#[derive(Debug, Default)]
struct HostState {
    settings: HostSettings,
    contracts: HashMap<ContractId, HostContract>,
    calls: HostCalls,
    failures: Vec<(RpcOperation, HostError)>,
    reported_revision: Option<u64>,
    stale_free_response: bool,
    free_limit: Option<u64>,
    free_delay: Option<Duration>,
    presented_revisions: Vec<u64>,
    freed_batches: Vec<Vec<u64>>,
}

impl HostState {
    fn failure(&self, operation: RpcOperation) -> Option<HostError> {
        self.failures
            .iter()
            .find(|(op, _)| *op == operation)
            .map(|(_, err)| err.clone())
    }

    fn contract_mut(&mut self, id: ContractId) -> Result<&mut HostContract, HostError> {
        self.contracts
            .get_mut(&id)
            .ok_or_else(|| HostError::rejected(format!("unknown contract {id}")))
    }
}

/// In-memory [`HostClient`]
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    state: Arc<Mutex<HostState>>,
}

impl MemoryHost {
    /// Host advertising `settings`
    pub fn new(settings: HostSettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                settings,
                ..HostState::default()
            })),
        }
    }

    /// Store `roots` under a contract at `revision_number`
    pub fn add_contract(&self, id: ContractId, revision_number: u64, roots: Vec<SectorRoot>) {
        let revision = Revision {
            contract_id: id,
            revision_number,
            filesize: roots.len() as u64 * SECTOR_SIZE,
            ..Revision::default()
        };
        self.state
            .lock()
            .contracts
            .insert(id, HostContract { roots, revision });
    }

    /// Set the renter funds and host payout of a contract's revision
    pub fn set_payouts(&self, id: ContractId, renter_funds: u128, missed_host_value: u128) {
        if let Some(contract) = self.state.lock().contracts.get_mut(&id) {
            contract.revision.renter_funds = Currency::new(renter_funds);
            contract.revision.missed_host_value = Currency::new(missed_host_value);
        }
    }

    /// Replace the advertised settings
    pub fn set_settings(&self, settings: HostSettings) {
        self.state.lock().settings = settings;
    }

    /// Make every call to `operation` fail with `error`
    pub fn fail(&self, operation: RpcOperation, error: HostError) {
        self.state.lock().failures.push((operation, error));
    }

    /// Report this revision number from `latest_revision` instead of the real one
    pub fn report_revision_number(&self, revision_number: u64) {
        self.state.lock().reported_revision = Some(revision_number);
    }

    /// Answer `free_sectors` with the revision that was presented instead of
    /// the new one
    pub fn return_stale_revision_on_free(&self) {
        self.state.lock().stale_free_response = true;
    }

    /// Free at most `limit` sectors per call
    pub fn limit_frees(&self, limit: u64) {
        self.state.lock().free_limit = Some(limit);
    }

    /// Sleep for `delay` before answering `free_sectors`
    pub fn delay_frees(&self, delay: Duration) {
        self.state.lock().free_delay = Some(delay);
    }

    /// Current revision of a contract
    pub fn revision(&self, id: ContractId) -> Option<Revision> {
        self.state.lock().contracts.get(&id).map(|c| c.revision)
    }

    /// Current roots of a contract
    pub fn roots(&self, id: ContractId) -> Vec<SectorRoot> {
        self.state
            .lock()
            .contracts
            .get(&id)
            .map(|c| c.roots.clone())
            .unwrap_or_default()
    }

    /// Calls made so far
    pub fn calls(&self) -> HostCalls {
        self.state.lock().calls
    }

    /// Revision numbers presented with each paid call, in call order
    pub fn presented_revisions(&self) -> Vec<u64> {
        self.state.lock().presented_revisions.clone()
    }

    /// Index batches passed to `free_sectors`, in call order
    pub fn freed_batches(&self) -> Vec<Vec<u64>> {
        self.state.lock().freed_batches.clone()
    }
}

#[async_trait]
impl HostClient for MemoryHost {
    async fn latest_revision(
        &self,
        _host_key: HostKey,
        _address: &str,
        contract_id: ContractId,
    ) -> Result<Revision, HostError> {
        let mut state = self.state.lock();
        state.calls.latest_revision += 1;
        if let Some(err) = state.failure(RpcOperation::LatestRevision) {
            return Err(err);
        }
        let reported = state.reported_revision;
        let mut revision = state.contract_mut(contract_id)?.revision;
        if let Some(number) = reported {
            revision.revision_number = number;
        }
        Ok(revision)
    }

    async fn settings(&self, _host_key: HostKey, _address: &str) -> Result<HostSettings, HostError> {
        let mut state = self.state.lock();
        state.calls.settings += 1;
        if let Some(err) = state.failure(RpcOperation::Settings) {
            return Err(err);
        }
        Ok(state.settings.clone())
    }

    async fn sector_roots(
        &self,
        _host_key: HostKey,
        _address: &str,
        _tip: TipState,
        prices: &HostPrices,
        _renter_key: &RenterKey,
        contract: ContractRevision,
        offset: u64,
        length: u64,
    ) -> Result<SectorRootsResult, HostError> {
        let mut state = self.state.lock();
        state.calls.sector_roots += 1;
        state
            .presented_revisions
            .push(contract.revision.revision_number);
        if let Some(err) = state.failure(RpcOperation::SectorRoots) {
            return Err(err);
        }

        let host_contract = state.contract_mut(contract.id)?;
        let start = usize::try_from(offset).map_err(|_| HostError::rejected("offset too large"))?;
        let end = start
            .checked_add(usize::try_from(length).map_err(|_| HostError::rejected("length too large"))?)
            .filter(|end| *end <= host_contract.roots.len())
            .ok_or_else(|| HostError::rejected("requested roots out of range"))?;

        let usage = prices.sector_roots_cost(length);
        host_contract.charge(usage);
        Ok(SectorRootsResult {
            roots: host_contract.roots[start..end].to_vec(),
            revision: host_contract.revision,
            usage,
        })
    }

    async fn free_sectors(
        &self,
        _host_key: HostKey,
        _address: &str,
        _tip: TipState,
        prices: &HostPrices,
        _renter_key: &RenterKey,
        contract: ContractRevision,
        indices: &[u64],
    ) -> Result<FreeSectorsResult, HostError> {
        let delay = {
            let mut state = self.state.lock();
            state.calls.free_sectors += 1;
            state
                .presented_revisions
                .push(contract.revision.revision_number);
            state.freed_batches.push(indices.to_vec());
            if let Some(err) = state.failure(RpcOperation::FreeSectors) {
                return Err(err);
            }
            state.free_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        let limit = state.free_limit.unwrap_or(u64::MAX);
        let stale = state.stale_free_response;
        let host_contract = state.contract_mut(contract.id)?;

        let mut unique = HashSet::new();
        for &index in indices {
            if index >= host_contract.roots.len() as u64 || !unique.insert(index) {
                return Err(HostError::rejected(format!("invalid sector index {index}")));
            }
        }

        let mut doomed: Vec<usize> = indices
            .iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|&i| i as usize)
            .collect();
        doomed.sort_unstable_by(|a, b| b.cmp(a));
        for index in doomed {
            host_contract.roots.remove(index);
        }

        let usage = prices.free_sectors_cost(indices.len() as u64);
        host_contract.charge(usage);
        host_contract.revision.filesize = host_contract.roots.len() as u64 * SECTOR_SIZE;

        let revision = if stale {
            Revision {
                revision_number: contract.revision.revision_number.saturating_sub(1),
                ..host_contract.revision
            }
        } else {
            host_contract.revision
        };
        Ok(FreeSectorsResult { revision, usage })
    }
}
