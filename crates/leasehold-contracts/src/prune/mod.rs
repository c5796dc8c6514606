//! Sector pruning
//!
//! One pass reconciles a host's sector set with what the renter still
//! references: fetch the latest revision, check prices, enumerate every root,
//! ask the store which ones are unreferenced, skip roots of in-flight uploads
//! and free one capped batch. Every paid RPC advances the revision, so the
//! pass threads a [`RevisionCursor`] through all of them.
//!
//! The caller must hold the contract lock for the duration of the pass.

pub mod accounting;
pub mod pure;
pub mod revision;

pub use accounting::SpendingTracker;
pub use revision::RevisionCursor;

use leasehold_core::{
    sector_count, ChainState, ContractError, ContractId, ContractMetadata, ContractPruneResponse,
    ContractRevision, ContractStore, GougingChecker, HostClient, HostPrices, PruningConfig,
    RenterKey, RpcOperation, SectorRoot, StoreError, TipState, SECTOR_SIZE,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one prune pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneResult {
    /// Contract filesize after the pass
    pub contract_size: u64,
    /// Bytes freed by this pass
    pub pruned: u64,
    /// Prunable bytes left for a later pass
    pub remaining: u64,
    /// Set when the host freed fewer sectors than requested
    pub error: Option<String>,
}

impl PruneResult {
    /// True when another pass would find more to prune
    pub fn has_remaining(&self) -> bool {
        self.remaining > 0
    }
}

impl From<PruneResult> for ContractPruneResponse {
    fn from(result: PruneResult) -> Self {
        Self {
            size: result.contract_size,
            pruned: result.pruned,
            remaining: result.remaining,
            error: result.error,
        }
    }
}

/// Runs prune passes against hosts
///
/// Holds the collaborators a pass needs. Cheap to share behind an `Arc`.
pub struct SectorPruner {
    host: Arc<dyn HostClient>,
    store: Arc<dyn ContractStore>,
    chain: Arc<dyn ChainState>,
    renter_key: RenterKey,
    batch_size: u64,
    spending_record_timeout: Duration,
}

impl SectorPruner {
    /// Create a pruner using the batch size and accounting timeout from `config`
    pub fn new(
        host: Arc<dyn HostClient>,
        store: Arc<dyn ContractStore>,
        chain: Arc<dyn ChainState>,
        renter_key: RenterKey,
        config: &PruningConfig,
    ) -> Self {
        Self {
            host,
            store,
            chain,
            renter_key,
            batch_size: config.max_batch_size.max(1),
            spending_record_timeout: config.spending_record_timeout(),
        }
    }

    /// Override the page and deletion batch size
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Page and deletion batch size
    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Run one prune pass for `contract`
    ///
    /// Fails before any paid RPC on a stale revision or a gouging host. Once
    /// money has been spent the spending record is written even if the pass
    /// then fails or is dropped.
    pub async fn prune(
        &self,
        contract: &ContractMetadata,
        host_address: &str,
        gouging: &dyn GougingChecker,
        pending_uploads: &HashSet<SectorRoot>,
    ) -> Result<PruneResult, ContractError> {
        let contract_id = contract.id;
        let host_key = contract.host_key;

        let latest = self
            .host
            .latest_revision(host_key, host_address, contract_id)
            .await
            .map_err(|e| ContractError::rpc(RpcOperation::LatestRevision, e))?;
        let mut cursor = RevisionCursor::start(contract_id, contract.revision_number, latest)?;

        let settings = self
            .host
            .settings(host_key, host_address)
            .await
            .map_err(|e| ContractError::rpc(RpcOperation::Settings, e))?;
        let breakdown = gouging.check(&settings);
        if breakdown.is_gouging() {
            warn!(contract = %contract_id, host = %host_key, reasons = %breakdown, "host is gouging, skipping prune");
            return Err(ContractError::HostGouging {
                host_key,
                reason: breakdown.to_string(),
            });
        }
        let prices = settings.prices;
        let tip = self.chain.tip_state().await;

        let mut spending = SpendingTracker::new(
            Arc::clone(&self.store),
            contract_id,
            *cursor.current(),
            self.spending_record_timeout,
        );
        let outcome = self
            .reconcile(contract, host_address, tip, &prices, pending_uploads, &mut cursor, &mut spending)
            .await;
        spending.settle().await;

        let result = outcome?;
        info!(
            contract = %contract_id,
            revision = cursor.current().revision_number,
            pruned = result.pruned,
            remaining = result.remaining,
            "prune pass finished"
        );
        Ok(result)
    }

    /// Enumerate, select and free one batch, charging `spending` as each
    /// paid RPC returns
    async fn reconcile(
        &self,
        contract: &ContractMetadata,
        host_address: &str,
        tip: TipState,
        prices: &HostPrices,
        pending_uploads: &HashSet<SectorRoot>,
        cursor: &mut RevisionCursor,
        spending: &mut SpendingTracker,
    ) -> Result<PruneResult, ContractError> {
        let contract_id = contract.id;
        let roots = self
            .fetch_roots(contract, host_address, tip, prices, cursor, spending)
            .await?;

        let (batch, deferred) = self.select_batch(contract_id, &roots, pending_uploads).await?;
        let candidates = batch.len() as u64 + deferred;

        let mut freed = 0;
        let mut partial = None;
        if !batch.is_empty() {
            let requested = batch.len() as u64;
            let size_before = cursor.current().filesize;
            let result = self
                .host
                .free_sectors(
                    contract.host_key,
                    host_address,
                    tip,
                    prices,
                    &self.renter_key,
                    ContractRevision {
                        id: contract_id,
                        revision: *cursor.current(),
                    },
                    &batch,
                )
                .await
                .map_err(|e| ContractError::rpc(RpcOperation::FreeSectors, e))?;
            spending.charge_deletion(result.usage);
            cursor.advance(result.revision)?;
            spending.observe(cursor.current());

            freed = pure::freed_sectors(size_before, cursor.current().filesize).min(requested);
            if freed < requested {
                let err = ContractError::PartialPrune { freed, requested };
                warn!(contract = %contract_id, freed, requested, "host freed fewer sectors than requested");
                partial = Some(err.to_string());
            }
        }

        Ok(PruneResult {
            contract_size: cursor.current().filesize,
            pruned: freed.saturating_mul(SECTOR_SIZE),
            remaining: candidates.saturating_sub(freed).saturating_mul(SECTOR_SIZE),
            error: partial,
        })
    }

    /// Page through every sector root on the host
    ///
    /// Each page is charged to `spending` before its response is validated.
    async fn fetch_roots(
        &self,
        contract: &ContractMetadata,
        host_address: &str,
        tip: TipState,
        prices: &HostPrices,
        cursor: &mut RevisionCursor,
        spending: &mut SpendingTracker,
    ) -> Result<Vec<SectorRoot>, ContractError> {
        let contract_id = contract.id;
        let num_sectors = sector_count(cursor.current().filesize);
        let capacity = usize::try_from(num_sectors.min(self.batch_size)).unwrap_or(0);
        let mut roots = Vec::with_capacity(capacity);

        let mut offset = 0;
        while offset < num_sectors {
            let length = pure::page_length(offset, num_sectors, self.batch_size);
            let page = self
                .host
                .sector_roots(
                    contract.host_key,
                    host_address,
                    tip,
                    prices,
                    &self.renter_key,
                    ContractRevision {
                        id: contract_id,
                        revision: *cursor.current(),
                    },
                    offset,
                    length,
                )
                .await
                .map_err(|e| ContractError::rpc(RpcOperation::SectorRoots, e))?;

            spending.charge_roots(page.usage);
            cursor.advance(page.revision)?;
            spending.observe(cursor.current());

            let received = page.roots.len() as u64;
            if received == 0 || received > length {
                return Err(ContractError::HostProtocol {
                    contract_id,
                    message: format!(
                        "requested {length} roots at offset {offset}, received {received}"
                    ),
                });
            }
            debug!(contract = %contract_id, offset, received, "fetched sector roots page");
            roots.extend(page.roots);
            offset += received;
        }
        Ok(roots)
    }

    /// Resolve the capped deletion batch and the number of deferred candidates
    async fn select_batch(
        &self,
        contract_id: ContractId,
        roots: &[SectorRoot],
        pending_uploads: &HashSet<SectorRoot>,
    ) -> Result<(Vec<u64>, u64), ContractError> {
        let indices = self
            .store
            .prunable_contract_roots(contract_id, roots)
            .await?;
        let indices = pure::normalize_indices(indices, roots.len()).map_err(|index| {
            StoreError::InvalidData {
                message: format!(
                    "prunable index {index} out of range for {} roots",
                    roots.len()
                ),
            }
        })?;

        let prunable = indices.len();
        let candidates = pure::exclude_pending(indices, roots, pending_uploads);
        if candidates.len() < prunable {
            debug!(
                contract = %contract_id,
                skipped = prunable - candidates.len(),
                "skipping sectors of pending uploads"
            );
        }
        Ok(pure::cap_batch(candidates, self.batch_size))
    }
}

impl std::fmt::Debug for SectorPruner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectorPruner")
            .field("batch_size", &self.batch_size)
            .field("spending_record_timeout", &self.spending_record_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_converts_to_response() {
        let response: ContractPruneResponse = PruneResult {
            contract_size: 3 * SECTOR_SIZE,
            pruned: SECTOR_SIZE,
            remaining: 0,
            error: None,
        }
        .into();
        assert_eq!(response.size, 3 * SECTOR_SIZE);
        assert_eq!(response.pruned, SECTOR_SIZE);
        assert!(response.error.is_none());
    }

    #[test]
    fn remaining_signals_another_pass() {
        let result = PruneResult {
            contract_size: 0,
            pruned: 0,
            remaining: SECTOR_SIZE,
            error: None,
        };
        assert!(result.has_remaining());
    }
}
