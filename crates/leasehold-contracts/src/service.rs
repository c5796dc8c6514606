//! Contract operation surface
//!
//! [`ContractService`] is what an outer API layer talks to: lease management
//! by request/response payloads and single prune passes that take care of
//! their own locking.

use crate::lock::ContractLocker;
use crate::prune::{PruneResult, SectorPruner};
use crate::uploads::PendingUploads;
use leasehold_core::{
    ChainState, ContractAcquireRequest, ContractAcquireResponse, ContractError, ContractId,
    ContractKeepaliveRequest, ContractPruneRequest, ContractPruneResponse, ContractReleaseRequest,
    ContractStore, GougingChecker, HostClient, LeaseholdConfig, PriceLimitChecker, RenterKey,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Extra lease time beyond a prune pass deadline
const PRUNE_LEASE_MARGIN: Duration = Duration::from_secs(5);

/// Lease management and pruning for contracts
pub struct ContractService {
    locker: Arc<ContractLocker>,
    pruner: SectorPruner,
    store: Arc<dyn ContractStore>,
    gouging: Arc<dyn GougingChecker>,
    uploads: Arc<PendingUploads>,
    max_wait: Duration,
    default_prune_timeout: Duration,
    prune_priority: i64,
}

impl ContractService {
    /// Wire a service from configuration and collaborators
    ///
    /// Host prices are checked against `config.gouging`; use
    /// [`ContractService::with_gouging_checker`] to substitute another policy.
    pub fn new(
        config: &LeaseholdConfig,
        host: Arc<dyn HostClient>,
        store: Arc<dyn ContractStore>,
        chain: Arc<dyn ChainState>,
        renter_key: RenterKey,
    ) -> Self {
        Self {
            locker: Arc::new(ContractLocker::new(&config.lock)),
            pruner: SectorPruner::new(host, Arc::clone(&store), chain, renter_key, &config.pruning),
            store,
            gouging: Arc::new(PriceLimitChecker::new(config.gouging)),
            uploads: Arc::new(PendingUploads::new()),
            max_wait: config.lock.max_wait(),
            default_prune_timeout: config.pruning.default_timeout(),
            prune_priority: config.pruning.lock_priority,
        }
    }

    /// Replace the gouging policy
    pub fn with_gouging_checker(mut self, gouging: Arc<dyn GougingChecker>) -> Self {
        self.gouging = gouging;
        self
    }

    /// Share an existing upload registry
    pub fn with_pending_uploads(mut self, uploads: Arc<PendingUploads>) -> Self {
        self.uploads = uploads;
        self
    }

    /// Share an existing locker
    pub fn with_locker(mut self, locker: Arc<ContractLocker>) -> Self {
        self.locker = locker;
        self
    }

    /// Locker guarding revision-advancing operations
    pub fn locker(&self) -> &Arc<ContractLocker> {
        &self.locker
    }

    /// Registry of uploads in progress
    pub fn pending_uploads(&self) -> &Arc<PendingUploads> {
        &self.uploads
    }

    /// Acquire a lease, waiting at most the configured maximum
    pub async fn acquire_contract(
        &self,
        contract_id: ContractId,
        request: ContractAcquireRequest,
    ) -> Result<ContractAcquireResponse, ContractError> {
        let lock_id = self
            .locker
            .acquire(
                contract_id,
                self.max_wait,
                request.duration.as_duration(),
                request.priority,
            )
            .await?;
        Ok(ContractAcquireResponse { lock_id })
    }

    /// Extend a held lease
    pub fn keepalive_contract(
        &self,
        contract_id: ContractId,
        request: ContractKeepaliveRequest,
    ) -> Result<(), ContractError> {
        self.locker
            .keepalive(contract_id, request.lock_id, request.duration.as_duration())
    }

    /// Release a held lease
    pub fn release_contract(
        &self,
        contract_id: ContractId,
        request: ContractReleaseRequest,
    ) -> Result<(), ContractError> {
        self.locker.release(contract_id, request.lock_id)
    }

    /// Run one prune pass under the contract's lease
    ///
    /// The lease is taken with the pruning priority. Once granted it is
    /// extended to outlast the pass deadline, and contract metadata is read
    /// under it. It is released afterwards whatever the outcome.
    pub async fn prune_contract(
        &self,
        contract_id: ContractId,
        request: ContractPruneRequest,
    ) -> Result<ContractPruneResponse, ContractError> {
        let timeout = match request.timeout.as_duration() {
            Duration::ZERO => self.default_prune_timeout,
            timeout => timeout,
        };
        let lease = timeout.saturating_add(PRUNE_LEASE_MARGIN);

        let lock_id = self
            .locker
            .acquire(contract_id, self.max_wait, lease, self.prune_priority)
            .await?;
        // the pass deadline must fall strictly before the lease expiry
        let deadline = Instant::now() + timeout;
        self.locker.keepalive(contract_id, lock_id, lease)?;
        debug!(contract = %contract_id, lock_id = %lock_id, "locked contract for pruning");

        let outcome = tokio::time::timeout_at(deadline, self.prune_locked(contract_id)).await;

        if let Err(err) = self.locker.release(contract_id, lock_id) {
            warn!(contract = %contract_id, error = %err, "pruning lease was lost before release");
        }

        let result = match outcome {
            Ok(result) => result?,
            Err(_) => {
                warn!(contract = %contract_id, timeout_ms = timeout.as_millis() as u64, "prune pass timed out");
                return Err(ContractError::PruneTimedOut {
                    contract_id,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };
        info!(
            contract = %contract_id,
            pruned = result.pruned,
            remaining = result.remaining,
            "pruned contract"
        );
        Ok(result.into())
    }

    async fn prune_locked(&self, contract_id: ContractId) -> Result<PruneResult, ContractError> {
        let contract = self.store.contract(contract_id).await?;
        if contract.is_archived() {
            return Err(ContractError::ContractArchived { contract_id });
        }
        let host_address = self.store.host_address(contract.host_key).await?;
        let pending = self.uploads.pending_sectors();
        self.pruner
            .prune(&contract, &host_address, self.gouging.as_ref(), &pending)
            .await
    }
}

impl std::fmt::Debug for ContractService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractService")
            .field("pruner", &self.pruner)
            .field("max_wait", &self.max_wait)
            .field("default_prune_timeout", &self.default_prune_timeout)
            .field("prune_priority", &self.prune_priority)
            .finish_non_exhaustive()
    }
}
