//! Spending accounting for a prune pass.
//!
//! Charges are handed to a [`SpendingTracker`] as soon as each paid RPC
//! returns. The record is written from a spawned task bounded by its own
//! timeout, and a tracker dropped before it was settled spawns that task
//! itself, so a caller that abandons the pass after money was spent does not
//! lose the audit entry.

use leasehold_core::{
    ContractId, ContractSpending, ContractSpendingRecord, ContractStore, Revision, Usage,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Build the spending record for a pass, or `None` when nothing was charged.
pub fn spending_record(
    contract_id: ContractId,
    roots_usage: Usage,
    delete_usage: Usage,
    revision: &Revision,
) -> Option<ContractSpendingRecord> {
    let spending = ContractSpending {
        deletions: delete_usage.renter_cost(),
        sector_roots: roots_usage.renter_cost(),
        ..ContractSpending::default()
    };
    if spending.is_zero() {
        return None;
    }
    Some(ContractSpendingRecord {
        spending,
        contract_id,
        revision_number: revision.revision_number,
        size: revision.filesize,
        missed_host_payout: revision.missed_host_value,
        valid_renter_payout: revision.renter_funds,
    })
}

/// Persist `record` on a detached task and wait for it to settle.
///
/// Dropping the returned future does not cancel the write.
pub async fn record_detached(
    store: Arc<dyn ContractStore>,
    record: ContractSpendingRecord,
    timeout: Duration,
) {
    let contract_id = record.contract_id;
    let handle = tokio::spawn(write_record(store, record, timeout));
    if let Err(err) = handle.await {
        warn!(contract = %contract_id, error = %err, "spending record task failed");
    }
}

async fn write_record(
    store: Arc<dyn ContractStore>,
    record: ContractSpendingRecord,
    timeout: Duration,
) {
    let contract_id = record.contract_id;
    match tokio::time::timeout(timeout, store.record_contract_spending(vec![record])).await {
        Ok(Ok(())) => debug!(contract = %contract_id, "recorded pruning spending"),
        Ok(Err(err)) => warn!(
            contract = %contract_id,
            error = %err,
            "failed to record pruning spending"
        ),
        Err(_) => warn!(
            contract = %contract_id,
            timeout_ms = timeout.as_millis() as u64,
            "recording pruning spending timed out"
        ),
    }
}

/// Running tally of what one pass has paid the host
///
/// Dropping an unsettled tracker inside a Tokio runtime spawns the spending
/// write for whatever was charged so far.
pub struct SpendingTracker {
    store: Arc<dyn ContractStore>,
    contract_id: ContractId,
    timeout: Duration,
    roots_usage: Usage,
    delete_usage: Usage,
    revision: Revision,
    settled: bool,
}

impl SpendingTracker {
    /// Start tracking a pass that begins at `revision`
    pub fn new(
        store: Arc<dyn ContractStore>,
        contract_id: ContractId,
        revision: Revision,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            contract_id,
            timeout,
            roots_usage: Usage::default(),
            delete_usage: Usage::default(),
            revision,
            settled: false,
        }
    }

    /// Add the cost of one sector roots page
    pub fn charge_roots(&mut self, usage: Usage) {
        self.roots_usage += usage;
    }

    /// Add the cost of a free sectors call
    pub fn charge_deletion(&mut self, usage: Usage) {
        self.delete_usage += usage;
    }

    /// Remember the latest accepted revision
    pub fn observe(&mut self, revision: &Revision) {
        self.revision = *revision;
    }

    /// Record for everything charged so far
    pub fn record(&self) -> Option<ContractSpendingRecord> {
        spending_record(
            self.contract_id,
            self.roots_usage,
            self.delete_usage,
            &self.revision,
        )
    }

    /// Write the record and wait for the detached write to finish
    pub async fn settle(mut self) {
        self.settled = true;
        if let Some(record) = self.record() {
            record_detached(Arc::clone(&self.store), record, self.timeout).await;
        }
    }
}

impl Drop for SpendingTracker {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Some(record) = self.record() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(contract = %self.contract_id, "pass abandoned, recording spending in background");
                runtime.spawn(write_record(Arc::clone(&self.store), record, self.timeout));
            }
            Err(_) => warn!(
                contract = %self.contract_id,
                "no runtime to record spending of an abandoned pass"
            ),
        }
    }
}

impl std::fmt::Debug for SpendingTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpendingTracker")
            .field("contract_id", &self.contract_id)
            .field("roots_usage", &self.roots_usage)
            .field("delete_usage", &self.delete_usage)
            .field("settled", &self.settled)
            .finish_non_exhaustive()
    }
}
