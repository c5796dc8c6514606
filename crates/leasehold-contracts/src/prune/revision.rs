//! Revision tracking within a single pass
//!
//! Every revising RPC returns the revision the next call has to build on.
//! The cursor is the only place that revision lives during a pass, and it
//! refuses to move backwards.

use leasehold_core::{ContractError, ContractId, Revision};

/// Latest revision observed during one pass
#[derive(Debug, Clone, Copy)]
pub struct RevisionCursor {
    contract_id: ContractId,
    current: Revision,
}

impl RevisionCursor {
    /// Start from the host's latest revision
    ///
    /// Fails if the host reports a revision older than `known_revision_number`.
    pub fn start(
        contract_id: ContractId,
        known_revision_number: u64,
        latest: Revision,
    ) -> Result<Self, ContractError> {
        let mut cursor = Self {
            contract_id,
            current: Revision {
                contract_id,
                revision_number: known_revision_number,
                ..latest
            },
        };
        cursor.advance(latest)?;
        Ok(cursor)
    }

    /// Replace the current revision with one returned by the host
    pub fn advance(&mut self, next: Revision) -> Result<(), ContractError> {
        if next.contract_id != self.contract_id {
            return Err(ContractError::HostProtocol {
                contract_id: self.contract_id,
                message: format!("host returned revision for {}", next.contract_id),
            });
        }
        if next.revision_number < self.current.revision_number {
            return Err(ContractError::StaleRevision {
                contract_id: self.contract_id,
                known: self.current.revision_number,
                observed: next.revision_number,
            });
        }
        self.current = next;
        Ok(())
    }

    /// Revision the next request must build on
    pub fn current(&self) -> &Revision {
        &self.current
    }
}
