//! Contract metadata, revisions and size summaries

use super::currency::Currency;
use super::identifiers::{ContractId, HostKey};
use super::spending::ContractSpending;
use crate::errors::ContractError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a contract
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractState {
    /// Contract could not be validated
    Invalid,
    /// State not determined yet
    #[default]
    Unknown,
    /// Formed but not yet confirmed
    Pending,
    /// Confirmed and within its window
    Active,
    /// Storage proof succeeded
    Complete,
    /// Storage proof missed
    Failed,
}

/// Whether a contract should be used for new work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractUsability {
    /// Usable
    Good,
    /// Not usable
    #[default]
    Bad,
}

/// Why a contract was archived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchivalReason {
    /// The host pruned the contract on its side
    #[serde(rename = "hostpruned")]
    HostPruned,
    /// Removed by the renter
    #[serde(rename = "removed")]
    Removed,
    /// Superseded by a renewal
    #[serde(rename = "renewed")]
    Renewed,
}

impl fmt::Display for ArchivalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArchivalReason::HostPruned => "hostpruned",
            ArchivalReason::Removed => "removed",
            ArchivalReason::Renewed => "renewed",
        };
        f.write_str(s)
    }
}

/// All metadata the renter keeps for a contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMetadata {
    /// Contract identifier
    pub id: ContractId,
    /// Host the contract was formed with
    pub host_key: HostKey,

    /// Height at which the storage proof was submitted
    pub proof_height: u64,
    /// Contract this one was renewed from, zero if none
    pub renewed_from: ContractId,
    /// Height of the last revision seen on chain
    pub revision_height: u64,
    /// Last known revision number
    pub revision_number: u64,
    /// Contract filesize in bytes
    pub size: u64,
    /// Formation height
    pub start_height: u64,
    /// Lifecycle state
    pub state: ContractState,
    /// Usability verdict
    pub usability: ContractUsability,
    /// Proof window start
    pub window_start: u64,
    /// Proof window end
    pub window_end: u64,

    /// Fee paid to the host for forming the contract
    pub contract_price: Currency,
    /// Renter funds committed at formation
    pub initial_renter_funds: Currency,
    /// Accumulated spending
    pub spending: ContractSpending,

    /// Set only on archived contracts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archival_reason: Option<ArchivalReason>,
    /// Renewal of this contract, set only on contracts archived by renewal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewed_to: Option<ContractId>,
}

impl ContractMetadata {
    /// Height by which the contract's data must be retained
    pub fn end_height(&self) -> u64 {
        self.window_start
    }

    /// True when the contract is marked usable
    pub fn is_good(&self) -> bool {
        self.usability == ContractUsability::Good
    }

    /// True once the contract reached its terminal archival state
    pub fn is_archived(&self) -> bool {
        self.archival_reason.is_some()
    }

    /// Move the contract into its terminal archival state
    ///
    /// A contract is archived at most once. Archiving by renewal requires the
    /// renewal's id, which may neither be this contract nor the contract it
    /// was itself renewed from.
    pub fn archive(
        &mut self,
        reason: ArchivalReason,
        renewed_to: Option<ContractId>,
    ) -> Result<(), ContractError> {
        if let Some(existing) = self.archival_reason {
            return Err(ContractError::InvalidArchival {
                contract_id: self.id,
                reason: format!("already archived ({existing})"),
            });
        }

        match (reason, renewed_to) {
            (ArchivalReason::Renewed, None) => {
                return Err(ContractError::InvalidArchival {
                    contract_id: self.id,
                    reason: "renewal archival requires the renewed contract id".to_string(),
                });
            }
            (ArchivalReason::Renewed, Some(to)) if to == self.id || to == self.renewed_from => {
                return Err(ContractError::InvalidArchival {
                    contract_id: self.id,
                    reason: format!("renewal to {to} would form a cycle"),
                });
            }
            (ArchivalReason::Renewed, Some(_)) => {}
            (_, Some(to)) => {
                return Err(ContractError::InvalidArchival {
                    contract_id: self.id,
                    reason: format!("only renewals may forward to another contract, got {to}"),
                });
            }
            (_, None) => {}
        }

        self.archival_reason = Some(reason);
        self.renewed_to = renewed_to;
        Ok(())
    }
}

/// Latest state of a contract as reported by its host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    /// Contract the revision belongs to
    #[serde(rename = "contractID")]
    pub contract_id: ContractId,
    /// Host payout if the storage proof is missed
    pub missed_host_value: Currency,
    /// Funds left to the renter
    pub renter_funds: Currency,
    /// Revision number
    pub revision_number: u64,
    /// Contract filesize in bytes
    #[serde(rename = "size")]
    pub filesize: u64,
}

/// Size of a contract and how much of it can be pruned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSize {
    /// Bytes no longer referenced by any object
    pub prunable: u64,
    /// Contract filesize in bytes
    pub size: u64,
}

/// A contract's size information together with its id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractPrunableData {
    /// Contract identifier
    pub id: ContractId,
    /// Size information
    #[serde(flatten)]
    pub size: ContractSize,
}

/// Prunable data across a set of contracts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractsPrunableData {
    /// Per-contract entries
    pub contracts: Vec<ContractPrunableData>,
    /// Sum of all prunable bytes
    pub total_prunable: u64,
    /// Sum of all contract sizes
    pub total_size: u64,
}

impl ContractsPrunableData {
    /// Build the summary, computing the totals
    pub fn from_contracts(contracts: Vec<ContractPrunableData>) -> Self {
        let (total_prunable, total_size) = contracts.iter().fold((0u64, 0u64), |(p, s), c| {
            (
                p.saturating_add(c.size.prunable),
                s.saturating_add(c.size.size),
            )
        });
        Self {
            contracts,
            total_prunable,
            total_size,
        }
    }
}
