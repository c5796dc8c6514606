//! Host RPC effect interface
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: provided by the host protocol client; the testkit
//!   ships an in-memory host
//! - **Usage**: contract pruning and any other revision-advancing operation
//!
//! Calls that revise the contract return the new revision together with the
//! usage they were charged. Callers must carry the returned revision forward
//! into the next call.

use crate::errors::HostError;
use crate::types::{ContractId, Currency, Hash256, HostKey, Revision, SectorRoot, Usage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Prices a host charges, as advertised in its settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostPrices {
    /// Flat fee for forming a contract
    pub contract_price: Currency,
    /// Collateral per byte per block
    pub collateral: Currency,
    /// Storage per byte per block
    pub storage_price: Currency,
    /// Upload bandwidth per byte
    pub ingress_price: Currency,
    /// Download bandwidth per byte
    pub egress_price: Currency,
    /// Per sector freed
    pub free_sector_price: Currency,
    /// Height the prices were signed at
    pub tip_height: u64,
}

impl HostPrices {
    /// Cost of reading `count` sector roots (32 bytes each)
    pub fn sector_roots_cost(&self, count: u64) -> Usage {
        Usage {
            egress: self.egress_price.saturating_mul(count.saturating_mul(32)),
            ..Usage::default()
        }
    }

    /// Cost of freeing `count` sectors
    pub fn free_sectors_cost(&self, count: u64) -> Usage {
        Usage {
            rpc: self.free_sector_price.saturating_mul(count),
            ..Usage::default()
        }
    }
}

/// A host's advertised settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSettings {
    /// Protocol version string
    pub protocol_version: String,
    /// Whether the host forms new contracts
    pub accepting_contracts: bool,
    /// Upper bound on collateral per contract
    pub max_collateral: Currency,
    /// Maximum contract duration in blocks
    pub max_contract_duration: u64,
    /// Free storage in sectors
    pub remaining_storage: u64,
    /// Total storage in sectors
    pub total_storage: u64,
    /// Current prices
    pub prices: HostPrices,
}

/// Chain tip the renter signs priced requests against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipState {
    /// Block height
    pub height: u64,
    /// Block id
    pub id: Hash256,
}

/// A contract id paired with the revision a request is built on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractRevision {
    /// Contract identifier
    pub id: ContractId,
    /// Revision the request revises
    pub revision: Revision,
}

/// Renter secret key used to sign contract revisions
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RenterKey([u8; 32]);

impl RenterKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for RenterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RenterKey(<redacted>)")
    }
}

/// Result of a sector roots page fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorRootsResult {
    /// Roots in on-host order, starting at the requested offset
    pub roots: Vec<SectorRoot>,
    /// Revision after paying for the read
    pub revision: Revision,
    /// Charged usage
    pub usage: Usage,
}

/// Result of a free sectors call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSectorsResult {
    /// Revision after the deletion
    pub revision: Revision,
    /// Charged usage
    pub usage: Usage,
}

/// Client for the four host RPCs used by contract maintenance
#[async_trait]
pub trait HostClient: Send + Sync {
    /// Latest revision the host holds for a contract
    async fn latest_revision(
        &self,
        host_key: HostKey,
        address: &str,
        contract_id: ContractId,
    ) -> Result<Revision, HostError>;

    /// Current host settings, including prices
    async fn settings(&self, host_key: HostKey, address: &str) -> Result<HostSettings, HostError>;

    /// Fetch `length` sector roots starting at `offset`
    async fn sector_roots(
        &self,
        host_key: HostKey,
        address: &str,
        tip: TipState,
        prices: &HostPrices,
        renter_key: &RenterKey,
        contract: ContractRevision,
        offset: u64,
        length: u64,
    ) -> Result<SectorRootsResult, HostError>;

    /// Free the sectors at the given indices
    async fn free_sectors(
        &self,
        host_key: HostKey,
        address: &str,
        tip: TipState,
        prices: &HostPrices,
        renter_key: &RenterKey,
        contract: ContractRevision,
        indices: &[u64],
    ) -> Result<FreeSectorsResult, HostError>;
}
