//! Deterministic fixtures
//!
//! Identifiers are derived from small integers so tests can refer to "root 3"
//! or "contract 1" without carrying values around.

use leasehold_core::{
    ContractId, ContractMetadata, ContractState, ContractUsability, Currency, Hash256,
    HostKey, HostPrices, HostSettings, RenterKey, SectorRoot, TipState,
};

fn bytes(tag: u8, n: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[0] = tag;
    out[24..].copy_from_slice(&n.to_be_bytes());
    out
}

/// Sector root number `n`
pub fn root(n: u64) -> SectorRoot {
    Hash256::new(bytes(0x52, n))
}

/// Roots `0..count`
pub fn roots(count: u64) -> Vec<SectorRoot> {
    (0..count).map(root).collect()
}

/// Contract id number `n`
pub fn contract_id(n: u64) -> ContractId {
    ContractId::new(bytes(0x43, n))
}

/// Host key number `n`
pub fn host_key(n: u64) -> HostKey {
    HostKey::new(bytes(0x48, n))
}

/// Fixed renter key
pub fn renter_key() -> RenterKey {
    RenterKey::from_bytes([0x11; 32])
}

/// Tip at height 100
pub fn tip() -> TipState {
    TipState {
        height: 100,
        id: Hash256::new(bytes(0x54, 100)),
    }
}

/// Prices where reading roots and freeing sectors both cost something
pub fn prices() -> HostPrices {
    HostPrices {
        contract_price: Currency::new(1_000),
        storage_price: Currency::new(1),
        ingress_price: Currency::new(1),
        egress_price: Currency::new(2),
        free_sector_price: Currency::new(5),
        tip_height: 100,
        ..HostPrices::default()
    }
}

/// Settings advertising [`prices`]
pub fn settings() -> HostSettings {
    HostSettings {
        protocol_version: "4.0.0".to_string(),
        accepting_contracts: true,
        max_collateral: Currency::new(1_000_000),
        max_contract_duration: 4_320,
        remaining_storage: 1 << 40,
        total_storage: 1 << 41,
        prices: prices(),
    }
}

/// Builder for [`ContractMetadata`]
#[derive(Debug, Clone)]
pub struct ContractBuilder {
    metadata: ContractMetadata,
}

impl ContractBuilder {
    /// Active, good contract `n` with host `n`
    pub fn new(n: u64) -> Self {
        Self {
            metadata: ContractMetadata {
                id: contract_id(n),
                host_key: host_key(n),
                state: ContractState::Active,
                usability: ContractUsability::Good,
                start_height: 10,
                window_start: 1_000,
                window_end: 1_144,
                initial_renter_funds: Currency::new(1_000_000),
                ..ContractMetadata::default()
            },
        }
    }

    /// Known revision number
    pub fn revision_number(mut self, revision_number: u64) -> Self {
        self.metadata.revision_number = revision_number;
        self
    }

    /// Known size in bytes
    pub fn size(mut self, size: u64) -> Self {
        self.metadata.size = size;
        self
    }

    /// Host the contract is formed with
    pub fn host(mut self, host_key: HostKey) -> Self {
        self.metadata.host_key = host_key;
        self
    }

    /// Finish
    pub fn build(self) -> ContractMetadata {
        self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_distinct_and_stable() {
        assert_ne!(root(1), root(2));
        assert_eq!(root(7), root(7));
        assert_ne!(contract_id(1).as_bytes(), host_key(1).as_bytes());
        assert_eq!(roots(3), vec![root(0), root(1), root(2)]);
    }

    #[test]
    fn builder_defaults_to_usable_contract() {
        let contract = ContractBuilder::new(4).revision_number(9).build();
        assert!(contract.is_good());
        assert!(!contract.is_archived());
        assert_eq!(contract.revision_number, 9);
        assert_eq!(contract.host_key, host_key(4));
    }
}
