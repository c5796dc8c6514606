//! Leasehold Testing Infrastructure
//!
//! In-memory implementations of every collaborator trait plus deterministic
//! fixtures, so lock and pruning behaviour can be tested without a host, a
//! database or a chain.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! leasehold-testkit = { workspace = true }
//! ```
//!
//! ```rust,no_run
//! use leasehold_testkit::*;
//!
//! let scenario = PruneScenario::new(1, roots(4));
//! scenario.store.reference([root(1), root(3)]);
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod chain;
pub mod fixtures;
pub mod host;
pub mod store;

pub use chain::{StaticChainState, StaticGougingChecker};
pub use fixtures::*;
pub use host::{HostCalls, MemoryHost};
pub use store::MemoryContractStore;

use leasehold_core::{ContractMetadata, SectorRoot};
use std::sync::Arc;

/// Install a test subscriber honouring `RUST_LOG`
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One contract stored on an in-memory host and known to an in-memory store
#[derive(Debug, Clone)]
pub struct PruneScenario {
    /// Host holding the contract's sectors
    pub host: Arc<MemoryHost>,
    /// Store that knows the contract and which roots are referenced
    pub store: Arc<MemoryContractStore>,
    /// Chain stuck at [`tip`]
    pub chain: Arc<StaticChainState>,
    /// Contract metadata as initially stored
    pub contract: ContractMetadata,
    /// Address registered for the host
    pub address: String,
}

impl PruneScenario {
    /// Contract `n` at revision 1 holding `roots`, none of them referenced
    pub fn new(n: u64, roots: Vec<SectorRoot>) -> Self {
        let size = roots.len() as u64 * leasehold_core::SECTOR_SIZE;
        let contract = ContractBuilder::new(n).revision_number(1).size(size).build();
        let address = format!("host-{n}.test:9984");

        let host = MemoryHost::new(settings());
        host.add_contract(contract.id, contract.revision_number, roots);

        let store = MemoryContractStore::new();
        store.insert_contract(contract.clone());
        store.set_host_address(contract.host_key, address.clone());

        Self {
            host: Arc::new(host),
            store: Arc::new(store),
            chain: Arc::new(StaticChainState::new(tip())),
            contract,
            address,
        }
    }

    /// Latest metadata from the store
    pub fn stored_contract(&self) -> ContractMetadata {
        self.store
            .contract_metadata(self.contract.id)
            .expect("scenario contract is stored")
    }
}
