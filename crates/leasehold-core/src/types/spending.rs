//! Spending and usage accounting
//!
//! `ContractSpending` and `Usage` are both additive monoids: `Default` is the
//! identity and `+` is pointwise. Spending records are an append-only audit
//! trail and are never mutated after creation.

use super::currency::Currency;
use super::identifiers::ContractId;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Spending on a contract, split by category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSpending {
    /// Spent on deleting sectors
    pub deletions: Currency,
    /// Spent topping up ephemeral accounts
    pub fund_account: Currency,
    /// Spent fetching sector roots
    pub sector_roots: Currency,
    /// Spent uploading sectors
    pub uploads: Currency,
}

impl ContractSpending {
    /// Sum over all categories
    pub fn total(&self) -> Currency {
        self.uploads + self.fund_account + self.deletions + self.sector_roots
    }

    /// True when nothing was spent in any category
    pub fn is_zero(&self) -> bool {
        self.total().is_zero()
    }
}

impl Add for ContractSpending {
    type Output = ContractSpending;

    fn add(self, rhs: ContractSpending) -> ContractSpending {
        ContractSpending {
            deletions: self.deletions + rhs.deletions,
            fund_account: self.fund_account + rhs.fund_account,
            sector_roots: self.sector_roots + rhs.sector_roots,
            uploads: self.uploads + rhs.uploads,
        }
    }
}

impl AddAssign for ContractSpending {
    fn add_assign(&mut self, rhs: ContractSpending) {
        *self = *self + rhs;
    }
}

/// A spending entry tagged with the contract state it was recorded at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSpendingRecord {
    /// Spending being recorded
    #[serde(flatten)]
    pub spending: ContractSpending,
    /// Contract the money was spent on
    #[serde(rename = "contractID")]
    pub contract_id: ContractId,
    /// Revision number after the spend
    pub revision_number: u64,
    /// Contract filesize after the spend
    pub size: u64,
    /// Host payout in the missed-proof case at that revision
    pub missed_host_payout: Currency,
    /// Renter payout in the valid-proof case at that revision
    pub valid_renter_payout: Currency,
}

/// Cost breakdown returned by a host RPC that changes contract state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Base RPC cost
    pub rpc: Currency,
    /// Storage cost
    pub storage: Currency,
    /// Download bandwidth cost
    pub egress: Currency,
    /// Upload bandwidth cost
    pub ingress: Currency,
    /// Amount moved into ephemeral accounts
    pub account_funding: Currency,
    /// Collateral the host puts at risk; not paid by the renter
    pub risked_collateral: Currency,
}

impl Usage {
    /// Total cost borne by the renter
    pub fn renter_cost(&self) -> Currency {
        self.rpc + self.storage + self.egress + self.ingress + self.account_funding
    }

    /// Collateral the host risks
    pub fn host_risked_collateral(&self) -> Currency {
        self.risked_collateral
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            rpc: self.rpc + rhs.rpc,
            storage: self.storage + rhs.storage,
            egress: self.egress + rhs.egress,
            ingress: self.ingress + rhs.ingress,
            account_funding: self.account_funding + rhs.account_funding,
            risked_collateral: self.risked_collateral + rhs.risked_collateral,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn currency() -> impl Strategy<Value = Currency> {
        (0u64..u64::MAX).prop_map(Currency::from)
    }

    fn spending() -> impl Strategy<Value = ContractSpending> {
        (currency(), currency(), currency(), currency()).prop_map(|(d, f, s, u)| {
            ContractSpending {
                deletions: d,
                fund_account: f,
                sector_roots: s,
                uploads: u,
            }
        })
    }

    fn usage() -> impl Strategy<Value = Usage> {
        (currency(), currency(), currency(), currency(), currency(), currency()).prop_map(
            |(rpc, storage, egress, ingress, account_funding, risked_collateral)| Usage {
                rpc,
                storage,
                egress,
                ingress,
                account_funding,
                risked_collateral,
            },
        )
    }

    proptest! {
        #[test]
        fn spending_addition_is_commutative(a in spending(), b in spending()) {
            prop_assert_eq!(a + b, b + a);
        }

        #[test]
        fn spending_addition_is_associative(a in spending(), b in spending(), c in spending()) {
            prop_assert_eq!((a + b) + c, a + (b + c));
        }

        #[test]
        fn spending_total_distributes(a in spending(), b in spending()) {
            prop_assert_eq!((a + b).total(), a.total() + b.total());
        }

        #[test]
        fn usage_renter_cost_distributes(a in usage(), b in usage()) {
            prop_assert_eq!((a + b).renter_cost(), a.renter_cost() + b.renter_cost());
        }
    }

    #[test]
    fn default_is_identity() {
        let s = ContractSpending {
            deletions: Currency(1),
            fund_account: Currency(2),
            sector_roots: Currency(3),
            uploads: Currency(4),
        };
        assert_eq!(s + ContractSpending::default(), s);
        assert_eq!(s.total(), Currency(10));
    }

    #[test]
    fn risked_collateral_is_not_a_renter_cost() {
        let usage = Usage {
            rpc: Currency(5),
            risked_collateral: Currency(100),
            ..Usage::default()
        };
        assert_eq!(usage.renter_cost(), Currency(5));
        assert_eq!(usage.host_risked_collateral(), Currency(100));
    }

    #[test]
    fn record_serializes_flat() {
        let record = ContractSpendingRecord {
            spending: ContractSpending {
                deletions: Currency(3),
                ..ContractSpending::default()
            },
            contract_id: ContractId::new([1u8; 32]),
            revision_number: 9,
            size: 4096,
            missed_host_payout: Currency(7),
            valid_renter_payout: Currency(8),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["deletions"], 3);
        assert_eq!(json["revisionNumber"], 9);
    }
}
