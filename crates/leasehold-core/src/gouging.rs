//! Price gouging checks
//!
//! A gouging checker is a pure function from host settings to a verdict. The
//! pruner consults it before issuing any paid RPC.

use crate::effects::HostSettings;
use crate::types::Currency;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict of a gouging check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GougingBreakdown {
    reasons: Vec<String>,
}

impl GougingBreakdown {
    /// Breakdown with no violations
    pub fn ok() -> Self {
        Self::default()
    }

    /// Breakdown carrying one violation
    pub fn gouging(reason: impl Into<String>) -> Self {
        Self {
            reasons: vec![reason.into()],
        }
    }

    /// Add a violation
    pub fn push(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }

    /// True when any violation was found
    pub fn is_gouging(&self) -> bool {
        !self.reasons.is_empty()
    }

    /// Individual violations
    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }
}

impl fmt::Display for GougingBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reasons.is_empty() {
            f.write_str("no gouging detected")
        } else {
            f.write_str(&self.reasons.join("; "))
        }
    }
}

/// Decides whether a host overcharges
pub trait GougingChecker: Send + Sync {
    /// Evaluate the host's settings
    fn check(&self, settings: &HostSettings) -> GougingBreakdown;
}

/// Upper bounds on host prices
///
/// A zero limit disables that particular check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GougingSettings {
    /// Maximum storage price per byte per block
    pub max_storage_price: Currency,
    /// Maximum upload price per byte
    pub max_ingress_price: Currency,
    /// Maximum download price per byte
    pub max_egress_price: Currency,
    /// Maximum price for freeing one sector
    pub max_free_sector_price: Currency,
    /// Maximum contract formation fee
    pub max_contract_price: Currency,
}

/// Gouging checker that compares prices against fixed limits
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceLimitChecker {
    limits: GougingSettings,
}

impl PriceLimitChecker {
    /// Create a checker for the given limits
    pub fn new(limits: GougingSettings) -> Self {
        Self { limits }
    }
}

fn check_limit(breakdown: &mut GougingBreakdown, what: &str, price: Currency, limit: Currency) {
    if !limit.is_zero() && price > limit {
        breakdown.push(format!("{what} {price} exceeds limit {limit}"));
    }
}

impl GougingChecker for PriceLimitChecker {
    fn check(&self, settings: &HostSettings) -> GougingBreakdown {
        let prices = &settings.prices;
        let mut breakdown = GougingBreakdown::ok();
        check_limit(
            &mut breakdown,
            "storage price",
            prices.storage_price,
            self.limits.max_storage_price,
        );
        check_limit(
            &mut breakdown,
            "ingress price",
            prices.ingress_price,
            self.limits.max_ingress_price,
        );
        check_limit(
            &mut breakdown,
            "egress price",
            prices.egress_price,
            self.limits.max_egress_price,
        );
        check_limit(
            &mut breakdown,
            "free sector price",
            prices.free_sector_price,
            self.limits.max_free_sector_price,
        );
        check_limit(
            &mut breakdown,
            "contract price",
            prices.contract_price,
            self.limits.max_contract_price,
        );
        breakdown
    }
}
