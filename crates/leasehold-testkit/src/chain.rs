//! Static chain state and gouging verdicts

use async_trait::async_trait;
use leasehold_core::{ChainState, GougingBreakdown, GougingChecker, HostSettings, TipState};
use std::sync::atomic::{AtomicUsize, Ordering};

/// [`ChainState`] that always reports the same tip
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticChainState {
    tip: TipState,
}

impl StaticChainState {
    /// Chain stuck at `tip`
    pub fn new(tip: TipState) -> Self {
        Self { tip }
    }
}

#[async_trait]
impl ChainState for StaticChainState {
    async fn tip_state(&self) -> TipState {
        self.tip
    }
}

/// [`GougingChecker`] with a fixed verdict that counts its checks
#[derive(Debug, Default)]
pub struct StaticGougingChecker {
    reasons: Vec<String>,
    checks: AtomicUsize,
}

impl StaticGougingChecker {
    /// Never reports gouging
    pub fn passing() -> Self {
        Self::default()
    }

    /// Always reports gouging for `reason`
    pub fn gouging(reason: impl Into<String>) -> Self {
        Self {
            reasons: vec![reason.into()],
            checks: AtomicUsize::new(0),
        }
    }

    /// Number of checks performed
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl GougingChecker for StaticGougingChecker {
    fn check(&self, _settings: &HostSettings) -> GougingBreakdown {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let mut breakdown = GougingBreakdown::ok();
        for reason in &self.reasons {
            breakdown.push(reason.clone());
        }
        breakdown
    }
}
