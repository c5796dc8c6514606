//! Prune pass behaviour against the in-memory host and store

use assert_matches::assert_matches;
use leasehold_contracts::SectorPruner;
use leasehold_core::{
    ContractError, Currency, GougingSettings, HostError, PriceLimitChecker, PruningConfig,
    RpcOperation, SectorRoot, StoreError, SECTOR_SIZE,
};
use leasehold_testkit::{
    init_test_tracing, prices, renter_key, root, roots, PruneScenario, StaticGougingChecker,
};
use std::collections::HashSet;
use std::time::Duration;

fn pruner(scenario: &PruneScenario, batch_size: u64) -> SectorPruner {
    pruner_with(scenario, &PruningConfig::default()).with_batch_size(batch_size)
}

fn pruner_with(scenario: &PruneScenario, config: &PruningConfig) -> SectorPruner {
    SectorPruner::new(
        scenario.host.clone(),
        scenario.store.clone(),
        scenario.chain.clone(),
        renter_key(),
        config,
    )
}

/// Roots a, b, c, d where b and d are referenced and b is still uploading
fn abcd() -> (PruneScenario, HashSet<SectorRoot>) {
    let scenario = PruneScenario::new(1, roots(4));
    scenario.store.reference([root(1), root(3)]);
    let pending = [root(1)].into_iter().collect();
    (scenario, pending)
}

#[tokio::test]
async fn frees_unreferenced_sectors_in_one_pass() {
    init_test_tracing();
    let (scenario, pending) = abcd();
    let gouging = StaticGougingChecker::passing();

    let result = pruner(&scenario, 4)
        .prune(&scenario.contract, &scenario.address, &gouging, &pending)
        .await
        .unwrap();

    assert_eq!(result.pruned, 2 * SECTOR_SIZE);
    assert_eq!(result.remaining, 0);
    assert_eq!(result.contract_size, 2 * SECTOR_SIZE);
    assert!(result.error.is_none());
    assert_eq!(scenario.host.freed_batches(), vec![vec![0, 2]]);
    assert_eq!(scenario.host.roots(scenario.contract.id), vec![root(1), root(3)]);
    assert_eq!(gouging.checks(), 1);
}

#[tokio::test]
async fn capped_batch_defers_the_rest_to_the_next_pass() {
    let (scenario, pending) = abcd();
    let gouging = StaticGougingChecker::passing();
    let pruner = pruner(&scenario, 1);

    let first = pruner
        .prune(&scenario.contract, &scenario.address, &gouging, &pending)
        .await
        .unwrap();
    assert_eq!(first.pruned, SECTOR_SIZE);
    assert_eq!(first.remaining, SECTOR_SIZE);
    assert!(first.has_remaining());
    // one root per page, each page built on the revision the previous returned
    assert_eq!(scenario.host.presented_revisions(), vec![1, 2, 3, 4, 5]);

    let second = pruner
        .prune(&scenario.stored_contract(), &scenario.address, &gouging, &pending)
        .await
        .unwrap();
    assert_eq!(second.pruned, SECTOR_SIZE);
    assert_eq!(second.remaining, 0);
    assert_eq!(second.contract_size, 2 * SECTOR_SIZE);
    assert_eq!(scenario.host.roots(scenario.contract.id), vec![root(1), root(3)]);
}

#[tokio::test]
async fn stale_revision_stops_before_any_other_rpc() {
    let (scenario, pending) = abcd();
    let mut contract = scenario.contract.clone();
    contract.revision_number = 5;

    let err = pruner(&scenario, 4)
        .prune(&contract, &scenario.address, &StaticGougingChecker::passing(), &pending)
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ContractError::StaleRevision {
            known: 5,
            observed: 1,
            ..
        }
    );
    assert!(err.is_precondition());
    let calls = scenario.host.calls();
    assert_eq!(calls.latest_revision, 1);
    assert_eq!(calls.total(), 1);
    assert_eq!(scenario.store.prunable_calls(), 0);
    assert!(scenario.store.spending_records().is_empty());
}

#[tokio::test]
async fn host_reporting_an_older_revision_is_stale() {
    let (scenario, pending) = abcd();
    scenario.host.report_revision_number(0);

    let err = pruner(&scenario, 4)
        .prune(&scenario.contract, &scenario.address, &StaticGougingChecker::passing(), &pending)
        .await
        .unwrap_err();
    assert_matches!(err, ContractError::StaleRevision { known: 1, observed: 0, .. });
    assert_eq!(scenario.host.calls().paid(), 0);
}

#[tokio::test]
async fn gouging_host_is_never_paid() {
    let (scenario, pending) = abcd();
    let gouging = StaticGougingChecker::gouging("egress price too high");

    let err = pruner(&scenario, 4)
        .prune(&scenario.contract, &scenario.address, &gouging, &pending)
        .await
        .unwrap_err();

    assert_matches!(err, ContractError::HostGouging { ref reason, .. } if reason.contains("egress"));
    assert!(err.is_precondition());
    assert_eq!(scenario.host.calls().settings, 1);
    assert_eq!(scenario.host.calls().paid(), 0);
    assert!(scenario.store.spending_records().is_empty());
}

#[tokio::test]
async fn price_limits_reject_expensive_hosts() {
    let (scenario, pending) = abcd();
    let checker = PriceLimitChecker::new(GougingSettings {
        max_egress_price: Currency::new(1),
        ..GougingSettings::default()
    });

    let err = pruner(&scenario, 4)
        .prune(&scenario.contract, &scenario.address, &checker, &pending)
        .await
        .unwrap_err();
    assert_matches!(err, ContractError::HostGouging { .. });
    assert_eq!(scenario.host.calls().paid(), 0);
}

#[tokio::test]
async fn recorded_spending_matches_what_the_host_charged() {
    let (scenario, pending) = abcd();
    let id = scenario.contract.id;
    scenario.host.set_payouts(id, 10_000, 500);

    pruner(&scenario, 1)
        .prune(&scenario.contract, &scenario.address, &StaticGougingChecker::passing(), &pending)
        .await
        .unwrap();

    let records = scenario.store.spending_records();
    assert_eq!(records.len(), 1);
    let record = &records[0];

    let page = prices().sector_roots_cost(1).renter_cost();
    let expected_roots = page + page + page + page;
    let expected_deletions = prices().free_sectors_cost(1).renter_cost();
    assert_eq!(record.spending.sector_roots, expected_roots);
    assert_eq!(record.spending.deletions, expected_deletions);
    assert!(record.spending.uploads.is_zero());
    assert!(record.spending.fund_account.is_zero());

    let revision = scenario.host.revision(id).unwrap();
    let spent = record.spending.total();
    assert_eq!(revision.renter_funds, Currency::new(10_000).saturating_sub(spent));
    assert_eq!(revision.missed_host_value, Currency::new(500) + spent);
    assert_eq!(record.revision_number, revision.revision_number);
    assert_eq!(record.size, revision.filesize);
    assert_eq!(record.valid_renter_payout, revision.renter_funds);
    assert_eq!(record.missed_host_payout, revision.missed_host_value);

    let stored = scenario.stored_contract();
    assert_eq!(stored.spending.total(), spent);
    assert_eq!(stored.revision_number, revision.revision_number);
}

#[tokio::test]
async fn partial_deletion_is_reported_not_thrown() {
    let (scenario, pending) = abcd();
    scenario.host.limit_frees(1);

    let result = pruner(&scenario, 4)
        .prune(&scenario.contract, &scenario.address, &StaticGougingChecker::passing(), &pending)
        .await
        .unwrap();

    assert_eq!(result.pruned, SECTOR_SIZE);
    assert_eq!(result.remaining, SECTOR_SIZE);
    assert_eq!(result.contract_size, 3 * SECTOR_SIZE);
    let error = result.error.unwrap();
    assert!(error.contains("freed 1 of 2"), "unexpected error: {error}");
    assert_eq!(scenario.store.spending_records().len(), 1);
}

#[tokio::test]
async fn pending_uploads_are_never_freed() {
    let scenario = PruneScenario::new(1, roots(3));
    let pending: HashSet<_> = roots(3).into_iter().collect();

    let result = pruner(&scenario, 4)
        .prune(&scenario.contract, &scenario.address, &StaticGougingChecker::passing(), &pending)
        .await
        .unwrap();

    assert_eq!(result.pruned, 0);
    assert_eq!(result.remaining, 0);
    assert_eq!(scenario.host.calls().free_sectors, 0);
    assert_eq!(scenario.host.roots(scenario.contract.id).len(), 3);
    // reading the roots still cost money
    let records = scenario.store.spending_records();
    assert_eq!(records.len(), 1);
    assert!(records[0].spending.deletions.is_zero());
}

#[tokio::test]
async fn empty_contract_costs_nothing() {
    let scenario = PruneScenario::new(1, Vec::new());

    let result = pruner(&scenario, 4)
        .prune(&scenario.contract, &scenario.address, &StaticGougingChecker::passing(), &HashSet::new())
        .await
        .unwrap();

    assert_eq!(result.contract_size, 0);
    assert_eq!(result.pruned, 0);
    assert_eq!(scenario.host.calls().paid(), 0);
    assert!(scenario.store.spending_records().is_empty());
}

#[tokio::test]
async fn failed_page_aborts_the_pass() {
    let (scenario, pending) = abcd();
    scenario
        .host
        .fail(RpcOperation::SectorRoots, HostError::transport("connection reset"));

    let err = pruner(&scenario, 4)
        .prune(&scenario.contract, &scenario.address, &StaticGougingChecker::passing(), &pending)
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ContractError::RemoteRpc {
            operation: RpcOperation::SectorRoots,
            ..
        }
    );
    assert_eq!(scenario.store.prunable_calls(), 0);
    assert_eq!(scenario.host.calls().free_sectors, 0);
}

#[tokio::test]
async fn failed_free_still_accounts_for_roots() {
    let (scenario, pending) = abcd();
    scenario
        .host
        .fail(RpcOperation::FreeSectors, HostError::rejected("busy"));

    let err = pruner(&scenario, 4)
        .prune(&scenario.contract, &scenario.address, &StaticGougingChecker::passing(), &pending)
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ContractError::RemoteRpc {
            operation: RpcOperation::FreeSectors,
            ..
        }
    );
    let records = scenario.store.spending_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].spending.sector_roots, prices().sector_roots_cost(4).renter_cost());
    assert!(records[0].spending.deletions.is_zero());
}

#[tokio::test]
async fn regressing_free_response_is_rejected_but_accounted() {
    let (scenario, pending) = abcd();
    scenario.host.return_stale_revision_on_free();

    let err = pruner(&scenario, 4)
        .prune(&scenario.contract, &scenario.address, &StaticGougingChecker::passing(), &pending)
        .await
        .unwrap_err();

    assert_matches!(err, ContractError::StaleRevision { .. });
    let records = scenario.store.spending_records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].spending.deletions.is_zero());
}

#[tokio::test]
async fn out_of_range_store_index_is_rejected() {
    let (scenario, pending) = abcd();
    scenario.store.override_prunable(vec![0, 9]);

    let err = pruner(&scenario, 4)
        .prune(&scenario.contract, &scenario.address, &StaticGougingChecker::passing(), &pending)
        .await
        .unwrap_err();

    assert_matches!(err, ContractError::Store(StoreError::InvalidData { .. }));
    assert_eq!(scenario.host.calls().free_sectors, 0);
}

#[tokio::test]
async fn duplicate_store_indices_are_freed_once() {
    let (scenario, pending) = abcd();
    scenario.store.override_prunable(vec![2, 0, 2]);

    let result = pruner(&scenario, 4)
        .prune(&scenario.contract, &scenario.address, &StaticGougingChecker::passing(), &pending)
        .await
        .unwrap();

    assert_eq!(result.pruned, 2 * SECTOR_SIZE);
    assert_eq!(scenario.host.freed_batches(), vec![vec![0, 2]]);
}

#[tokio::test]
async fn store_failure_surfaces_as_store_error() {
    let (scenario, pending) = abcd();
    scenario.store.fail_prunable(StoreError::backend("database is locked"));

    let err = pruner(&scenario, 4)
        .prune(&scenario.contract, &scenario.address, &StaticGougingChecker::passing(), &pending)
        .await
        .unwrap_err();
    assert_matches!(err, ContractError::Store(StoreError::Backend { .. }));
}

#[tokio::test(start_paused = true)]
async fn abandoned_pass_still_records_spending() {
    let (scenario, pending) = abcd();
    scenario.store.delay_records(Duration::from_secs(5));
    let pruner = pruner(&scenario, 4);
    let gouging = StaticGougingChecker::passing();

    let outcome = tokio::time::timeout(
        Duration::from_secs(1),
        pruner.prune(&scenario.contract, &scenario.address, &gouging, &pending),
    )
    .await;
    assert!(outcome.is_err(), "pass should still be waiting on the store");
    assert!(scenario.store.spending_records().is_empty());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(scenario.store.spending_records().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_pass_records_pages_already_paid_for() {
    let (scenario, pending) = abcd();
    let id = scenario.contract.id;
    scenario.host.set_payouts(id, 10_000, 500);
    scenario.host.delay_frees(Duration::from_secs(10));
    let pruner = pruner(&scenario, 4);
    let gouging = StaticGougingChecker::passing();

    let outcome = tokio::time::timeout(
        Duration::from_secs(1),
        pruner.prune(&scenario.contract, &scenario.address, &gouging, &pending),
    )
    .await;
    assert!(outcome.is_err(), "pass should still be waiting on the host");
    assert_eq!(scenario.host.calls().sector_roots, 1);

    tokio::time::sleep(Duration::from_secs(120)).await;

    let records = scenario.store.spending_records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.spending.sector_roots, prices().sector_roots_cost(4).renter_cost());
    assert!(record.spending.deletions.is_zero());

    let revision = scenario.host.revision(id).unwrap();
    assert_eq!(record.revision_number, revision.revision_number);
    assert_eq!(record.valid_renter_payout, revision.renter_funds);
    assert_eq!(
        revision.renter_funds,
        Currency::new(10_000).saturating_sub(record.spending.total())
    );
}

#[tokio::test(start_paused = true)]
async fn slow_store_does_not_hold_the_pass_forever() {
    let (scenario, pending) = abcd();
    scenario.store.delay_records(Duration::from_secs(3600));
    let config = PruningConfig {
        spending_record_timeout_ms: 100,
        ..PruningConfig::default()
    };

    let result = pruner_with(&scenario, &config)
        .with_batch_size(4)
        .prune(&scenario.contract, &scenario.address, &StaticGougingChecker::passing(), &pending)
        .await
        .unwrap();

    assert_eq!(result.pruned, 2 * SECTOR_SIZE);
    assert!(scenario.store.spending_records().is_empty());
}
