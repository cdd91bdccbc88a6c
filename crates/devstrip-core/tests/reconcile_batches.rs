//! Batching, isolation and idempotence of remote reconciliation.

use std::sync::Arc;

use devstrip_core::{
    FunctionOutcome, MemoryLog, ReconcilerConfig, RemoteReconciler, ServiceScope,
};
use function_api::fakes::MemoryFunctionApi;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn logical_names(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("f{}", i)).collect()
}

/// Fake API with `svc-dev-f1..fN`, each carrying reserved concurrency.
fn seeded_api(count: usize) -> Arc<MemoryFunctionApi> {
    let api = MemoryFunctionApi::new();
    for name in logical_names(count) {
        api.put_function(&format!("svc-dev-{}", name), Some(2));
    }
    Arc::new(api)
}

fn reconciler(api: &Arc<MemoryFunctionApi>, log: &Arc<MemoryLog>) -> RemoteReconciler {
    RemoteReconciler::new(api.clone(), log.clone(), ServiceScope::new("svc", "dev"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn seven_functions_run_as_five_then_two_despite_failure() {
    let api = seeded_api(7);
    api.fail_fetch("svc-dev-f3");
    let log = Arc::new(MemoryLog::new());

    let report = reconciler(&api, &log)
        .reconcile_all(&logical_names(7))
        .await;

    assert_eq!(report.total(), 7);
    assert_eq!(report.error_count(), 1);
    assert_eq!(report.modified_count(), 6);
    assert_eq!(report.skipped_count(), 0);
    assert!(matches!(
        report.outcome_of("f3"),
        Some(FunctionOutcome::Failed { .. })
    ));
    assert_eq!(report.outcome_of("f7"), Some(&FunctionOutcome::Modified));

    // At most one batch in flight at a time.
    assert_eq!(api.peak_in_flight(), 5);

    // The second batch starts only after every call of the first one.
    let calls = api.calls();
    let first_batch: Vec<String> = logical_names(5)
        .iter()
        .map(|n| format!("svc-dev-{}", n))
        .collect();
    let last_first_batch_call = calls
        .iter()
        .rposition(|c| first_batch.iter().any(|n| n == c.function_name()))
        .expect("first batch calls");
    let first_second_batch_call = calls
        .iter()
        .position(|c| !first_batch.iter().any(|n| n == c.function_name()))
        .expect("second batch calls");
    assert!(last_first_batch_call < first_second_batch_call);

    let errors = log.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("f3"));
    assert!(errors[0].contains("injected failure"));
}

#[tokio::test]
async fn batch_size_is_configurable() {
    let api = seeded_api(6);
    let log = Arc::new(MemoryLog::new());

    let report = reconciler(&api, &log)
        .with_config(ReconcilerConfig::default().with_batch_size(2))
        .reconcile_all(&logical_names(6))
        .await;

    assert_eq!(report.modified_count(), 6);
    assert_eq!(api.peak_in_flight(), 2);
}

#[tokio::test]
async fn warmup_function_is_never_touched() {
    let api = seeded_api(2);
    api.put_function("svc-dev-warmup-plugin", Some(10));
    let log = Arc::new(MemoryLog::new());

    let mut names = logical_names(2);
    names.push("warmup-plugin".to_string());
    let report = reconciler(&api, &log).reconcile_all(&names).await;

    assert_eq!(
        report.outcome_of("warmup-plugin"),
        Some(&FunctionOutcome::SkippedWarmup)
    );
    assert!(api
        .calls()
        .iter()
        .all(|c| c.function_name() != "svc-dev-warmup-plugin"));
    assert_eq!(
        api.reserved_concurrency("svc-dev-warmup-plugin"),
        Some(Some(10))
    );
    assert_eq!(report.modified_count(), 2);
    assert_eq!(report.skipped_count(), 1);
    assert!(log
        .infos()
        .iter()
        .any(|m| m == "Skipping warm-up function svc-dev-warmup-plugin"));
}

#[tokio::test]
async fn camel_case_warmup_function_is_skipped() {
    let api = seeded_api(1);
    api.put_function("svc-dev-warmUpPluginDefault", Some(1));
    let log = Arc::new(MemoryLog::new());

    let mut names = logical_names(1);
    names.push("warmUpPluginDefault".to_string());
    let report = reconciler(&api, &log).reconcile_all(&names).await;

    assert_eq!(
        report.outcome_of("warmUpPluginDefault"),
        Some(&FunctionOutcome::SkippedWarmup)
    );
    assert_eq!(
        api.reserved_concurrency("svc-dev-warmUpPluginDefault"),
        Some(Some(1))
    );
    assert!(api
        .calls()
        .iter()
        .all(|c| c.function_name() != "svc-dev-warmUpPluginDefault"));
}

#[tokio::test]
async fn second_run_modifies_nothing() {
    let api = seeded_api(7);
    let log = Arc::new(MemoryLog::new());
    let rec = reconciler(&api, &log);

    let first = rec.reconcile_all(&logical_names(7)).await;
    let second = rec.reconcile_all(&logical_names(7)).await;

    assert_eq!(first.modified_count(), 7);
    assert_eq!(second.modified_count(), 0);
    assert_eq!(second.skipped_count(), 7);
    assert_eq!(api.deleted().len(), 7);
}

#[tokio::test]
async fn counts_always_add_up() {
    let api = seeded_api(4);
    api.put_function("svc-dev-f2", None);
    api.put_function("svc-dev-warmup", Some(1));
    api.fail_fetch("svc-dev-f4");
    let log = Arc::new(MemoryLog::new());

    let mut names = logical_names(5);
    names.push("warmup".to_string());
    let report = reconciler(&api, &log).reconcile_all(&names).await;

    // f1 modified, f2 clean, f3 modified, f4 failed, f5 missing, warmup skipped
    assert_eq!(report.modified_count(), 2);
    assert_eq!(report.error_count(), 2);
    assert_eq!(report.skipped_count(), 2);
    assert_eq!(
        report.modified_count() + report.error_count() + report.skipped_count(),
        report.total()
    );
    assert_eq!(
        log.infos().last().map(String::as_str),
        Some("Reserved concurrency reconciliation finished: modified=2 errored=2 skipped=2 total=6")
    );
}

#[tokio::test]
async fn single_function_without_name_makes_no_calls() {
    let api = seeded_api(3);
    let log = Arc::new(MemoryLog::new());

    let report = reconciler(&api, &log).reconcile_one(None).await;

    assert_eq!(report.total(), 0);
    assert!(api.calls().is_empty());
    assert_eq!(log.errors().len(), 1);
}
