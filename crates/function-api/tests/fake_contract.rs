//! Contract tests for the in-memory function API.

use function_api::fakes::{ApiCall, MemoryFunctionApi};
use function_api::{FunctionApi, FunctionApiError};

#[tokio::test]
async fn fetch_returns_seeded_configuration() {
    let api = MemoryFunctionApi::new()
        .with_function("svc-dev-a", Some(5))
        .with_function("svc-dev-b", None);

    let a = api.get_function_configuration("svc-dev-a").await.expect("fetch a");
    assert_eq!(a.reserved_concurrency, Some(5));

    let b = api.get_function_configuration("svc-dev-b").await.expect("fetch b");
    assert!(!b.has_reserved_concurrency());
}

#[tokio::test]
async fn unknown_function_is_not_found() {
    let api = MemoryFunctionApi::new();
    let err = api
        .get_function_configuration("svc-dev-missing")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        FunctionApiError::NotFound {
            function_name: "svc-dev-missing".to_string()
        }
    );
}

#[tokio::test]
async fn delete_is_idempotent() {
    let api = MemoryFunctionApi::new().with_function("svc-dev-a", Some(3));

    api.delete_function_concurrency("svc-dev-a").await.expect("first delete");
    api.delete_function_concurrency("svc-dev-a").await.expect("second delete");

    assert_eq!(api.reserved_concurrency("svc-dev-a"), Some(None));
    assert_eq!(api.deleted().len(), 2);
}

#[tokio::test]
async fn injected_fetch_failure_is_reported() {
    let api = MemoryFunctionApi::new().with_function("svc-dev-a", Some(3));
    api.fail_fetch("svc-dev-a");

    let err = api.get_function_configuration("svc-dev-a").await.unwrap_err();
    assert!(matches!(err, FunctionApiError::Status { status: 500, .. }));
    assert_eq!(
        api.calls(),
        vec![ApiCall::GetConfiguration("svc-dev-a".to_string())]
    );
}

#[tokio::test]
async fn concurrent_calls_overlap() {
    let api = MemoryFunctionApi::new()
        .with_function("svc-dev-a", None)
        .with_function("svc-dev-b", None)
        .with_function("svc-dev-c", None);

    let (a, b, c) = tokio::join!(
        api.get_function_configuration("svc-dev-a"),
        api.get_function_configuration("svc-dev-b"),
        api.get_function_configuration("svc-dev-c"),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(api.peak_in_flight(), 3);
}
