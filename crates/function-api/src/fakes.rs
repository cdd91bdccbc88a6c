//! In-memory fake for the function-management API (testing and dry runs)
//!
//! `MemoryFunctionApi` keeps a `HashMap<function name, reserved concurrency>`
//! and records every call. Each call yields to the scheduler once before it
//! completes, so futures polled together genuinely overlap and the peak
//! number of in-flight calls can be asserted on.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{ApiResult, FunctionApi, RemoteFunctionConfiguration};
use crate::error::FunctionApiError;

/// A recorded API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    GetConfiguration(String),
    DeleteConcurrency(String),
}

impl ApiCall {
    pub fn function_name(&self) -> &str {
        match self {
            ApiCall::GetConfiguration(name) | ApiCall::DeleteConcurrency(name) => name,
        }
    }
}

/// In-memory function API.
#[derive(Debug, Default)]
pub struct MemoryFunctionApi {
    functions: Mutex<HashMap<String, Option<u32>>>,
    failing_fetches: Mutex<HashSet<String>>,
    calls: Mutex<Vec<ApiCall>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryFunctionApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: seed a deployed function.
    pub fn with_function(self, function_name: &str, reserved_concurrency: Option<u32>) -> Self {
        self.put_function(function_name, reserved_concurrency);
        self
    }

    /// Create or overwrite a deployed function (simulates an external change).
    pub fn put_function(&self, function_name: &str, reserved_concurrency: Option<u32>) {
        self.functions
            .lock()
            .unwrap()
            .insert(function_name.to_string(), reserved_concurrency);
    }

    /// Make every fetch of `function_name` fail with a 500 status.
    pub fn fail_fetch(&self, function_name: &str) {
        self.failing_fetches
            .lock()
            .unwrap()
            .insert(function_name.to_string());
    }

    /// Current remote setting: `None` if the function does not exist.
    pub fn reserved_concurrency(&self, function_name: &str) -> Option<Option<u32>> {
        self.functions.lock().unwrap().get(function_name).copied()
    }

    /// All calls in the order they were issued.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Function names passed to `get_function_configuration`, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ApiCall::GetConfiguration(name) => Some(name),
                ApiCall::DeleteConcurrency(_) => None,
            })
            .collect()
    }

    /// Function names passed to `delete_function_concurrency`, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ApiCall::DeleteConcurrency(name) => Some(name),
                ApiCall::GetConfiguration(_) => None,
            })
            .collect()
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self, call: ApiCall) -> InFlightGuard<'_> {
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard {
            counter: &self.in_flight,
        }
    }
}

#[async_trait]
impl FunctionApi for MemoryFunctionApi {
    async fn get_function_configuration(
        &self,
        function_name: &str,
    ) -> ApiResult<RemoteFunctionConfiguration> {
        let _guard = self.enter(ApiCall::GetConfiguration(function_name.to_string()));
        tokio::task::yield_now().await;

        if self.failing_fetches.lock().unwrap().contains(function_name) {
            return Err(FunctionApiError::Status {
                status: 500,
                body: format!("injected failure for {}", function_name),
            });
        }

        let functions = self.functions.lock().unwrap();
        let reserved = functions
            .get(function_name)
            .ok_or_else(|| FunctionApiError::NotFound {
                function_name: function_name.to_string(),
            })?;

        Ok(RemoteFunctionConfiguration {
            function_name: function_name.to_string(),
            reserved_concurrency: *reserved,
        })
    }

    async fn delete_function_concurrency(&self, function_name: &str) -> ApiResult<()> {
        let _guard = self.enter(ApiCall::DeleteConcurrency(function_name.to_string()));
        tokio::task::yield_now().await;

        let mut functions = self.functions.lock().unwrap();
        let reserved = functions
            .get_mut(function_name)
            .ok_or_else(|| FunctionApiError::NotFound {
                function_name: function_name.to_string(),
            })?;
        *reserved = None;
        Ok(())
    }
}
