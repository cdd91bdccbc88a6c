//! Remote reserved-concurrency reconciliation.
//!
//! Walks a set of logical function names, resolves each to its remote
//! identifier, and deletes the reserved-concurrency setting wherever the live
//! configuration still carries one.
//!
//! Names are processed in consecutive batches. Every function of a batch is
//! polled concurrently on the current task and the batch fully settles before
//! the next one starts. A failure for one function is logged and counted; it
//! never aborts its siblings or later batches. No retries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use function_api::{ApiResult, FunctionApi};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::log::PluginLog;
use crate::naming;
use crate::obs::{emit_batch_settled, emit_function_outcome};

/// Functions reconciled concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Marker in the remote identifier of the warm-up helper function.
pub const DEFAULT_WARMUP_MARKER: &str = "warmup";

/// Reconciler tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Batch size; values below 1 are treated as 1.
    pub batch_size: usize,

    /// Remote identifiers containing this substring, compared without
    /// regard to case, are never touched. An empty marker disables the
    /// exclusion.
    pub warmup_marker: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            warmup_marker: DEFAULT_WARMUP_MARKER.to_string(),
        }
    }
}

impl ReconcilerConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_warmup_marker(mut self, marker: &str) -> Self {
        self.warmup_marker = marker.to_string();
        self
    }

    fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    fn is_warmup(&self, function_id: &str) -> bool {
        !self.warmup_marker.is_empty()
            && function_id
                .to_lowercase()
                .contains(&self.warmup_marker.to_lowercase())
    }
}

/// Service and stage the remote identifiers are derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceScope {
    pub service: String,
    pub stage: String,
}

impl ServiceScope {
    pub fn new(service: &str, stage: &str) -> Self {
        Self {
            service: service.to_string(),
            stage: stage.to_string(),
        }
    }

    pub fn function_id(&self, logical_name: &str) -> String {
        naming::resolve(&self.service, &self.stage, logical_name)
    }
}

/// What happened to one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FunctionOutcome {
    /// Reserved concurrency was present and got deleted.
    Modified,

    /// No reserved concurrency remotely; nothing to do.
    AlreadyClean,

    /// Warm-up helper; never fetched or changed.
    SkippedWarmup,

    /// Resolving, fetching or deleting failed.
    Failed { error: String },
}

impl FunctionOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            FunctionOutcome::Modified => "modified",
            FunctionOutcome::AlreadyClean => "already_clean",
            FunctionOutcome::SkippedWarmup => "skipped_warmup",
            FunctionOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            FunctionOutcome::AlreadyClean | FunctionOutcome::SkippedWarmup
        )
    }
}

/// Result for one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionReport {
    pub logical_name: String,
    pub function_id: String,
    pub outcome: FunctionOutcome,
}

/// Aggregate of one reconciliation run.
///
/// `modified_count() + error_count() + skipped_count() == total()` always holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Per-function results in submission order.
    pub functions: Vec<FunctionReport>,
    pub finished_at: DateTime<Utc>,
}

impl ReconciliationReport {
    fn new(functions: Vec<FunctionReport>) -> Self {
        Self {
            functions,
            finished_at: Utc::now(),
        }
    }

    /// Report for a run that never touched any function.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn total(&self) -> usize {
        self.functions.len()
    }

    pub fn modified_count(&self) -> usize {
        self.count(|o| matches!(o, FunctionOutcome::Modified))
    }

    pub fn error_count(&self) -> usize {
        self.count(|o| matches!(o, FunctionOutcome::Failed { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(FunctionOutcome::is_skipped)
    }

    pub fn outcome_of(&self, logical_name: &str) -> Option<&FunctionOutcome> {
        self.functions
            .iter()
            .find(|f| f.logical_name == logical_name)
            .map(|f| &f.outcome)
    }

    /// One-line run summary; distinguishes "nothing to do" from "nothing succeeded".
    pub fn summary_line(&self) -> String {
        if self.total() == 0 {
            return "Reserved concurrency reconciliation finished: nothing to reconcile".to_string();
        }
        format!(
            "Reserved concurrency reconciliation finished: modified={} errored={} skipped={} total={}",
            self.modified_count(),
            self.error_count(),
            self.skipped_count(),
            self.total()
        )
    }

    fn count(&self, pred: impl Fn(&FunctionOutcome) -> bool) -> usize {
        self.functions.iter().filter(|f| pred(&f.outcome)).count()
    }
}

/// Removes reserved concurrency from deployed functions.
pub struct RemoteReconciler {
    api: Arc<dyn FunctionApi>,
    log: Arc<dyn PluginLog>,
    scope: ServiceScope,
    config: ReconcilerConfig,
}

impl RemoteReconciler {
    pub fn new(api: Arc<dyn FunctionApi>, log: Arc<dyn PluginLog>, scope: ServiceScope) -> Self {
        Self {
            api,
            log,
            scope,
            config: ReconcilerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scope(&self) -> &ServiceScope {
        &self.scope
    }

    /// Reconcile every function in `logical_names`, batch by batch.
    pub async fn reconcile_all(&self, logical_names: &[String]) -> ReconciliationReport {
        let mut functions = Vec::with_capacity(logical_names.len());

        for (index, batch) in logical_names
            .chunks(self.config.effective_batch_size())
            .enumerate()
        {
            let settled = join_all(batch.iter().map(|name| self.reconcile_function(name))).await;
            emit_batch_settled(index, batch.len());
            functions.extend(settled);
        }

        let report = ReconciliationReport::new(functions);
        self.log.info(&report.summary_line());
        report
    }

    /// Reconcile exactly one function, as targeted by the operator.
    ///
    /// Without a (non-empty) name this logs one error and makes no remote call.
    pub async fn reconcile_one(&self, logical_name: Option<&str>) -> ReconciliationReport {
        let Some(logical_name) = logical_name.filter(|n| !n.is_empty()) else {
            self.log
                .error("No function specified for single-function reconciliation");
            return ReconciliationReport::empty();
        };

        let report = ReconciliationReport::new(vec![self.reconcile_function(logical_name).await]);
        self.log.info(&report.summary_line());
        report
    }

    async fn reconcile_function(&self, logical_name: &str) -> FunctionReport {
        let function_id = self.scope.function_id(logical_name);

        let outcome = match self.apply(logical_name, &function_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.log.error(&format!(
                    "Failed to remove reserved concurrency from {}: {}",
                    logical_name, e
                ));
                FunctionOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        emit_function_outcome(logical_name, &function_id, outcome.name());
        FunctionReport {
            logical_name: logical_name.to_string(),
            function_id,
            outcome,
        }
    }

    async fn apply(&self, logical_name: &str, function_id: &str) -> ApiResult<FunctionOutcome> {
        if self.config.is_warmup(function_id) {
            self.log
                .info(&format!("Skipping warm-up function {}", function_id));
            return Ok(FunctionOutcome::SkippedWarmup);
        }

        let remote = self.api.get_function_configuration(function_id).await?;
        match remote.reserved_concurrency {
            Some(reserved) => {
                self.api.delete_function_concurrency(function_id).await?;
                self.log.info(&format!(
                    "Removed reserved concurrency ({}) from {}",
                    reserved, logical_name
                ));
                Ok(FunctionOutcome::Modified)
            }
            None => Ok(FunctionOutcome::AlreadyClean),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use function_api::fakes::MemoryFunctionApi;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn reconciler(api: Arc<MemoryFunctionApi>, log: Arc<MemoryLog>) -> RemoteReconciler {
        RemoteReconciler::new(api, log, ServiceScope::new("svc", "dev"))
    }

    #[test]
    fn test_config_defaults() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.warmup_marker, "warmup");
        assert_eq!(config.clone().with_batch_size(0).effective_batch_size(), 1);
        assert!(config.is_warmup("svc-dev-warmup-plugin"));
        assert!(config.is_warmup("svc-dev-warmUpPluginDefault"));
        assert!(config.is_warmup("svc-dev-WARMUP"));
        assert!(!config.is_warmup("svc-dev-warm-up"));
        assert!(!config.with_warmup_marker("").is_warmup("svc-dev-warmup-plugin"));
    }

    #[tokio::test]
    async fn test_modified_clean_and_missing() {
        let api = Arc::new(
            MemoryFunctionApi::new()
                .with_function("svc-dev-a", Some(5))
                .with_function("svc-dev-b", None),
        );
        let log = Arc::new(MemoryLog::new());
        let report = reconciler(api.clone(), log.clone())
            .reconcile_all(&names(&["a", "b", "c"]))
            .await;

        assert_eq!(report.outcome_of("a"), Some(&FunctionOutcome::Modified));
        assert_eq!(report.outcome_of("b"), Some(&FunctionOutcome::AlreadyClean));
        assert!(matches!(
            report.outcome_of("c"),
            Some(FunctionOutcome::Failed { .. })
        ));
        assert_eq!(report.modified_count(), 1);
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(api.deleted(), vec!["svc-dev-a".to_string()]);
        assert_eq!(api.reserved_concurrency("svc-dev-a"), Some(None));

        let errors = log.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("c"));
        assert!(errors[0].contains("function not found: svc-dev-c"));
        assert_eq!(
            log.infos().last().map(String::as_str),
            Some("Reserved concurrency reconciliation finished: modified=1 errored=1 skipped=1 total=3")
        );
    }

    #[tokio::test]
    async fn test_empty_run_still_summarises() {
        let api = Arc::new(MemoryFunctionApi::new());
        let log = Arc::new(MemoryLog::new());
        let report = reconciler(api.clone(), log.clone()).reconcile_all(&[]).await;

        assert_eq!(report.total(), 0);
        assert!(api.calls().is_empty());
        assert_eq!(
            log.infos(),
            vec!["Reserved concurrency reconciliation finished: nothing to reconcile"]
        );
    }

    #[tokio::test]
    async fn test_reconcile_one_without_name() {
        let api = Arc::new(MemoryFunctionApi::new().with_function("svc-dev-a", Some(1)));
        let log = Arc::new(MemoryLog::new());
        let rec = reconciler(api.clone(), log.clone());

        let none = rec.reconcile_one(None).await;
        let empty = rec.reconcile_one(Some("")).await;

        assert_eq!(none.total(), 0);
        assert_eq!(empty.total(), 0);
        assert!(api.calls().is_empty());
        assert_eq!(log.errors().len(), 2);
    }

    #[tokio::test]
    async fn test_reconcile_one_targets_single_function() {
        let api = Arc::new(
            MemoryFunctionApi::new()
                .with_function("svc-dev-a", Some(1))
                .with_function("svc-dev-b", Some(2)),
        );
        let log = Arc::new(MemoryLog::new());
        let report = reconciler(api.clone(), log.clone())
            .reconcile_one(Some("b"))
            .await;

        assert_eq!(report.modified_count(), 1);
        assert_eq!(api.deleted(), vec!["svc-dev-b".to_string()]);
        assert_eq!(api.reserved_concurrency("svc-dev-a"), Some(Some(1)));
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let value = serde_json::to_value(FunctionOutcome::Failed {
            error: "boom".to_string(),
        })
        .expect("serialize");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "boom");
    }
}
