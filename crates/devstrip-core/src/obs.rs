//! Structured observability for hook invocations.
//!
//! This module provides:
//! - [`timed`], the start/finish/failure wrapper every registered hook runs in
//! - Hook-scoped tracing spans via [`hook_span`]
//! - Emission functions for per-function reconciliation outcomes
//!
//! Events are emitted at `debug!` level; the user-visible lines go through
//! the injected [`PluginLog`].

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use tracing::debug;
use uuid::Uuid;

use crate::log::PluginLog;

/// Span tagging everything one hook invocation does with the extension
/// point and a fresh invocation id. Attach it with `Instrument::instrument`.
pub fn hook_span(point: &str) -> tracing::Span {
    let invocation_id = Uuid::new_v4();
    tracing::info_span!("devstrip.hook", point = %point, invocation_id = %invocation_id)
}

/// Run `operation`, logging start, finish with elapsed time, or failure with
/// elapsed time and message. Errors are returned unchanged.
pub async fn timed<T, E, F>(operation: &str, log: &dyn PluginLog, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    log.info(&format!("Starting {}", operation));
    let start = Instant::now();

    match fut.await {
        Ok(value) => {
            let elapsed_ms = start.elapsed().as_millis();
            log.info(&format!("Finished {} in {}ms", operation, elapsed_ms));
            Ok(value)
        }
        Err(e) => {
            let elapsed_ms = start.elapsed().as_millis();
            log.error(&format!(
                "Failed {} after {}ms: {}",
                operation, elapsed_ms, e
            ));
            Err(e)
        }
    }
}

/// Emit event: one function reconciled.
pub fn emit_function_outcome(logical_name: &str, function_id: &str, outcome: &str) {
    debug!(
        event = "reconcile.function",
        logical_name = %logical_name,
        function_id = %function_id,
        outcome = %outcome,
    );
}

/// Emit event: a batch settled.
pub fn emit_batch_settled(batch_index: usize, batch_len: usize) {
    debug!(event = "reconcile.batch_settled", batch_index = batch_index, batch_len = batch_len);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;

    #[tokio::test]
    async fn timed_logs_start_and_finish() {
        let log = MemoryLog::new();
        let value: Result<u32, String> = timed("strip", &log, async { Ok(7) }).await;

        assert_eq!(value, Ok(7));
        let infos = log.infos();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0], "Starting strip");
        assert!(infos[1].starts_with("Finished strip in "));
        assert!(log.errors().is_empty());
    }

    #[tokio::test]
    async fn timed_logs_failure_and_returns_error() {
        let log = MemoryLog::new();
        let value: Result<(), String> =
            timed("reconcile", &log, async { Err("boom".to_string()) }).await;

        assert_eq!(value, Err("boom".to_string()));
        let errors = log.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Failed reconcile after "));
        assert!(errors[0].ends_with(": boom"));
    }

    #[test]
    fn hook_span_can_be_entered_without_subscriber() {
        let span = hook_span("before:deploy:deploy");
        let _entered = span.enter();
    }
}
