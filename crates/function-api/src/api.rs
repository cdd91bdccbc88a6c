//! Trait and data definitions for the remote function-management API.
//!
//! The trait is async and backend-agnostic. Implementations must be safe to
//! call concurrently from several futures polled on the same task.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FunctionApiError;

/// Result type for remote API operations
pub type ApiResult<T> = std::result::Result<T, FunctionApiError>;

/// Live configuration of one deployed function.
///
/// Only the fields devstrip reads are modelled; it is fetched on demand and
/// never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFunctionConfiguration {
    /// Fully-qualified remote identifier.
    pub function_name: String,
    /// Reserved concurrent executions, if a setting exists.
    pub reserved_concurrency: Option<u32>,
}

impl RemoteFunctionConfiguration {
    /// Whether a reserved-concurrency setting is present (zero counts).
    pub fn has_reserved_concurrency(&self) -> bool {
        self.reserved_concurrency.is_some()
    }
}

/// Remote function-management API.
///
/// Guarantees expected from implementations:
/// - `get_function_configuration` on an unknown identifier returns
///   `FunctionApiError::NotFound`.
/// - `delete_function_concurrency` is idempotent: deleting an absent setting
///   succeeds.
#[async_trait]
pub trait FunctionApi: Send + Sync {
    /// Fetch the live configuration of `function_name`.
    async fn get_function_configuration(
        &self,
        function_name: &str,
    ) -> ApiResult<RemoteFunctionConfiguration>;

    /// Remove the reserved-concurrency setting of `function_name`.
    async fn delete_function_concurrency(&self, function_name: &str) -> ApiResult<()>;
}
