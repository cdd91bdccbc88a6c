//! Remote function identifiers.

/// Derive the remote identifier of a function: `{service}-{stage}-{logical}`.
///
/// Must match the convention the deployment system uses when it provisions
/// functions. No validation is done; a mismatch surfaces as a remote
/// "not found" during reconciliation.
pub fn resolve(service: &str, stage: &str, logical_name: &str) -> String {
    format!("{}-{}-{}", service, stage, logical_name)
}
