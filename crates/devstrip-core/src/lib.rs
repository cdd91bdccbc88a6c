//! devstrip core library
//!
//! Removes reserved-concurrency settings when deploying to a development-like
//! stage: from the in-memory deployment descriptor before packaging, and from
//! the deployed functions after the deploy completes.
//!
//! - [`stage`]: development-like stage classification
//! - [`naming`]: logical name -> remote function identifier
//! - [`descriptor`]: descriptor model and in-place mutation
//! - [`reconcile`]: batched, failure-isolating remote reconciliation
//! - [`lifecycle`]: hook registration against host extension points

pub mod descriptor;
pub mod error;
pub mod lifecycle;
pub mod log;
pub mod naming;
pub mod obs;
pub mod reconcile;
pub mod stage;
pub mod telemetry;

pub use descriptor::{
    strip_reserved_concurrency, DeploymentDescriptor, DescriptorFormat, FunctionDefinition,
    MutationSummary, ProviderSettings, SharedDescriptor,
};
pub use error::{DevstripError, Result};
pub use lifecycle::{
    ConcurrencyPlugin, Hook, HookOperation, HookRegistry, HostCommand, LifecyclePoint,
    PluginOptions,
};
pub use log::{MemoryLog, PluginLog, TracingLog};
pub use reconcile::{
    FunctionOutcome, FunctionReport, ReconcilerConfig, ReconciliationReport, RemoteReconciler,
    ServiceScope,
};
pub use stage::{is_development_like, StageClass};
pub use telemetry::{init_tracing, LogFormat};

pub use function_api::{FunctionApi, FunctionApiError, RemoteFunctionConfiguration};
