//! Lifecycle wiring: which operation runs at which host extension point.
//!
//! [`ConcurrencyPlugin::new`] classifies the stage once and builds an
//! immutable [`HookRegistry`]. For a development-like stage:
//! - descriptor mutation runs before packaging and before the deploy call
//! - bulk reconciliation runs after a full-service deploy
//! - single-function reconciliation runs after a single-function deploy
//!
//! Any other stage gets an empty registry and the plugin is inert for the
//! rest of the process.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLockReadGuard, RwLockWriteGuard};

use function_api::FunctionApi;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, Instrument};

use crate::descriptor::{strip_reserved_concurrency, DeploymentDescriptor, SharedDescriptor};
use crate::error::{DevstripError, Result};
use crate::log::PluginLog;
use crate::obs::{hook_span, timed};
use crate::reconcile::{ReconcilerConfig, RemoteReconciler, ServiceScope};
use crate::stage::StageClass;

/// Named extension points of the host deployment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecyclePoint {
    /// `before:package:initialize`
    BeforePackageInitialize,

    /// `before:package:createDeploymentArtifacts`
    BeforeCreateDeploymentArtifacts,

    /// `before:deploy:deploy`
    BeforeDeploy,

    /// `after:deploy:deploy`
    AfterDeploy,

    /// `after:deploy:function:deploy`
    AfterFunctionDeploy,
}

impl LifecyclePoint {
    pub const ALL: [LifecyclePoint; 5] = [
        LifecyclePoint::BeforePackageInitialize,
        LifecyclePoint::BeforeCreateDeploymentArtifacts,
        LifecyclePoint::BeforeDeploy,
        LifecyclePoint::AfterDeploy,
        LifecyclePoint::AfterFunctionDeploy,
    ];

    /// Host vocabulary name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePoint::BeforePackageInitialize => "before:package:initialize",
            LifecyclePoint::BeforeCreateDeploymentArtifacts => {
                "before:package:createDeploymentArtifacts"
            }
            LifecyclePoint::BeforeDeploy => "before:deploy:deploy",
            LifecyclePoint::AfterDeploy => "after:deploy:deploy",
            LifecyclePoint::AfterFunctionDeploy => "after:deploy:function:deploy",
        }
    }
}

impl fmt::Display for LifecyclePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecyclePoint {
    type Err = DevstripError;

    fn from_str(s: &str) -> Result<Self> {
        LifecyclePoint::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DevstripError::UnknownLifecyclePoint(s.to_string()))
    }
}

/// Host commands and the order in which they fire extension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostCommand {
    Package,
    Deploy,
    DeployFunction,
}

impl HostCommand {
    pub fn lifecycle_points(&self) -> &'static [LifecyclePoint] {
        match self {
            HostCommand::Package => &[
                LifecyclePoint::BeforePackageInitialize,
                LifecyclePoint::BeforeCreateDeploymentArtifacts,
            ],
            HostCommand::Deploy => &[
                LifecyclePoint::BeforePackageInitialize,
                LifecyclePoint::BeforeCreateDeploymentArtifacts,
                LifecyclePoint::BeforeDeploy,
                LifecyclePoint::AfterDeploy,
            ],
            HostCommand::DeployFunction => &[LifecyclePoint::AfterFunctionDeploy],
        }
    }
}

/// Operation a hook performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookOperation {
    StripDescriptor,
    ReconcileAll,
    ReconcileOne,
}

impl HookOperation {
    /// Name used in start/finish log lines.
    pub fn name(&self) -> &'static str {
        match self {
            HookOperation::StripDescriptor => "reserved concurrency removal from descriptor",
            HookOperation::ReconcileAll => "reserved concurrency removal from deployed functions",
            HookOperation::ReconcileOne => "reserved concurrency removal from deployed function",
        }
    }
}

/// Future returned by a hook.
pub type HookFuture = BoxFuture<'static, Result<()>>;

type HookFn = Arc<dyn Fn() -> HookFuture + Send + Sync>;

/// A zero-argument asynchronous operation registered at an extension point.
#[derive(Clone)]
pub struct Hook {
    operation: HookOperation,
    run: HookFn,
}

impl Hook {
    pub fn operation(&self) -> HookOperation {
        self.operation
    }

    pub fn call(&self) -> HookFuture {
        (self.run)()
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// Immutable mapping from extension point to hook.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    hooks: BTreeMap<LifecyclePoint, Hook>,
}

impl HookRegistry {
    pub fn get(&self, point: LifecyclePoint) -> Option<&Hook> {
        self.hooks.get(&point)
    }

    /// Look up by host name; unknown names are an error, unregistered ones `None`.
    pub fn get_by_name(&self, name: &str) -> Result<Option<&Hook>> {
        Ok(self.get(name.parse()?))
    }

    pub fn points(&self) -> Vec<LifecyclePoint> {
        self.hooks.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LifecyclePoint, &Hook)> {
        self.hooks.iter().map(|(p, h)| (*p, h))
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// Options bag supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginOptions {
    /// Target function of a single-function deploy.
    pub function: Option<String>,

    /// Stage override; takes precedence over the descriptor's provider stage.
    pub stage: Option<String>,
}

impl PluginOptions {
    pub fn with_function(mut self, function: &str) -> Self {
        self.function = Some(function.to_string());
        self
    }

    pub fn with_stage(mut self, stage: &str) -> Self {
        self.stage = Some(stage.to_string());
        self
    }
}

fn read(descriptor: &SharedDescriptor) -> RwLockReadGuard<'_, DeploymentDescriptor> {
    descriptor.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(descriptor: &SharedDescriptor) -> RwLockWriteGuard<'_, DeploymentDescriptor> {
    descriptor.write().unwrap_or_else(PoisonError::into_inner)
}

/// State shared by the registered hooks.
struct HookContext {
    descriptor: SharedDescriptor,
    log: Arc<dyn PluginLog>,
    reconciler: RemoteReconciler,
    target_function: Option<String>,
}

impl HookContext {
    async fn strip_descriptor(&self) -> Result<()> {
        let op = HookOperation::StripDescriptor;
        timed(op.name(), self.log.as_ref(), async {
            let summary = strip_reserved_concurrency(&mut write(&self.descriptor).functions);
            self.log.info(&format!(
                "Removed reserved concurrency from {} function definition(s)",
                summary.modified_count
            ));
            Ok(())
        })
        .await
    }

    async fn reconcile_all(&self) -> Result<()> {
        let op = HookOperation::ReconcileAll;
        timed(op.name(), self.log.as_ref(), async {
            let names = read(&self.descriptor).function_names();
            self.reconciler.reconcile_all(&names).await;
            Ok(())
        })
        .await
    }

    async fn reconcile_one(&self) -> Result<()> {
        let op = HookOperation::ReconcileOne;
        timed(op.name(), self.log.as_ref(), async {
            self.reconciler
                .reconcile_one(self.target_function.as_deref())
                .await;
            Ok(())
        })
        .await
    }

    async fn run(&self, operation: HookOperation) -> Result<()> {
        match operation {
            HookOperation::StripDescriptor => self.strip_descriptor().await,
            HookOperation::ReconcileAll => self.reconcile_all().await,
            HookOperation::ReconcileOne => self.reconcile_one().await,
        }
    }
}

/// The plugin as seen by the host: a stage decision plus its hooks.
#[derive(Debug)]
pub struct ConcurrencyPlugin {
    stage: String,
    class: StageClass,
    hooks: HookRegistry,
}

impl ConcurrencyPlugin {
    /// Classify the stage and register hooks with default reconciler settings.
    ///
    /// The stage is `options.stage` when the host passed one, and the
    /// descriptor's `provider.stage` otherwise. The descriptor is not
    /// authoritative once an explicit stage option is given.
    pub fn new(
        descriptor: SharedDescriptor,
        options: PluginOptions,
        api: Arc<dyn FunctionApi>,
        log: Arc<dyn PluginLog>,
    ) -> Self {
        Self::with_config(descriptor, options, api, log, ReconcilerConfig::default())
    }

    /// Same as [`ConcurrencyPlugin::new`] with explicit reconciler settings.
    pub fn with_config(
        descriptor: SharedDescriptor,
        options: PluginOptions,
        api: Arc<dyn FunctionApi>,
        log: Arc<dyn PluginLog>,
        config: ReconcilerConfig,
    ) -> Self {
        let (service, stage) = {
            let d = read(&descriptor);
            let stage = options
                .stage
                .clone()
                .unwrap_or_else(|| d.provider.stage.clone());
            (d.service.clone(), stage)
        };
        let class = StageClass::of(&stage);

        if class != StageClass::DevelopmentLike {
            debug!(stage = %stage, "Stage is not development-like; no hooks registered");
            return Self {
                stage,
                class,
                hooks: HookRegistry::default(),
            };
        }

        let reconciler = RemoteReconciler::new(api, log.clone(), ServiceScope::new(&service, &stage))
            .with_config(config);
        let context = Arc::new(HookContext {
            descriptor,
            log,
            reconciler,
            target_function: options.function,
        });

        let mut hooks = BTreeMap::new();
        let mut register = |point: LifecyclePoint, operation: HookOperation| {
            let context = Arc::clone(&context);
            let run: HookFn = Arc::new(move || -> HookFuture {
                let context = Arc::clone(&context);
                Box::pin(
                    async move { context.run(operation).await }.instrument(hook_span(point.as_str())),
                )
            });
            hooks.insert(point, Hook { operation, run });
        };

        register(
            LifecyclePoint::BeforePackageInitialize,
            HookOperation::StripDescriptor,
        );
        register(
            LifecyclePoint::BeforeCreateDeploymentArtifacts,
            HookOperation::StripDescriptor,
        );
        register(LifecyclePoint::BeforeDeploy, HookOperation::StripDescriptor);
        register(LifecyclePoint::AfterDeploy, HookOperation::ReconcileAll);
        register(
            LifecyclePoint::AfterFunctionDeploy,
            HookOperation::ReconcileOne,
        );

        debug!(stage = %stage, hooks = hooks.len(), "Registered development-stage hooks");
        Self {
            stage,
            class,
            hooks: HookRegistry { hooks },
        }
    }

    /// Stage the decision was made for.
    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn class(&self) -> StageClass {
        self.class
    }

    /// Whether any hook is registered.
    pub fn is_active(&self) -> bool {
        !self.hooks.is_empty()
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Fire the hook registered at `point`, if any. Returns whether one ran.
    pub async fn invoke_point(&self, point: LifecyclePoint) -> Result<bool> {
        match self.hooks.get(point) {
            Some(hook) => {
                hook.call().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fire the hook registered under a host extension-point name.
    pub async fn invoke(&self, point: &str) -> Result<bool> {
        self.invoke_point(point.parse()?).await
    }

    /// Fire every extension point of `command` in host order.
    pub async fn run_command(&self, command: HostCommand) -> Result<Vec<LifecyclePoint>> {
        let mut fired = Vec::new();
        for point in command.lifecycle_points() {
            if self.invoke_point(*point).await? {
                fired.push(*point);
            }
        }
        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_point_names_roundtrip() {
        for point in LifecyclePoint::ALL {
            assert_eq!(point.as_str().parse::<LifecyclePoint>().unwrap(), point);
        }
        assert!(matches!(
            "after:nothing".parse::<LifecyclePoint>(),
            Err(DevstripError::UnknownLifecyclePoint(_))
        ));
    }

    #[test]
    fn test_deploy_mutates_before_reconciling() {
        let points = HostCommand::Deploy.lifecycle_points();
        let before = points
            .iter()
            .position(|p| *p == LifecyclePoint::BeforeDeploy)
            .unwrap();
        let after = points
            .iter()
            .position(|p| *p == LifecyclePoint::AfterDeploy)
            .unwrap();
        assert!(before < after);
        assert_eq!(
            HostCommand::DeployFunction.lifecycle_points(),
            &[LifecyclePoint::AfterFunctionDeploy]
        );
    }

    #[test]
    fn test_plugin_options_builders() {
        let options = PluginOptions::default().with_function("create").with_stage("dev");
        assert_eq!(options.function.as_deref(), Some("create"));
        assert_eq!(options.stage.as_deref(), Some("dev"));
    }
}
