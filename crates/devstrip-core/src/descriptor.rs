//! Deployment descriptor model and in-place mutation.
//!
//! The descriptor is owned by the host pipeline. devstrip only removes the
//! reserved-concurrency field from function definitions; every other key
//! (known or not) is carried through untouched via flattened maps.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{DevstripError, Result};

/// Descriptor shared between the host and the registered hooks.
pub type SharedDescriptor = Arc<RwLock<DeploymentDescriptor>>;

fn default_stage() -> String {
    "dev".to_string()
}

/// Root configuration of one deployable service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    /// Service identifier.
    pub service: String,

    #[serde(default)]
    pub provider: ProviderSettings,

    /// Logical function name -> definition.
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionDefinition>,

    /// Everything else in the descriptor.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Provider block of the descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Target stage.
    #[serde(default = "default_stage")]
    pub stage: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            stage: default_stage(),
            extra: Map::new(),
        }
    }
}

/// A key that is present maps to `Some`, even when its value is `null`.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Declared settings of one logical function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Raw `reservedConcurrency` value. Kept opaque so that `null` and
    /// unresolved variables such as `${self:custom.rc}` still load.
    #[serde(
        rename = "reservedConcurrency",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub reserved_concurrency: Option<Value>,

    #[serde(
        rename = "provisionedConcurrency",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub provisioned_concurrency: Option<Value>,

    /// Provider-specific fields, passed through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FunctionDefinition {
    pub fn with_reserved_concurrency(mut self, reserved: u32) -> Self {
        self.reserved_concurrency = Some(Value::from(reserved));
        self
    }

    pub fn has_reserved_concurrency(&self) -> bool {
        self.reserved_concurrency.is_some()
    }

    /// Numeric reserved concurrency, if the field holds an integer.
    pub fn reserved_concurrency_limit(&self) -> Option<u64> {
        self.reserved_concurrency.as_ref().and_then(Value::as_u64)
    }
}

/// On-disk format of a descriptor file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFormat {
    Json,
    Yaml,
    Toml,
}

impl DescriptorFormat {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(DescriptorFormat::Json),
            Some("yml") | Some("yaml") => Ok(DescriptorFormat::Yaml),
            Some("toml") => Ok(DescriptorFormat::Toml),
            _ => Err(DevstripError::Descriptor(format!(
                "unsupported descriptor file extension: {}",
                path.display()
            ))),
        }
    }
}

impl DeploymentDescriptor {
    /// Minimal descriptor for `service` deployed to `stage`.
    pub fn new(service: &str, stage: &str) -> Self {
        Self {
            service: service.to_string(),
            provider: ProviderSettings {
                stage: stage.to_string(),
                extra: Map::new(),
            },
            functions: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    /// Builder: add a function definition.
    pub fn with_function(mut self, name: &str, definition: FunctionDefinition) -> Self {
        self.functions.insert(name.to_string(), definition);
        self
    }

    /// Wrap for sharing with a plugin.
    pub fn into_shared(self) -> SharedDescriptor {
        Arc::new(RwLock::new(self))
    }

    /// Logical function names in mapping order.
    pub fn function_names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    pub fn parse(content: &str, format: DescriptorFormat) -> Result<Self> {
        let descriptor: Self = match format {
            DescriptorFormat::Json => serde_json::from_str(content)?,
            DescriptorFormat::Yaml => serde_yaml::from_str(content)?,
            DescriptorFormat::Toml => toml::from_str(content)?,
        };
        Ok(descriptor)
    }

    pub fn render(&self, format: DescriptorFormat) -> Result<String> {
        match format {
            DescriptorFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            DescriptorFormat::Yaml => Ok(serde_yaml::to_string(self)?),
            DescriptorFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| DevstripError::Descriptor(e.to_string()))
            }
        }
    }

    /// Load a descriptor file; the format follows the extension.
    pub fn load(path: &Path) -> Result<Self> {
        let format = DescriptorFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Write the descriptor; the format follows the extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        let format = DescriptorFormat::from_path(path)?;
        std::fs::write(path, self.render(format)?)?;
        Ok(())
    }
}

/// Outcome of a descriptor mutation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationSummary {
    /// Number of definitions that lost their reserved-concurrency field.
    pub modified_count: usize,
    /// Logical names of those definitions.
    pub modified: Vec<String>,
}

/// Remove `reservedConcurrency` from every function definition in place.
///
/// Presence is the test, so an explicit zero or `null` is removed and
/// counted too.
pub fn strip_reserved_concurrency(
    functions: &mut BTreeMap<String, FunctionDefinition>,
) -> MutationSummary {
    let mut summary = MutationSummary::default();
    for (name, definition) in functions.iter_mut() {
        if definition.reserved_concurrency.take().is_some() {
            summary.modified_count += 1;
            summary.modified.push(name.clone());
        }
    }
    summary
}
