//! IR-002: Shared types — ambient context, child objects, connector metadata.
//!
//! Environment and service descriptors are supplied by the caller; the engine
//! never fetches them. All types derive Serialize/Deserialize so request
//! documents and outcomes round-trip through YAML and JSON.

use super::field::FieldValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ============================================================================
// Ambient context
// ============================================================================

/// Account / organization / project the pipeline runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub account_identifier: String,

    #[serde(default)]
    pub org_identifier: Option<String>,

    #[serde(default)]
    pub project_identifier: Option<String>,
}

impl Scope {
    pub fn new(account: &str, org: &str, project: &str) -> Self {
        Self {
            account_identifier: account.to_string(),
            org_identifier: Some(org.to_string()),
            project_identifier: Some(project.to_string()),
        }
    }
}

/// Environment type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentType {
    #[default]
    PreProduction,
    Production,
}

impl fmt::Display for EnvironmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreProduction => write!(f, "PreProduction"),
            Self::Production => write!(f, "Production"),
        }
    }
}

/// Ambient environment descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub identifier: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "type", default)]
    pub environment_type: EnvironmentType,
}

impl Environment {
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            ..Self::default()
        }
    }
}

/// Ambient service descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub identifier: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Release name pinned at service level; overrides the infra default.
    #[serde(default)]
    pub release_name: Option<String>,
}

impl Service {
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            ..Self::default()
        }
    }

    pub fn with_release(mut self, release: &str) -> Self {
        self.release_name = Some(release.to_string());
        self
    }

    /// The service-level release name, if set and non-empty.
    pub fn release(&self) -> Option<&str> {
        self.release_name.as_deref().filter(|r| !r.is_empty())
    }
}

/// Fields shared by every infrastructure kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraDetails {
    #[serde(default)]
    pub infra_identifier: String,

    #[serde(default)]
    pub infra_name: String,

    /// Kind-intrinsic tags
    #[serde(default)]
    pub tags: IndexMap<String, String>,

    /// Fields come from a provisioner's output instead of the definition
    #[serde(default)]
    pub dynamically_provisioned: bool,

    #[serde(default)]
    pub provisioner_step_identifier: Option<String>,
}

// ============================================================================
// Child objects
// ============================================================================

/// Host filter type for physical data center host pools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostFilterType {
    #[default]
    All,
    HostNames,
    HostAttributes,
}

impl fmt::Display for HostFilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::HostNames => write!(f, "HostNames"),
            Self::HostAttributes => write!(f, "HostAttributes"),
        }
    }
}

/// Host filter as written in a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "spec")]
pub enum HostFilter {
    All,
    HostNames {
        value: FieldValue<Vec<String>>,
    },
    HostAttributes {
        value: FieldValue<IndexMap<String, String>>,
    },
}

/// Host filter carried on an outcome, with field values dereferenced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostFilterOutcome {
    #[serde(rename = "type")]
    pub filter_type: HostFilterType,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub host_names: Vec<String>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, String>,
}

impl HostFilterOutcome {
    /// Absent filters select every host.
    pub fn from_filter(filter: Option<&HostFilter>) -> Self {
        match filter {
            None | Some(HostFilter::All) => Self::default(),
            Some(HostFilter::HostNames { value }) => Self {
                filter_type: HostFilterType::HostNames,
                host_names: value.value().cloned().unwrap_or_default(),
                attributes: IndexMap::new(),
            },
            Some(HostFilter::HostAttributes { value }) => Self {
                filter_type: HostFilterType::HostAttributes,
                host_names: Vec::new(),
                attributes: value.value().cloned().unwrap_or_default(),
            },
        }
    }
}

/// AWS instance selection for SSH/WinRM targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsInstanceFilter {
    #[serde(default)]
    pub vpcs: Vec<String>,

    #[serde(default)]
    pub tags: Option<FieldValue<IndexMap<String, String>>>,
}

/// Elastigroup configuration block; only its presence is checked here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElastigroupConfiguration {
    pub store: StoreConfig,
}

/// Where a configuration document lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "spec")]
pub enum StoreConfig {
    Inline { content: FieldValue<String> },
    Harness { files: Vec<String> },
}

/// Reference to a custom deployment template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDeploymentRef {
    pub template_ref: String,

    #[serde(default)]
    pub version_label: String,
}

/// Name/value variable declared on a custom deployment infrastructure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDeploymentVariable {
    pub name: String,

    #[serde(default)]
    pub value: Option<FieldValue<String>>,
}

// ============================================================================
// Connectors
// ============================================================================

/// Connector display metadata attached to an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connector {
    pub name: String,
}

/// Connector record returned by a connector service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorInfo {
    pub identifier: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "type", default)]
    pub connector_type: Option<String>,
}

// ============================================================================
// Cancellation
// ============================================================================

/// Caller-owned cancellation flag, checked before every external call.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
