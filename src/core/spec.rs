//! IR-003: Infrastructure definitions — one struct per deployment-target kind.
//!
//! [`Infrastructure`] is a closed tagged union. YAML form:
//!
//! ```yaml
//! type: KubernetesDirect
//! spec:
//!   infraIdentifier: k8s-prod
//!   connectorRef: my-cluster
//!   namespace: default
//!   releaseName: release-<+INFRA_KEY_SHORT_ID>
//! ```

use super::field::{FieldValue, HostList};
use super::types::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

type Field<T = String> = Option<FieldValue<T>>;

/// Static facts about a kind, consumed by the registry.
pub trait KindSpec: Sized {
    const KIND: InfrastructureKind;

    /// Names of the fields hashed into the infra key, in hashing order.
    const KEY_FIELDS: &'static [&'static str];

    /// Whether fields may come from a provisioner's output.
    const SUPPORTS_DYNAMIC_PROVISIONING: bool = true;

    /// Legacy kinds also expose a six-character short key.
    const SHORT_KEY: bool = false;

    fn downcast(infra: &Infrastructure) -> Option<&Self>;

    fn details(&self) -> &InfraDetails;
}

macro_rules! infrastructure_kinds {
    ($($variant:ident($spec:ident) => $tag:literal;)*) => {
        /// Discriminant tag selecting a deployment-target variant.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum InfrastructureKind {
            $(#[serde(rename = $tag)] $variant,)*
        }

        impl InfrastructureKind {
            /// Every kind in the closed set, in registration order.
            pub const ALL: &'static [InfrastructureKind] = &[$(Self::$variant,)*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $tag,)*
                }
            }
        }

        impl FromStr for InfrastructureKind {
            type Err = super::errors::InfraError;

            fn from_str(tag: &str) -> Result<Self, Self::Err> {
                match tag {
                    $($tag => Ok(Self::$variant),)*
                    other => Err(super::errors::InfraError::UnknownKind(other.to_string())),
                }
            }
        }

        /// A user-authored infrastructure definition.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type", content = "spec")]
        pub enum Infrastructure {
            $(#[serde(rename = $tag)] $variant($spec),)*
        }

        impl Infrastructure {
            pub fn kind(&self) -> InfrastructureKind {
                match self {
                    $(Self::$variant(_) => InfrastructureKind::$variant,)*
                }
            }

            pub fn details(&self) -> &InfraDetails {
                match self {
                    $(Self::$variant(s) => &s.details,)*
                }
            }

            /// Connector reference, present on every kind.
            pub fn connector_reference(&self) -> Option<&FieldValue<String>> {
                match self {
                    $(Self::$variant(s) => s.connector_ref.as_ref(),)*
                }
            }
        }

        $(
            impl From<$spec> for Infrastructure {
                fn from(spec: $spec) -> Self {
                    Self::$variant(spec)
                }
            }
        )*
    };
}

infrastructure_kinds! {
    KubernetesDirect(K8sDirectInfrastructure) => "KubernetesDirect";
    KubernetesGcp(K8sGcpInfrastructure) => "KubernetesGcp";
    KubernetesAzure(K8sAzureInfrastructure) => "KubernetesAzure";
    KubernetesAws(K8sAwsInfrastructure) => "KubernetesAws";
    KubernetesRancher(K8sRancherInfrastructure) => "KubernetesRancher";
    ServerlessAwsLambda(ServerlessAwsLambdaInfrastructure) => "ServerlessAwsLambda";
    Pdc(PdcInfrastructure) => "Pdc";
    SshWinRmAws(SshWinRmAwsInfrastructure) => "SshWinRmAws";
    SshWinRmAzure(SshWinRmAzureInfrastructure) => "SshWinRmAzure";
    AzureWebApp(AzureWebAppInfrastructure) => "AzureWebApp";
    Ecs(EcsInfrastructure) => "ECS";
    GoogleCloudFunctions(GoogleFunctionsInfrastructure) => "GoogleCloudFunctions";
    Elastigroup(ElastigroupInfrastructure) => "Elastigroup";
    Asg(AsgInfrastructure) => "Asg";
    CustomDeployment(CustomDeploymentInfrastructure) => "CustomDeployment";
    Tas(TanzuApplicationServiceInfrastructure) => "TAS";
    AwsSam(AwsSamInfrastructure) => "AWS_SAM";
    AwsLambda(AwsLambdaInfrastructure) => "AwsLambda";
}

impl fmt::Display for InfrastructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InfrastructureKind {
    /// Kubernetes-family kinds share release-name semantics.
    pub fn is_kubernetes(&self) -> bool {
        matches!(
            self,
            Self::KubernetesDirect
                | Self::KubernetesGcp
                | Self::KubernetesAzure
                | Self::KubernetesAws
                | Self::KubernetesRancher
        )
    }
}

impl Infrastructure {
    pub fn is_dynamically_provisioned(&self) -> bool {
        self.details().dynamically_provisioned
    }
}

/// Implements [`KindSpec`] for a definition struct.
macro_rules! kind_spec {
    ($spec:ident, $variant:ident, [$($key:literal),*] $(, $name:ident = $value:expr)*) => {
        impl KindSpec for $spec {
            const KIND: InfrastructureKind = InfrastructureKind::$variant;
            const KEY_FIELDS: &'static [&'static str] = &[$($key),*];
            $(const $name: bool = $value;)*

            fn downcast(infra: &Infrastructure) -> Option<&Self> {
                match infra {
                    Infrastructure::$variant(s) => Some(s),
                    _ => None,
                }
            }

            fn details(&self) -> &InfraDetails {
                &self.details
            }
        }
    };
}

// ============================================================================
// Kubernetes family
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct K8sDirectInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub namespace: Field,
    #[serde(default)]
    pub release_name: Field,
}

kind_spec!(K8sDirectInfrastructure, KubernetesDirect, ["connectorRef", "namespace"], SHORT_KEY = true);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct K8sGcpInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub namespace: Field,
    #[serde(default)]
    pub cluster: Field,
    #[serde(default)]
    pub release_name: Field,
}

kind_spec!(K8sGcpInfrastructure, KubernetesGcp, ["connectorRef", "cluster", "namespace"], SHORT_KEY = true);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct K8sAzureInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub namespace: Field,
    #[serde(default)]
    pub cluster: Field,
    #[serde(default)]
    pub release_name: Field,
    #[serde(default)]
    pub subscription_id: Field,
    #[serde(default)]
    pub resource_group: Field,
    #[serde(default)]
    pub use_cluster_admin_credentials: Field<bool>,
}

kind_spec!(
    K8sAzureInfrastructure,
    KubernetesAzure,
    ["connectorRef", "subscriptionId", "resourceGroup", "cluster", "namespace"],
    SHORT_KEY = true
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct K8sAwsInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub namespace: Field,
    #[serde(default)]
    pub cluster: Field,
    #[serde(default)]
    pub release_name: Field,
}

kind_spec!(K8sAwsInfrastructure, KubernetesAws, ["connectorRef", "cluster", "namespace"], SHORT_KEY = true);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct K8sRancherInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub namespace: Field,
    #[serde(default)]
    pub cluster: Field,
    #[serde(default)]
    pub release_name: Field,
}

kind_spec!(K8sRancherInfrastructure, KubernetesRancher, ["connectorRef", "cluster", "namespace"], SHORT_KEY = true);

// ============================================================================
// Serverless / functions
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerlessAwsLambdaInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub region: Field,
    #[serde(default)]
    pub stage: Field,
}

kind_spec!(ServerlessAwsLambdaInfrastructure, ServerlessAwsLambda, ["connectorRef", "region", "stage"]);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleFunctionsInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub region: Field,
    #[serde(default)]
    pub project: Field,
}

kind_spec!(GoogleFunctionsInfrastructure, GoogleCloudFunctions, ["connectorRef", "project", "region"]);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsSamInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub region: Field,
}

kind_spec!(AwsSamInfrastructure, AwsSam, ["connectorRef", "region"]);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsLambdaInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub region: Field,
}

kind_spec!(AwsLambdaInfrastructure, AwsLambda, ["connectorRef", "region"]);

// ============================================================================
// VM fleets / hosts
// ============================================================================

/// Physical data center host pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdcInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub credentials_ref: Field,
    #[serde(default)]
    pub hosts: Field<HostList>,
    #[serde(default)]
    pub host_filter: Option<HostFilter>,
    /// Expression yielding the provisioner's host array (dynamic mode)
    #[serde(default)]
    pub host_array_path: Field,
    /// Attribute name -> property path inside each host object (dynamic mode)
    #[serde(default)]
    pub host_attributes: Field<IndexMap<String, String>>,
}

kind_spec!(PdcInfrastructure, Pdc, ["credentialsRef", "connectorRef"]);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshWinRmAwsInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub credentials_ref: Field,
    #[serde(default)]
    pub region: Field,
    #[serde(default)]
    pub host_connection_type: Field,
    #[serde(default)]
    pub aws_instance_filter: Option<AwsInstanceFilter>,
}

kind_spec!(SshWinRmAwsInfrastructure, SshWinRmAws, ["connectorRef", "credentialsRef", "region"]);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshWinRmAzureInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub credentials_ref: Field,
    #[serde(default)]
    pub subscription_id: Field,
    #[serde(default)]
    pub resource_group: Field,
    /// Host tag filter
    #[serde(default)]
    pub tags: Field<IndexMap<String, String>>,
    #[serde(default)]
    pub host_connection_type: Field,
}

kind_spec!(
    SshWinRmAzureInfrastructure,
    SshWinRmAzure,
    ["connectorRef", "credentialsRef", "subscriptionId", "resourceGroup"]
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElastigroupInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub configuration: Option<ElastigroupConfiguration>,
}

kind_spec!(ElastigroupInfrastructure, Elastigroup, ["connectorRef"], SUPPORTS_DYNAMIC_PROVISIONING = false);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsgInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub region: Field,
}

kind_spec!(AsgInfrastructure, Asg, ["connectorRef", "region"]);

// ============================================================================
// Containers / PaaS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureWebAppInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub subscription_id: Field,
    #[serde(default)]
    pub resource_group: Field,
}

kind_spec!(AzureWebAppInfrastructure, AzureWebApp, ["connectorRef", "subscriptionId", "resourceGroup"]);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EcsInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub region: Field,
    #[serde(default)]
    pub cluster: Field,
}

kind_spec!(EcsInfrastructure, Ecs, ["connectorRef", "cluster", "region"]);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TanzuApplicationServiceInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub organization: Field,
    #[serde(default)]
    pub space: Field,
}

kind_spec!(TanzuApplicationServiceInfrastructure, Tas, ["connectorRef", "organization", "space"]);

/// Template-driven deployment target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDeploymentInfrastructure {
    #[serde(flatten)]
    pub details: InfraDetails,
    #[serde(default)]
    pub connector_ref: Field,
    #[serde(default)]
    pub custom_deployment_ref: Option<CustomDeploymentRef>,
    #[serde(default)]
    pub variables: Vec<CustomDeploymentVariable>,
}

kind_spec!(
    CustomDeploymentInfrastructure,
    CustomDeployment,
    ["templateRef", "versionLabel", "infraIdentifier"],
    SUPPORTS_DYNAMIC_PROVISIONING = false
);
