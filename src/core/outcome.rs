//! IR-005: Infrastructure outcomes — the resolved, immutable result of a spec.

use super::key::InfraKey;
use super::spec::InfrastructureKind;
use super::types::*;
use indexmap::IndexMap;
use serde::Serialize;

/// Fields carried by every outcome variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeCommon {
    pub environment: Environment,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<Service>,

    pub infrastructure_key: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub infrastructure_key_short: Option<String>,

    pub infra_identifier: String,
    pub infra_name: String,
    pub name: String,

    /// Kind-intrinsic tags overlaid with caller entity tags.
    pub tags: IndexMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<Connector>,
}

impl OutcomeCommon {
    pub fn key(&self) -> InfraKey {
        InfraKey {
            key: self.infrastructure_key.clone(),
            short_key: self.infrastructure_key.chars().take(super::key::SHORT_KEY_LEN).collect(),
        }
    }
}

/// Merge tags: kind-intrinsic first, entity tags overwrite on collision.
pub fn merge_tags(
    intrinsic: &IndexMap<String, String>,
    entity: &IndexMap<String, String>,
) -> IndexMap<String, String> {
    let mut merged = intrinsic.clone();
    for (k, v) in entity {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Kubernetes family outcome (direct, GCP, AWS, Rancher).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct K8sOutcome {
    #[serde(flatten)]
    pub common: OutcomeCommon,
    pub connector_ref: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    pub release_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct K8sAzureOutcome {
    #[serde(flatten)]
    pub common: OutcomeCommon,
    pub connector_ref: String,
    pub namespace: String,
    pub cluster: String,
    pub release_name: String,
    pub subscription: String,
    pub resource_group: String,
    pub use_cluster_admin_credentials: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerlessAwsLambdaOutcome {
    #[serde(flatten)]
    pub common: OutcomeCommon,
    pub connector_ref: String,
    pub region: String,
    pub stage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdcOutcome {
    #[serde(flatten)]
    pub common: OutcomeCommon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector_ref: Option<String>,
    pub credentials_ref: String,
    pub hosts: Vec<String>,
    pub host_filter: HostFilterOutcome,
}

/// Dynamically provisioned host pool: hosts come from provisioner output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdcProvisionedOutcome {
    #[serde(flatten)]
    pub common: OutcomeCommon,
    pub credentials_ref: String,
    pub hosts: Vec<String>,
    /// Per host, the mapped attribute values (always includes `hostname`).
    pub host_attributes: Vec<IndexMap<String, String>>,
    pub host_filter: HostFilterOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshWinRmAwsOutcome {
    #[serde(flatten)]
    pub common: OutcomeCommon,
    pub connector_ref: String,
    pub credentials_ref: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_connection_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_tags: Option<IndexMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshWinRmAzureOutcome {
    #[serde(flatten)]
    pub common: OutcomeCommon,
    pub connector_ref: String,
    pub credentials_ref: String,
    pub subscription_id: String,
    pub resource_group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_connection_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_tags: Option<IndexMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureWebAppOutcome {
    #[serde(flatten)]
    pub common: OutcomeCommon,
    pub connector_ref: String,
    pub subscription: String,
    pub resource_group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EcsOutcome {
    #[serde(flatten)]
    pub common: OutcomeCommon,
    pub connector_ref: String,
    pub region: String,
    pub cluster: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleFunctionsOutcome {
    #[serde(flatten)]
    pub common: OutcomeCommon,
    pub connector_ref: String,
    pub region: String,
    pub project: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElastigroupOutcome {
    #[serde(flatten)]
    pub common: OutcomeCommon,
    pub connector_ref: String,
}

/// Region-scoped AWS targets (ASG, SAM, Lambda).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsRegionOutcome {
    #[serde(flatten)]
    pub common: OutcomeCommon,
    pub connector_ref: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDeploymentOutcome {
    #[serde(flatten)]
    pub common: OutcomeCommon,
    pub template_ref: String,
    pub version_label: String,
    pub variables: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TasOutcome {
    #[serde(flatten)]
    pub common: OutcomeCommon,
    pub connector_ref: String,
    pub organization: String,
    pub space: String,
}

/// Resolved infrastructure, one variant per kind plus the provisioned host pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum InfrastructureOutcome {
    KubernetesDirect(K8sOutcome),
    KubernetesGcp(K8sOutcome),
    KubernetesAzure(K8sAzureOutcome),
    KubernetesAws(K8sOutcome),
    KubernetesRancher(K8sOutcome),
    ServerlessAwsLambda(ServerlessAwsLambdaOutcome),
    Pdc(PdcOutcome),
    PdcProvisioned(PdcProvisionedOutcome),
    SshWinRmAws(SshWinRmAwsOutcome),
    SshWinRmAzure(SshWinRmAzureOutcome),
    AzureWebApp(AzureWebAppOutcome),
    #[serde(rename = "ECS")]
    Ecs(EcsOutcome),
    GoogleCloudFunctions(GoogleFunctionsOutcome),
    Elastigroup(ElastigroupOutcome),
    Asg(AwsRegionOutcome),
    CustomDeployment(CustomDeploymentOutcome),
    #[serde(rename = "TAS")]
    Tas(TasOutcome),
    #[serde(rename = "AWS_SAM")]
    AwsSam(AwsRegionOutcome),
    AwsLambda(AwsRegionOutcome),
}

macro_rules! each_outcome {
    ($self:expr, $o:ident => $body:expr) => {
        match $self {
            InfrastructureOutcome::KubernetesDirect($o)
            | InfrastructureOutcome::KubernetesGcp($o)
            | InfrastructureOutcome::KubernetesAws($o)
            | InfrastructureOutcome::KubernetesRancher($o) => $body,
            InfrastructureOutcome::KubernetesAzure($o) => $body,
            InfrastructureOutcome::ServerlessAwsLambda($o) => $body,
            InfrastructureOutcome::Pdc($o) => $body,
            InfrastructureOutcome::PdcProvisioned($o) => $body,
            InfrastructureOutcome::SshWinRmAws($o) => $body,
            InfrastructureOutcome::SshWinRmAzure($o) => $body,
            InfrastructureOutcome::AzureWebApp($o) => $body,
            InfrastructureOutcome::Ecs($o) => $body,
            InfrastructureOutcome::GoogleCloudFunctions($o) => $body,
            InfrastructureOutcome::Elastigroup($o) => $body,
            InfrastructureOutcome::Asg($o)
            | InfrastructureOutcome::AwsSam($o)
            | InfrastructureOutcome::AwsLambda($o) => $body,
            InfrastructureOutcome::CustomDeployment($o) => $body,
            InfrastructureOutcome::Tas($o) => $body,
        }
    };
}

impl InfrastructureOutcome {
    pub fn common(&self) -> &OutcomeCommon {
        each_outcome!(self, o => &o.common)
    }

    pub fn common_mut(&mut self) -> &mut OutcomeCommon {
        each_outcome!(self, o => &mut o.common)
    }

    /// Kind the outcome was produced from. `PdcProvisioned` reports `Pdc`.
    pub fn kind(&self) -> InfrastructureKind {
        match self {
            Self::KubernetesDirect(_) => InfrastructureKind::KubernetesDirect,
            Self::KubernetesGcp(_) => InfrastructureKind::KubernetesGcp,
            Self::KubernetesAzure(_) => InfrastructureKind::KubernetesAzure,
            Self::KubernetesAws(_) => InfrastructureKind::KubernetesAws,
            Self::KubernetesRancher(_) => InfrastructureKind::KubernetesRancher,
            Self::ServerlessAwsLambda(_) => InfrastructureKind::ServerlessAwsLambda,
            Self::Pdc(_) | Self::PdcProvisioned(_) => InfrastructureKind::Pdc,
            Self::SshWinRmAws(_) => InfrastructureKind::SshWinRmAws,
            Self::SshWinRmAzure(_) => InfrastructureKind::SshWinRmAzure,
            Self::AzureWebApp(_) => InfrastructureKind::AzureWebApp,
            Self::Ecs(_) => InfrastructureKind::Ecs,
            Self::GoogleCloudFunctions(_) => InfrastructureKind::GoogleCloudFunctions,
            Self::Elastigroup(_) => InfrastructureKind::Elastigroup,
            Self::Asg(_) => InfrastructureKind::Asg,
            Self::CustomDeployment(_) => InfrastructureKind::CustomDeployment,
            Self::Tas(_) => InfrastructureKind::Tas,
            Self::AwsSam(_) => InfrastructureKind::AwsSam,
            Self::AwsLambda(_) => InfrastructureKind::AwsLambda,
        }
    }

    pub fn infrastructure_key(&self) -> &str {
        &self.common().infrastructure_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common() -> OutcomeCommon {
        OutcomeCommon {
            environment: Environment::new("env"),
            service: Some(Service::new("svc")),
            infrastructure_key: "11f6673d11711af46238bf33972cb99a4a869244".to_string(),
            infrastructure_key_short: Some("11f667".to_string()),
            infra_identifier: "infra".to_string(),
            infra_name: "Infra".to_string(),
            name: "Infra".to_string(),
            tags: IndexMap::new(),
            connector: None,
        }
    }

    #[test]
    fn test_ir005_merge_tags_entity_wins() {
        let mut intrinsic = IndexMap::new();
        intrinsic.insert("team".to_string(), "infra".to_string());
        intrinsic.insert("tier".to_string(), "gold".to_string());
        let mut entity = IndexMap::new();
        entity.insert("team".to_string(), "payments".to_string());
        entity.insert("owner".to_string(), "alice".to_string());

        let merged = merge_tags(&intrinsic, &entity);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged["team"], "payments");
        assert_eq!(merged["tier"], "gold");
        assert_eq!(merged["owner"], "alice");
    }

    #[test]
    fn test_ir005_common_accessors() {
        let mut outcome = InfrastructureOutcome::Asg(AwsRegionOutcome {
            common: common(),
            connector_ref: "aws".to_string(),
            region: "us-east-1".to_string(),
        });
        assert_eq!(outcome.kind(), InfrastructureKind::Asg);
        outcome.common_mut().connector = Some(Connector {
            name: "AWS".to_string(),
        });
        assert_eq!(outcome.common().connector.as_ref().unwrap().name, "AWS");
        assert_eq!(outcome.common().key().short_key, "11f667");
    }

    #[test]
    fn test_ir005_serialize_tagged() {
        let outcome = InfrastructureOutcome::Tas(TasOutcome {
            common: common(),
            connector_ref: "tas".to_string(),
            organization: "org".to_string(),
            space: "dev".to_string(),
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "TAS");
        assert_eq!(json["infrastructureKey"], "11f6673d11711af46238bf33972cb99a4a869244");
        assert_eq!(json["environment"]["identifier"], "env");
        assert!(json.get("connector").is_none());
    }

    #[test]
    fn test_ir005_provisioned_pdc_reports_pdc_kind() {
        let outcome = InfrastructureOutcome::PdcProvisioned(PdcProvisionedOutcome {
            common: common(),
            credentials_ref: "ssh".to_string(),
            hosts: vec!["h1".to_string()],
            host_attributes: vec![],
            host_filter: HostFilterOutcome::default(),
        });
        assert_eq!(outcome.kind(), InfrastructureKind::Pdc);
    }
}
