//! IR-011: Infrastructure resolution — compile a validated definition into an outcome.
//!
//! Flow: validate (fail fast) -> dispatch on kind through the registry ->
//! resolve each field (plainly, or through the provisioner when dynamically
//! provisioned) -> compute the infra key -> merge tags -> enrich connector.

use super::connector::{enrich_connector, ConnectorService};
use super::errors::{InfraError, Result, NOT_PROVIDED};
use super::expression::{ExpressionEvaluator, ExpressionEvaluatorExt, ExpressionMode};
use super::field::{FieldValue, HostList};
use super::key::InfraKey;
use super::outcome::*;
use super::registry::KindRegistry;
use super::spec::*;
use super::types::*;
use super::validator::validate_infrastructure;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use tracing::debug;

use super::expression::ExpressionMode::{
    ReturnNullIfUnresolved, ReturnOriginalExpressionIfUnresolved, ThrowOnUnresolved,
};

/// Ambient inputs of one resolution.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub environment: &'a Environment,
    pub service: Option<&'a Service>,
    pub scope: &'a Scope,
    /// Caller entity tags; win over kind-intrinsic tags.
    pub entity_tags: &'a IndexMap<String, String>,
    pub evaluator: &'a dyn ExpressionEvaluator,
    pub connectors: &'a dyn ConnectorService,
    pub cancellation: Option<&'a CancellationToken>,
}

static EMPTY_SCOPE: Scope = Scope {
    account_identifier: String::new(),
    org_identifier: None,
    project_identifier: None,
};

static EMPTY_TAGS: LazyLock<IndexMap<String, String>> = LazyLock::new(IndexMap::new);

impl<'a> ResolveContext<'a> {
    pub fn new(
        environment: &'a Environment,
        evaluator: &'a dyn ExpressionEvaluator,
        connectors: &'a dyn ConnectorService,
    ) -> Self {
        Self {
            environment,
            service: None,
            scope: &EMPTY_SCOPE,
            entity_tags: &EMPTY_TAGS,
            evaluator,
            connectors,
            cancellation: None,
        }
    }

    pub fn with_service(mut self, service: &'a Service) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_scope(mut self, scope: &'a Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_tags(mut self, tags: &'a IndexMap<String, String>) -> Self {
        self.entity_tags = tags;
        self
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Abort if the caller cancelled. Checked before every external call.
    pub fn checkpoint(&self) -> Result<()> {
        match self.cancellation {
            Some(token) if token.is_cancelled() => Err(InfraError::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Validate and resolve a definition.
pub fn resolve_infrastructure(
    spec: &Infrastructure,
    ctx: &ResolveContext<'_>,
) -> Result<InfrastructureOutcome> {
    validate_infrastructure(Some(spec), ctx)?;

    let descriptor = KindRegistry::global().lookup(spec.kind())?;
    let resolution = Resolution::new(ctx, descriptor.is_dynamic(spec));
    debug!(
        kind = %spec.kind(),
        infra = %spec.details().infra_identifier,
        dynamic = resolution.is_dynamic(),
        "resolving infrastructure"
    );
    let mut outcome = (descriptor.resolve)(spec, &resolution)?;

    if spec.connector_reference().is_some_and(|r| r.value().is_some()) {
        ctx.checkpoint()?;
        outcome.common_mut().connector =
            enrich_connector(ctx.connectors, ctx.scope, spec.connector_reference());
    }

    debug!(key = %outcome.infrastructure_key(), "infrastructure resolved");
    Ok(outcome)
}

// ============================================================================
// Field resolution
// ============================================================================

/// Field resolution for one definition.
pub struct Resolution<'r, 'a> {
    ctx: &'r ResolveContext<'a>,
    dynamic: bool,
}

impl<'r, 'a> Resolution<'r, 'a> {
    pub fn new(ctx: &'r ResolveContext<'a>, dynamic: bool) -> Self {
        Self { ctx, dynamic }
    }

    pub fn ctx(&self) -> &ResolveContext<'a> {
        self.ctx
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Text of a string field. Static definitions dereference plainly and keep
    /// expression text as-is; dynamic ones go through the evaluator in `mode`.
    pub fn text(
        &self,
        field: Option<&FieldValue<String>>,
        name: &str,
        mode: ExpressionMode,
    ) -> Result<Option<String>> {
        if !self.dynamic {
            return self.plain(field, name);
        }
        let Some(field) = field else {
            return Ok(None);
        };
        reject_pending(field, name)?;
        self.ctx.checkpoint()?;
        let resolved = self.ctx.evaluator.resolve_expression(field, mode)?;
        Ok(resolved.and_then(|f| f.value_or_expression().map(str::to_string)))
    }

    /// Like [`Resolution::text`], with absence as an empty string.
    pub fn string(&self, field: Option<&FieldValue<String>>, name: &str, mode: ExpressionMode) -> Result<String> {
        Ok(self.text(field, name, mode)?.unwrap_or_default())
    }

    /// Plain dereference: literal, resolved value, or expression text.
    pub fn plain(&self, field: Option<&FieldValue<String>>, name: &str) -> Result<Option<String>> {
        match field {
            None => Ok(None),
            Some(f) => {
                reject_pending(f, name)?;
                Ok(f.value_or_expression().map(str::to_string))
            }
        }
    }

    /// Typed value of a non-string field. Unresolved expressions in static
    /// definitions have no typed value.
    pub fn value<T>(&self, field: Option<&FieldValue<T>>, name: &str, mode: ExpressionMode) -> Result<Option<T>>
    where
        T: DeserializeOwned + Clone,
    {
        let Some(field) = field else {
            return Ok(None);
        };
        reject_pending(field, name)?;
        if !self.dynamic {
            return Ok(field.value().cloned());
        }
        self.ctx.checkpoint()?;
        self.ctx.evaluator.evaluate_expression(field, mode)
    }

    /// Release name; a service-level release name always wins.
    pub fn release_name(&self, field: Option<&FieldValue<String>>) -> Result<String> {
        if let Some(release) = self.ctx.service.and_then(Service::release) {
            return Ok(release.to_string());
        }
        self.string(field, "releaseName", ReturnOriginalExpressionIfUnresolved)
    }

    /// Key, identity and merged tags shared by every outcome of kind `S`.
    pub fn common<S: KindSpec>(&self, details: &InfraDetails, key_parts: &[&str]) -> OutcomeCommon {
        let key = InfraKey::generate(self.ctx.service, self.ctx.environment, key_parts);
        OutcomeCommon {
            environment: self.ctx.environment.clone(),
            service: self.ctx.service.cloned(),
            infrastructure_key: key.key,
            infrastructure_key_short: S::SHORT_KEY.then_some(key.short_key),
            infra_identifier: details.infra_identifier.clone(),
            infra_name: details.infra_name.clone(),
            name: details.infra_name.clone(),
            tags: merge_tags(&details.tags, self.ctx.entity_tags),
            connector: None,
        }
    }
}

fn reject_pending<T>(field: &FieldValue<T>, name: &str) -> Result<()> {
    if field.is_pending_input() {
        return Err(InfraError::InvalidRequest(format!("{}: {}", name, NOT_PROVIDED)));
    }
    Ok(())
}

// ============================================================================
// Per-kind resolution
// ============================================================================

/// Kind-specific compilation into an outcome.
pub trait ResolveKind {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome>;
}

/// Direct, GCP, AWS and Rancher clusters share one outcome shape.
fn resolve_k8s<S: KindSpec>(
    r: &Resolution<'_, '_>,
    spec: &S,
    connector_ref: Option<&FieldValue<String>>,
    namespace: Option<&FieldValue<String>>,
    cluster: Option<Option<&FieldValue<String>>>,
    release_name: Option<&FieldValue<String>>,
) -> Result<K8sOutcome> {
    let connector_ref = r.plain(connector_ref, "connectorRef")?.unwrap_or_default();
    let namespace = r.string(namespace, "namespace", ThrowOnUnresolved)?;
    let cluster = cluster
        .map(|c| r.string(c, "cluster", ThrowOnUnresolved))
        .transpose()?;
    let release_name = r.release_name(release_name)?;

    let common = match &cluster {
        Some(c) => r.common::<S>(spec.details(), &[&connector_ref, c, &namespace]),
        None => r.common::<S>(spec.details(), &[&connector_ref, &namespace]),
    };
    Ok(K8sOutcome {
        common,
        connector_ref,
        namespace,
        cluster,
        release_name,
    })
}

impl ResolveKind for K8sDirectInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        let outcome = resolve_k8s(
            r,
            self,
            self.connector_ref.as_ref(),
            self.namespace.as_ref(),
            None,
            self.release_name.as_ref(),
        )?;
        Ok(InfrastructureOutcome::KubernetesDirect(outcome))
    }
}

impl ResolveKind for K8sGcpInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        let outcome = resolve_k8s(
            r,
            self,
            self.connector_ref.as_ref(),
            self.namespace.as_ref(),
            Some(self.cluster.as_ref()),
            self.release_name.as_ref(),
        )?;
        Ok(InfrastructureOutcome::KubernetesGcp(outcome))
    }
}

impl ResolveKind for K8sAwsInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        let outcome = resolve_k8s(
            r,
            self,
            self.connector_ref.as_ref(),
            self.namespace.as_ref(),
            Some(self.cluster.as_ref()),
            self.release_name.as_ref(),
        )?;
        Ok(InfrastructureOutcome::KubernetesAws(outcome))
    }
}

impl ResolveKind for K8sRancherInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        let outcome = resolve_k8s(
            r,
            self,
            self.connector_ref.as_ref(),
            self.namespace.as_ref(),
            Some(self.cluster.as_ref()),
            self.release_name.as_ref(),
        )?;
        Ok(InfrastructureOutcome::KubernetesRancher(outcome))
    }
}

impl ResolveKind for K8sAzureInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        let connector_ref = r.plain(self.connector_ref.as_ref(), "connectorRef")?.unwrap_or_default();
        let namespace = r.string(self.namespace.as_ref(), "namespace", ThrowOnUnresolved)?;
        let cluster = r.string(self.cluster.as_ref(), "cluster", ThrowOnUnresolved)?;
        let release_name = r.release_name(self.release_name.as_ref())?;
        let subscription = r.string(self.subscription_id.as_ref(), "subscriptionId", ThrowOnUnresolved)?;
        let resource_group = r.string(self.resource_group.as_ref(), "resourceGroup", ThrowOnUnresolved)?;
        // Not provisioner-resolvable; a missing flag means false.
        let use_cluster_admin_credentials = self
            .use_cluster_admin_credentials
            .as_ref()
            .and_then(FieldValue::value)
            .copied()
            .unwrap_or(false);

        let common = r.common::<Self>(
            &self.details,
            &[&connector_ref, &subscription, &resource_group, &cluster, &namespace],
        );
        Ok(InfrastructureOutcome::KubernetesAzure(K8sAzureOutcome {
            common,
            connector_ref,
            namespace,
            cluster,
            release_name,
            subscription,
            resource_group,
            use_cluster_admin_credentials,
        }))
    }
}

impl ResolveKind for ServerlessAwsLambdaInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        let connector_ref = r.plain(self.connector_ref.as_ref(), "connectorRef")?.unwrap_or_default();
        let region = r.string(self.region.as_ref(), "region", ThrowOnUnresolved)?;
        let stage = r.string(self.stage.as_ref(), "stage", ThrowOnUnresolved)?;
        let common = r.common::<Self>(&self.details, &[&connector_ref, &region, &stage]);
        Ok(InfrastructureOutcome::ServerlessAwsLambda(ServerlessAwsLambdaOutcome {
            common,
            connector_ref,
            region,
            stage,
        }))
    }
}

impl ResolveKind for PdcInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        if r.is_dynamic() {
            return super::pdc::resolve_provisioned(self, r);
        }

        let credentials_ref = r.plain(self.credentials_ref.as_ref(), "credentialsRef")?.unwrap_or_default();
        let connector_ref = r
            .plain(self.connector_ref.as_ref(), "connectorRef")?
            .filter(|c| !c.is_empty());
        let hosts = self
            .hosts
            .as_ref()
            .and_then(FieldValue::value)
            .map(HostList::split)
            .unwrap_or_default();

        let mut parts = vec![credentials_ref.as_str()];
        parts.extend(connector_ref.as_deref());
        let common = r.common::<Self>(&self.details, &parts);
        Ok(InfrastructureOutcome::Pdc(PdcOutcome {
            common,
            connector_ref,
            credentials_ref,
            hosts,
            host_filter: HostFilterOutcome::from_filter(self.host_filter.as_ref()),
        }))
    }
}

impl ResolveKind for SshWinRmAwsInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        let connector_ref = r.plain(self.connector_ref.as_ref(), "connectorRef")?.unwrap_or_default();
        let credentials_ref = r.plain(self.credentials_ref.as_ref(), "credentialsRef")?.unwrap_or_default();
        let region = r.string(self.region.as_ref(), "region", ThrowOnUnresolved)?;
        let host_tags = match &self.aws_instance_filter {
            Some(filter) => r.value(filter.tags.as_ref(), "awsInstanceFilter.tags", ReturnNullIfUnresolved)?,
            None => None,
        };
        let host_connection_type = r.plain(self.host_connection_type.as_ref(), "hostConnectionType")?;

        let common = r.common::<Self>(&self.details, &[&connector_ref, &credentials_ref, &region]);
        Ok(InfrastructureOutcome::SshWinRmAws(SshWinRmAwsOutcome {
            common,
            connector_ref,
            credentials_ref,
            region,
            host_connection_type,
            host_tags,
        }))
    }
}

impl ResolveKind for SshWinRmAzureInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        let connector_ref = r.plain(self.connector_ref.as_ref(), "connectorRef")?.unwrap_or_default();
        let credentials_ref = r.plain(self.credentials_ref.as_ref(), "credentialsRef")?.unwrap_or_default();
        let subscription_id = r.string(self.subscription_id.as_ref(), "subscriptionId", ThrowOnUnresolved)?;
        let resource_group = r.string(self.resource_group.as_ref(), "resourceGroup", ThrowOnUnresolved)?;
        let host_tags = r.value(self.tags.as_ref(), "tags", ReturnNullIfUnresolved)?;
        let host_connection_type = r.plain(self.host_connection_type.as_ref(), "hostConnectionType")?;

        let common = r.common::<Self>(
            &self.details,
            &[&connector_ref, &credentials_ref, &subscription_id, &resource_group],
        );
        Ok(InfrastructureOutcome::SshWinRmAzure(SshWinRmAzureOutcome {
            common,
            connector_ref,
            credentials_ref,
            subscription_id,
            resource_group,
            host_connection_type,
            host_tags,
        }))
    }
}

impl ResolveKind for AzureWebAppInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        let connector_ref = r.plain(self.connector_ref.as_ref(), "connectorRef")?.unwrap_or_default();
        let subscription = r.string(self.subscription_id.as_ref(), "subscriptionId", ThrowOnUnresolved)?;
        let resource_group = r.string(self.resource_group.as_ref(), "resourceGroup", ThrowOnUnresolved)?;
        let common = r.common::<Self>(&self.details, &[&connector_ref, &subscription, &resource_group]);
        Ok(InfrastructureOutcome::AzureWebApp(AzureWebAppOutcome {
            common,
            connector_ref,
            subscription,
            resource_group,
        }))
    }
}

impl ResolveKind for EcsInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        let connector_ref = r.plain(self.connector_ref.as_ref(), "connectorRef")?.unwrap_or_default();
        let region = r.string(self.region.as_ref(), "region", ThrowOnUnresolved)?;
        let cluster = r.string(self.cluster.as_ref(), "cluster", ThrowOnUnresolved)?;
        let common = r.common::<Self>(&self.details, &[&connector_ref, &cluster, &region]);
        Ok(InfrastructureOutcome::Ecs(EcsOutcome {
            common,
            connector_ref,
            region,
            cluster,
        }))
    }
}

impl ResolveKind for GoogleFunctionsInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        let connector_ref = r.plain(self.connector_ref.as_ref(), "connectorRef")?.unwrap_or_default();
        let region = r.string(self.region.as_ref(), "region", ThrowOnUnresolved)?;
        let project = r.string(self.project.as_ref(), "project", ThrowOnUnresolved)?;
        let common = r.common::<Self>(&self.details, &[&connector_ref, &project, &region]);
        Ok(InfrastructureOutcome::GoogleCloudFunctions(GoogleFunctionsOutcome {
            common,
            connector_ref,
            region,
            project,
        }))
    }
}

impl ResolveKind for ElastigroupInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        let connector_ref = r.plain(self.connector_ref.as_ref(), "connectorRef")?.unwrap_or_default();
        let common = r.common::<Self>(&self.details, &[&connector_ref]);
        Ok(InfrastructureOutcome::Elastigroup(ElastigroupOutcome {
            common,
            connector_ref,
        }))
    }
}

/// ASG, SAM and Lambda: connector plus region.
fn resolve_aws_region<S: KindSpec>(
    r: &Resolution<'_, '_>,
    spec: &S,
    connector_ref: Option<&FieldValue<String>>,
    region: Option<&FieldValue<String>>,
) -> Result<AwsRegionOutcome> {
    let connector_ref = r.plain(connector_ref, "connectorRef")?.unwrap_or_default();
    let region = r.string(region, "region", ThrowOnUnresolved)?;
    let common = r.common::<S>(spec.details(), &[&connector_ref, &region]);
    Ok(AwsRegionOutcome {
        common,
        connector_ref,
        region,
    })
}

impl ResolveKind for AsgInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        resolve_aws_region(r, self, self.connector_ref.as_ref(), self.region.as_ref())
            .map(InfrastructureOutcome::Asg)
    }
}

impl ResolveKind for AwsSamInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        resolve_aws_region(r, self, self.connector_ref.as_ref(), self.region.as_ref())
            .map(InfrastructureOutcome::AwsSam)
    }
}

impl ResolveKind for AwsLambdaInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        resolve_aws_region(r, self, self.connector_ref.as_ref(), self.region.as_ref())
            .map(InfrastructureOutcome::AwsLambda)
    }
}

impl ResolveKind for TanzuApplicationServiceInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        let connector_ref = r.plain(self.connector_ref.as_ref(), "connectorRef")?.unwrap_or_default();
        let organization = r.string(self.organization.as_ref(), "organization", ThrowOnUnresolved)?;
        let space = r.string(self.space.as_ref(), "space", ThrowOnUnresolved)?;
        let common = r.common::<Self>(&self.details, &[&connector_ref, &organization, &space]);
        Ok(InfrastructureOutcome::Tas(TasOutcome {
            common,
            connector_ref,
            organization,
            space,
        }))
    }
}

impl ResolveKind for CustomDeploymentInfrastructure {
    fn resolve(&self, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
        let (template_ref, version_label) = match &self.custom_deployment_ref {
            Some(t) => (t.template_ref.clone(), t.version_label.clone()),
            None => (String::new(), String::new()),
        };
        let mut variables = IndexMap::new();
        for var in &self.variables {
            let value = r.plain(var.value.as_ref(), &var.name)?.unwrap_or_default();
            variables.insert(var.name.clone(), value);
        }

        let common = r.common::<Self>(
            &self.details,
            &[&template_ref, &version_label, &self.details.infra_identifier],
        );
        Ok(InfrastructureOutcome::CustomDeployment(CustomDeploymentOutcome {
            common,
            template_ref,
            version_label,
            variables,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connector::{InMemoryConnectorService, NoopConnectorService};
    use crate::core::expression::ProvisionerOutputEvaluator;
    use crate::core::key::compute_infra_key;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn lit(s: &str) -> Option<FieldValue<String>> {
        Some(FieldValue::literal(s.to_string()))
    }

    fn expr(s: &str) -> Option<FieldValue<String>> {
        Some(FieldValue::expression(s))
    }

    fn dynamic() -> InfraDetails {
        InfraDetails {
            infra_identifier: "dyn".to_string(),
            dynamically_provisioned: true,
            provisioner_step_identifier: Some("tf_apply".to_string()),
            ..Default::default()
        }
    }

    fn k8s_direct() -> Infrastructure {
        K8sDirectInfrastructure {
            details: InfraDetails {
                infra_identifier: "k8s".to_string(),
                infra_name: "K8s".to_string(),
                ..Default::default()
            },
            connector_ref: lit("c1"),
            namespace: lit("ns"),
            release_name: lit("rel"),
        }
        .into()
    }

    /// Evaluator that counts lookups and never resolves anything.
    #[derive(Default)]
    struct CountingEvaluator(AtomicUsize);

    impl ExpressionEvaluator for CountingEvaluator {
        fn lookup(&self, _expression: &str) -> Result<Option<Value>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn resolve_with(infra: &Infrastructure, evaluator: &dyn ExpressionEvaluator) -> Result<InfrastructureOutcome> {
        let env = Environment::new("env");
        let svc = Service::new("svc");
        let ctx = ResolveContext::new(&env, evaluator, &NoopConnectorService).with_service(&svc);
        resolve_infrastructure(infra, &ctx)
    }

    fn resolve(infra: &Infrastructure) -> Result<InfrastructureOutcome> {
        resolve_with(infra, &ProvisionerOutputEvaluator::default())
    }

    #[test]
    fn test_ir011_k8s_direct_end_to_end() {
        let outcome = resolve(&k8s_direct()).unwrap();
        let InfrastructureOutcome::KubernetesDirect(k8s) = &outcome else {
            panic!("wrong outcome: {:?}", outcome);
        };
        assert_eq!(k8s.connector_ref, "c1");
        assert_eq!(k8s.namespace, "ns");
        assert_eq!(k8s.release_name, "rel");
        assert_eq!(k8s.common.infrastructure_key, "7577ab1d0ce4aeaad3280007b10bf73c1b987df6");
        assert_eq!(k8s.common.infrastructure_key_short.as_deref(), Some("7577ab"));
        assert_eq!(k8s.common.infra_identifier, "k8s");
        assert_eq!(k8s.common.name, "K8s");
        assert_eq!(k8s.common.environment.identifier, "env");
        assert!(k8s.common.connector.is_none());
    }

    #[test]
    fn test_ir011_service_release_overrides() {
        let env = Environment::new("env");
        let svc = Service::new("svc").with_release("pinned");
        let evaluator = ProvisionerOutputEvaluator::default();
        let ctx = ResolveContext::new(&env, &evaluator, &NoopConnectorService).with_service(&svc);
        let outcome = resolve_infrastructure(&k8s_direct(), &ctx).unwrap();
        let InfrastructureOutcome::KubernetesDirect(k8s) = outcome else {
            panic!("wrong outcome");
        };
        assert_eq!(k8s.release_name, "pinned");
    }

    #[test]
    fn test_ir011_no_service_omits_segment() {
        let env = Environment::new("env");
        let evaluator = ProvisionerOutputEvaluator::default();
        let ctx = ResolveContext::new(&env, &evaluator, &NoopConnectorService);
        let outcome = resolve_infrastructure(&k8s_direct(), &ctx).unwrap();
        assert_eq!(outcome.infrastructure_key(), "58bbad35386d475c2c5d4c45d78b7633a95e8580");
        assert!(outcome.common().service.is_none());
    }

    #[test]
    fn test_ir011_validation_fails_before_evaluation() {
        let infra: Infrastructure = K8sGcpInfrastructure {
            details: dynamic(),
            connector_ref: lit("gcp"),
            namespace: expr("<+provisioner.ns>"),
            cluster: None,
            release_name: lit("rel"),
        }
        .into();
        let evaluator = CountingEvaluator::default();
        let err = resolve_with(&infra, &evaluator).unwrap_err();
        assert_eq!(err.violations()[0].field, "cluster");
        assert_eq!(evaluator.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ir011_dynamic_fields_from_provisioner() {
        let infra: Infrastructure = K8sGcpInfrastructure {
            details: dynamic(),
            connector_ref: lit("c1"),
            namespace: expr("<+provisioner.namespace>"),
            cluster: expr("<+provisioner.cluster>"),
            release_name: expr("release-<+INFRA_KEY_SHORT_ID>"),
        }
        .into();
        let evaluator = ProvisionerOutputEvaluator::new(json!({
            "namespace": "ns",
            "cluster": "cluster"
        }));
        let outcome = resolve_with(&infra, &evaluator).unwrap();
        let InfrastructureOutcome::KubernetesGcp(k8s) = &outcome else {
            panic!("wrong outcome");
        };
        assert_eq!(k8s.namespace, "ns");
        assert_eq!(k8s.cluster.as_deref(), Some("cluster"));
        assert_eq!(k8s.release_name, "release-<+INFRA_KEY_SHORT_ID>");
        assert_eq!(
            k8s.common.infrastructure_key,
            "e78487994d11684dc079b23f21b381c37a2d5837"
        );
    }

    #[test]
    fn test_ir011_dynamic_release_name_keeps_expression() {
        let infra: Infrastructure = K8sGcpInfrastructure {
            details: dynamic(),
            connector_ref: lit("c1"),
            namespace: expr("<+provisioner.namespace>"),
            cluster: expr("<+provisioner.cluster>"),
            release_name: expr("release-<+provisioner.missing>"),
        }
        .into();
        let evaluator = ProvisionerOutputEvaluator::new(json!({
            "namespace": "ns",
            "cluster": "cluster"
        }));
        let outcome = resolve_with(&infra, &evaluator).unwrap();
        let InfrastructureOutcome::KubernetesGcp(k8s) = &outcome else {
            panic!("wrong outcome");
        };
        assert_eq!(k8s.namespace, "ns");
        assert_eq!(k8s.release_name, "release-<+provisioner.missing>");
    }

    #[test]
    fn test_ir011_dynamic_unresolved_fails() {
        let infra: Infrastructure = EcsInfrastructure {
            details: dynamic(),
            connector_ref: lit("aws"),
            region: expr("<+provisioner.region>"),
            cluster: expr("<+provisioner.cluster>"),
        }
        .into();
        let err = resolve(&infra).unwrap_err();
        assert!(matches!(err, InfraError::Resolution { .. }), "{}", err);
    }

    #[test]
    fn test_ir011_tags_merged_entity_wins() {
        let mut intrinsic = IndexMap::new();
        intrinsic.insert("team".to_string(), "infra".to_string());
        intrinsic.insert("tier".to_string(), "gold".to_string());
        let infra: Infrastructure = AsgInfrastructure {
            details: InfraDetails {
                tags: intrinsic,
                ..Default::default()
            },
            connector_ref: lit("aws"),
            region: lit("us-east-1"),
        }
        .into();

        let mut entity = IndexMap::new();
        entity.insert("team".to_string(), "payments".to_string());
        let env = Environment::new("env");
        let svc = Service::new("svc");
        let evaluator = ProvisionerOutputEvaluator::default();
        let ctx = ResolveContext::new(&env, &evaluator, &NoopConnectorService)
            .with_service(&svc)
            .with_tags(&entity);
        let outcome = resolve_infrastructure(&infra, &ctx).unwrap();
        let tags = &outcome.common().tags;
        assert_eq!(tags["team"], "payments");
        assert_eq!(tags["tier"], "gold");
        assert_eq!(outcome.infrastructure_key(), "189219753a94ac06e52e89500a74003f53c43257");
        assert!(outcome.common().infrastructure_key_short.is_none());
    }

    #[test]
    fn test_ir011_connector_enriched() {
        let env = Environment::new("env");
        let scope = Scope::new("acct", "org", "proj");
        let connectors = InMemoryConnectorService::with_connectors(
            &scope,
            [ConnectorInfo {
                identifier: "c1".to_string(),
                name: Some("Prod Cluster".to_string()),
                connector_type: None,
            }],
        );
        let evaluator = ProvisionerOutputEvaluator::default();
        let ctx = ResolveContext::new(&env, &evaluator, &connectors).with_scope(&scope);
        let outcome = resolve_infrastructure(&k8s_direct(), &ctx).unwrap();
        assert_eq!(outcome.common().connector.as_ref().unwrap().name, "Prod Cluster");
    }

    #[test]
    fn test_ir011_cancelled_before_external_call() {
        let env = Environment::new("env");
        let token = CancellationToken::new();
        token.cancel();
        let evaluator = ProvisionerOutputEvaluator::default();
        let ctx = ResolveContext::new(&env, &evaluator, &NoopConnectorService).with_cancellation(&token);
        let err = resolve_infrastructure(&k8s_direct(), &ctx).unwrap_err();
        assert!(matches!(err, InfraError::Cancelled));
    }

    #[test]
    fn test_ir011_pdc_static() {
        let infra: Infrastructure = PdcInfrastructure {
            credentials_ref: lit("ssh-key"),
            connector_ref: lit("pdc-conn"),
            hosts: Some(FieldValue::literal(HostList::Joined("h1, h2,,h3".to_string()))),
            ..Default::default()
        }
        .into();
        let outcome = resolve(&infra).unwrap();
        let InfrastructureOutcome::Pdc(pdc) = &outcome else {
            panic!("wrong outcome");
        };
        assert_eq!(pdc.hosts, vec!["h1", "h2", "h3"]);
        assert_eq!(pdc.host_filter.filter_type, HostFilterType::All);
        assert_eq!(
            pdc.common.infrastructure_key,
            "0667b7003903f810db49ae04ab7fb23540dfa7f0"
        );
    }

    #[test]
    fn test_ir011_pdc_key_without_connector() {
        let infra: Infrastructure = PdcInfrastructure {
            credentials_ref: lit("ssh-key"),
            hosts: Some(FieldValue::literal(HostList::List(vec!["h1".to_string()]))),
            ..Default::default()
        }
        .into();
        let outcome = resolve(&infra).unwrap();
        assert_eq!(outcome.infrastructure_key(), "5125f5bee312b79027ea7806b7464e9f7b892906");
    }

    #[test]
    fn test_ir011_custom_deployment_key_includes_identifier() {
        let infra: Infrastructure = CustomDeploymentInfrastructure {
            details: InfraDetails {
                infra_identifier: "custom-infra".to_string(),
                ..Default::default()
            },
            custom_deployment_ref: Some(CustomDeploymentRef {
                template_ref: "tmpl".to_string(),
                version_label: "v1".to_string(),
            }),
            variables: vec![CustomDeploymentVariable {
                name: "cluster".to_string(),
                value: lit("east"),
            }],
            ..Default::default()
        }
        .into();
        let outcome = resolve(&infra).unwrap();
        let InfrastructureOutcome::CustomDeployment(custom) = &outcome else {
            panic!("wrong outcome");
        };
        assert_eq!(custom.variables["cluster"], "east");
        assert_eq!(
            custom.common.infrastructure_key,
            "af49ee827ca7a67dabe7e7aca27c5b116e0076b5"
        );
    }

    #[test]
    fn test_ir011_host_tags_null_if_unresolved() {
        let infra: Infrastructure = SshWinRmAwsInfrastructure {
            details: dynamic(),
            connector_ref: lit("aws"),
            credentials_ref: lit("ssh"),
            region: expr("<+provisioner.region>"),
            host_connection_type: lit("PrivateIP"),
            aws_instance_filter: Some(AwsInstanceFilter {
                vpcs: vec![],
                tags: Some(FieldValue::expression("<+provisioner.tags>")),
            }),
        }
        .into();
        let evaluator = ProvisionerOutputEvaluator::new(json!({"region": "us-east-1"}));
        let outcome = resolve_with(&infra, &evaluator).unwrap();
        let InfrastructureOutcome::SshWinRmAws(ssh) = &outcome else {
            panic!("wrong outcome");
        };
        assert_eq!(ssh.region, "us-east-1");
        assert!(ssh.host_tags.is_none());
        assert_eq!(ssh.host_connection_type.as_deref(), Some("PrivateIP"));
        assert_eq!(
            ssh.common.infrastructure_key,
            compute_infra_key(Some("svc"), "env", &["aws", "ssh", "us-east-1"]).key
        );
    }

    #[test]
    fn test_ir011_pending_optional_field_rejected() {
        let infra: Infrastructure = SshWinRmAzureInfrastructure {
            connector_ref: lit("az"),
            credentials_ref: lit("ssh"),
            subscription_id: lit("sub"),
            resource_group: lit("rg"),
            host_connection_type: Some(FieldValue::PendingRuntimeInput),
            ..Default::default()
        }
        .into();
        let err = resolve(&infra).unwrap_err();
        assert!(err.to_string().starts_with("hostConnectionType:"), "{}", err);
    }

    #[test]
    fn test_ir011_static_keeps_expression_text() {
        let r_env = Environment::new("env");
        let evaluator = CountingEvaluator::default();
        let ctx = ResolveContext::new(&r_env, &evaluator, &NoopConnectorService);
        let r = Resolution::new(&ctx, false);
        let text = r
            .text(expr("<+pipeline.name>").as_ref(), "f", ThrowOnUnresolved)
            .unwrap();
        assert_eq!(text.as_deref(), Some("<+pipeline.name>"));
        assert_eq!(evaluator.0.load(Ordering::SeqCst), 0);
    }
}
