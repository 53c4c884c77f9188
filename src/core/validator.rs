//! IR-009: Infrastructure validation — reject malformed definitions before resolution.
//!
//! Validation inspects field state only. It never evaluates expressions, so
//! a definition that fails here never reaches the evaluator or the connector
//! service.
//!
//! Checks run in a fixed order per kind: unresolved-expression scan, then
//! required fields, then structural rules. The first failure wins.

use super::errors::{FieldViolation, InfraError, Result, CANNOT_BE_EMPTY, CANNOT_BE_NULL, NOT_PROVIDED};
use super::field::{is_expression_text, is_runtime_input_text, Blank, FieldValue};
use super::registry::KindRegistry;
use super::resolver::ResolveContext;
use super::spec::*;
use tracing::info;

/// Host attribute every dynamically provisioned host must map.
pub const HOSTNAME_ATTRIBUTE: &str = "hostname";

const NULL_DEFINITION: &str = "Infrastructure definition can't be null or empty";

/// Validate a definition. `None` stands for a missing definition.
pub fn validate_infrastructure(spec: Option<&Infrastructure>, ctx: &ResolveContext<'_>) -> Result<()> {
    let infra = spec.ok_or_else(|| InfraError::InvalidRequest(NULL_DEFINITION.to_string()))?;
    let details = infra.details();
    info!(
        environment = %ctx.environment.identifier,
        "Infrastructure Name: {} , Identifier: {}",
        details.infra_name,
        details.infra_identifier
    );

    let descriptor = KindRegistry::global().lookup(infra.kind())?;
    let validation = Validation::new(descriptor.is_dynamic(infra));
    (descriptor.validate)(infra, &validation)
}

// ============================================================================
// Field inspection
// ============================================================================

/// Whether a field still carries an expression with no value.
pub trait FieldState {
    fn unresolved_expression(&self) -> Option<&str>;
}

impl<T> FieldState for FieldValue<T> {
    fn unresolved_expression(&self) -> Option<&str> {
        match self {
            FieldValue::Expression(e) => Some(e),
            _ => None,
        }
    }
}

impl<S: FieldState> FieldState for Option<S> {
    fn unresolved_expression(&self) -> Option<&str> {
        self.as_ref().and_then(FieldState::unresolved_expression)
    }
}

impl FieldState for String {
    fn unresolved_expression(&self) -> Option<&str> {
        is_expression_text(self).then_some(self.as_str())
    }
}

/// What a required field must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// A concrete value. Relaxed to [`Presence::ValueOrExpression`] for
    /// dynamically provisioned definitions, whose values arrive later.
    Value,
    ValueOrExpression,
}

/// Per-definition validation state.
#[derive(Debug, Clone, Copy)]
pub struct Validation {
    dynamic: bool,
}

impl Validation {
    pub fn new(dynamic: bool) -> Self {
        Self { dynamic }
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Fail on the first field still carrying an unresolved expression.
    pub fn ensure_resolved(&self, fields: &[&dyn FieldState]) -> Result<()> {
        match fields.iter().find_map(|f| f.unresolved_expression()) {
            Some(expression) => Err(InfraError::InvalidRequest(format!(
                "Unresolved Expression : [{}]",
                expression
            ))),
            None => Ok(()),
        }
    }

    /// Like [`Validation::ensure_resolved`], but skipped for dynamically
    /// provisioned definitions: these fields come from the provisioner.
    pub fn ensure_provisioned_resolved(&self, fields: &[&dyn FieldState]) -> Result<()> {
        if self.dynamic {
            return Ok(());
        }
        self.ensure_resolved(fields)
    }

    /// Reject fields that are absent, blank, or still runtime input.
    pub fn require<T: Blank>(
        &self,
        field: Option<&FieldValue<T>>,
        name: &str,
        presence: Presence,
    ) -> Result<()> {
        let reason = match field {
            None => Some(CANNOT_BE_EMPTY),
            Some(FieldValue::PendingRuntimeInput) => Some(NOT_PROVIDED),
            Some(FieldValue::Expression(e)) if is_runtime_input_text(e) => Some(NOT_PROVIDED),
            Some(FieldValue::Expression(_)) => match presence {
                Presence::Value if !self.dynamic => Some(CANNOT_BE_EMPTY),
                _ => None,
            },
            Some(FieldValue::Literal(v)) | Some(FieldValue::ExpressionResolved { value: v, .. }) => {
                if v.is_input_marker() {
                    Some(NOT_PROVIDED)
                } else if v.is_blank() {
                    Some(CANNOT_BE_EMPTY)
                } else {
                    None
                }
            }
        };
        match reason {
            Some(reason) => Err(InfraError::invalid_argument(name, reason)),
            None => Ok(()),
        }
    }

    /// Two unresolved alternatives are reported together.
    pub fn require_one_resolvable(&self, first: &dyn FieldState, second: &dyn FieldState) -> Result<()> {
        if let (Some(a), Some(b)) = (first.unresolved_expression(), second.unresolved_expression()) {
            return Err(InfraError::InvalidRequest(format!(
                "Unresolved Expressions : [{}] , [{}]",
                a, b
            )));
        }
        Ok(())
    }

    /// Required child object.
    pub fn require_child<T>(&self, child: Option<&T>, name: &str, reason: &str) -> Result<()> {
        match child {
            Some(_) => Ok(()),
            None => Err(InfraError::invalid_argument(name, reason)),
        }
    }
}

/// Whether a field carries something other than absence, blankness or input.
fn has_value_or_expression<T: Blank>(field: Option<&FieldValue<T>>) -> bool {
    match field {
        None | Some(FieldValue::PendingRuntimeInput) => false,
        Some(FieldValue::Expression(e)) => !is_runtime_input_text(e),
        Some(FieldValue::Literal(v)) | Some(FieldValue::ExpressionResolved { value: v, .. }) => {
            !v.is_blank() && !v.is_input_marker()
        }
    }
}

fn log_namespace(namespace: Option<&FieldValue<String>>) {
    if let Some(ns) = namespace.and_then(FieldValue::value).filter(|ns| !ns.is_empty()) {
        info!("Kubernetes Namespace: {}", ns);
    }
}

// ============================================================================
// Per-kind rules
// ============================================================================

/// Kind-specific validation rules.
pub trait ValidateKind {
    fn validate(&self, v: &Validation) -> Result<()>;
}

/// Namespace, release name and cluster checks shared by the Kubernetes family.
fn validate_k8s_common(
    v: &Validation,
    namespace: Option<&FieldValue<String>>,
    release_name: Option<&FieldValue<String>>,
    cluster: Option<Option<&FieldValue<String>>>,
) -> Result<()> {
    v.require(namespace, "namespace", Presence::Value)?;
    v.require(release_name, "releaseName", Presence::ValueOrExpression)?;
    if let Some(cluster) = cluster {
        v.require(cluster, "cluster", Presence::Value)?;
    }
    Ok(())
}

impl ValidateKind for K8sDirectInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref])?;
        v.ensure_provisioned_resolved(&[&self.namespace])?;
        log_namespace(self.namespace.as_ref());
        validate_k8s_common(v, self.namespace.as_ref(), self.release_name.as_ref(), None)
    }
}

impl ValidateKind for K8sGcpInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref])?;
        v.ensure_provisioned_resolved(&[&self.namespace, &self.cluster])?;
        log_namespace(self.namespace.as_ref());
        validate_k8s_common(
            v,
            self.namespace.as_ref(),
            self.release_name.as_ref(),
            Some(self.cluster.as_ref()),
        )
    }
}

impl ValidateKind for K8sAwsInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref])?;
        v.ensure_provisioned_resolved(&[&self.namespace, &self.cluster])?;
        log_namespace(self.namespace.as_ref());
        validate_k8s_common(
            v,
            self.namespace.as_ref(),
            self.release_name.as_ref(),
            Some(self.cluster.as_ref()),
        )
    }
}

impl ValidateKind for K8sRancherInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref])?;
        v.ensure_provisioned_resolved(&[&self.namespace, &self.cluster])?;
        log_namespace(self.namespace.as_ref());
        validate_k8s_common(
            v,
            self.namespace.as_ref(),
            self.release_name.as_ref(),
            Some(self.cluster.as_ref()),
        )
    }
}

impl ValidateKind for K8sAzureInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref])?;
        v.ensure_provisioned_resolved(&[
            &self.namespace,
            &self.cluster,
            &self.subscription_id,
            &self.resource_group,
        ])?;
        log_namespace(self.namespace.as_ref());
        validate_k8s_common(
            v,
            self.namespace.as_ref(),
            self.release_name.as_ref(),
            Some(self.cluster.as_ref()),
        )?;
        v.require(self.subscription_id.as_ref(), "subscription", Presence::Value)?;
        v.require(self.resource_group.as_ref(), "resourceGroup", Presence::Value)
    }
}

impl ValidateKind for ServerlessAwsLambdaInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref])?;
        v.ensure_provisioned_resolved(&[&self.region, &self.stage])?;
        v.require(self.region.as_ref(), "region", Presence::Value)?;
        v.require(self.stage.as_ref(), "stage", Presence::ValueOrExpression)
    }
}

impl ValidateKind for PdcInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.credentials_ref])?;
        v.require_one_resolvable(&self.hosts, &self.connector_ref)?;
        v.require(self.credentials_ref.as_ref(), "credentialsRef", Presence::ValueOrExpression)?;

        if v.is_dynamic() {
            v.require(self.host_array_path.as_ref(), "hostArrayPath", Presence::ValueOrExpression)?;
            v.require(self.host_attributes.as_ref(), "hostAttributes", Presence::Value)?;
            let has_hostname = self
                .host_attributes
                .as_ref()
                .and_then(FieldValue::value)
                .is_some_and(|attrs| attrs.contains_key(HOSTNAME_ATTRIBUTE));
            if !has_hostname {
                return Err(InfraError::InvalidRequest(format!(
                    "[{}] property is mandatory for getting host names",
                    HOSTNAME_ATTRIBUTE
                )));
            }
        } else if !has_value_or_expression(self.hosts.as_ref())
            && !has_value_or_expression(self.connector_ref.as_ref())
        {
            return Err(InfraError::InvalidArguments(vec![
                FieldViolation::new("hosts", CANNOT_BE_EMPTY),
                FieldViolation::new("connectorRef", CANNOT_BE_EMPTY),
            ]));
        }
        Ok(())
    }
}

impl ValidateKind for SshWinRmAwsInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref, &self.credentials_ref, &self.host_connection_type])?;
        v.ensure_provisioned_resolved(&[&self.region])?;
        v.require(self.credentials_ref.as_ref(), "credentialsRef", Presence::ValueOrExpression)?;
        v.require(self.connector_ref.as_ref(), "connectorRef", Presence::ValueOrExpression)?;
        v.require(self.region.as_ref(), "region", Presence::ValueOrExpression)?;
        v.require(
            self.host_connection_type.as_ref(),
            "hostConnectionType",
            Presence::ValueOrExpression,
        )?;
        v.require_child(self.aws_instance_filter.as_ref(), "awsInstanceFilter", CANNOT_BE_NULL)
    }
}

impl ValidateKind for SshWinRmAzureInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref, &self.credentials_ref])?;
        v.ensure_provisioned_resolved(&[&self.subscription_id, &self.resource_group])?;
        v.require(self.connector_ref.as_ref(), "connectorRef", Presence::ValueOrExpression)?;
        v.require(self.subscription_id.as_ref(), "subscriptionId", Presence::ValueOrExpression)?;
        v.require(self.resource_group.as_ref(), "resourceGroup", Presence::ValueOrExpression)?;
        v.require(self.credentials_ref.as_ref(), "credentialsRef", Presence::ValueOrExpression)
    }
}

impl ValidateKind for AzureWebAppInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref])?;
        v.ensure_provisioned_resolved(&[&self.subscription_id, &self.resource_group])?;
        v.require(self.connector_ref.as_ref(), "connectorRef", Presence::Value)?;
        v.require(self.subscription_id.as_ref(), "subscription", Presence::Value)?;
        v.require(self.resource_group.as_ref(), "resourceGroup", Presence::Value)
    }
}

impl ValidateKind for EcsInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref])?;
        v.ensure_provisioned_resolved(&[&self.cluster, &self.region])?;
        v.require(self.connector_ref.as_ref(), "connectorRef", Presence::ValueOrExpression)?;
        v.require(self.cluster.as_ref(), "cluster", Presence::ValueOrExpression)?;
        v.require(self.region.as_ref(), "region", Presence::ValueOrExpression)
    }
}

impl ValidateKind for GoogleFunctionsInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref])?;
        v.ensure_provisioned_resolved(&[&self.project, &self.region])?;
        v.require(self.connector_ref.as_ref(), "connectorRef", Presence::ValueOrExpression)?;
        v.require(self.project.as_ref(), "project", Presence::ValueOrExpression)?;
        v.require(self.region.as_ref(), "region", Presence::ValueOrExpression)
    }
}

impl ValidateKind for ElastigroupInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref])?;
        v.require(self.connector_ref.as_ref(), "connectorRef", Presence::ValueOrExpression)?;
        v.require_child(self.configuration.as_ref(), "configuration", CANNOT_BE_EMPTY)
    }
}

impl ValidateKind for TanzuApplicationServiceInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref])?;
        v.ensure_provisioned_resolved(&[&self.organization, &self.space])?;
        v.require(self.connector_ref.as_ref(), "connectorRef", Presence::ValueOrExpression)?;
        v.require(self.organization.as_ref(), "Organization", Presence::ValueOrExpression)?;
        v.require(self.space.as_ref(), "Space", Presence::ValueOrExpression)
    }
}

impl ValidateKind for AsgInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref])?;
        v.ensure_provisioned_resolved(&[&self.region])?;
        v.require(self.connector_ref.as_ref(), "connectorRef", Presence::ValueOrExpression)?;
        v.require(self.region.as_ref(), "region", Presence::ValueOrExpression)
    }
}

impl ValidateKind for AwsSamInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref])?;
        v.ensure_provisioned_resolved(&[&self.region])?;
        v.require(self.connector_ref.as_ref(), "connectorRef", Presence::ValueOrExpression)?;
        v.require(self.region.as_ref(), "region", Presence::ValueOrExpression)
    }
}

impl ValidateKind for AwsLambdaInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        v.ensure_resolved(&[&self.connector_ref])?;
        v.ensure_provisioned_resolved(&[&self.region])?;
        v.require(self.region.as_ref(), "region", Presence::Value)
    }
}

impl ValidateKind for CustomDeploymentInfrastructure {
    fn validate(&self, v: &Validation) -> Result<()> {
        let Some(template) = self.custom_deployment_ref.as_ref() else {
            return Err(InfraError::invalid_argument("customDeploymentRef", CANNOT_BE_NULL));
        };
        v.ensure_resolved(&[&self.connector_ref, &template.template_ref, &template.version_label])?;
        if template.template_ref.is_empty() {
            return Err(InfraError::invalid_argument("templateRef", CANNOT_BE_EMPTY));
        }
        Ok(())
    }
}
