//! IR-013: YAML parsing — infrastructure definitions and resolve requests.
//!
//! A definition is `{type: <Kind>, spec: {...}}`. A resolve request bundles
//! the definition with everything the engine takes from its caller: scope,
//! environment, service, entity tags, provisioner outputs and known
//! connectors.

use super::connector::InMemoryConnectorService;
use super::errors::{InfraError, Result};
use super::expression::ProvisionerOutputEvaluator;
use super::outcome::InfrastructureOutcome;
use super::resolver::{resolve_infrastructure, ResolveContext};
use super::spec::{Infrastructure, InfrastructureKind};
use super::types::{CancellationToken, ConnectorInfo, Environment, Scope, Service};
use super::validator::validate_infrastructure;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml_ng::Value as YamlValue;
use std::path::Path;

const KIND_TAG: &str = "type";

/// Parse a definition from YAML.
pub fn parse_infrastructure(yaml: &str) -> Result<Infrastructure> {
    let value: YamlValue =
        serde_yaml_ng::from_str(yaml).map_err(|e| InfraError::Parse(format!("YAML parse error: {}", e)))?;
    infrastructure_from_value(value)
}

/// Build a definition from an already-parsed YAML value. The kind tag is
/// checked first so an unsupported kind reports as such.
pub fn infrastructure_from_value(value: YamlValue) -> Result<Infrastructure> {
    let tag = value
        .get(KIND_TAG)
        .and_then(YamlValue::as_str)
        .ok_or_else(|| InfraError::Parse(format!("infrastructure definition has no '{}'", KIND_TAG)))?;
    let kind: InfrastructureKind = tag.parse()?;
    serde_yaml_ng::from_value(value).map_err(|e| InfraError::Parse(format!("{} definition: {}", kind, e)))
}

/// Everything needed to validate and resolve one definition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    #[serde(default)]
    pub scope: Scope,

    pub environment: Environment,

    #[serde(default)]
    pub service: Option<Service>,

    /// Entity tags overlaid on the definition's own tags.
    #[serde(default)]
    pub tags: IndexMap<String, String>,

    /// Provisioner output document read by `<+provisioner...>` expressions.
    #[serde(default)]
    pub provisioner: serde_json::Value,

    #[serde(default)]
    pub connectors: Vec<ConnectorInfo>,

    #[serde(default)]
    pub infrastructure: Option<YamlValue>,
}

impl ResolveRequest {
    /// The definition, or `None` when the request carries none.
    pub fn infrastructure(&self) -> Result<Option<Infrastructure>> {
        match &self.infrastructure {
            None | Some(YamlValue::Null) => Ok(None),
            Some(value) => infrastructure_from_value(value.clone()).map(Some),
        }
    }

    pub fn evaluator(&self) -> ProvisionerOutputEvaluator {
        ProvisionerOutputEvaluator::new(self.provisioner.clone())
    }

    pub fn connector_service(&self) -> InMemoryConnectorService {
        InMemoryConnectorService::with_connectors(&self.scope, self.connectors.iter().cloned())
    }

    /// Validate the carried definition.
    pub fn validate(&self) -> Result<Infrastructure> {
        let infra = self.infrastructure()?;
        let evaluator = self.evaluator();
        let connectors = self.connector_service();
        let ctx = self.context(&evaluator, &connectors, None);
        validate_infrastructure(infra.as_ref(), &ctx)?;
        // validation passed, so the definition is present
        infra.ok_or_else(null_definition)
    }

    /// Resolve the carried definition. Validation runs inside
    /// `resolve_infrastructure`.
    pub fn resolve(&self, cancellation: Option<&CancellationToken>) -> Result<InfrastructureOutcome> {
        let infra = self.infrastructure()?.ok_or_else(null_definition)?;
        let evaluator = self.evaluator();
        let connectors = self.connector_service();
        let ctx = self.context(&evaluator, &connectors, cancellation);
        resolve_infrastructure(&infra, &ctx)
    }

    fn context<'a>(
        &'a self,
        evaluator: &'a ProvisionerOutputEvaluator,
        connectors: &'a InMemoryConnectorService,
        cancellation: Option<&'a CancellationToken>,
    ) -> ResolveContext<'a> {
        let mut ctx = ResolveContext::new(&self.environment, evaluator, connectors)
            .with_scope(&self.scope)
            .with_tags(&self.tags);
        if let Some(service) = &self.service {
            ctx = ctx.with_service(service);
        }
        if let Some(token) = cancellation {
            ctx = ctx.with_cancellation(token);
        }
        ctx
    }
}

fn null_definition() -> InfraError {
    InfraError::InvalidRequest("Infrastructure definition can't be null or empty".to_string())
}

/// Parse a resolve request from YAML.
pub fn parse_request(yaml: &str) -> Result<ResolveRequest> {
    serde_yaml_ng::from_str(yaml).map_err(|e| InfraError::Parse(format!("YAML parse error: {}", e)))
}

/// Parse a resolve request file from disk.
pub fn parse_request_file(path: &Path) -> Result<ResolveRequest> {
    let content = std::fs::read_to_string(path).map_err(|source| InfraError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_request(&content)
}
