//! IR-012: Provisioned host pools — physical data center hosts read from
//! provisioner output.
//!
//! `hostArrayPath` names a list of host objects in the provisioner output;
//! `hostAttributes` maps outcome attribute names to paths inside each host
//! object. The `hostname` attribute names the host.

use super::errors::Result;
use super::expression::{
    json_path, json_value_to_string, ExpressionEvaluatorExt, ExpressionMode, PROVISIONER_ROOT,
};
use super::field::is_expression_text;
use super::outcome::{InfrastructureOutcome, PdcProvisionedOutcome};
use super::resolver::Resolution;
use super::spec::PdcInfrastructure;
use super::types::HostFilterOutcome;
use super::validator::HOSTNAME_ATTRIBUTE;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

/// Prefix of attribute paths written as host expressions: `<+host.ip>`.
const HOST_ROOT: &str = "host";

/// Resolve a dynamically provisioned PDC definition.
pub fn resolve_provisioned(spec: &PdcInfrastructure, r: &Resolution<'_, '_>) -> Result<InfrastructureOutcome> {
    let credentials_ref = r.plain(spec.credentials_ref.as_ref(), "credentialsRef")?.unwrap_or_default();
    let connector_ref = r
        .plain(spec.connector_ref.as_ref(), "connectorRef")?
        .filter(|c| !c.is_empty());
    let array_path = r.plain(spec.host_array_path.as_ref(), "hostArrayPath")?.unwrap_or_default();
    let mapping = r
        .value(spec.host_attributes.as_ref(), "hostAttributes", ExpressionMode::ThrowOnUnresolved)?
        .unwrap_or_default();

    r.ctx().checkpoint()?;
    let objects = r.ctx().evaluator.evaluate_host_objects(&host_array_expression(&array_path))?;
    debug!(path = %array_path, count = objects.len(), "provisioned host objects");

    let mut hosts = Vec::with_capacity(objects.len());
    let mut host_attributes = Vec::with_capacity(objects.len());
    for (index, object) in objects.iter().enumerate() {
        let attributes = map_host(object, &mapping);
        match attributes.get(HOSTNAME_ATTRIBUTE) {
            Some(hostname) if !hostname.is_empty() => {
                hosts.push(hostname.clone());
                host_attributes.push(attributes);
            }
            _ => warn!(index, "provisioned host has no {}, skipping", HOSTNAME_ATTRIBUTE),
        }
    }

    let mut parts = vec![credentials_ref.as_str()];
    parts.extend(connector_ref.as_deref());
    let common = r.common::<PdcInfrastructure>(&spec.details, &parts);
    Ok(InfrastructureOutcome::PdcProvisioned(PdcProvisionedOutcome {
        common,
        credentials_ref,
        hosts,
        host_attributes,
        host_filter: HostFilterOutcome::from_filter(spec.host_filter.as_ref()),
    }))
}

/// A bare path is read from the provisioner output.
fn host_array_expression(path: &str) -> String {
    if is_expression_text(path) {
        path.to_string()
    } else {
        format!("<+{}.{}>", PROVISIONER_ROOT, path.trim())
    }
}

/// Path of an attribute inside a host object; accepts `ip` or `<+host.ip>`.
fn attribute_path(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.strip_prefix("<+").and_then(|s| s.strip_suffix('>')) {
        Some(inner) => {
            let inner = inner.trim();
            match inner.strip_prefix(HOST_ROOT) {
                Some(rest) if rest.is_empty() || rest.starts_with('.') => rest.trim_start_matches('.'),
                _ => inner,
            }
        }
        None => raw,
    }
}

/// Extract mapped attributes; missing or null attributes are left out.
fn map_host(object: &Value, mapping: &IndexMap<String, String>) -> IndexMap<String, String> {
    mapping
        .iter()
        .filter_map(|(name, raw)| {
            let value = json_path(object, attribute_path(raw)).filter(|v| !v.is_null())?;
            Some((name.clone(), json_value_to_string(value)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connector::NoopConnectorService;
    use crate::core::errors::InfraError;
    use crate::core::expression::ProvisionerOutputEvaluator;
    use crate::core::field::FieldValue;
    use crate::core::resolver::{resolve_infrastructure, ResolveContext};
    use crate::core::spec::Infrastructure;
    use crate::core::types::{Environment, InfraDetails, Service};
    use serde_json::json;

    fn lit(s: &str) -> Option<FieldValue<String>> {
        Some(FieldValue::literal(s.to_string()))
    }

    fn provisioned(path: &str, attrs: &[(&str, &str)]) -> Infrastructure {
        let mapping: IndexMap<String, String> = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PdcInfrastructure {
            details: InfraDetails {
                dynamically_provisioned: true,
                ..Default::default()
            },
            credentials_ref: lit("ssh-key"),
            host_array_path: lit(path),
            host_attributes: Some(FieldValue::literal(mapping)),
            ..Default::default()
        }
        .into()
    }

    fn resolve(infra: &Infrastructure, outputs: Value) -> Result<InfrastructureOutcome> {
        let env = Environment::new("env");
        let svc = Service::new("svc");
        let evaluator = ProvisionerOutputEvaluator::new(outputs);
        let ctx = ResolveContext::new(&env, &evaluator, &NoopConnectorService).with_service(&svc);
        resolve_infrastructure(infra, &ctx)
    }

    #[test]
    fn test_ir012_hosts_from_provisioner() {
        let infra = provisioned("hosts", &[("hostname", "ip"), ("region", "<+host.placement.region>")]);
        let outputs = json!({
            "hosts": [
                {"ip": "10.0.0.1", "placement": {"region": "east"}},
                {"ip": "10.0.0.2"},
                {"name": "no-ip"}
            ]
        });
        let outcome = resolve(&infra, outputs).unwrap();
        let InfrastructureOutcome::PdcProvisioned(pdc) = &outcome else {
            panic!("wrong outcome: {:?}", outcome);
        };
        assert_eq!(pdc.hosts, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(pdc.host_attributes[0]["region"], "east");
        assert!(!pdc.host_attributes[1].contains_key("region"));
        assert_eq!(pdc.credentials_ref, "ssh-key");
        assert_eq!(
            pdc.common.infrastructure_key,
            "5125f5bee312b79027ea7806b7464e9f7b892906"
        );
        assert_eq!(outcome.kind(), crate::core::spec::InfrastructureKind::Pdc);
    }

    #[test]
    fn test_ir012_expression_array_path() {
        let infra = provisioned("<+provisioner.out.hosts>", &[("hostname", "<+host.name>")]);
        let outcome = resolve(&infra, json!({"out": {"hosts": [{"name": "a"}]}})).unwrap();
        let InfrastructureOutcome::PdcProvisioned(pdc) = outcome else {
            panic!("wrong outcome");
        };
        assert_eq!(pdc.hosts, vec!["a"]);
    }

    #[test]
    fn test_ir012_numeric_attribute_rendered() {
        let infra = provisioned("hosts", &[("hostname", "name"), ("port", "ssh.port")]);
        let outcome = resolve(&infra, json!({"hosts": [{"name": "a", "ssh": {"port": 22}}]})).unwrap();
        let InfrastructureOutcome::PdcProvisioned(pdc) = outcome else {
            panic!("wrong outcome");
        };
        assert_eq!(pdc.host_attributes[0]["port"], "22");
    }

    #[test]
    fn test_ir012_missing_array_fails() {
        let infra = provisioned("hosts", &[("hostname", "ip")]);
        let err = resolve(&infra, json!({})).unwrap_err();
        assert!(matches!(err, InfraError::Resolution { .. }), "{}", err);
    }

    #[test]
    fn test_ir012_non_list_fails() {
        let infra = provisioned("hosts", &[("hostname", "ip")]);
        let err = resolve(&infra, json!({"hosts": "10.0.0.1"})).unwrap_err();
        assert!(err.to_string().contains("expected a list of host objects"), "{}", err);
    }

    #[test]
    fn test_ir012_hostname_mapping_required() {
        let infra = provisioned("hosts", &[("ip", "ip")]);
        let err = resolve(&infra, json!({"hosts": []})).unwrap_err();
        assert!(err.to_string().contains("[hostname] property is mandatory"), "{}", err);
    }

    #[test]
    fn test_ir012_attribute_path_forms() {
        assert_eq!(attribute_path("ip"), "ip");
        assert_eq!(attribute_path("<+host.ip>"), "ip");
        assert_eq!(attribute_path(" <+host.a.b> "), "a.b");
        assert_eq!(attribute_path("<+hostname>"), "hostname");
        assert_eq!(host_array_expression("out.hosts"), "<+provisioner.out.hosts>");
    }
}
