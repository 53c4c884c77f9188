//! IR-008: Connector enrichment — attach connector display metadata to outcomes.
//!
//! Enrichment is best effort. A missing connector or a failing lookup leaves
//! the outcome's connector unset; it never fails resolution.

use super::field::FieldValue;
use super::types::{Connector, ConnectorInfo, Scope};
use indexmap::IndexMap;
use thiserror::Error;

/// Scope prefixes a connector reference may carry.
const ACCOUNT_PREFIX: &str = "account.";
const ORG_PREFIX: &str = "org.";

/// Failure talking to the connector store.
#[derive(Debug, Error)]
pub enum ConnectorLookupError {
    #[error("connector service unavailable: {0}")]
    Unavailable(String),

    #[error("invalid connector reference: {0}")]
    InvalidReference(String),
}

/// Connector store consulted during enrichment.
pub trait ConnectorService: Send + Sync {
    fn get_by_ref(
        &self,
        account: &str,
        org: Option<&str>,
        project: Option<&str>,
        reference: &str,
    ) -> Result<Option<ConnectorInfo>, ConnectorLookupError>;
}

/// Connector service that knows no connectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConnectorService;

impl ConnectorService for NoopConnectorService {
    fn get_by_ref(
        &self,
        _account: &str,
        _org: Option<&str>,
        _project: Option<&str>,
        _reference: &str,
    ) -> Result<Option<ConnectorInfo>, ConnectorLookupError> {
        Ok(None)
    }
}

/// Fully qualified connector location: `account/org/project/identifier`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ConnectorPath {
    account: String,
    org: Option<String>,
    project: Option<String>,
    identifier: String,
}

impl ConnectorPath {
    /// Interpret a reference relative to a scope. `account.` and `org.`
    /// prefixes lift the lookup to the outer scope.
    fn from_ref(
        account: &str,
        org: Option<&str>,
        project: Option<&str>,
        reference: &str,
    ) -> Result<Self, ConnectorLookupError> {
        let (org, project, identifier) = if let Some(id) = reference.strip_prefix(ACCOUNT_PREFIX) {
            (None, None, id)
        } else if let Some(id) = reference.strip_prefix(ORG_PREFIX) {
            (org, None, id)
        } else {
            (org, project, reference)
        };
        if identifier.is_empty() || identifier.contains('.') {
            return Err(ConnectorLookupError::InvalidReference(reference.to_string()));
        }
        Ok(Self {
            account: account.to_string(),
            org: org.map(str::to_string),
            project: project.map(str::to_string),
            identifier: identifier.to_string(),
        })
    }
}

/// In-memory connector store keyed by scope and identifier.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnectorService {
    connectors: IndexMap<ConnectorPath, ConnectorInfo>,
}

impl InMemoryConnectorService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector at `scope`.
    pub fn insert(&mut self, scope: &Scope, connector: ConnectorInfo) {
        let path = ConnectorPath {
            account: scope.account_identifier.clone(),
            org: scope.org_identifier.clone(),
            project: scope.project_identifier.clone(),
            identifier: connector.identifier.clone(),
        };
        self.connectors.insert(path, connector);
    }

    /// Store pre-populated with connectors all living at `scope`.
    pub fn with_connectors(scope: &Scope, connectors: impl IntoIterator<Item = ConnectorInfo>) -> Self {
        let mut service = Self::new();
        for connector in connectors {
            service.insert(scope, connector);
        }
        service
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

impl ConnectorService for InMemoryConnectorService {
    fn get_by_ref(
        &self,
        account: &str,
        org: Option<&str>,
        project: Option<&str>,
        reference: &str,
    ) -> Result<Option<ConnectorInfo>, ConnectorLookupError> {
        let path = ConnectorPath::from_ref(account, org, project, reference)?;
        Ok(self.connectors.get(&path).cloned())
    }
}

/// Look up the connector behind `reference`. Only concrete literal references
/// are looked up; expressions, pending input and failures yield `None`.
pub fn enrich_connector(
    service: &dyn ConnectorService,
    scope: &Scope,
    reference: Option<&FieldValue<String>>,
) -> Option<Connector> {
    let reference = match reference {
        Some(FieldValue::Literal(r)) | Some(FieldValue::ExpressionResolved { value: r, .. })
            if !r.is_empty() =>
        {
            r
        }
        _ => return None,
    };

    match service.get_by_ref(
        &scope.account_identifier,
        scope.org_identifier.as_deref(),
        scope.project_identifier.as_deref(),
        reference,
    ) {
        Ok(Some(info)) => Some(Connector {
            name: info.name.unwrap_or(info.identifier),
        }),
        Ok(None) => {
            tracing::debug!(connector = %reference, "connector not found, outcome left without connector");
            None
        }
        Err(e) => {
            tracing::warn!(connector = %reference, error = %e, "connector lookup failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new("acct", "org1", "proj1")
    }

    fn info(id: &str, name: &str) -> ConnectorInfo {
        ConnectorInfo {
            identifier: id.to_string(),
            name: Some(name.to_string()),
            connector_type: Some("K8sCluster".to_string()),
        }
    }

    struct FailingService;

    impl ConnectorService for FailingService {
        fn get_by_ref(
            &self,
            _: &str,
            _: Option<&str>,
            _: Option<&str>,
            _: &str,
        ) -> Result<Option<ConnectorInfo>, ConnectorLookupError> {
            Err(ConnectorLookupError::Unavailable("timeout".to_string()))
        }
    }

    #[test]
    fn test_ir008_enrich_literal() {
        let service = InMemoryConnectorService::with_connectors(&scope(), [info("c1", "Prod Cluster")]);
        let reference = FieldValue::literal("c1".to_string());
        let connector = enrich_connector(&service, &scope(), Some(&reference));
        assert_eq!(connector.unwrap().name, "Prod Cluster");
    }

    #[test]
    fn test_ir008_skip_expression() {
        let service = InMemoryConnectorService::with_connectors(&scope(), [info("c1", "Prod Cluster")]);
        let reference = FieldValue::<String>::expression("<+provisioner.connector>");
        assert!(enrich_connector(&service, &scope(), Some(&reference)).is_none());
        assert!(enrich_connector(&service, &scope(), None).is_none());
    }

    #[test]
    fn test_ir008_missing_connector_degrades() {
        let reference = FieldValue::literal("ghost".to_string());
        assert!(enrich_connector(&NoopConnectorService, &scope(), Some(&reference)).is_none());
    }

    #[test]
    fn test_ir008_lookup_error_degrades() {
        let reference = FieldValue::literal("c1".to_string());
        assert!(enrich_connector(&FailingService, &scope(), Some(&reference)).is_none());
    }

    #[test]
    fn test_ir008_account_scoped_reference() {
        let mut service = InMemoryConnectorService::new();
        let account = Scope {
            account_identifier: "acct".to_string(),
            org_identifier: None,
            project_identifier: None,
        };
        service.insert(&account, info("shared", "Shared"));
        assert_eq!(service.len(), 1);

        let found = service
            .get_by_ref("acct", Some("org1"), Some("proj1"), "account.shared")
            .unwrap();
        assert_eq!(found.unwrap().identifier, "shared");

        let project_level = service
            .get_by_ref("acct", Some("org1"), Some("proj1"), "shared")
            .unwrap();
        assert!(project_level.is_none());
    }

    #[test]
    fn test_ir008_invalid_reference() {
        let service = InMemoryConnectorService::new();
        let result = service.get_by_ref("acct", None, None, "account.");
        assert!(matches!(result, Err(ConnectorLookupError::InvalidReference(_))));
    }

    #[test]
    fn test_ir008_name_falls_back_to_identifier() {
        let service = InMemoryConnectorService::with_connectors(
            &scope(),
            [ConnectorInfo {
                identifier: "c2".to_string(),
                name: None,
                connector_type: None,
            }],
        );
        let reference = FieldValue::literal("c2".to_string());
        assert_eq!(
            enrich_connector(&service, &scope(), Some(&reference)).unwrap().name,
            "c2"
        );
    }
}
