//! IR-010: Kind registry — the single table mapping kinds to their rules.
//!
//! Validator and resolver are kind-agnostic dispatchers over this table.
//! Adding a deployment-target kind means adding its spec struct, its
//! [`ValidateKind`] and [`ResolveKind`] impls, and one line in [`build`].

use super::errors::{InfraError, Result};
use super::outcome::InfrastructureOutcome;
use super::resolver::{ResolveKind, Resolution};
use super::spec::*;
use super::validator::{ValidateKind, Validation};
use indexmap::IndexMap;
use std::sync::LazyLock;

type ValidateFn = fn(&Infrastructure, &Validation) -> Result<()>;
type ResolveFn = fn(&Infrastructure, &Resolution<'_, '_>) -> Result<InfrastructureOutcome>;

/// Everything the engine knows about one kind.
#[derive(Debug, Clone, Copy)]
pub struct KindDescriptor {
    pub kind: InfrastructureKind,

    /// Ordered names of the fields hashed into the infra key.
    pub key_fields: &'static [&'static str],

    pub supports_dynamic_provisioning: bool,

    /// Outcome carries `infrastructureKeyShort`.
    pub legacy_short_key: bool,

    pub validate: ValidateFn,
    pub resolve: ResolveFn,
}

impl KindDescriptor {
    pub fn of<S>() -> Self
    where
        S: KindSpec + ValidateKind + ResolveKind,
    {
        Self {
            kind: S::KIND,
            key_fields: S::KEY_FIELDS,
            supports_dynamic_provisioning: S::SUPPORTS_DYNAMIC_PROVISIONING,
            legacy_short_key: S::SHORT_KEY,
            validate: validate_as::<S>,
            resolve: resolve_as::<S>,
        }
    }

    /// Whether `infra` takes its field values from a provisioner.
    pub fn is_dynamic(&self, infra: &Infrastructure) -> bool {
        self.supports_dynamic_provisioning && infra.is_dynamically_provisioned()
    }
}

fn mismatch<S: KindSpec>(infra: &Infrastructure) -> InfraError {
    InfraError::InvalidRequest(format!(
        "expected {} definition, got {}",
        S::KIND,
        infra.kind()
    ))
}

fn validate_as<S: KindSpec + ValidateKind>(infra: &Infrastructure, v: &Validation) -> Result<()> {
    S::downcast(infra).ok_or_else(|| mismatch::<S>(infra))?.validate(v)
}

fn resolve_as<S: KindSpec + ResolveKind>(
    infra: &Infrastructure,
    r: &Resolution<'_, '_>,
) -> Result<InfrastructureOutcome> {
    S::downcast(infra).ok_or_else(|| mismatch::<S>(infra))?.resolve(r)
}

/// Immutable kind table, built once per process.
#[derive(Debug)]
pub struct KindRegistry {
    kinds: IndexMap<InfrastructureKind, KindDescriptor>,
}

static REGISTRY: LazyLock<KindRegistry> = LazyLock::new(build);

fn build() -> KindRegistry {
    let descriptors = [
        KindDescriptor::of::<K8sDirectInfrastructure>(),
        KindDescriptor::of::<K8sGcpInfrastructure>(),
        KindDescriptor::of::<K8sAzureInfrastructure>(),
        KindDescriptor::of::<K8sAwsInfrastructure>(),
        KindDescriptor::of::<K8sRancherInfrastructure>(),
        KindDescriptor::of::<ServerlessAwsLambdaInfrastructure>(),
        KindDescriptor::of::<PdcInfrastructure>(),
        KindDescriptor::of::<SshWinRmAwsInfrastructure>(),
        KindDescriptor::of::<SshWinRmAzureInfrastructure>(),
        KindDescriptor::of::<AzureWebAppInfrastructure>(),
        KindDescriptor::of::<EcsInfrastructure>(),
        KindDescriptor::of::<GoogleFunctionsInfrastructure>(),
        KindDescriptor::of::<ElastigroupInfrastructure>(),
        KindDescriptor::of::<AsgInfrastructure>(),
        KindDescriptor::of::<CustomDeploymentInfrastructure>(),
        KindDescriptor::of::<TanzuApplicationServiceInfrastructure>(),
        KindDescriptor::of::<AwsSamInfrastructure>(),
        KindDescriptor::of::<AwsLambdaInfrastructure>(),
    ];
    KindRegistry {
        kinds: descriptors.into_iter().map(|d| (d.kind, d)).collect(),
    }
}

impl KindRegistry {
    pub fn global() -> &'static KindRegistry {
        &REGISTRY
    }

    pub fn lookup(&self, kind: InfrastructureKind) -> Result<&KindDescriptor> {
        self.kinds
            .get(&kind)
            .ok_or_else(|| InfraError::UnknownKind(kind.to_string()))
    }

    /// Look up by the tag written in YAML (`KubernetesDirect`, `ECS`, ...).
    pub fn lookup_tag(&self, tag: &str) -> Result<&KindDescriptor> {
        self.lookup(tag.parse()?)
    }

    /// Registered kinds in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = &KindDescriptor> {
        self.kinds.values()
    }
}
