//! infradef — infrastructure definition resolution.
//!
//! Validates declarative deployment-target definitions, resolves their
//! fields (statically or from provisioner output), and compiles them into
//! keyed, immutable infrastructure outcomes.

pub mod cli;
pub mod core;

pub use crate::core::connector::{ConnectorService, InMemoryConnectorService, NoopConnectorService};
pub use crate::core::errors::{FieldViolation, InfraError};
pub use crate::core::expression::{ExpressionEvaluator, ExpressionMode, ProvisionerOutputEvaluator};
pub use crate::core::field::FieldValue;
pub use crate::core::key::{compute_infra_key, InfraKey};
pub use crate::core::outcome::InfrastructureOutcome;
pub use crate::core::resolver::{resolve_infrastructure, ResolveContext};
pub use crate::core::spec::{Infrastructure, InfrastructureKind};
pub use crate::core::validator::validate_infrastructure;
