//! IR-007: Error taxonomy for validation and resolution.
//!
//! Every failure the engine can surface is an [`InfraError`]. Connector
//! lookup failures are deliberately absent: enrichment degrades instead.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Reason attached to a required field that is missing or blank.
pub const CANNOT_BE_EMPTY: &str = "cannot be empty";

/// Reason attached to a field still carrying the runtime-input marker.
pub const NOT_PROVIDED: &str = "set as runtime input but no value was provided";

/// Reason attached to a required child object that is absent.
pub const CANNOT_BE_NULL: &str = "cannot be null";

/// One offending field and a short human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Errors raised while validating or resolving an infrastructure definition.
#[derive(Debug, Error)]
pub enum InfraError {
    /// Kind tag outside the closed set. Never retried.
    #[error("Unknown Infrastructure Kind : [{0}]")]
    UnknownKind(String),

    /// One or more required fields are missing, blank, or still runtime input.
    #[error("{}", join_violations(.0))]
    InvalidArguments(Vec<FieldViolation>),

    /// Structural problems and unresolved-expression messages.
    #[error("{0}")]
    InvalidRequest(String),

    /// The expression evaluator could not produce a value in strict mode.
    #[error("Unresolved Expression : [{expression}] ({reason})")]
    Resolution { expression: String, reason: String },

    /// The caller cancelled the resolution before an external call.
    #[error("infrastructure resolution cancelled")]
    Cancelled,

    /// A definition or request document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InfraError {
    /// Shorthand for a single-field [`InfraError::InvalidArguments`].
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments(vec![FieldViolation::new(field, reason)])
    }

    /// Field violations carried by this error, if any.
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            Self::InvalidArguments(v) => v,
            _ => &[],
        }
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, InfraError>;
