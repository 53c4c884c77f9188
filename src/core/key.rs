//! IR-004: Infrastructure key — SHA-1 identity of a deployment target.
//!
//! The key is persisted by release tracking and drift detection, so the input
//! string and digest format must never change: `[service-]env-part1-part2...`,
//! SHA-1 over the UTF-8 bytes, 40 lowercase hex characters.

use super::types::{Environment, Service};
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::fmt;

/// Separator between key segments.
pub const KEY_SEPARATOR: &str = "-";

/// Length of the legacy short key.
pub const SHORT_KEY_LEN: usize = 6;

/// Full and short infrastructure key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraKey {
    pub key: String,
    pub short_key: String,
}

impl InfraKey {
    /// Key for a service deployed to an environment, from the ambient descriptors.
    pub fn generate(service: Option<&Service>, environment: &Environment, parts: &[&str]) -> Self {
        compute_infra_key(
            service.map(|s| s.identifier.as_str()),
            &environment.identifier,
            parts,
        )
    }
}

impl fmt::Display for InfraKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Compute the infrastructure key. The service segment is omitted entirely
/// when no service is in context.
pub fn compute_infra_key(service_id: Option<&str>, env_id: &str, parts: &[&str]) -> InfraKey {
    let mut segments: Vec<&str> = Vec::with_capacity(parts.len() + 2);
    if let Some(service) = service_id {
        segments.push(service);
    }
    segments.push(env_id);
    segments.extend_from_slice(parts);

    let mut hasher = Sha1::new();
    hasher.update(segments.join(KEY_SEPARATOR).as_bytes());
    let key = format!("{:x}", hasher.finalize());
    let short_key = key[..SHORT_KEY_LEN].to_string();
    InfraKey { key, short_key }
}
