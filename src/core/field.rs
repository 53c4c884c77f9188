//! IR-001: Field values — literal, pending runtime input, expression.
//!
//! Every configurable attribute of an infrastructure definition is a
//! [`FieldValue`]. YAML strings equal to `<+input>`, optionally followed by
//! modifier calls, become
//! [`FieldValue::PendingRuntimeInput`]; strings containing a `<+...>`
//! reference become [`FieldValue::Expression`]; everything else is a literal
//! of the field's type.

use indexmap::IndexMap;
use regex::Regex;
use serde::de::{DeserializeOwned, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Marker a user writes to defer a value to pipeline run time.
pub const RUNTIME_INPUT_MARKER: &str = "<+input>";

/// Separator for host lists written as a single string.
pub const HOSTS_SEPARATOR: char = ',';

static EXPRESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\+[^<>]+>").expect("static expression pattern"));

/// Whether `text` contains at least one `<+...>` reference.
pub fn is_expression_text(text: &str) -> bool {
    EXPRESSION_RE.is_match(text)
}

static RUNTIME_INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<\+input>(\.(default|allowedValues|regex|executionInput)\([^()]*\))*$")
        .expect("static runtime input pattern")
});

/// Whether `text` is exactly the runtime-input marker, optionally followed by
/// modifier calls such as `.default(ns)` or `.allowedValues(a,b)`. Any other
/// text after the marker makes it an ordinary expression.
pub fn is_runtime_input_text(text: &str) -> bool {
    let text = text.trim();
    text == RUNTIME_INPUT_MARKER || RUNTIME_INPUT_RE.is_match(text)
}

/// A single definition attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue<T> {
    Literal(T),
    PendingRuntimeInput,
    Expression(String),
    ExpressionResolved { expression: String, value: T },
}

impl<T> FieldValue<T> {
    pub fn literal(value: T) -> Self {
        Self::Literal(value)
    }

    pub fn expression(text: impl Into<String>) -> Self {
        Self::Expression(text.into())
    }

    /// Concrete value, if the field has one.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Literal(v) | Self::ExpressionResolved { value: v, .. } => Some(v),
            Self::PendingRuntimeInput | Self::Expression(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Literal(v) | Self::ExpressionResolved { value: v, .. } => Some(v),
            Self::PendingRuntimeInput | Self::Expression(_) => None,
        }
    }

    /// True for both resolved and unresolved expressions.
    pub fn is_expression(&self) -> bool {
        matches!(self, Self::Expression(_) | Self::ExpressionResolved { .. })
    }

    pub fn is_unresolved_expression(&self) -> bool {
        matches!(self, Self::Expression(_))
    }

    pub fn is_pending_input(&self) -> bool {
        matches!(self, Self::PendingRuntimeInput)
    }

    /// Raw expression text for expression fields.
    pub fn expression_text(&self) -> Option<&str> {
        match self {
            Self::Expression(e) | Self::ExpressionResolved { expression: e, .. } => Some(e),
            Self::Literal(_) | Self::PendingRuntimeInput => None,
        }
    }

    /// Attach a value to an unresolved expression. Other states are returned unchanged.
    pub fn resolved(self, value: T) -> Self {
        match self {
            Self::Expression(expression) => Self::ExpressionResolved { expression, value },
            other => other,
        }
    }

    /// Build a field from a JSON/YAML scalar, classifying markers and expressions.
    pub fn from_json(raw: serde_json::Value) -> Result<Self, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        if let serde_json::Value::String(s) = &raw {
            if is_runtime_input_text(s) {
                return Ok(Self::PendingRuntimeInput);
            }
            if is_expression_text(s) {
                return Ok(Self::Expression(s.clone()));
            }
        }
        serde_json::from_value(raw).map(Self::Literal)
    }
}

impl FieldValue<String> {
    /// Literal or resolved value, falling back to the expression text.
    pub fn value_or_expression(&self) -> Option<&str> {
        match self {
            Self::Literal(v) | Self::ExpressionResolved { value: v, .. } => Some(v),
            Self::Expression(e) => Some(e),
            Self::PendingRuntimeInput => None,
        }
    }

    /// The text a user would see for this field; pending input renders as the marker.
    pub fn final_value_text(&self) -> &str {
        self.value_or_expression().unwrap_or(RUNTIME_INPUT_MARKER)
    }
}

impl<T: Serialize> Serialize for FieldValue<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Literal(v) | Self::ExpressionResolved { value: v, .. } => v.serialize(serializer),
            Self::PendingRuntimeInput => serializer.serialize_str(RUNTIME_INPUT_MARKER),
            Self::Expression(e) => serializer.serialize_str(e),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for FieldValue<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Blankness: what "no value" means per field type
// ============================================================================

/// Emptiness check used by required-field validation.
pub trait Blank {
    fn is_blank(&self) -> bool;

    /// Literal values equal to the runtime-input marker count as missing.
    fn is_input_marker(&self) -> bool {
        false
    }
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn is_input_marker(&self) -> bool {
        is_runtime_input_text(self)
    }
}

impl Blank for bool {
    fn is_blank(&self) -> bool {
        false
    }
}

impl<T> Blank for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl<V> Blank for IndexMap<String, V> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Blank for HostList {
    fn is_blank(&self) -> bool {
        self.split().is_empty()
    }
}

// ============================================================================
// Host lists
// ============================================================================

/// Host list: a single separator-joined string or an explicit list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostList {
    Joined(String),
    List(Vec<String>),
}

impl HostList {
    /// Split every entry on [`HOSTS_SEPARATOR`], trimming and dropping empties.
    /// Splitting an already-split list is a no-op.
    pub fn split(&self) -> Vec<String> {
        match self {
            Self::Joined(s) => split_hosts(std::slice::from_ref(s)),
            Self::List(v) => split_hosts(v),
        }
    }
}

/// Split host entries on [`HOSTS_SEPARATOR`].
pub fn split_hosts(entries: &[String]) -> Vec<String> {
    entries
        .iter()
        .flat_map(|e| e.split(HOSTS_SEPARATOR))
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ir001_parse_literal() {
        let f: FieldValue<String> = serde_yaml_ng::from_str("my-namespace").unwrap();
        assert_eq!(f, FieldValue::Literal("my-namespace".to_string()));
        assert_eq!(f.value().map(String::as_str), Some("my-namespace"));
        assert!(!f.is_expression());
    }

    #[test]
    fn test_ir001_parse_runtime_input() {
        let f: FieldValue<String> = serde_yaml_ng::from_str("\"<+input>\"").unwrap();
        assert!(f.is_pending_input());
        assert_eq!(f.value(), None);
        assert_eq!(f.final_value_text(), RUNTIME_INPUT_MARKER);

        let with_default: FieldValue<String> =
            serde_yaml_ng::from_str("\"<+input>.default(ns)\"").unwrap();
        assert!(with_default.is_pending_input());
    }

    #[test]
    fn test_ir001_marker_prefix_is_not_input() {
        let f: FieldValue<String> = serde_yaml_ng::from_str("\"<+input>suffix\"").unwrap();
        assert!(!f.is_pending_input());
        assert_eq!(f, FieldValue::Expression("<+input>suffix".to_string()));

        let unknown: FieldValue<String> =
            serde_yaml_ng::from_str("\"<+input>.bogus(x)\"").unwrap();
        assert!(!unknown.is_pending_input());

        let chained: FieldValue<String> =
            serde_yaml_ng::from_str("\"<+input>.allowedValues(a,b).default(a)\"").unwrap();
        assert!(chained.is_pending_input());

        assert!(!"<+input>x".to_string().is_input_marker());
        assert!(!is_runtime_input_text("ns-<+input>"));
    }

    #[test]
    fn test_ir001_parse_expression() {
        let f: FieldValue<String> =
            serde_yaml_ng::from_str("\"<+provisioner.namespace>\"").unwrap();
        assert!(f.is_unresolved_expression());
        assert_eq!(f.expression_text(), Some("<+provisioner.namespace>"));
        assert_eq!(f.value_or_expression(), Some("<+provisioner.namespace>"));
    }

    #[test]
    fn test_ir001_embedded_expression() {
        let f: FieldValue<String> =
            serde_yaml_ng::from_str("\"release-<+INFRA_KEY_SHORT_ID>\"").unwrap();
        assert!(f.is_unresolved_expression());
    }

    #[test]
    fn test_ir001_non_string_literal() {
        let f: FieldValue<bool> = serde_yaml_ng::from_str("true").unwrap();
        assert_eq!(f, FieldValue::Literal(true));
        let m: FieldValue<IndexMap<String, String>> =
            serde_yaml_ng::from_str("{hostname: ip}").unwrap();
        assert_eq!(m.value().unwrap()["hostname"], "ip");
    }

    #[test]
    fn test_ir001_type_mismatch_rejected() {
        let result: Result<FieldValue<bool>, _> = serde_yaml_ng::from_str("[1, 2]");
        assert!(result.is_err());
    }

    #[test]
    fn test_ir001_resolved_keeps_expression_text() {
        let f = FieldValue::<String>::expression("<+provisioner.ns>").resolved("prod".to_string());
        assert_eq!(f.value().map(String::as_str), Some("prod"));
        assert_eq!(f.expression_text(), Some("<+provisioner.ns>"));
        assert!(f.is_expression());
        assert!(!f.is_unresolved_expression());
    }

    #[test]
    fn test_ir001_resolved_ignores_literals() {
        let f = FieldValue::literal("a".to_string()).resolved("b".to_string());
        assert_eq!(f, FieldValue::Literal("a".to_string()));
    }

    #[test]
    fn test_ir001_serialize_states() {
        let pending: FieldValue<String> = FieldValue::PendingRuntimeInput;
        assert_eq!(serde_json::to_string(&pending).unwrap(), "\"<+input>\"");
        let resolved = FieldValue::<String>::expression("<+a>").resolved("x".into());
        assert_eq!(serde_json::to_string(&resolved).unwrap(), "\"x\"");
    }

    #[test]
    fn test_ir001_blank_marker() {
        assert!(String::new().is_blank());
        assert!("<+input>".to_string().is_input_marker());
        assert!(!"ns".to_string().is_input_marker());
        assert!(!true.is_blank());
    }

    #[test]
    fn test_ir001_host_list_joined() {
        let h: HostList = serde_yaml_ng::from_str("\"host1, host2,,host3\"").unwrap();
        assert_eq!(h.split(), vec!["host1", "host2", "host3"]);
    }

    #[test]
    fn test_ir001_host_list_list() {
        let h: HostList = serde_yaml_ng::from_str("[host1, \"host2,host3\"]").unwrap();
        assert_eq!(h.split(), vec!["host1", "host2", "host3"]);
    }

    #[test]
    fn test_ir001_host_list_blank() {
        assert!(HostList::Joined(" , ".to_string()).is_blank());
        assert!(!HostList::List(vec!["a".into()]).is_blank());
    }

    proptest! {
        #[test]
        fn prop_split_is_idempotent(hosts in proptest::collection::vec("[a-z0-9.-]{1,12}", 0..8)) {
            let joined = HostList::Joined(hosts.join(","));
            let once = joined.split();
            let twice = HostList::List(once.clone()).split();
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(once, HostList::List(hosts).split());
        }
    }
}
