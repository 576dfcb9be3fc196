//! Schema identifiers and shape validation of metadata documents
//!
//! Schema ids use the format `<namespace>:<name>-<major>.<minor>`, e.g.
//! `asset-core:version-1.0`.
//!
//! ## Compatibility rules
//! - Same namespace, name and major version: compatible (minor may differ)
//! - Anything else: rejected with a diagnostic naming expected vs actual

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::metadata::{
    DIRNAME_PLACEHOLDER, FORMAT_PLACEHOLDER, REPRESENTATION_SCHEMA_ID, ROOT_PLACEHOLDER,
    VERSION_SCHEMA_ID,
};

/// Schema name of the version document
pub const VERSION_SCHEMA: &str = "version";

/// Schema name of a representation record
pub const REPRESENTATION_SCHEMA: &str = "representation";

/// Error parsing or comparing schema identifiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("invalid schema id '{schema_id}': {reason}")]
    InvalidFormat { schema_id: String, reason: String },

    #[error("schema type mismatch: expected '{expected}', got '{actual}'")]
    TypeMismatch { expected: String, actual: String },

    #[error("schema major version mismatch: expected {expected} ({expected_schema_id}), got {actual} ({actual_schema_id})")]
    MajorVersionMismatch {
        expected: u32,
        actual: u32,
        expected_schema_id: String,
        actual_schema_id: String,
    },
}

/// Parsed schema identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaId {
    pub full: String,
    pub namespace: String,
    pub name: String,
    pub major: u32,
    pub minor: u32,
}

impl SchemaId {
    /// Parse `<namespace>:<name>-<major>.<minor>`
    pub fn parse(schema_id: &str) -> Result<Self, SchemaError> {
        let invalid = |reason: &str| SchemaError::InvalidFormat {
            schema_id: schema_id.to_string(),
            reason: reason.to_string(),
        };

        let (namespace, rest) = schema_id
            .split_once(':')
            .ok_or_else(|| invalid("missing ':' after namespace"))?;
        if namespace.is_empty() {
            return Err(invalid("empty namespace"));
        }

        let (name, version) = rest
            .rsplit_once('-')
            .ok_or_else(|| invalid("missing '-' before version"))?;
        if name.is_empty() {
            return Err(invalid("empty name"));
        }

        let (major, minor) = version
            .split_once('.')
            .ok_or_else(|| invalid("version must be <major>.<minor>"))?;
        let major: u32 = major
            .parse()
            .map_err(|_| invalid(&format!("invalid major version '{}'", major)))?;
        let minor: u32 = minor
            .parse()
            .map_err(|_| invalid(&format!("invalid minor version '{}'", minor)))?;

        Ok(Self {
            full: schema_id.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            major,
            minor,
        })
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

/// Check that `actual_schema_id` can be read by a consumer of `expected_schema_id`
pub fn validate_schema_compatibility(
    expected_schema_id: &str,
    actual_schema_id: &str,
) -> Result<(), SchemaError> {
    let expected = SchemaId::parse(expected_schema_id)?;
    let actual = SchemaId::parse(actual_schema_id)?;

    if expected.namespace != actual.namespace || expected.name != actual.name {
        return Err(SchemaError::TypeMismatch {
            expected: format!("{}:{}", expected.namespace, expected.name),
            actual: format!("{}:{}", actual.namespace, actual.name),
        });
    }

    if expected.major != actual.major {
        return Err(SchemaError::MajorVersionMismatch {
            expected: expected.major,
            actual: actual.major,
            expected_schema_id: expected_schema_id.to_string(),
            actual_schema_id: actual_schema_id.to_string(),
        });
    }

    Ok(())
}

/// A document did not conform to a schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("document does not conform to schema \"{schema}\": {}", .violations.join("; "))]
pub struct SchemaViolations {
    pub schema: String,
    pub violations: Vec<String>,
}

/// Validates documents against named schemas
pub trait SchemaValidator {
    fn validate(&self, document: &Value, schema: &str) -> Result<(), SchemaViolations>;
}

impl<F> SchemaValidator for F
where
    F: Fn(&Value, &str) -> Result<(), SchemaViolations>,
{
    fn validate(&self, document: &Value, schema: &str) -> Result<(), SchemaViolations> {
        self(document, schema)
    }
}

/// Validator for the `version` and `representation` shapes
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinValidator;

impl SchemaValidator for BuiltinValidator {
    fn validate(&self, document: &Value, schema: &str) -> Result<(), SchemaViolations> {
        let mut violations = Vec::new();

        match schema {
            VERSION_SCHEMA => check_version(document, "", &mut violations),
            REPRESENTATION_SCHEMA => check_representation(document, "", &mut violations),
            other => violations.push(format!("unknown schema \"{}\"", other)),
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaViolations {
                schema: schema.to_string(),
                violations,
            })
        }
    }
}

const VERSION_KEYS: &[&str] = &[
    "schema",
    "version",
    "path",
    "representations",
    "families",
    "time",
    "author",
    "silo",
    "source",
];

const REPRESENTATION_KEYS: &[&str] = &["schema", "format", "path"];

/// Object with exactly `keys`; records missing and unknown keys
fn check_object<'a>(
    value: &'a Value,
    keys: &[&str],
    at: &str,
    violations: &mut Vec<String>,
) -> Option<&'a Map<String, Value>> {
    let Some(map) = value.as_object() else {
        violations.push(format!("{}must be an object", prefix(at)));
        return None;
    };

    for key in keys {
        if !map.contains_key(*key) {
            violations.push(format!("missing `{}{}`", at, key));
        }
    }

    let known: BTreeSet<&str> = keys.iter().copied().collect();
    for key in map.keys() {
        if !known.contains(key.as_str()) {
            violations.push(format!("unknown key `{}{}`", at, key));
        }
    }

    Some(map)
}

fn prefix(at: &str) -> String {
    if at.is_empty() {
        String::new()
    } else {
        format!("`{}` ", at.trim_end_matches('.'))
    }
}

fn check_schema_id(map: &Map<String, Value>, expected: &str, at: &str, violations: &mut Vec<String>) {
    match map.get("schema") {
        Some(Value::String(actual)) => {
            if let Err(e) = validate_schema_compatibility(expected, actual) {
                violations.push(format!("`{}schema`: {}", at, e));
            }
        }
        Some(_) => violations.push(format!("`{}schema` must be a string", at)),
        None => {}
    }
}

fn non_empty_str<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    at: &str,
    violations: &mut Vec<String>,
) -> Option<&'a str> {
    match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::String(_)) => {
            violations.push(format!("`{}{}` must not be empty", at, key));
            None
        }
        Some(_) => {
            violations.push(format!("`{}{}` must be a string", at, key));
            None
        }
        None => None,
    }
}

fn check_root_template(map: &Map<String, Value>, key: &str, violations: &mut Vec<String>) {
    let Some(template) = non_empty_str(map, key, "", violations) else {
        return;
    };

    let rooted = template == ROOT_PLACEHOLDER || template.starts_with(&format!("{}/", ROOT_PLACEHOLDER));
    if !rooted {
        violations.push(format!("`{}` must start with {}", key, ROOT_PLACEHOLDER));
    }
    if template.contains('\\') {
        violations.push(format!("`{}` must use '/' separators", key));
    }
    if template.contains("//") {
        violations.push(format!("`{}` must not contain empty or absolute components", key));
    }
}

fn check_version(document: &Value, at: &str, violations: &mut Vec<String>) {
    let Some(map) = check_object(document, VERSION_KEYS, at, violations) else {
        return;
    };

    check_schema_id(map, VERSION_SCHEMA_ID, at, violations);

    match map.get("version") {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(v) if v >= 1 && v <= u64::from(u32::MAX) => {}
            _ => violations.push("`version` must be an integer >= 1".to_string()),
        },
        Some(_) => violations.push("`version` must be an integer >= 1".to_string()),
        None => {}
    }

    check_root_template(map, "path", violations);
    check_root_template(map, "source", violations);

    for key in ["time", "author", "silo"] {
        non_empty_str(map, key, at, violations);
    }

    match map.get("families") {
        Some(Value::Array(families)) => {
            if families.is_empty() {
                violations.push("`families` must not be empty".to_string());
            }
            if !families
                .iter()
                .all(|f| f.as_str().is_some_and(|s| !s.is_empty()))
            {
                violations.push("`families` must contain non-empty strings".to_string());
            }
        }
        Some(_) => violations.push("`families` must be an array".to_string()),
        None => {}
    }

    match map.get("representations") {
        Some(Value::Array(representations)) => {
            for (i, representation) in representations.iter().enumerate() {
                check_representation(representation, &format!("representations[{}].", i), violations);
            }
        }
        Some(_) => violations.push("`representations` must be an array".to_string()),
        None => {}
    }
}

fn check_representation(document: &Value, at: &str, violations: &mut Vec<String>) {
    let Some(map) = check_object(document, REPRESENTATION_KEYS, at, violations) else {
        return;
    };

    check_schema_id(map, REPRESENTATION_SCHEMA_ID, at, violations);

    match map.get("format") {
        Some(Value::String(format)) => {
            let well_formed =
                format.is_empty() || (format.starts_with('.') && !format.contains(['/', '\\']));
            if !well_formed {
                violations.push(format!("`{}format` must be empty or start with '.'", at));
            }
        }
        Some(_) => violations.push(format!("`{}format` must be a string", at)),
        None => {}
    }

    if let Some(path) = non_empty_str(map, "path", at, violations) {
        if !path.starts_with(&format!("{}/", DIRNAME_PLACEHOLDER)) {
            violations.push(format!("`{}path` must start with {}/", at, DIRNAME_PLACEHOLDER));
        }
        if !path.contains(FORMAT_PLACEHOLDER) {
            violations.push(format!("`{}path` must contain {}", at, FORMAT_PLACEHOLDER));
        }
        if path.contains('\\') {
            violations.push(format!("`{}path` must use '/' separators", at));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_version() -> Value {
        json!({
            "schema": "asset-core:version-1.0",
            "version": 1,
            "path": "{root}/publish/model/001",
            "representations": [
                {"schema": "asset-core:representation-1.0", "format": ".abc", "path": "{dirname}/mesh{format}"}
            ],
            "families": ["model"],
            "time": "20261018T093000Z",
            "author": "alice",
            "silo": "assets",
            "source": "{root}/work/hero.ma"
        })
    }

    #[test]
    fn test_parse_schema_id() {
        let id = SchemaId::parse("asset-core:version-1.0").unwrap();
        assert_eq!(id.namespace, "asset-core");
        assert_eq!(id.name, "version");
        assert_eq!(id.major, 1);
        assert_eq!(id.minor, 0);
        assert_eq!(id.to_string(), "asset-core:version-1.0");
    }

    #[test]
    fn test_parse_schema_id_invalid() {
        for bad in ["version-1.0", ":version-1.0", "asset-core:version", "asset-core:-1.0", "asset-core:version-1", "asset-core:version-x.0"] {
            assert!(
                matches!(SchemaId::parse(bad), Err(SchemaError::InvalidFormat { .. })),
                "{} parsed",
                bad
            );
        }
    }

    #[test]
    fn test_compatibility_minor_bump() {
        assert!(validate_schema_compatibility("asset-core:version-1.0", "asset-core:version-1.3").is_ok());
    }

    #[test]
    fn test_compatibility_major_bump() {
        let result = validate_schema_compatibility("asset-core:version-1.0", "asset-core:version-2.0");
        assert!(matches!(result, Err(SchemaError::MajorVersionMismatch { .. })));
    }

    #[test]
    fn test_compatibility_type_mismatch() {
        let result =
            validate_schema_compatibility("asset-core:version-1.0", "asset-core:representation-1.0");
        assert!(matches!(result, Err(SchemaError::TypeMismatch { .. })));
    }

    #[test]
    fn test_valid_version_document() {
        assert!(BuiltinValidator.validate(&valid_version(), VERSION_SCHEMA).is_ok());
    }

    #[test]
    fn test_missing_and_unknown_keys() {
        let mut doc = valid_version();
        let map = doc.as_object_mut().unwrap();
        map.remove("silo");
        map.insert("extra".to_string(), json!(1));

        let err = BuiltinValidator.validate(&doc, VERSION_SCHEMA).unwrap_err();
        assert!(err.violations.contains(&"missing `silo`".to_string()));
        assert!(err.violations.contains(&"unknown key `extra`".to_string()));
    }

    #[test]
    fn test_absolute_path_rejected() {
        let mut doc = valid_version();
        doc["path"] = json!("/repo/publish/model/001");
        doc["source"] = json!("{root}\\work\\hero.ma");

        let err = BuiltinValidator.validate(&doc, VERSION_SCHEMA).unwrap_err();
        assert_eq!(err.violations.len(), 3);
    }

    #[test]
    fn test_zero_version_rejected() {
        let mut doc = valid_version();
        doc["version"] = json!(0);
        assert!(BuiltinValidator.validate(&doc, VERSION_SCHEMA).is_err());
    }

    #[test]
    fn test_bad_representation_reported_with_index() {
        let mut doc = valid_version();
        doc["representations"][0]["format"] = json!("abc");

        let err = BuiltinValidator.validate(&doc, VERSION_SCHEMA).unwrap_err();
        assert_eq!(
            err.violations,
            vec!["`representations[0].format` must be empty or start with '.'".to_string()]
        );
    }

    #[test]
    fn test_absolute_path_after_root_rejected() {
        let mut doc = valid_version();
        doc["source"] = json!("{root}///home/alice/hero.ma");

        let err = BuiltinValidator.validate(&doc, VERSION_SCHEMA).unwrap_err();
        assert_eq!(
            err.violations,
            vec!["`source` must not contain empty or absolute components".to_string()]
        );
    }

    #[test]
    fn test_empty_families_rejected() {
        let mut doc = valid_version();
        doc["families"] = json!([]);
        assert!(BuiltinValidator.validate(&doc, VERSION_SCHEMA).is_err());
    }

    #[test]
    fn test_wrong_schema_id_rejected() {
        let mut doc = valid_version();
        doc["schema"] = json!("asset-core:version-2.0");
        let err = BuiltinValidator.validate(&doc, VERSION_SCHEMA).unwrap_err();
        assert!(err.violations[0].contains("major version mismatch"));
    }

    #[test]
    fn test_unknown_schema_name() {
        let err = BuiltinValidator.validate(&valid_version(), "rig").unwrap_err();
        assert_eq!(err.violations, vec!["unknown schema \"rig\"".to_string()]);
    }

    #[test]
    fn test_closure_validator() {
        let reject = |_: &Value, schema: &str| -> Result<(), SchemaViolations> {
            Err(SchemaViolations {
                schema: schema.to_string(),
                violations: vec!["always".to_string()],
            })
        };
        assert!(reject.validate(&valid_version(), VERSION_SCHEMA).is_err());
    }
}
