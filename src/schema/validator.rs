//! Structural validation for untrusted schema documents.

use crate::core::{Error, Result};
use serde_json::Value;

const REQUIRED_FIELDS: &[&str] = &[
    "schema_version",
    "schema_url",
    "timestamp",
    "analysis_id",
    "configuration",
    "summary",
    "files",
    "issues",
    "metrics",
    "plugins",
];

const ARRAY_FIELDS: &[&str] = &["issues", "files", "plugins"];

const ISSUE_SEVERITIES: &[&str] = &["error", "warning", "info"];

/// Collect every structural problem in the document.
pub fn validate_value(value: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(object) = value.as_object() else {
        return vec!["document must be a JSON object".to_string()];
    };

    for field in REQUIRED_FIELDS {
        if !object.contains_key(*field) {
            errors.push(format!("missing required field '{field}'"));
        }
    }

    if let Some(timestamp) = object.get("timestamp") {
        match timestamp.as_str() {
            Some(raw) => {
                if chrono::DateTime::parse_from_rfc3339(raw).is_err() {
                    errors.push(format!("timestamp '{raw}' is not valid RFC 3339"));
                }
            }
            None => errors.push("timestamp must be a string".to_string()),
        }
    }

    for field in ARRAY_FIELDS {
        if let Some(entry) = object.get(*field) {
            if !entry.is_array() {
                errors.push(format!("'{field}' must be an array"));
            }
        }
    }

    if let Some(issues) = object.get("issues").and_then(Value::as_array) {
        for (index, issue) in issues.iter().enumerate() {
            validate_issue(index, issue, &mut errors);
        }
    }

    errors
}

/// Validate, failing with a single combined error message.
pub fn validate(value: &Value) -> Result<()> {
    let errors = validate_value(value);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaValidation(errors.join("; ")))
    }
}

fn validate_issue(index: usize, issue: &Value, errors: &mut Vec<String>) {
    let Some(object) = issue.as_object() else {
        errors.push(format!("issues[{index}] must be an object"));
        return;
    };

    if !object.get("id").is_some_and(Value::is_string) {
        errors.push(format!("issues[{index}] missing string 'id'"));
    }

    match object.get("severity").and_then(Value::as_str) {
        Some(severity) if ISSUE_SEVERITIES.contains(&severity) => {}
        Some(severity) => errors.push(format!(
            "issues[{index}] has invalid severity '{severity}'"
        )),
        None => errors.push(format!("issues[{index}] missing 'severity'")),
    }

    match object.get("location").and_then(Value::as_object) {
        Some(location) => {
            for field in ["line", "column"] {
                match location.get(field).and_then(Value::as_u64) {
                    Some(n) if n >= 1 => {}
                    _ => errors.push(format!(
                        "issues[{index}] location '{field}' must be a positive integer"
                    )),
                }
            }
            if !location.contains_key("file") {
                errors.push(format!("issues[{index}] location missing 'file'"));
            }
        }
        None => errors.push(format!("issues[{index}] missing 'location'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_document() -> Value {
        json!({
            "schema_version": "1.0.0",
            "schema_url": "https://auditmap.dev/schemas/analysis-result/v1.json",
            "timestamp": "2026-08-23T10:00:00Z",
            "analysis_id": "run-1",
            "configuration": {},
            "summary": {},
            "files": [],
            "issues": [],
            "metrics": {},
            "plugins": []
        })
    }

    #[test]
    fn test_minimal_document_is_clean() {
        assert!(validate_value(&minimal_document()).is_empty());
    }

    #[test]
    fn test_missing_fields_reported() {
        let errors = validate_value(&json!({}));
        assert!(errors.iter().any(|e| e.contains("'timestamp'")));
        assert!(errors.iter().any(|e| e.contains("'issues'")));
    }

    #[test]
    fn test_bad_timestamp() {
        let mut document = minimal_document();
        document["timestamp"] = json!("yesterday-ish");
        let errors = validate_value(&document);
        assert!(errors.iter().any(|e| e.contains("RFC 3339")));
    }

    #[test]
    fn test_non_array_issues() {
        let mut document = minimal_document();
        document["issues"] = json!("lots");
        let errors = validate_value(&document);
        assert!(errors.iter().any(|e| e.contains("must be an array")));
    }

    #[test]
    fn test_issue_field_checks() {
        let mut document = minimal_document();
        document["issues"] = json!([
            {"severity": "fatal", "location": {"file": "a.rs", "line": 0, "column": 1}}
        ]);
        let errors = validate_value(&document);
        assert!(errors.iter().any(|e| e.contains("missing string 'id'")));
        assert!(errors.iter().any(|e| e.contains("invalid severity")));
        assert!(errors
            .iter()
            .any(|e| e.contains("'line' must be a positive integer")));
    }

    #[test]
    fn test_validate_wraps_errors() {
        let err = validate(&json!({})).unwrap_err();
        assert!(matches!(err, Error::SchemaValidation(_)));
    }
}
