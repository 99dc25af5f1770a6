//! Request validation from config rules. Collects every violation instead of stopping at the first.

use crate::config::ValidationRule;
use crate::error::FieldErrors;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a snake_case body against per-column rules. Never touches storage.
    pub fn validate(body: &Map<String, Value>, rules: &HashMap<String, ValidationRule>) -> FieldErrors {
        let mut errors = FieldErrors::new();
        let mut cols: Vec<&String> = rules.keys().collect();
        cols.sort();
        for col in cols {
            let rule = &rules[col];
            let label = rule.label.as_deref().unwrap_or(col);
            let val = body.get(col.as_str()).filter(|v| !v.is_null());
            match val {
                None => {
                    if rule.required == Some(true) {
                        errors.add(col.as_str(), format!("{} is required", label));
                    }
                }
                Some(v) => validate_field(col, label, v, rule, &mut errors),
            }
        }
        errors
    }
}

fn validate_field(col: &str, label: &str, v: &Value, rule: &ValidationRule, errors: &mut FieldErrors) {
    let Some(s) = v.as_str() else {
        errors.add(col, format!("{} must be a string", label));
        return;
    };
    if s.trim().is_empty() {
        if rule.required == Some(true) {
            errors.add(col, format!("{} is required", label));
        }
        return;
    }
    let len = s.chars().count();
    if let Some(format) = &rule.format {
        if let Some(msg) = check_format(label, s, format) {
            errors.add(col, msg);
        }
    }
    if let Some(exact) = rule.length {
        if len != exact as usize {
            errors.add(col, format!("{} must be exactly {} characters", label, exact));
        }
    }
    if let Some(min) = rule.min_length {
        if len < min as usize {
            errors.add(col, format!("{} must be at least {} characters", label, min));
        }
    }
    if let Some(max) = rule.max_length {
        if len > max as usize {
            errors.add(col, format!("{} must be at most {} characters", label, max));
        }
    }
    if rule.digits_only == Some(true) && !s.chars().all(|c| c.is_ascii_digit()) {
        errors.add(col, format!("{} must contain only digits", label));
    }
    if let Some(pattern) = &rule.pattern {
        match Regex::new(pattern) {
            Ok(re) if re.is_match(s) => {}
            Ok(_) => errors.add(col, format!("{} does not match required pattern", label)),
            Err(_) => errors.add(col, format!("invalid pattern for {}", label)),
        }
    }
}

fn check_format(label: &str, s: &str, format: &str) -> Option<String> {
    match format.to_lowercase().as_str() {
        "email" if !is_email(s) => Some(format!("{} must be a valid email", label)),
        "uuid" if uuid::Uuid::parse_str(s).is_err() => Some(format!("{} must be a valid UUID", label)),
        _ => None,
    }
}

/// One `@` with text on both sides and no whitespace. The domain may not start or end with a dot.
pub fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules(v: Value) -> HashMap<String, ValidationRule> {
        serde_json::from_value(v).unwrap()
    }

    fn body(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn reports_every_violation_at_once() {
        let rules = rules(json!({
            "name": { "required": true, "min_length": 3, "max_length": 100 },
            "cpf": { "required": true, "length": 11, "digits_only": true, "label": "CPF" },
            "city_id": { "required": true, "format": "uuid", "label": "city" }
        }));
        let errors = RequestValidator::validate(&body(json!({ "name": "Al", "cpf": "12ab" })), &rules);
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["city_id", "cpf", "name"]);
        assert_eq!(errors.get("cpf").unwrap().len(), 2);
        assert_eq!(errors.get("city_id").unwrap(), &["city is required".to_string()]);
    }

    #[test]
    fn accepts_valid_body() {
        let rules = rules(json!({
            "name": { "required": true, "min_length": 3 },
            "email": { "required": true, "format": "email", "max_length": 100 }
        }));
        let errors = RequestValidator::validate(&body(json!({ "name": "Ana", "email": "ana@example.com" })), &rules);
        assert!(errors.is_empty());
    }

    #[test]
    fn blank_string_counts_as_missing() {
        let rules = rules(json!({ "name": { "required": true, "min_length": 3 } }));
        let errors = RequestValidator::validate(&body(json!({ "name": "   " })), &rules);
        assert_eq!(errors.get("name").unwrap(), &["name is required".to_string()]);
    }

    #[test]
    fn optional_null_is_skipped() {
        let rules = rules(json!({ "mayor_id": { "format": "uuid" } }));
        assert!(RequestValidator::validate(&body(json!({ "mayor_id": null })), &rules).is_empty());
        assert!(!RequestValidator::validate(&body(json!({ "mayor_id": "nope" })), &rules).is_empty());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let rules = rules(json!({ "name": { "max_length": 3 } }));
        assert!(RequestValidator::validate(&body(json!({ "name": "São" })), &rules).is_empty());
    }

    #[test]
    fn non_string_value_is_rejected() {
        let rules = rules(json!({ "name": { "required": true } }));
        let errors = RequestValidator::validate(&body(json!({ "name": 42 })), &rules);
        assert_eq!(errors.get("name").unwrap(), &["name must be a string".to_string()]);
    }

    #[test]
    fn email_shapes() {
        assert!(is_email("a@b.com"));
        assert!(!is_email("ab.com"));
        assert!(!is_email("@b.com"));
        assert!(!is_email("a@"));
        assert!(!is_email("a b@c.com"));
        assert!(!is_email("a@b@c"));
    }
}
