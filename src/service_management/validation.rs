//! Field-level validation errors reported back to HTTP clients.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub code: String,
    pub message: String,
}

/// Mapping from field name to the errors found for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrorMap {
    errors: BTreeMap<String, Vec<FieldError>>,
}

impl FieldErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, code: &str, message: &str) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(FieldError {
                code: code.to_string(),
                message: message.to_string(),
            });
    }

    pub fn require(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            self.add(field, "required", "Field is required");
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Names of the offending fields, sorted.
    pub fn fields(&self) -> Vec<String> {
        self.errors.keys().cloned().collect()
    }

    pub fn get(&self, field: &str) -> Option<&[FieldError]> {
        self.errors.get(field).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_only_flags_empty_values() {
        let mut errors = FieldErrorMap::new();
        errors.require("providerId", "0xabc");
        assert!(!errors.has_errors());

        errors.require("serviceType", "");
        assert!(errors.has_errors());
        assert_eq!(errors.fields(), vec!["serviceType".to_string()]);
        assert_eq!(errors.get("serviceType").unwrap()[0].code, "required");
    }

    #[test]
    fn serializes_as_plain_field_map() {
        let mut errors = FieldErrorMap::new();
        errors.require("providerId", "");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "providerId": [{"code": "required", "message": "Field is required"}]
            })
        );
    }
}
