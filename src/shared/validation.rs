//! Validation Utilities

use validator::{ValidationError, ValidationErrors};

use super::error::StoreError;
use super::ids::is_valid_id;

/// Convert validator errors to a [`StoreError::InvalidInput`] naming the first
/// offending field.
pub fn validation_error(entity: &'static str, errors: ValidationErrors) -> StoreError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let Some((field, errs)) = fields.into_iter().next() else {
        return StoreError::invalid_input(entity, "unknown", "");
    };

    let value = errs
        .first()
        .and_then(|e| e.params.get("value"))
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();

    StoreError::invalid_input(entity, field.to_string(), value)
}

/// `validator` hook for 26-character entity ids.
pub fn validate_id(id: &str) -> Result<(), ValidationError> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_id"))
    }
}

/// `validator` hook for ids that may be empty (e.g. unattached file infos).
pub fn validate_optional_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        Ok(())
    } else {
        validate_id(id)
    }
}

/// Escape LIKE wildcards in a user-supplied search term.
pub fn sanitize_search_term(term: &str, escape: char) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if c == escape || c == '%' || c == '_' {
            out.push(escape);
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(custom(function = "validate_id"))]
        id: String,
        #[validate(length(max = 3))]
        name: String,
    }

    #[test]
    fn test_validation_error_names_field() {
        let sample = Sample {
            id: "x".repeat(26),
            name: "toolong".into(),
        };
        let err = validation_error("Sample", sample.validate().unwrap_err());
        match err {
            StoreError::InvalidInput { entity, field, value } => {
                assert_eq!(entity, "Sample");
                assert_eq!(field, "name");
                assert_eq!(value, "toolong");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id(&"a".repeat(26)).is_ok());
        assert!(validate_id("nope").is_err());
        assert!(validate_optional_id("").is_ok());
    }

    #[test]
    fn test_sanitize_search_term() {
        assert_eq!(sanitize_search_term("50%_off\\", '\\'), "50\\%\\_off\\\\");
        assert_eq!(sanitize_search_term("plain", '\\'), "plain");
    }
}
