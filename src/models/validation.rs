use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Field name to the list of messages reported for it
pub type FieldErrors = BTreeMap<String, Vec<String>>;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

pub fn validate_email(email: &str) -> bool {
    email.len() <= 255 && EMAIL_RE.is_match(email)
}

/// Emails are compared case-insensitively everywhere
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Strip HTML tags and surrounding whitespace from free text
pub fn sanitize_text(input: &str) -> String {
    TAG_RE.replace_all(input, "").trim().to_string()
}

pub fn sanitize_opt(input: Option<String>) -> Option<String> {
    input
        .map(|value| sanitize_text(&value))
        .filter(|value| !value.is_empty())
}

pub fn single_field_error(field: &str, message: impl Into<String>) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.insert(field.to_string(), vec![message.into()]);
    errors
}

/// Flatten `validator` output into `field -> messages`, nested fields joined with dots
pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut out = FieldErrors::new();
    collect(errors, None, &mut out);
    out
}

fn collect(errors: &ValidationErrors, prefix: Option<&str>, out: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let name = match prefix {
            Some(prefix) => format!("{}.{}", prefix, field),
            None => field.to_string(),
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = out.entry(name.clone()).or_default();
                for error in list {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| default_message(&name, &error.code));
                    messages.push(message);
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, Some(&name), out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, Some(&format!("{}.{}", name, index)), out);
                }
            }
        }
    }
}

fn default_message(field: &str, code: &str) -> String {
    match code {
        "email" => format!("The {} must be a valid email address", field),
        "length" => format!("The {} has an invalid length", field),
        "range" => format!("The {} is out of range", field),
        "required" => format!("The {} field is required", field),
        _ => format!("The {} is invalid", field),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(email(message = "Please provide a valid email"))]
        email: String,
        #[validate(length(min = 2))]
        name: String,
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("layla@example.com"));
        assert!(validate_email("first.last+tag@sub.example.org"));
        assert!(!validate_email("invalid-email"));
        assert!(!validate_email("@example.com"));
        assert!(!validate_email("test@"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Sara@Example.COM "), "sara@example.com");
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("  <b>Hello</b> there "), "Hello there");
        assert_eq!(sanitize_text("<script>alert(1)</script>"), "alert(1)");
        assert_eq!(sanitize_opt(Some("<p></p>".to_string())), None);
    }

    #[test]
    fn test_field_errors_flatten() {
        let sample = Sample {
            email: "nope".to_string(),
            name: "x".to_string(),
        };
        let errors = field_errors(&sample.validate().unwrap_err());

        assert_eq!(errors["email"], vec!["Please provide a valid email".to_string()]);
        assert_eq!(errors["name"], vec!["The name has an invalid length".to_string()]);
    }
}
