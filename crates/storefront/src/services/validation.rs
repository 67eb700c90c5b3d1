//! Form validation shared by the auth pages and checkout.
//!
//! Validation runs before any backend call. Failures are collected per field
//! and rendered next to the offending input.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use shopfront_core::Email;

/// Field name to error message.
pub type FieldErrors = BTreeMap<&'static str, String>;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{9,15}$").expect("Invalid regex"));

/// Record an error if the value is blank.
pub fn require(errors: &mut FieldErrors, field: &'static str, value: &str, label: &str) {
    if value.trim().is_empty() {
        errors.insert(field, format!("{label} is required"));
    }
}

/// Record an error if the value is not a well formed email. Blank values are
/// left to [`require`].
pub fn email(errors: &mut FieldErrors, field: &'static str, value: &str) {
    if !value.trim().is_empty() && Email::parse(value).is_err() {
        errors.insert(field, "Enter a valid email address".to_string());
    }
}

/// Record an error if the value is not a phone number: digits with an
/// optional leading `+`, 9 to 15 digits.
pub fn phone(errors: &mut FieldErrors, field: &'static str, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !PHONE_RE.is_match(value) {
        errors.insert(field, "Enter a phone number of 9 to 15 digits".to_string());
    }
}

/// Record errors for a new password and its confirmation.
pub fn new_password(
    errors: &mut FieldErrors,
    field: &'static str,
    confirm_field: &'static str,
    password: &str,
    confirmation: &str,
) {
    if password.is_empty() {
        errors.insert(field, "Password is required".to_string());
    } else if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.insert(
            field,
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
        );
    }
    if password != confirmation {
        errors.insert(confirm_field, "Passwords do not match".to_string());
    }
}

/// Trimmed value, or `None` when blank.
#[must_use]
pub fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_numbers() {
        for ok in ["0912345678", "+84912345678", "123456789"] {
            let mut errors = FieldErrors::new();
            phone(&mut errors, "phone", ok);
            assert!(errors.is_empty(), "{ok} should be accepted");
        }
        for bad in ["12345678", "09-1234-5678", "+", "1234567890123456", "abc123456789"] {
            let mut errors = FieldErrors::new();
            phone(&mut errors, "phone", bad);
            assert!(errors.contains_key("phone"), "{bad} should be rejected");
        }
    }

    #[test]
    fn password_rules() {
        let mut errors = FieldErrors::new();
        new_password(&mut errors, "password", "confirm", "short", "short");
        assert!(errors.contains_key("password"));
        assert!(!errors.contains_key("confirm"));

        let mut errors = FieldErrors::new();
        new_password(&mut errors, "password", "confirm", "long enough", "long enougH");
        assert_eq!(errors.keys().copied().collect::<Vec<_>>(), vec!["confirm"]);
    }

    #[test]
    fn blank_email_is_left_to_require() {
        let mut errors = FieldErrors::new();
        email(&mut errors, "email", "  ");
        assert!(errors.is_empty());
        email(&mut errors, "email", "not-an-email");
        assert!(errors.contains_key("email"));
    }
}
