//! Local registration rules, checked before anything is sent to the service.
//! Every violated rule is reported, keyed by the wire field name, so the form
//! can mark each field without a round trip.

use crate::console::{
    errors::FieldErrors,
    types::{RegistrationForm, RegistrationRequest, Role},
};
use regex::Regex;
use secrecy::ExposeSecret;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 20;
const PASSWORD_MIN: usize = 6;
const FULL_NAME_MIN: usize = 3;

/// Validates the form and returns the payload to send.
///
/// # Errors
/// Returns every violated rule keyed by field.
pub fn validate_registration(form: &RegistrationForm) -> Result<RegistrationRequest, FieldErrors> {
    let mut errors = FieldErrors::new();

    let username_len = form.username.chars().count();
    if username_len < USERNAME_MIN {
        errors.push("username", "Username must be at least 3 characters");
    }
    if username_len > USERNAME_MAX {
        errors.push("username", "Username must be less than 20 characters");
    }

    let password = form.password.expose_secret();
    for message in password_violations(password) {
        errors.push("password", message);
    }

    if password != form.confirm_password.expose_secret() {
        errors.push("confirmPassword", "Passwords don't match");
    }

    if form.full_name.chars().count() < FULL_NAME_MIN {
        errors.push("fullName", "Full name must be at least 3 characters");
    }

    let role = match form.role.parse::<Role>() {
        Ok(role) if role.is_self_assignable() => Some(role),
        _ => {
            errors.push("role", "Role must be STAFF or MANAGER");
            None
        }
    };

    match role {
        Some(role) if errors.is_empty() => Ok(RegistrationRequest {
            username: form.username.clone(),
            password: form.password.clone(),
            confirm_password: form.confirm_password.clone(),
            full_name: form.full_name.clone(),
            role,
        }),
        _ => Err(errors),
    }
}

fn password_violations(password: &str) -> Vec<&'static str> {
    let rules: [(&str, &str); 3] = [
        ("[A-Z]", "Password must contain at least one uppercase letter"),
        ("[a-z]", "Password must contain at least one lowercase letter"),
        ("[0-9]", "Password must contain at least one number"),
    ];

    let mut violations = Vec::new();
    if password.chars().count() < PASSWORD_MIN {
        violations.push("Password must be at least 6 characters");
    }

    for (pattern, message) in rules {
        if !Regex::new(pattern).is_ok_and(|re| re.is_match(password)) {
            violations.push(message);
        }
    }

    violations
}
