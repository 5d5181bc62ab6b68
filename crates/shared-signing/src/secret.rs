//! Advisory shared-secret strength check. Never blocks anything.

use serde::Serialize;

pub const MIN_SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretStrength {
    pub is_strong: bool,
    pub warnings: Vec<String>,
}

/// Reports which strength criteria `secret` misses.
///
/// Strong means at least [`MIN_SECRET_LENGTH`] characters with lowercase,
/// uppercase, digit and symbol classes all present.
pub fn validate_secret_strength(secret: &str) -> SecretStrength {
    let mut warnings = Vec::new();

    let length = secret.chars().count();
    if length < MIN_SECRET_LENGTH {
        warnings.push(format!(
            "secret is {length} characters; at least {MIN_SECRET_LENGTH} recommended"
        ));
    }
    if !secret.chars().any(|c| c.is_lowercase()) {
        warnings.push("secret has no lowercase letters".to_string());
    }
    if !secret.chars().any(|c| c.is_uppercase()) {
        warnings.push("secret has no uppercase letters".to_string());
    }
    if !secret.chars().any(|c| c.is_ascii_digit()) {
        warnings.push("secret has no digits".to_string());
    }
    if !secret
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        warnings.push("secret has no symbols".to_string());
    }

    SecretStrength {
        is_strong: warnings.is_empty(),
        warnings,
    }
}
