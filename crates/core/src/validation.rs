//! Validation rules for account forms.
//!
//! Every check returns the first failing rule, in the order the rules are listed.

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use crate::models::account::{
    EMAIL_MAX_LEN, FIRST_NAME_MAX_LEN, LAST_NAME_MAX_LEN, USERNAME_MAX_LEN,
};
use crate::normalize::normalize;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 10;

/// Characters `sAMAccountName` does not accept.
const FORBIDDEN_USERNAME_CHARS: &[char] = &[
    '"', '/', '\\', '[', ']', ':', ';', '|', '=', ',', '+', '*', '?', '<', '>', '@',
];

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$")
        .expect("EMAIL_REGEX is a valid regex pattern")
});

static NON_WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W").expect("NON_WORD_REGEX is a valid regex pattern"));

/// Password policy violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    TooShort,
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSpecialChar,
    ContainsEmail,
    Mismatch,
}

impl fmt::Display for PasswordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(
                f,
                "Password must be at least {MIN_PASSWORD_LENGTH} characters long."
            ),
            Self::MissingUppercase => {
                write!(f, "Password must contain at least one uppercase letter.")
            }
            Self::MissingLowercase => {
                write!(f, "Password must contain at least one lowercase letter.")
            }
            Self::MissingDigit => write!(f, "Password must contain at least one digit."),
            Self::MissingSpecialChar => {
                write!(f, "Password must contain at least one special character.")
            }
            Self::ContainsEmail => write!(f, "Password must not contain email or username."),
            Self::Mismatch => write!(f, "Passwords do not match."),
        }
    }
}

/// Check a password against the policy. `email` may be empty when it is unknown.
pub fn validate_password(password: &str, email: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PasswordError::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(PasswordError::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordError::MissingDigit);
    }
    if !NON_WORD_REGEX.is_match(password) {
        return Err(PasswordError::MissingSpecialChar);
    }

    let local = email.split('@').next().unwrap_or("");
    let domain = email.rsplit('@').next().unwrap_or("");
    let contains = |part: &str| !part.is_empty() && password.contains(part);
    if contains(email) || contains(local) || contains(domain) {
        return Err(PasswordError::ContainsEmail);
    }
    Ok(())
}

/// The confirmation field must repeat the password exactly.
pub fn validate_password_match(password: &str, confirmation: &str) -> Result<(), PasswordError> {
    if password != confirmation {
        return Err(PasswordError::Mismatch);
    }
    Ok(())
}

/// Email violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    Invalid,
    TooLong,
    DomainNotAllowed { allowed: Vec<String> },
}

impl fmt::Display for EmailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "Enter a valid email address."),
            Self::TooLong => write!(
                f,
                "Email must be at most {EMAIL_MAX_LEN} characters long."
            ),
            Self::DomainNotAllowed { allowed } => write!(
                f,
                "Email domain must be one of the following: {}",
                allowed.join(", ")
            ),
        }
    }
}

/// Check email syntax and that its domain is in the allow-list.
///
/// Domains are compared whole and case-insensitively, so `sub.example.edu`
/// does not match an allowed `example.edu`.
pub fn validate_email(email: &str, allowed_domains: &[String]) -> Result<(), EmailError> {
    if email.len() > EMAIL_MAX_LEN {
        return Err(EmailError::TooLong);
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err(EmailError::Invalid);
    }
    let domain = email.rsplit('@').next().unwrap_or("");
    if allowed_domains
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(domain))
    {
        return Ok(());
    }
    Err(EmailError::DomainNotAllowed {
        allowed: allowed_domains.to_vec(),
    })
}

/// Check a username is acceptable as a `sAMAccountName`.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required.".into());
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(format!(
            "Username must be at most {USERNAME_MAX_LEN} characters long."
        ));
    }
    if username
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_USERNAME_CHARS.contains(&c))
    {
        return Err("Username contains characters that are not allowed.".into());
    }
    // The directory only sees the ASCII-folded name.
    if normalize(username) != username {
        return Err("Username may only contain ASCII letters, digits and punctuation.".into());
    }
    if username.ends_with('.') {
        return Err("Username must not end with a period.".into());
    }
    Ok(())
}

pub fn validate_first_name(name: &str) -> Result<(), String> {
    validate_name("First name", name, FIRST_NAME_MAX_LEN)
}

pub fn validate_last_name(name: &str) -> Result<(), String> {
    validate_name("Last name", name, LAST_NAME_MAX_LEN)
}

fn validate_name(label: &str, name: &str, max: usize) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{label} is required."));
    }
    if name.chars().count() > max {
        return Err(format!("{label} must be at most {max} characters long."));
    }
    Ok(())
}

/// Per-field error messages collected while validating a form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: BTreeMap<String, String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for `field`. The first error recorded for a field wins.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    /// Record the error of a failed check, if any.
    pub fn check<E: fmt::Display>(&mut self, field: &str, result: Result<(), E>) {
        if let Err(e) = result {
            self.add(field, e.to_string());
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}
