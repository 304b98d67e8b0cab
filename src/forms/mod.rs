//! Form decoding and validation.
//!
//! [`Form`] is a plain value object: it holds the raw submitted values and
//! accumulates field-level errors as declarative checks run over them.
//! Checks are non-fatal and order-independent; a form is valid iff no check
//! recorded an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::Error;

/// Sanity check for email addresses, per the W3C/WHATWG recommended pattern.
pub static EMAIL_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email regex is valid")
});

/// Submitted form data plus accumulated validation errors.
#[derive(Debug, Clone, Default)]
pub struct Form {
    values: Vec<(String, String)>,
    errors: Vec<(String, String)>,
}

/// Serializable projection of a [`Form`] for template rendering: first value
/// and first error per field.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FormView {
    pub values: HashMap<String, String>,
    pub errors: HashMap<String, String>,
}

impl Form {
    /// Wrap raw submitted values. Repeated fields keep their submission order.
    pub fn new(values: Vec<(String, String)>) -> Self {
        Self {
            values,
            errors: Vec::new(),
        }
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    pub fn from_urlencoded(body: &[u8]) -> Result<Self, Error> {
        let values: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
            .map_err(|e| Error::BadRequest(format!("malformed form body: {e}")))?;
        Ok(Self::new(values))
    }

    /// First submitted value for `field`, or the empty string.
    pub fn get(&self, field: &str) -> &str {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    /// All submitted values for `field`, in order.
    pub fn get_all(&self, field: &str) -> Vec<&str> {
        self.values
            .iter()
            .filter(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// Each listed field must be present and non-blank.
    pub fn required(&mut self, fields: &[&str]) {
        for field in fields {
            if self.get(field).trim().is_empty() {
                self.add_error(field, "This field cannot be blank");
            }
        }
    }

    /// The field, if submitted, must contain at most `max` characters.
    pub fn max_length(&mut self, field: &str, max: usize) {
        let value = self.get(field);
        if value.is_empty() {
            return;
        }
        if value.chars().count() > max {
            self.add_error(
                field,
                format!("This field is too long (maximum is {max} characters)"),
            );
        }
    }

    /// The field, if submitted, must contain at least `min` characters.
    pub fn min_length(&mut self, field: &str, min: usize) {
        let value = self.get(field);
        if value.is_empty() {
            return;
        }
        if value.chars().count() < min {
            self.add_error(
                field,
                format!("This field is too short (minimum is {min} characters)"),
            );
        }
    }

    /// The field, if submitted, must be one of `allowed`.
    pub fn permitted_values(&mut self, field: &str, allowed: &[&str]) {
        let value = self.get(field);
        if value.is_empty() {
            return;
        }
        if !allowed.contains(&value) {
            self.add_error(field, "This field is invalid");
        }
    }

    /// The field, if submitted, must match `pattern`.
    pub fn matches_pattern(&mut self, field: &str, pattern: &Regex) {
        let value = self.get(field);
        if value.is_empty() {
            return;
        }
        if !pattern.is_match(value) {
            self.add_error(field, "This field is invalid");
        }
    }

    /// Record an error against a field. Handlers use this for failures that
    /// only the collaborators can detect (duplicate email, bad credentials).
    pub fn add_error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push((field.to_string(), message.into()));
    }

    /// A form is valid iff no check recorded an error.
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All recorded (field, message) pairs.
    pub fn errors(&self) -> &[(String, String)] {
        &self.errors
    }

    /// Projection for templates: first value and first error per field.
    pub fn view(&self) -> FormView {
        let mut values = HashMap::new();
        for (name, value) in &self.values {
            values.entry(name.clone()).or_insert_with(|| value.clone());
        }
        let mut errors = HashMap::new();
        for (name, message) in &self.errors {
            errors.entry(name.clone()).or_insert_with(|| message.clone());
        }
        FormView { values, errors }
    }
}
