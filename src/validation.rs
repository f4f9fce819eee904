use crate::errors::{DomainError, DomainResult, ValidationError};
use regex::Regex;
use std::sync::OnceLock;

/// A trait that records implement for validation before they are stored.
pub trait Validate {
    /// Validates the record and returns an error if validation fails.
    fn validate(&self) -> DomainResult<()>;
}

// Common regex patterns
fn plate_regex() -> &'static Regex {
    // Legacy (ABC-1234) and Mercosul (ABC1D23) plates.
    static PLATE_REGEX: OnceLock<Regex> = OnceLock::new();
    PLATE_REGEX.get_or_init(|| {
        Regex::new(r"^(?i)[A-Z]{3}-?[0-9][A-Z0-9][0-9]{2}$").unwrap_or_else(|_| unreachable!())
    })
}

fn iso_date_regex() -> &'static Regex {
    static DATE_REGEX: OnceLock<Regex> = OnceLock::new();
    DATE_REGEX.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap_or_else(|_| unreachable!()))
}

/// Struct for configuring validations in a fluent style
#[derive(Default)]
pub struct ValidationBuilder<T> {
    field_name: String,
    value: Option<T>,
    errors: Vec<ValidationError>,
}

/// Generic validation implementations
impl<T> ValidationBuilder<T> {
    pub fn new(field_name: &str, value: Option<T>) -> Self {
        Self {
            field_name: field_name.to_string(),
            value,
            errors: Vec::new(),
        }
    }

    pub fn validate_with<F>(mut self, validator: F) -> Self
    where
        F: FnOnce(&T) -> Result<(), ValidationError>,
    {
        if let Some(value) = &self.value {
            if let Err(err) = validator(value) {
                self.errors.push(err);
            }
        }
        self
    }

    /// Complete validation and return result
    pub fn validate(self) -> DomainResult<()> {
        match self.errors.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(DomainError::Validation(first)),
        }
    }
}

/// String-specific validations
impl ValidationBuilder<String> {
    /// Present and not blank.
    pub fn required(mut self) -> Self {
        let blank = self.value.as_ref().map_or(true, |v| v.trim().is_empty());
        if blank {
            self.errors.push(ValidationError::required(&self.field_name));
        }
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        if let Some(value) = &self.value {
            if value.chars().count() > max {
                self.errors.push(ValidationError::max_length(&self.field_name, max));
            }
        }
        self
    }

    pub fn matches_pattern(mut self, pattern: &Regex, message: &str) -> Self {
        if let Some(value) = &self.value {
            if !pattern.is_match(value) {
                self.errors.push(ValidationError::format(&self.field_name, message));
            }
        }
        self
    }

    pub fn plate(self) -> Self {
        self.matches_pattern(plate_regex(), "must be a vehicle plate such as ABC-1234 or ABC1D23")
    }

    pub fn iso_date(self) -> Self {
        self.matches_pattern(iso_date_regex(), "must be a date formatted YYYY-MM-DD")
    }
}

/// Numeric validations
impl ValidationBuilder<f64> {
    pub fn finite(mut self) -> Self {
        if let Some(value) = self.value {
            if !value.is_finite() {
                self.errors.push(ValidationError::invalid_value(&self.field_name, "must be a number"));
            }
        }
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        if let Some(value) = self.value {
            if value < min {
                self.errors.push(ValidationError::invalid_value(&self.field_name, &format!("must be at least {}", min)));
            }
        }
        self
    }
}

/// Helper collecting errors from several builders
pub struct NestedValidator {
    errors: Vec<ValidationError>,
}

impl NestedValidator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn check(&mut self, result: DomainResult<()>) {
        if let Err(DomainError::Validation(err)) = result {
            self.errors.push(err);
        }
    }

    pub fn validate(self) -> DomainResult<()> {
        match self.errors.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(DomainError::Validation(first)),
        }
    }
}

impl Default for NestedValidator {
    fn default() -> Self {
        Self::new()
    }
}
