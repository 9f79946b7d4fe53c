//! Input validation helpers shared by feature commands

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameValidationError {
    #[error("Name is required and cannot be empty")]
    Required,

    #[error("Name must be between 1 and {max_length} characters")]
    TooLong { max_length: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextValidationError {
    #[error("{field_name} must be at most {max_length} characters")]
    TooLong {
        field_name: &'static str,
        max_length: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityValidationError {
    #[error("Quantity cannot be negative")]
    Negative,
}

/// Validate a display name: non-blank and at most `max_length` characters
pub fn validate_name(name: &str, max_length: usize) -> Result<(), NameValidationError> {
    if name.trim().is_empty() {
        return Err(NameValidationError::Required);
    }

    if name.chars().count() > max_length {
        return Err(NameValidationError::TooLong { max_length });
    }

    Ok(())
}

/// Validate optional free text
pub fn validate_optional_text(
    value: Option<&str>,
    field_name: &'static str,
    max_length: usize,
) -> Result<(), TextValidationError> {
    match value {
        Some(text) if text.chars().count() > max_length => Err(TextValidationError::TooLong {
            field_name,
            max_length,
        }),
        _ => Ok(()),
    }
}

pub fn validate_quantity(quantity: i32) -> Result<(), QuantityValidationError> {
    if quantity < 0 {
        return Err(QuantityValidationError::Negative);
    }
    Ok(())
}
