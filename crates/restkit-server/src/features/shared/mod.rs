//! Shared utilities for feature modules

pub mod validation;

pub use validation::{validate_name, validate_optional_text, validate_quantity};
