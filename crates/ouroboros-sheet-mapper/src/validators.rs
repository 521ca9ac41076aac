//! Cell validators
//!
//! A validator is a predicate over the coerced value of a cell plus a fixed
//! message and a [`ValidationKind`] tag. Validators attached to a property
//! run in declaration order; the first failure is reported for that cell.
//!
//! # Example
//!
//! ```rust
//! use ouroboros_sheet_mapper::validators::{CellValidator, GreaterThan, FnValidator};
//! use ouroboros_sheet_mapper::FieldValue;
//!
//! let positive = GreaterThan::new(0.0);
//! assert!(positive.is_valid(&FieldValue::Float(0.0001)));
//! assert!(!positive.is_valid(&FieldValue::Int(0)));
//!
//! let even = FnValidator::new("Value must be even", |value: &FieldValue| {
//!     matches!(value, FieldValue::Int(i) if i % 2 == 0)
//! });
//! assert!(even.is_valid(&FieldValue::Int(4)));
//! ```

use crate::errors::ValidationKind;
use crate::value::FieldValue;
use std::sync::Arc;

// ============================================================================
// Validator Trait
// ============================================================================

/// Predicate over a coerced cell value
pub trait CellValidator: Send + Sync {
    /// Classification reported when the predicate fails
    fn kind(&self) -> ValidationKind;

    /// Message reported when the predicate fails
    fn message(&self) -> &str;

    /// Whether the value passes
    fn is_valid(&self, value: &FieldValue) -> bool;
}

/// Type alias for shared validators
pub type BoxedValidator = Arc<dyn CellValidator>;

/// First validator rejecting `value`, in declaration order
pub fn first_failure<'a>(
    validators: &'a [BoxedValidator],
    value: &FieldValue,
) -> Option<&'a BoxedValidator> {
    validators.iter().find(|validator| !validator.is_valid(value))
}

// ============================================================================
// Built-in Validators
// ============================================================================

/// Fails on null and on empty strings
#[derive(Debug, Clone)]
pub struct Required {
    message: String,
}

impl Required {
    pub fn new() -> Self {
        Self {
            message: "Value is required".to_string(),
        }
    }
}

impl Default for Required {
    fn default() -> Self {
        Self::new()
    }
}

impl CellValidator for Required {
    fn kind(&self) -> ValidationKind {
        ValidationKind::Required
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn is_valid(&self, value: &FieldValue) -> bool {
        match value {
            FieldValue::Null => false,
            FieldValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}

/// Value must be numeric and strictly greater than the bound
#[derive(Debug, Clone)]
pub struct GreaterThan {
    bound: f64,
    message: String,
}

impl GreaterThan {
    /// Create a strict lower bound
    pub fn new(bound: f64) -> Self {
        Self {
            bound,
            message: format!("Value must be greater than {}", bound),
        }
    }
}

impl CellValidator for GreaterThan {
    fn kind(&self) -> ValidationKind {
        ValidationKind::GreaterThan
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn is_valid(&self, value: &FieldValue) -> bool {
        value.as_f64().map_or(false, |n| n > self.bound)
    }
}

/// Value must be numeric and strictly less than the bound
#[derive(Debug, Clone)]
pub struct LessThan {
    bound: f64,
    message: String,
}

impl LessThan {
    /// Create a strict upper bound
    pub fn new(bound: f64) -> Self {
        Self {
            bound,
            message: format!("Value must be less than {}", bound),
        }
    }
}

impl CellValidator for LessThan {
    fn kind(&self) -> ValidationKind {
        ValidationKind::LessThan
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn is_valid(&self, value: &FieldValue) -> bool {
        value.as_f64().map_or(false, |n| n < self.bound)
    }
}

/// Value must equal one of a fixed set
#[derive(Debug, Clone)]
pub struct OneOf {
    allowed: Vec<FieldValue>,
    message: String,
}

impl OneOf {
    /// Create from the allowed values
    pub fn new(allowed: Vec<FieldValue>) -> Self {
        let listed: Vec<String> = allowed.iter().map(ToString::to_string).collect();
        Self {
            message: format!("Value must be one of: {}", listed.join(", ")),
            allowed,
        }
    }

    pub fn allowed(&self) -> &[FieldValue] {
        &self.allowed
    }
}

impl CellValidator for OneOf {
    fn kind(&self) -> ValidationKind {
        ValidationKind::OneOf
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn is_valid(&self, value: &FieldValue) -> bool {
        self.allowed.iter().any(|allowed| match (allowed, value) {
            // enum members may be listed by name
            (FieldValue::String(name), FieldValue::Enum(member)) => name == member,
            _ => allowed == value,
        })
    }
}

// ============================================================================
// Function-based Validators
// ============================================================================

/// Create a custom validator from a predicate
pub struct FnValidator<F>
where
    F: Fn(&FieldValue) -> bool + Send + Sync,
{
    message: String,
    predicate: F,
}

impl<F> FnValidator<F>
where
    F: Fn(&FieldValue) -> bool + Send + Sync,
{
    /// Create a validator reporting `message` when `predicate` fails
    pub fn new(message: impl Into<String>, predicate: F) -> Self {
        Self {
            message: message.into(),
            predicate,
        }
    }
}

impl<F> CellValidator for FnValidator<F>
where
    F: Fn(&FieldValue) -> bool + Send + Sync,
{
    fn kind(&self) -> ValidationKind {
        ValidationKind::Custom
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn is_valid(&self, value: &FieldValue) -> bool {
        (self.predicate)(value)
    }
}

impl<F> std::fmt::Debug for FnValidator<F>
where
    F: Fn(&FieldValue) -> bool + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnValidator")
            .field("message", &self.message)
            .finish()
    }
}
