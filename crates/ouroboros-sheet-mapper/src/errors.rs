//! Error types for spreadsheet mapping
//!
//! Configuration and structural errors stop a read outright. Cell, row and
//! sheet errors are validation errors: they are routed through the
//! configured exception strategy (fail fast, aggregate, or collect).

use crate::value::{CellValue, FieldValue};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Mapping Result
// ============================================================================

/// Mapping result type
pub type MappingResult<T> = Result<T, MappingError>;

/// Raw cells of one row keyed by column letter, in column order
pub type RowSnapshot = Vec<(String, CellValue)>;

// ============================================================================
// Validation Kind
// ============================================================================

/// Classification of cell validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValidationKind {
    /// Value missing or empty
    Required,
    /// Value not in the allowed set
    OneOf,
    /// Value not strictly below the bound
    LessThan,
    /// Value not strictly above the bound
    GreaterThan,
    /// User-supplied predicate failed
    Custom,
    /// Value could not be converted to the field type
    InvalidValue,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::OneOf => write!(f, "one_of"),
            Self::LessThan => write!(f, "less_than"),
            Self::GreaterThan => write!(f, "greater_than"),
            Self::Custom => write!(f, "custom"),
            Self::InvalidValue => write!(f, "invalid_value"),
        }
    }
}

// ============================================================================
// Error Payloads
// ============================================================================

/// A single cell failed coercion or validation
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Row {row}, column {column} ({property}): {message} [{kind}, value: '{value}']")]
pub struct CellError {
    /// 1-based spreadsheet row
    pub row: u32,
    /// Column letter
    pub column: String,
    /// Record property bound to the column
    pub property: String,
    /// Offending raw value
    pub value: CellValue,
    /// Human-readable message
    pub message: String,
    /// Failure classification
    pub kind: ValidationKind,
    /// Every raw cell of the row, for diagnostics
    pub row_values: RowSnapshot,
}

/// A whole row was rejected
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Row {row}: {message}")]
pub struct RowError {
    pub row: u32,
    pub message: String,
    pub row_values: RowSnapshot,
}

/// A whole-sheet condition, currently duplicate values in a unique field
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct SheetError {
    /// Property marked unique
    pub property: String,
    /// Value of every flagged row, aligned with `rows`
    pub values: Vec<FieldValue>,
    /// Rows holding the duplicates, ascending
    pub rows: Vec<u32>,
    pub message: String,
}

impl SheetError {
    /// `values[i]` is the duplicated value found on `rows[i]`; the message
    /// names each distinct value once
    pub fn duplicates(property: impl Into<String>, values: Vec<FieldValue>, rows: Vec<u32>) -> Self {
        let property = property.into();
        let mut seen = HashSet::new();
        let listed: Vec<String> = values
            .iter()
            .filter(|v| seen.insert(v.unique_key()))
            .map(|v| format!("'{}'", v))
            .collect();
        let message = format!(
            "Duplicate values found for property '{}': {}",
            property,
            listed.join(", ")
        );
        Self {
            property,
            values,
            rows,
            message,
        }
    }
}

/// Header row and declared properties could not be reconciled
#[derive(Debug, Clone, PartialEq, Eq, Default, Error)]
pub struct MissingColumnsError {
    /// Declared properties with no matching header column
    pub missing_headers: Vec<String>,
    /// Header columns with no matching property
    pub missing_properties: Vec<String>,
}

impl fmt::Display for MissingColumnsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Spreadsheet columns do not match the configured properties.")?;
        if !self.missing_headers.is_empty() {
            write!(
                f,
                " No column found for properties: {}.",
                self.missing_headers.join(", ")
            )?;
        }
        if !self.missing_properties.is_empty() {
            write!(
                f,
                " No property found for columns: {}.",
                self.missing_properties.join(", ")
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// Mapping Error
// ============================================================================

/// Unified error type for mapping operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    /// Malformed builder usage; never subject to the exception strategy
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Header row and properties disagree
    #[error(transparent)]
    MissingColumns(#[from] MissingColumnsError),

    #[error(transparent)]
    Cell(#[from] CellError),

    #[error(transparent)]
    Row(#[from] RowError),

    #[error(transparent)]
    Sheet(#[from] SheetError),

    /// Every validation error of a read, in discovery order
    #[error("{} error(s) while reading sheet", .0.len())]
    Aggregate(Vec<MappingError>),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Decoder failure (unreadable workbook, corrupt sheet)
    #[error("Source error: {0}")]
    Source(String),

    /// The record accessor rejected a value
    #[error("Property '{property}' rejected value: {message}")]
    Access { property: String, message: String },
}

impl MappingError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Cell, row and sheet errors are subject to the exception strategy
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Cell(_) | Self::Row(_) | Self::Sheet(_))
    }

    /// Inner errors of an aggregate, or the error itself
    pub fn errors(&self) -> Vec<&MappingError> {
        match self {
            Self::Aggregate(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }

    /// Get the cell error, if this is one
    pub fn as_cell(&self) -> Option<&CellError> {
        match self {
            Self::Cell(e) => Some(e),
            _ => None,
        }
    }

    /// Get the row error, if this is one
    pub fn as_row(&self) -> Option<&RowError> {
        match self {
            Self::Row(e) => Some(e),
            _ => None,
        }
    }

    /// Get the sheet error, if this is one
    pub fn as_sheet(&self) -> Option<&SheetError> {
        match self {
            Self::Sheet(e) => Some(e),
            _ => None,
        }
    }
}
