//! Default cell coercion
//!
//! Converts a raw [`CellValue`] into the [`FieldValue`] a record field
//! expects. Only used when the field has no custom mapping.

use crate::header::normalize;
use crate::options::NumberFormat;
use crate::value::{CellValue, EnumType, FieldValue, ScalarTarget, ScalarType};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Tolerance for treating a float as a whole number
pub const WHOLE_NUMBER_TOLERANCE: f64 = f64::EPSILON * 100.0;

/// First run of number-like characters in a text cell
static NUMBER_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-0-9,.]+").unwrap());

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

// ============================================================================
// Coercion Errors
// ============================================================================

/// Why a cell could not be converted
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    #[error("cannot convert {found} '{value}' to {target}")]
    InvalidCast {
        found: &'static str,
        value: String,
        target: &'static str,
    },

    #[error("'{0}' is not a valid boolean")]
    InvalidBool(String),

    #[error("'{value}' is not a member of {enum_name}")]
    InvalidEnum { value: String, enum_name: &'static str },

    #[error("{0} has a fractional part and cannot be stored as an integer")]
    Fractional(f64),

    #[error("{value} is out of range for {target}")]
    OutOfRange { value: String, target: &'static str },

    #[error("no number found in '{0}'")]
    Format(String),
}

fn invalid_cast(value: &CellValue, target: &ScalarType) -> CoercionError {
    CoercionError::InvalidCast {
        found: value.type_name(),
        value: value.to_text(),
        target: target.type_name(),
    }
}

// ============================================================================
// Coercion Options
// ============================================================================

/// Per-field coercion settings
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CoercionOptions {
    /// Extract the first number-like run from text cells for numeric targets
    pub relaxed_numbers: bool,
    /// Separators used by relaxed numeric parsing
    pub number_format: NumberFormat,
}

// ============================================================================
// Public API
// ============================================================================

/// Convert a raw cell value to the target type
pub fn coerce(
    value: &CellValue,
    target: &ScalarTarget,
    options: &CoercionOptions,
) -> Result<FieldValue, CoercionError> {
    if value.is_blank() {
        return coerce_blank(value, target);
    }

    match &target.scalar {
        ScalarType::String => Ok(match value {
            CellValue::String(s) => FieldValue::String(s.clone()),
            other => FieldValue::String(other.to_text()),
        }),
        ScalarType::Int => {
            let n = numeric_source(value, &target.scalar, options)?;
            let whole = whole_number(n)?;
            if whole < i32::MIN as f64 || whole > i32::MAX as f64 {
                return Err(CoercionError::OutOfRange {
                    value: value.to_text(),
                    target: "int",
                });
            }
            Ok(FieldValue::Int(whole as i64))
        }
        ScalarType::Long => {
            let n = numeric_source(value, &target.scalar, options)?;
            let rounded = n.round();
            if rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
                return Err(CoercionError::OutOfRange {
                    value: value.to_text(),
                    target: "long",
                });
            }
            Ok(FieldValue::Int(rounded as i64))
        }
        ScalarType::Float => numeric_source(value, &target.scalar, options).map(FieldValue::Float),
        ScalarType::Decimal => coerce_decimal(value, options),
        ScalarType::Bool => coerce_bool(value, target.nullable),
        ScalarType::DateTime => coerce_datetime(value),
        ScalarType::Enum(enum_type) => coerce_enum(value, enum_type),
    }
}

/// Extract and parse the first number-like run of `text`
pub fn parse_relaxed_number(text: &str, format: &NumberFormat) -> Result<f64, CoercionError> {
    let normalized = relaxed_number_text(text, format)?;
    normalized
        .parse::<f64>()
        .map_err(|_| CoercionError::Format(text.to_string()))
}

// ============================================================================
// Per-type Conversions
// ============================================================================

fn coerce_blank(value: &CellValue, target: &ScalarTarget) -> Result<FieldValue, CoercionError> {
    if target.nullable {
        return Ok(FieldValue::Null);
    }
    match &target.scalar {
        ScalarType::String => Ok(FieldValue::String(String::new())),
        ScalarType::Enum(enum_type) => Ok(enum_type
            .zero_member()
            .map(|member| FieldValue::Enum(member.to_string()))
            .unwrap_or(FieldValue::Null)),
        ScalarType::Bool => Err(CoercionError::InvalidBool("EMPTY STRING".to_string())),
        other => Err(CoercionError::InvalidCast {
            found: value.type_name(),
            value: "EMPTY STRING".to_string(),
            target: other.type_name(),
        }),
    }
}

fn numeric_source(
    value: &CellValue,
    target: &ScalarType,
    options: &CoercionOptions,
) -> Result<f64, CoercionError> {
    match value {
        CellValue::Number(n) => Ok(*n),
        CellValue::String(s) if options.relaxed_numbers => {
            parse_relaxed_number(s, &options.number_format)
        }
        CellValue::String(s) => s.trim().parse::<f64>().map_err(|_| invalid_cast(value, target)),
        other => Err(invalid_cast(other, target)),
    }
}

fn whole_number(n: f64) -> Result<f64, CoercionError> {
    let rounded = n.round();
    if (n - rounded).abs() <= WHOLE_NUMBER_TOLERANCE {
        Ok(rounded)
    } else {
        Err(CoercionError::Fractional(n))
    }
}

fn coerce_decimal(value: &CellValue, options: &CoercionOptions) -> Result<FieldValue, CoercionError> {
    let decimal = match value {
        CellValue::Number(n) => Decimal::from_f64(*n).ok_or_else(|| CoercionError::OutOfRange {
            value: n.to_string(),
            target: "decimal",
        })?,
        CellValue::String(s) if options.relaxed_numbers => {
            let text = relaxed_number_text(s, &options.number_format)?;
            Decimal::from_str(&text).map_err(|_| CoercionError::Format(s.clone()))?
        }
        CellValue::String(s) => {
            let trimmed = s.trim();
            Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .map_err(|_| invalid_cast(value, &ScalarType::Decimal))?
        }
        other => return Err(invalid_cast(other, &ScalarType::Decimal)),
    };
    Ok(FieldValue::Decimal(decimal))
}

fn coerce_bool(value: &CellValue, nullable: bool) -> Result<FieldValue, CoercionError> {
    if let CellValue::Bool(b) = value {
        return Ok(FieldValue::Bool(*b));
    }
    let text = value.to_text().trim().to_lowercase();
    match text.as_str() {
        "1" | "true" | "yes" => Ok(FieldValue::Bool(true)),
        "0" | "false" | "no" => Ok(FieldValue::Bool(false)),
        "" if nullable => Ok(FieldValue::Null),
        "" => Err(CoercionError::InvalidBool("EMPTY STRING".to_string())),
        _ => Err(CoercionError::InvalidBool(value.to_text())),
    }
}

fn coerce_datetime(value: &CellValue) -> Result<FieldValue, CoercionError> {
    match value {
        CellValue::DateTime(dt) => Ok(FieldValue::DateTime(*dt)),
        CellValue::Number(serial) => from_excel_serial(*serial)
            .map(FieldValue::DateTime)
            .ok_or_else(|| invalid_cast(value, &ScalarType::DateTime)),
        CellValue::String(s) => parse_datetime(s.trim())
            .map(FieldValue::DateTime)
            .ok_or_else(|| invalid_cast(value, &ScalarType::DateTime)),
        other => Err(invalid_cast(other, &ScalarType::DateTime)),
    }
}

fn coerce_enum(value: &CellValue, enum_type: &EnumType) -> Result<FieldValue, CoercionError> {
    let unmatched = || CoercionError::InvalidEnum {
        value: value.to_text(),
        enum_name: enum_type.name,
    };
    let member = match value {
        CellValue::Number(n) => {
            if n.fract() != 0.0 {
                return Err(invalid_cast(value, &ScalarType::Enum(enum_type.clone())));
            }
            enum_type.member_by_value(*n as i64)
        }
        CellValue::String(s) => match s.trim().parse::<i64>() {
            Ok(n) => enum_type.member_by_value(n),
            Err(_) => {
                let wanted = normalize(s);
                enum_type
                    .members
                    .iter()
                    .find(|(name, _)| normalize(name) == wanted)
                    .map(|(name, _)| *name)
            }
        },
        other => return Err(invalid_cast(other, &ScalarType::Enum(enum_type.clone()))),
    };
    member
        .map(|name| FieldValue::Enum(name.to_string()))
        .ok_or_else(unmatched)
}

// ============================================================================
// Helpers
// ============================================================================

fn relaxed_number_text(text: &str, format: &NumberFormat) -> Result<String, CoercionError> {
    let run = NUMBER_RUN
        .find(text)
        .ok_or_else(|| CoercionError::Format(text.to_string()))?;
    let normalized: String = run
        .as_str()
        .chars()
        .filter(|c| *c != format.group_separator)
        .map(|c| if c == format.decimal_separator { '.' } else { c })
        .collect();
    if normalized.is_empty() {
        return Err(CoercionError::Format(text.to_string()));
    }
    Ok(normalized)
}

/// Excel serial day number (1900 date system) to a date-time
fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
