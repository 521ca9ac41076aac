//! Value types for spreadsheet mapping
//!
//! `CellValue` is what the sheet decoder hands us, `FieldValue` is what a
//! record field receives after coercion, and `TargetType` describes the
//! shape a record field expects.

use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// CellValue - raw values produced by the sheet decoder
// ============================================================================

/// Raw value of a single spreadsheet cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Absent / empty cell
    #[default]
    Empty,
    /// Text cell
    String(String),
    /// Numeric cell (spreadsheets store every number as a double)
    Number(f64),
    /// Boolean cell
    Bool(bool),
    /// Date-like cell
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Get human-readable type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Bool(_) => "boolean",
            Self::DateTime(_) => "datetime",
        }
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Empty cells and empty strings count as blank
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Stringified form of the cell, as shown in error messages and used
    /// when a text target receives a non-text cell.
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::String(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Bool(b) => b.to_string(),
            Self::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Empty)
    }
}

/// Whole numbers print without a trailing `.0`
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ============================================================================
// FieldValue - coerced values handed to record fields
// ============================================================================

/// Value assigned to a record field after coercion
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// No value
    #[default]
    Null,
    /// Text value
    String(String),
    /// Integer value (32- and 64-bit targets)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Exact decimal value
    Decimal(Decimal),
    /// Boolean value
    Bool(bool),
    /// Date/time value
    DateTime(NaiveDateTime),
    /// Enum member, by its declared name
    Enum(String),
    /// List-valued field, populated from several columns
    List(Vec<FieldValue>),
    /// Dictionary-valued field keyed by column name
    Map(Vec<(String, FieldValue)>),
}

impl FieldValue {
    /// Get human-readable type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Bool(_) => "boolean",
            Self::DateTime(_) => "datetime",
            Self::Enum(_) => "enum",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value, `None` for non-numeric values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Grouping key used by whole-sheet uniqueness checks
    pub(crate) fn unique_key(&self) -> String {
        match self {
            Self::Float(f) => format!("float:{}", f.to_bits()),
            other => format!("{}:{}", other.type_name(), other),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Bool(b) => write!(f, "{}", b),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Self::Enum(name) => f.write_str(name),
            Self::List(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Self::Map(entries) => {
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value))
                    .collect();
                write!(f, "{{{}}}", entries.join(", "))
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

// ============================================================================
// TargetType - what a record field expects
// ============================================================================

/// Scalar type of a record field (or of a collection field's items)
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarType {
    /// Text
    String,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    /// Double precision float
    Float,
    /// Exact decimal
    Decimal,
    /// Boolean
    Bool,
    /// Date/time
    DateTime,
    /// Enumeration
    Enum(EnumType),
}

impl ScalarType {
    /// Get human-readable type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Bool => "boolean",
            Self::DateTime => "datetime",
            Self::Enum(_) => "enum",
        }
    }
}

/// Enum members with their discriminants, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: &'static str,
    pub members: Vec<(&'static str, i64)>,
}

impl EnumType {
    pub fn new(name: &'static str, members: Vec<(&'static str, i64)>) -> Self {
        Self { name, members }
    }

    /// Member with discriminant 0, or the first declared member
    pub fn zero_member(&self) -> Option<&'static str> {
        self.members
            .iter()
            .find(|(_, value)| *value == 0)
            .or_else(|| self.members.first())
            .map(|(name, _)| *name)
    }

    /// Member name for a discriminant
    pub fn member_by_value(&self, value: i64) -> Option<&'static str> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| *name)
    }
}

/// Scalar type plus nullability
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarTarget {
    pub scalar: ScalarType,
    pub nullable: bool,
}

impl ScalarTarget {
    pub fn new(scalar: ScalarType, nullable: bool) -> Self {
        Self { scalar, nullable }
    }
}

/// Shape of a record field
#[derive(Debug, Clone, PartialEq)]
pub enum TargetType {
    /// Single value
    Scalar(ScalarTarget),
    /// List populated from several columns, in declared order
    List(ScalarTarget),
    /// Dictionary populated from several columns, keyed by column name
    Map(ScalarTarget),
}

impl TargetType {
    /// Type of the individual values assigned to this field
    pub fn element(&self) -> &ScalarTarget {
        match self {
            Self::Scalar(t) | Self::List(t) | Self::Map(t) => t,
        }
    }

    /// Check if the field is a list or dictionary
    pub fn is_collection(&self) -> bool {
        !matches!(self, Self::Scalar(_))
    }

    /// Get human-readable type name for error messages
    pub fn type_name(&self) -> String {
        match self {
            Self::Scalar(t) if t.nullable => format!("{}?", t.scalar.type_name()),
            Self::Scalar(t) => t.scalar.type_name().to_string(),
            Self::List(t) => format!("list<{}>", t.scalar.type_name()),
            Self::Map(t) => format!("map<{}>", t.scalar.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_cell_value_type_name() {
        assert_eq!(CellValue::Empty.type_name(), "empty");
        assert_eq!(CellValue::from("x").type_name(), "string");
        assert_eq!(CellValue::from(1.5).type_name(), "number");
        assert_eq!(CellValue::from(true).type_name(), "boolean");
    }

    #[test]
    fn test_cell_value_is_blank() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::from("").is_blank());
        assert!(!CellValue::from(" ").is_blank());
        assert!(!CellValue::from(0).is_blank());
    }

    #[test]
    fn test_cell_value_to_text() {
        assert_eq!(CellValue::from(5).to_text(), "5");
        assert_eq!(CellValue::from(2.5).to_text(), "2.5");
        assert_eq!(CellValue::from(false).to_text(), "false");
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(CellValue::from(dt).to_text(), "2024-03-01 12:30:00");
    }

    #[test]
    fn test_field_value_as_f64() {
        assert_eq!(FieldValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(FieldValue::Decimal(Decimal::new(25, 1)).as_f64(), Some(2.5));
        assert_eq!(FieldValue::from("3").as_f64(), None);
        assert_eq!(FieldValue::Null.as_f64(), None);
    }

    #[test]
    fn test_field_value_display() {
        let list = FieldValue::List(vec![FieldValue::Int(1), FieldValue::Int(2)]);
        assert_eq!(list.to_string(), "[1, 2]");
        let map = FieldValue::Map(vec![("a".to_string(), FieldValue::Bool(true))]);
        assert_eq!(map.to_string(), "{a: true}");
    }

    #[test]
    fn test_unique_key_distinguishes_types() {
        assert_ne!(
            FieldValue::from("1").unique_key(),
            FieldValue::Int(1).unique_key()
        );
        assert_eq!(
            FieldValue::Float(0.5).unique_key(),
            FieldValue::Float(0.5).unique_key()
        );
    }

    #[test]
    fn test_enum_type_zero_member() {
        let with_zero = EnumType::new("Status", vec![("Active", 1), ("Unknown", 0)]);
        assert_eq!(with_zero.zero_member(), Some("Unknown"));
        let without_zero = EnumType::new("Level", vec![("Low", 5), ("High", 9)]);
        assert_eq!(without_zero.zero_member(), Some("Low"));
        assert_eq!(without_zero.member_by_value(9), Some("High"));
    }

    #[test]
    fn test_target_type_name() {
        let target = TargetType::Scalar(ScalarTarget::new(ScalarType::Int, true));
        assert_eq!(target.type_name(), "int?");
        let list = TargetType::List(ScalarTarget::new(ScalarType::String, false));
        assert_eq!(list.type_name(), "list<string>");
        assert!(list.is_collection());
    }
}
