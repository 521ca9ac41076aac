//! Record construction and field access
//!
//! The mapping engine never touches concrete record types directly. It
//! constructs records, writes fields by name and reads them back (for
//! uniqueness checks) through [`SheetRecord`]. Implementations are normally
//! generated with [`sheet_record!`](crate::sheet_record); enums used as
//! field types come from [`sheet_enum!`](crate::sheet_enum).
//!
//! Collection-valued fields receive a single [`FieldValue::List`] or
//! [`FieldValue::Map`] assembled by the row mapper.
//!
//! # Example
//!
//! ```rust
//! use ouroboros_sheet_mapper::{sheet_enum, sheet_record, FieldValue, SheetRecord};
//!
//! sheet_enum! {
//!     pub enum Grade { Low = 0, High = 1 }
//! }
//!
//! sheet_record! {
//!     #[derive(Debug, Clone, PartialEq)]
//!     pub struct Sample {
//!         pub name: String,
//!         pub grade: Option<Grade>,
//!     }
//! }
//!
//! let mut sample = Sample::construct();
//! sample.set_field("grade", FieldValue::Enum("High".to_string())).unwrap();
//! assert_eq!(sample.grade, Some(Grade::High));
//! assert_eq!(Sample::fields().len(), 2);
//! ```

use crate::value::{EnumType, FieldValue, ScalarTarget, ScalarType, TargetType};
use chrono::NaiveDateTime;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

// ============================================================================
// Field Specs and Access Errors
// ============================================================================

/// A declared bindable member of a record type
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub target: TargetType,
}

impl FieldSpec {
    pub fn new(name: &'static str, target: TargetType) -> Self {
        Self { name, target }
    }
}

/// The record rejected a field write
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot set '{field}': {message}")]
pub struct AccessError {
    pub field: String,
    pub message: String,
}

impl AccessError {
    /// Create an access error for a field
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create the error for a field the record does not declare
    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self::new(field, "no such field")
    }
}

// ============================================================================
// Record Trait
// ============================================================================

/// Record type the mapper can build from a spreadsheet row
pub trait SheetRecord: Default {
    /// Bindable fields in declaration order
    fn fields() -> Vec<FieldSpec>;

    /// Write a coerced value into the named field
    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), AccessError>;

    /// Read the named field back, `None` for unknown names
    fn get_field(&self, name: &str) -> Option<FieldValue>;

    /// Default-constructed instance
    fn construct() -> Self {
        Self::default()
    }
}

// ============================================================================
// Field Kinds
// ============================================================================

/// Scalar Rust types that can back a record field
pub trait ScalarKind: Sized + Default {
    fn scalar_type() -> ScalarType;

    fn from_scalar(value: FieldValue) -> Result<Self, String>;

    fn to_scalar(&self) -> FieldValue;
}

/// Any Rust type that can back a record field: scalars, `Option`s of
/// scalars, `Vec`s and string-keyed maps of scalars.
pub trait FieldKind: Sized {
    fn target() -> TargetType;

    fn from_field_value(value: FieldValue) -> Result<Self, String>;

    fn to_field_value(&self) -> FieldValue;
}

/// Enums generated by [`sheet_enum!`](crate::sheet_enum)
pub trait SheetEnum: Sized + Copy {
    fn enum_type() -> EnumType;

    fn from_member(name: &str) -> Option<Self>;

    fn member_name(&self) -> &'static str;
}

fn mismatch(expected: &str, value: &FieldValue) -> String {
    format!("expected {}, got {}", expected, value.type_name())
}

impl ScalarKind for String {
    fn scalar_type() -> ScalarType {
        ScalarType::String
    }

    fn from_scalar(value: FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::String(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }

    fn to_scalar(&self) -> FieldValue {
        FieldValue::String(self.clone())
    }
}

impl ScalarKind for i32 {
    fn scalar_type() -> ScalarType {
        ScalarType::Int
    }

    fn from_scalar(value: FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Int(i) => {
                i32::try_from(i).map_err(|_| format!("{} is out of range for int", i))
            }
            other => Err(mismatch("integer", &other)),
        }
    }

    fn to_scalar(&self) -> FieldValue {
        FieldValue::Int(i64::from(*self))
    }
}

impl ScalarKind for i64 {
    fn scalar_type() -> ScalarType {
        ScalarType::Long
    }

    fn from_scalar(value: FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Int(i) => Ok(i),
            other => Err(mismatch("integer", &other)),
        }
    }

    fn to_scalar(&self) -> FieldValue {
        FieldValue::Int(*self)
    }
}

impl ScalarKind for f64 {
    fn scalar_type() -> ScalarType {
        ScalarType::Float
    }

    fn from_scalar(value: FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Float(f) => Ok(f),
            FieldValue::Int(i) => Ok(i as f64),
            FieldValue::Decimal(d) => d.to_f64().ok_or_else(|| format!("{} does not fit a float", d)),
            other => Err(mismatch("float", &other)),
        }
    }

    fn to_scalar(&self) -> FieldValue {
        FieldValue::Float(*self)
    }
}

impl ScalarKind for Decimal {
    fn scalar_type() -> ScalarType {
        ScalarType::Decimal
    }

    fn from_scalar(value: FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Decimal(d) => Ok(d),
            FieldValue::Int(i) => Ok(Decimal::from(i)),
            FieldValue::Float(f) => {
                Decimal::from_f64(f).ok_or_else(|| format!("{} does not fit a decimal", f))
            }
            other => Err(mismatch("decimal", &other)),
        }
    }

    fn to_scalar(&self) -> FieldValue {
        FieldValue::Decimal(*self)
    }
}

impl ScalarKind for bool {
    fn scalar_type() -> ScalarType {
        ScalarType::Bool
    }

    fn from_scalar(value: FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Bool(b) => Ok(b),
            other => Err(mismatch("boolean", &other)),
        }
    }

    fn to_scalar(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }
}

impl ScalarKind for NaiveDateTime {
    fn scalar_type() -> ScalarType {
        ScalarType::DateTime
    }

    fn from_scalar(value: FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::DateTime(dt) => Ok(dt),
            other => Err(mismatch("datetime", &other)),
        }
    }

    fn to_scalar(&self) -> FieldValue {
        FieldValue::DateTime(*self)
    }
}

// Shared conversions used by the generated `FieldKind` impls.

#[doc(hidden)]
pub fn scalar_target<T: ScalarKind>(nullable: bool) -> ScalarTarget {
    ScalarTarget::new(T::scalar_type(), nullable)
}

#[doc(hidden)]
pub fn scalar_from<T: ScalarKind>(value: FieldValue) -> Result<T, String> {
    match value {
        FieldValue::Null => Ok(T::default()),
        other => T::from_scalar(other),
    }
}

#[doc(hidden)]
pub fn optional_from<T: ScalarKind>(value: FieldValue) -> Result<Option<T>, String> {
    match value {
        FieldValue::Null => Ok(None),
        other => T::from_scalar(other).map(Some),
    }
}

#[doc(hidden)]
pub fn list_from<T: ScalarKind>(value: FieldValue) -> Result<Vec<T>, String> {
    match value {
        FieldValue::Null => Ok(Vec::new()),
        FieldValue::List(items) => items.into_iter().map(scalar_from).collect(),
        other => Err(mismatch("list", &other)),
    }
}

#[doc(hidden)]
pub fn entries_from<T: ScalarKind>(value: FieldValue) -> Result<Vec<(String, T)>, String> {
    match value {
        FieldValue::Null => Ok(Vec::new()),
        FieldValue::Map(entries) => entries
            .into_iter()
            .map(|(key, value)| scalar_from(value).map(|v| (key, v)))
            .collect(),
        other => Err(mismatch("map", &other)),
    }
}

#[doc(hidden)]
pub fn optional_to<T: ScalarKind>(value: &Option<T>) -> FieldValue {
    value.as_ref().map(T::to_scalar).unwrap_or(FieldValue::Null)
}

#[doc(hidden)]
pub fn list_to<T: ScalarKind>(items: &[T]) -> FieldValue {
    FieldValue::List(items.iter().map(T::to_scalar).collect())
}

#[doc(hidden)]
pub fn hash_map_to<T: ScalarKind>(entries: &HashMap<String, T>) -> FieldValue {
    let mut entries: Vec<(String, FieldValue)> = entries
        .iter()
        .map(|(key, value)| (key.clone(), value.to_scalar()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    FieldValue::Map(entries)
}

#[doc(hidden)]
pub fn btree_map_to<T: ScalarKind>(entries: &BTreeMap<String, T>) -> FieldValue {
    FieldValue::Map(
        entries
            .iter()
            .map(|(key, value)| (key.clone(), value.to_scalar()))
            .collect(),
    )
}

impl<T: ScalarKind> FieldKind for Option<T> {
    fn target() -> TargetType {
        TargetType::Scalar(scalar_target::<T>(true))
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        optional_from(value)
    }

    fn to_field_value(&self) -> FieldValue {
        optional_to(self)
    }
}

impl<T: ScalarKind> FieldKind for Vec<T> {
    fn target() -> TargetType {
        TargetType::List(scalar_target::<T>(false))
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        list_from(value)
    }

    fn to_field_value(&self) -> FieldValue {
        list_to(self)
    }
}

impl<T: ScalarKind> FieldKind for HashMap<String, T> {
    fn target() -> TargetType {
        TargetType::Map(scalar_target::<T>(false))
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        entries_from(value).map(|entries| entries.into_iter().collect())
    }

    fn to_field_value(&self) -> FieldValue {
        hash_map_to(self)
    }
}

impl<T: ScalarKind> FieldKind for BTreeMap<String, T> {
    fn target() -> TargetType {
        TargetType::Map(scalar_target::<T>(false))
    }

    fn from_field_value(value: FieldValue) -> Result<Self, String> {
        entries_from(value).map(|entries| entries.into_iter().collect())
    }

    fn to_field_value(&self) -> FieldValue {
        btree_map_to(self)
    }
}

/// Implements [`FieldKind`] for plain scalar types; wrappers use the
/// generic impls above.
#[doc(hidden)]
#[macro_export]
macro_rules! __impl_field_kind {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::record::FieldKind for $ty {
                fn target() -> $crate::value::TargetType {
                    $crate::value::TargetType::Scalar($crate::record::scalar_target::<$ty>(false))
                }

                fn from_field_value(value: $crate::value::FieldValue) -> ::std::result::Result<Self, String> {
                    $crate::record::scalar_from(value)
                }

                fn to_field_value(&self) -> $crate::value::FieldValue {
                    $crate::record::ScalarKind::to_scalar(self)
                }
            }
        )+
    };
}

__impl_field_kind!(String, i32, i64, f64, Decimal, bool, NaiveDateTime);

// ============================================================================
// Declarative Macros
// ============================================================================

/// Declare an enum usable as a record field type.
///
/// Every variant needs an explicit discriminant; the variant with
/// discriminant `0` (or the first variant) is the zero value assigned to
/// non-nullable fields when the cell is blank.
#[macro_export]
macro_rules! sheet_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident = $value:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant = $value),+
        }

        impl $crate::record::SheetEnum for $name {
            fn enum_type() -> $crate::value::EnumType {
                $crate::value::EnumType::new(
                    stringify!($name),
                    vec![$((stringify!($variant), ($value) as i64)),+],
                )
            }

            fn from_member(name: &str) -> ::std::option::Option<Self> {
                match name {
                    $(stringify!($variant) => ::std::option::Option::Some(Self::$variant),)+
                    _ => ::std::option::Option::None,
                }
            }

            fn member_name(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)+
                }
            }
        }

        impl ::std::default::Default for $name {
            fn default() -> Self {
                let members = [$(Self::$variant),+];
                members
                    .iter()
                    .copied()
                    .find(|member| *member as i64 == 0)
                    .unwrap_or(members[0])
            }
        }

        impl $crate::record::ScalarKind for $name {
            fn scalar_type() -> $crate::value::ScalarType {
                $crate::value::ScalarType::Enum(<Self as $crate::record::SheetEnum>::enum_type())
            }

            fn from_scalar(value: $crate::value::FieldValue) -> ::std::result::Result<Self, String> {
                match value {
                    $crate::value::FieldValue::Enum(member) => {
                        <Self as $crate::record::SheetEnum>::from_member(&member).ok_or_else(|| {
                            format!("'{}' is not a member of {}", member, stringify!($name))
                        })
                    }
                    other => Err(format!("expected enum, got {}", other.type_name())),
                }
            }

            fn to_scalar(&self) -> $crate::value::FieldValue {
                $crate::value::FieldValue::Enum(
                    <Self as $crate::record::SheetEnum>::member_name(self).to_string(),
                )
            }
        }

        $crate::__impl_field_kind!($name);
    };
}

/// Declare a record struct and its [`SheetRecord`] implementation.
///
/// The struct derives `Default` (the default-constructed instance the
/// mapper starts every row from); field order is the declaration order
/// used for positional binding.
#[macro_export]
macro_rules! sheet_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Default)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::record::SheetRecord for $name {
            fn fields() -> ::std::vec::Vec<$crate::record::FieldSpec> {
                vec![$(
                    $crate::record::FieldSpec::new(
                        stringify!($field),
                        <$ty as $crate::record::FieldKind>::target(),
                    )
                ),*]
            }

            fn set_field(
                &mut self,
                name: &str,
                value: $crate::value::FieldValue,
            ) -> ::std::result::Result<(), $crate::record::AccessError> {
                match name {
                    $(
                        stringify!($field) => {
                            self.$field = <$ty as $crate::record::FieldKind>::from_field_value(value)
                                .map_err(|message| $crate::record::AccessError::new(name, message))?;
                            Ok(())
                        }
                    )*
                    _ => Err($crate::record::AccessError::unknown_field(name)),
                }
            }

            fn get_field(&self, name: &str) -> ::std::option::Option<$crate::value::FieldValue> {
                match name {
                    $(
                        stringify!($field) => ::std::option::Option::Some(
                            <$ty as $crate::record::FieldKind>::to_field_value(&self.$field),
                        ),
                    )*
                    _ => ::std::option::Option::None,
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    crate::sheet_enum! {
        enum Colour { Red = 1, Green = 2, Blue = 0 }
    }

    crate::sheet_record! {
        #[derive(Debug, Clone, PartialEq)]
        struct Item {
            code: String,
            count: i32,
            weight: Option<f64>,
            colour: Option<Colour>,
            tags: Vec<String>,
            sizes: HashMap<String, i64>,
        }
    }

    #[test]
    fn test_fields_in_declaration_order() {
        let names: Vec<&str> = Item::fields().iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["code", "count", "weight", "colour", "tags", "sizes"]);
    }

    #[test]
    fn test_field_targets() {
        let fields = Item::fields();
        assert_eq!(
            fields[1].target,
            TargetType::Scalar(ScalarTarget::new(ScalarType::Int, false))
        );
        assert_eq!(
            fields[2].target,
            TargetType::Scalar(ScalarTarget::new(ScalarType::Float, true))
        );
        assert!(matches!(fields[4].target, TargetType::List(_)));
        assert!(matches!(fields[5].target, TargetType::Map(_)));
    }

    #[test]
    fn test_set_and_get_field() {
        let mut item = Item::construct();
        item.set_field("code", FieldValue::from("X-1")).unwrap();
        item.set_field("count", FieldValue::Int(4)).unwrap();
        item.set_field("weight", FieldValue::Float(2.5)).unwrap();
        item.set_field("colour", FieldValue::Enum("Green".to_string())).unwrap();
        item.set_field(
            "tags",
            FieldValue::List(vec![FieldValue::from("a"), FieldValue::from("b")]),
        )
        .unwrap();

        assert_eq!(item.code, "X-1");
        assert_eq!(item.count, 4);
        assert_eq!(item.weight, Some(2.5));
        assert_eq!(item.colour, Some(Colour::Green));
        assert_eq!(item.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(item.get_field("count"), Some(FieldValue::Int(4)));
        assert_eq!(item.get_field("missing"), None);
    }

    #[test]
    fn test_set_null_resets_field() {
        let mut item = Item::construct();
        item.set_field("weight", FieldValue::Float(1.0)).unwrap();
        item.set_field("weight", FieldValue::Null).unwrap();
        assert_eq!(item.weight, None);
        item.set_field("count", FieldValue::Null).unwrap();
        assert_eq!(item.count, 0);
    }

    #[test]
    fn test_set_map_field() {
        let mut item = Item::construct();
        item.set_field(
            "sizes",
            FieldValue::Map(vec![
                ("small".to_string(), FieldValue::Int(1)),
                ("large".to_string(), FieldValue::Int(3)),
            ]),
        )
        .unwrap();
        assert_eq!(item.sizes.get("large"), Some(&3));
        assert_eq!(
            item.get_field("sizes"),
            Some(FieldValue::Map(vec![
                ("large".to_string(), FieldValue::Int(3)),
                ("small".to_string(), FieldValue::Int(1)),
            ]))
        );
    }

    #[test]
    fn test_access_errors() {
        let mut item = Item::construct();
        let err = item.set_field("nope", FieldValue::Null).unwrap_err();
        assert_eq!(err.field, "nope");
        let err = item
            .set_field("count", FieldValue::Int(i64::from(i32::MAX) + 1))
            .unwrap_err();
        assert!(err.message.contains("out of range"));
        assert!(item.set_field("count", FieldValue::from("x")).is_err());
    }

    #[test]
    fn test_enum_default_is_zero_member() {
        assert_eq!(Colour::default(), Colour::Blue);
        let enum_type = Colour::enum_type();
        assert_eq!(enum_type.name, "Colour");
        assert_eq!(enum_type.members.len(), 3);
        assert_eq!(Colour::Red.member_name(), "Red");
    }
}
