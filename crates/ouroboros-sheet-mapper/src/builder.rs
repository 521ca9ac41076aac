//! Fluent configuration builder
//!
//! ```rust
//! use ouroboros_sheet_mapper::{sheet_record, MapperOptions};
//!
//! sheet_record! {
//!     pub struct Product {
//!         pub code: String,
//!         pub price: f64,
//!     }
//! }
//!
//! let options = MapperOptions::<Product>::builder()
//!     .using_sheet("Products")
//!     .starting_from_row(3)
//!     .property("code")
//!         .is_required()
//!         .should_be_unique()
//!         .and()
//!     .property("price")
//!         .uses_column_named("Unit Price")
//!         .should_be_greater_than(0)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(options.row_range().header_row, Some(2));
//! assert!(options.field("code").unwrap().unique);
//! ```
//!
//! Singular settings follow last-write-wins; validators, required and
//! unique markers accumulate. Unknown properties and conflicting binding
//! modes are rejected by [`OptionsBuilder::build`].

use crate::address::column_index;
use crate::errors::MappingError;
use crate::options::{
    BlankRowBehaviour, ColumnBinding, CustomMapping, ErrorLog, ExceptionStrategy, FieldBinding,
    HeaderCallback, MapperOptions, NumberFormat, ReadSettings, SheetSelector,
};
use crate::record::SheetRecord;
use crate::validators::{
    BoxedValidator, CellValidator, FnValidator, GreaterThan, LessThan, OneOf, Required,
};
use crate::value::{CellValue, FieldValue, ScalarType, TargetType};
use std::marker::PhantomData;
use std::sync::Arc;

// ============================================================================
// Property Configuration
// ============================================================================

#[derive(Default)]
struct PropertyConfig {
    name: String,
    column: Option<ColumnBinding>,
    /// First pair of incompatible binding modes set on this property
    conflict: Option<(&'static str, &'static str)>,
    transform: Option<CustomMapping>,
    validators: Vec<BoxedValidator>,
    required: bool,
    unique: bool,
    optional: bool,
    relaxed_numbers: bool,
}

impl PropertyConfig {
    fn bind(&mut self, binding: ColumnBinding) {
        if let Some(existing) = &self.column {
            if existing.mode() != binding.mode() && self.conflict.is_none() {
                self.conflict = Some((existing.mode(), binding.mode()));
            }
        }
        self.column = Some(binding);
    }
}

// ============================================================================
// Options Builder
// ============================================================================

/// Builder for [`MapperOptions`]
pub struct OptionsBuilder<T: SheetRecord> {
    settings: ReadSettings,
    properties: Vec<PropertyConfig>,
    error_log: Option<ErrorLog>,
    on_header: Option<HeaderCallback>,
    _record: PhantomData<fn() -> T>,
}

impl<T: SheetRecord> Default for OptionsBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SheetRecord> OptionsBuilder<T> {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self {
            settings: ReadSettings::default(),
            properties: Vec::new(),
            error_log: None,
            on_header: None,
            _record: PhantomData,
        }
    }

    /// Replace all plain-data settings at once
    pub fn settings(mut self, settings: ReadSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Read the sheet with this name
    pub fn using_sheet(mut self, name: impl Into<String>) -> Self {
        self.settings.sheet = SheetSelector::Name(name.into());
        self
    }

    /// Read the sheet at this zero-based index
    pub fn using_sheet_index(mut self, index: usize) -> Self {
        self.settings.sheet = SheetSelector::Index(index);
        self
    }

    /// Set the 1-based row holding the column names
    pub fn header_on_row(mut self, row: u32) -> Self {
        self.settings.header_row = Some(row);
        self
    }

    /// Set the first 1-based data row
    pub fn starting_from_row(mut self, row: u32) -> Self {
        self.settings.start_row = Some(row);
        self
    }

    /// Set the last 1-based data row (inclusive)
    pub fn ending_with_row(mut self, row: u32) -> Self {
        self.settings.end_row = Some(row);
        self
    }

    /// Bind by header name (default) or positionally
    pub fn using_header_names(mut self, use_header_names: bool) -> Self {
        self.settings.use_header_names = use_header_names;
        self
    }

    /// Set what happens to rows with no mapped values
    pub fn blank_row_behaviour(mut self, behaviour: BlankRowBehaviour) -> Self {
        self.settings.blank_rows = behaviour;
        self
    }

    /// Fail on the first error
    pub fn throw_on_first_error(mut self) -> Self {
        self.settings.exceptions = ExceptionStrategy::ThrowOnFirst;
        self
    }

    /// Collect every error and fail once at the end with all of them
    pub fn aggregate_exceptions(mut self) -> Self {
        self.settings.exceptions = ExceptionStrategy::Aggregate;
        self
    }

    /// Append every error to `log` instead of failing
    pub fn collect_errors_into(mut self, log: &ErrorLog) -> Self {
        self.settings.exceptions = ExceptionStrategy::Collect;
        self.error_log = Some(log.clone());
        self
    }

    /// Tolerate sheet columns that match no property
    pub fn ignore_columns_without_matching_properties(mut self, ignore: bool) -> Self {
        self.settings.ignore_unmapped_columns = ignore;
        self
    }

    /// Treat properties without `is_required()` as optional
    pub fn all_properties_optional_by_default(mut self, optional: bool) -> Self {
        self.settings.all_properties_optional = optional;
        self
    }

    /// Enable relaxed number matching for every numeric property
    pub fn relaxed_number_matching(mut self, relaxed: bool) -> Self {
        self.settings.relaxed_number_matching = relaxed;
        self
    }

    /// Set the separators used by relaxed number matching
    pub fn number_format(mut self, decimal_separator: char, group_separator: char) -> Self {
        self.settings.number_format = NumberFormat {
            decimal_separator,
            group_separator,
        };
        self
    }

    /// Invoke `callback` once per read with the raw header labels
    pub fn on_reading_header<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.on_header = Some(Arc::new(callback));
        self
    }

    /// Configure one record property
    pub fn property(mut self, name: &str) -> PropertyBuilder<T> {
        let index = match self.properties.iter().position(|p| p.name == name) {
            Some(index) => index,
            None => {
                self.properties.push(PropertyConfig {
                    name: name.to_string(),
                    ..Default::default()
                });
                self.properties.len() - 1
            }
        };
        PropertyBuilder {
            parent: self,
            index,
        }
    }

    /// Validate the configuration and freeze it
    pub fn build(self) -> Result<MapperOptions<T>, MappingError> {
        let rows = self.settings.row_range()?;
        let record = std::any::type_name::<T>();
        let specs = T::fields();

        for property in &self.properties {
            if !specs.iter().any(|spec| spec.name == property.name) {
                return Err(MappingError::configuration(format!(
                    "Unknown property '{}' on {}",
                    property.name, record
                )));
            }
            if let Some((first, second)) = property.conflict {
                return Err(MappingError::configuration(format!(
                    "Property '{}' is bound by {} and by {}; choose one",
                    property.name, first, second
                )));
            }
        }

        let mut fields = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut field = FieldBinding::new(spec.name, spec.target);
            if let Some(property) = self.properties.iter().find(|p| p.name == spec.name) {
                if let Some(column) = &property.column {
                    field.column = column.clone();
                }
                field.transform = property.transform.clone();
                field.validators = property.validators.clone();
                field.required = property.required;
                field.unique = property.unique;
                field.optional = property.optional;
                field.relaxed_numbers = property.relaxed_numbers;
            }
            check_binding(&field)?;
            fields.push(field);
        }

        let error_log = match (self.settings.exceptions, self.error_log) {
            (ExceptionStrategy::Collect, None) => Some(ErrorLog::new()),
            (_, log) => log,
        };

        Ok(MapperOptions {
            settings: self.settings,
            rows,
            fields,
            error_log,
            on_header: self.on_header,
            _record: PhantomData,
        })
    }
}

fn check_binding(field: &FieldBinding) -> Result<(), MappingError> {
    match (&field.column, &field.target) {
        (ColumnBinding::Ignored, _) => Ok(()),
        (ColumnBinding::Columns(_), TargetType::Scalar(_)) => Err(MappingError::configuration(
            format!("Property '{}' is not a list or dictionary", field.name),
        )),
        (ColumnBinding::Columns(columns), _) if columns.is_empty() => Err(
            MappingError::configuration(format!("Property '{}' maps from no columns", field.name)),
        ),
        (ColumnBinding::Columns(_), _) => Ok(()),
        (_, target) if target.is_collection() => Err(MappingError::configuration(format!(
            "Property '{}' is a collection; bind it with map_from_columns",
            field.name
        ))),
        (ColumnBinding::RowNumber, TargetType::Scalar(target))
            if !matches!(target.scalar, ScalarType::Int | ScalarType::Long) =>
        {
            Err(MappingError::configuration(format!(
                "Property '{}' must be an integer to hold the row number",
                field.name
            )))
        }
        _ => Ok(()),
    }
}

// ============================================================================
// Property Builder
// ============================================================================

/// Scoped configurator for one property; [`and`](Self::and) returns to the
/// parent builder
pub struct PropertyBuilder<T: SheetRecord> {
    parent: OptionsBuilder<T>,
    index: usize,
}

impl<T: SheetRecord> PropertyBuilder<T> {
    fn config(&mut self) -> &mut PropertyConfig {
        &mut self.parent.properties[self.index]
    }

    fn validator(mut self, validator: impl CellValidator + 'static) -> Self {
        self.config().validators.push(Arc::new(validator));
        self
    }

    fn bind(mut self, binding: ColumnBinding) -> Self {
        self.config().bind(binding);
        self
    }

    /// Fail rows where this property has no value
    pub fn is_required(mut self) -> Self {
        self.config().required = true;
        self.validator(Required::new())
    }

    /// Strictly greater than `bound`
    pub fn should_be_greater_than(self, bound: impl Into<f64>) -> Self {
        self.validator(GreaterThan::new(bound.into()))
    }

    /// Strictly less than `bound`
    pub fn should_be_less_than(self, bound: impl Into<f64>) -> Self {
        self.validator(LessThan::new(bound.into()))
    }

    /// Accept only the given values
    pub fn should_be_one_of<I, V>(self, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        self.validator(OneOf::new(allowed.into_iter().map(Into::into).collect()))
    }

    /// Predicate over the coerced value; `message` is reported on failure
    pub fn uses_custom_validator<F>(self, message: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&FieldValue) -> bool + Send + Sync + 'static,
    {
        self.validator(FnValidator::new(message, predicate))
    }

    /// Bind to the header cell with this name
    pub fn uses_column_named(self, name: impl Into<String>) -> Self {
        self.bind(ColumnBinding::Name(name.into()))
    }

    /// Fixed 1-based column number
    pub fn uses_column_number(self, number: u32) -> Result<Self, MappingError> {
        if number < 1 {
            return Err(MappingError::configuration(format!(
                "Column number for property '{}' must be at least 1",
                self.parent.properties[self.index].name
            )));
        }
        Ok(self.bind(ColumnBinding::Number(number)))
    }

    /// Fixed column by letter ("A", "AB")
    pub fn uses_column_letter(self, letter: &str) -> Result<Self, MappingError> {
        match column_index(letter) {
            Some(index) => Ok(self.bind(ColumnBinding::Number(index + 1))),
            None => Err(MappingError::configuration(format!(
                "'{}' is not a column letter (property '{}')",
                letter, self.parent.properties[self.index].name
            ))),
        }
    }

    /// Populate a list or dictionary from several columns, in this order
    pub fn map_from_columns<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bind(ColumnBinding::Columns(
            columns.into_iter().map(Into::into).collect(),
        ))
    }

    /// Replace default coercion with `transform`
    pub fn uses_custom_mapping<F>(mut self, transform: F) -> Self
    where
        F: Fn(&CellValue) -> Result<FieldValue, String> + Send + Sync + 'static,
    {
        self.config().transform = Some(Arc::new(transform));
        self
    }

    /// Reject duplicate values across the sheet
    pub fn should_be_unique(mut self) -> Self {
        self.config().unique = true;
        self
    }

    /// Leave the property unbound
    pub fn ignore(self) -> Self {
        self.bind(ColumnBinding::Ignored)
    }

    /// Fill the property with the 1-based spreadsheet row number
    pub fn maps_to_row_number(self) -> Self {
        self.bind(ColumnBinding::RowNumber)
    }

    /// The property's column may be absent from the header row
    pub fn optional(mut self) -> Self {
        self.config().optional = true;
        self
    }

    /// Enable relaxed number matching for this property only
    pub fn uses_relaxed_number_matching(mut self) -> Self {
        self.config().relaxed_numbers = true;
        self
    }

    /// Return to the parent builder
    pub fn and(self) -> OptionsBuilder<T> {
        self.parent
    }

    /// Start configuring another property
    pub fn property(self, name: &str) -> PropertyBuilder<T> {
        self.parent.property(name)
    }

    /// Finish configuration and validate it
    pub fn build(self) -> Result<MapperOptions<T>, MappingError> {
        self.parent.build()
    }
}
