//! Mapper configuration
//!
//! [`ReadSettings`] holds the plain-data part of a configuration (sheet,
//! rows, policies) and can be loaded from JSON/YAML with the `serde`
//! feature. [`MapperOptions`] adds the per-property bindings and is built
//! with [`OptionsBuilder`](crate::builder::OptionsBuilder).

use crate::coercion::CoercionOptions;
use crate::errors::MappingError;
use crate::record::SheetRecord;
use crate::validators::BoxedValidator;
use crate::value::{CellValue, FieldValue, TargetType};
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

// ============================================================================
// Policies
// ============================================================================

/// Which sheet of the workbook to read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SheetSelector {
    /// Zero-based sheet index
    Index(usize),
    /// Sheet name
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        Self::Index(0)
    }
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{}", index),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// What to do with rows that contribute no mapped value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BlankRowBehaviour {
    /// Skip blank rows (default)
    #[default]
    Ignore,
    /// Report a row error for every blank row
    ThrowException,
    /// Stop at the first blank row and return what was read
    StopReading,
    /// Emit a default-constructed record for every blank row
    CreateEntity,
}

/// How validation errors are surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ExceptionStrategy {
    /// The first error aborts the read (default)
    #[default]
    ThrowOnFirst,
    /// Collect every error, fail once at the end with all of them
    Aggregate,
    /// Append every error to an [`ErrorLog`] and return the valid records
    Collect,
}

/// Separators used when extracting numbers from text cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NumberFormat {
    pub decimal_separator: char,
    pub group_separator: char,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            group_separator: ',',
        }
    }
}

// ============================================================================
// Read Settings
// ============================================================================

/// Plain-data read configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReadSettings {
    /// Sheet to read
    pub sheet: SheetSelector,
    /// 1-based header row (derived from the start row when unset)
    pub header_row: Option<u32>,
    /// 1-based first data row (derived from the header row when unset)
    pub start_row: Option<u32>,
    /// 1-based last data row, inclusive
    pub end_row: Option<u32>,
    /// Bind columns by header name; positional binding when false
    pub use_header_names: bool,
    pub blank_rows: BlankRowBehaviour,
    pub exceptions: ExceptionStrategy,
    /// Tolerate header columns without a matching property
    pub ignore_unmapped_columns: bool,
    /// Treat every property as optional unless marked required
    pub all_properties_optional: bool,
    /// Relaxed numeric matching for every numeric property
    pub relaxed_number_matching: bool,
    pub number_format: NumberFormat,
}

impl Default for ReadSettings {
    fn default() -> Self {
        Self {
            sheet: SheetSelector::default(),
            header_row: None,
            start_row: None,
            end_row: None,
            use_header_names: true,
            blank_rows: BlankRowBehaviour::default(),
            exceptions: ExceptionStrategy::default(),
            ignore_unmapped_columns: false,
            all_properties_optional: false,
            relaxed_number_matching: false,
            number_format: NumberFormat::default(),
        }
    }
}

/// Resolved row layout of a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    /// `None` when header names are not used
    pub header_row: Option<u32>,
    pub start_row: u32,
    pub end_row: Option<u32>,
}

impl RowRange {
    /// Check if a 1-based row number lies in the data range
    pub fn contains(&self, row: u32) -> bool {
        row >= self.start_row && self.end_row.map_or(true, |end| row <= end)
    }
}

impl ReadSettings {
    /// Apply row defaults and check the row invariants
    pub fn row_range(&self) -> Result<RowRange, MappingError> {
        if self.start_row == Some(0) || self.header_row == Some(0) || self.end_row == Some(0) {
            return Err(MappingError::configuration("Row numbers are 1-based"));
        }

        let (header_row, start_row) = if self.use_header_names {
            let (header, start) = match (self.header_row, self.start_row) {
                (Some(header), Some(start)) => (header, start),
                (Some(header), None) => (header, header.saturating_add(1)),
                (None, Some(start)) => (start.saturating_sub(1), start),
                (None, None) => (1, 2),
            };
            if header == 0 {
                return Err(MappingError::configuration(format!(
                    "Start row {} leaves no room for a header row",
                    start
                )));
            }
            if header >= start {
                return Err(MappingError::configuration(format!(
                    "Header row {} must come before start row {}",
                    header, start
                )));
            }
            (Some(header), start)
        } else {
            (None, self.start_row.unwrap_or(1))
        };

        if let Some(end) = self.end_row {
            if end < start_row {
                return Err(MappingError::configuration(format!(
                    "End row {} is before start row {}",
                    end, start_row
                )));
            }
        }

        Ok(RowRange {
            header_row,
            start_row,
            end_row: self.end_row,
        })
    }
}

// ============================================================================
// Error Log
// ============================================================================

/// Caller-owned list receiving every error under [`ExceptionStrategy::Collect`]
#[derive(Clone, Default)]
pub struct ErrorLog {
    errors: Arc<Mutex<Vec<MappingError>>>,
}

impl ErrorLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, error: MappingError) {
        self.errors.lock().push(error);
    }

    /// Number of recorded errors
    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    /// Check if no errors were recorded
    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    /// Copy of the recorded errors, in discovery order
    pub fn errors(&self) -> Vec<MappingError> {
        self.errors.lock().clone()
    }

    /// Drain the recorded errors
    pub fn take(&self) -> Vec<MappingError> {
        std::mem::take(&mut *self.errors.lock())
    }

    /// Remove every recorded error
    pub fn clear(&self) {
        self.errors.lock().clear();
    }
}

impl fmt::Debug for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorLog").field("len", &self.len()).finish()
    }
}

// ============================================================================
// Field Bindings
// ============================================================================

/// Custom raw-value transform replacing default coercion
pub type CustomMapping = Arc<dyn Fn(&CellValue) -> Result<FieldValue, String> + Send + Sync>;

/// Callback receiving the raw header row
pub type HeaderCallback = Arc<dyn Fn(&[String]) + Send + Sync>;

/// Where a property takes its value from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnBinding {
    /// Column whose header normalizes to this name
    Name(String),
    /// Fixed 1-based column number
    Number(u32),
    /// Several columns jointly populating a list or dictionary
    Columns(Vec<String>),
    /// The 1-based spreadsheet row number
    RowNumber,
    /// Not bound
    Ignored,
}

impl ColumnBinding {
    pub(crate) fn mode(&self) -> &'static str {
        match self {
            Self::Name(_) => "column name",
            Self::Number(_) => "column number",
            Self::Columns(_) => "multiple columns",
            Self::RowNumber => "row number",
            Self::Ignored => "ignored",
        }
    }
}

/// Configured relationship between one record property and the sheet
#[derive(Clone)]
pub struct FieldBinding {
    pub name: String,
    pub target: TargetType,
    pub column: ColumnBinding,
    pub transform: Option<CustomMapping>,
    pub validators: Vec<BoxedValidator>,
    pub required: bool,
    pub unique: bool,
    pub optional: bool,
    pub relaxed_numbers: bool,
}

impl FieldBinding {
    pub(crate) fn new(name: &str, target: TargetType) -> Self {
        Self {
            name: name.to_string(),
            target,
            column: ColumnBinding::Name(name.to_string()),
            transform: None,
            validators: Vec::new(),
            required: false,
            unique: false,
            optional: false,
            relaxed_numbers: false,
        }
    }

    /// Bound to at least one spreadsheet column
    pub fn is_column_bound(&self) -> bool {
        !matches!(self.column, ColumnBinding::RowNumber | ColumnBinding::Ignored)
    }

    /// Uniqueness checks read the value back from finished records
    pub fn needs_accessor(&self) -> bool {
        self.unique
    }

    /// May be absent from the header row
    pub fn is_optional(&self, settings: &ReadSettings) -> bool {
        self.optional || (settings.all_properties_optional && !self.required)
    }

    pub(crate) fn coercion(&self, settings: &ReadSettings) -> CoercionOptions {
        CoercionOptions {
            relaxed_numbers: self.relaxed_numbers || settings.relaxed_number_matching,
            number_format: settings.number_format,
        }
    }
}

impl fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .field("target", &self.target.type_name())
            .field("column", &self.column)
            .field("custom_mapping", &self.transform.is_some())
            .field("validators", &self.validators.len())
            .field("required", &self.required)
            .field("unique", &self.unique)
            .field("optional", &self.optional)
            .finish()
    }
}

// ============================================================================
// Mapper Options
// ============================================================================

/// Immutable configuration for mapping rows into `T`
pub struct MapperOptions<T: SheetRecord> {
    pub(crate) settings: ReadSettings,
    pub(crate) rows: RowRange,
    pub(crate) fields: Vec<FieldBinding>,
    pub(crate) error_log: Option<ErrorLog>,
    pub(crate) on_header: Option<HeaderCallback>,
    pub(crate) _record: PhantomData<fn() -> T>,
}

impl<T: SheetRecord> MapperOptions<T> {
    /// Start building options for `T`
    pub fn builder() -> crate::builder::OptionsBuilder<T> {
        crate::builder::OptionsBuilder::new()
    }

    /// Options with every setting at its default
    pub fn defaults() -> Result<Self, MappingError> {
        Self::builder().build()
    }

    /// Raw read settings
    pub fn settings(&self) -> &ReadSettings {
        &self.settings
    }

    /// Resolved header and data rows
    pub fn row_range(&self) -> RowRange {
        self.rows
    }

    /// Field bindings in declaration order
    pub fn fields(&self) -> &[FieldBinding] {
        &self.fields
    }

    /// Binding for a property by name
    pub fn field(&self, name: &str) -> Option<&FieldBinding> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Log receiving errors under [`ExceptionStrategy::Collect`]
    pub fn error_log(&self) -> Option<&ErrorLog> {
        self.error_log.as_ref()
    }

    pub(crate) fn header_callback(&self) -> Option<&HeaderCallback> {
        self.on_header.as_ref()
    }
}

impl<T: SheetRecord> Clone for MapperOptions<T> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            rows: self.rows,
            fields: self.fields.clone(),
            error_log: self.error_log.clone(),
            on_header: self.on_header.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: SheetRecord> fmt::Debug for MapperOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperOptions")
            .field("record", &std::any::type_name::<T>())
            .field("settings", &self.settings)
            .field("rows", &self.rows)
            .field("fields", &self.fields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ReadSettings::default();
        assert_eq!(settings.sheet, SheetSelector::Index(0));
        assert!(settings.use_header_names);
        assert_eq!(settings.blank_rows, BlankRowBehaviour::Ignore);
        assert_eq!(settings.exceptions, ExceptionStrategy::ThrowOnFirst);
    }

    #[test]
    fn test_row_range_defaults() {
        let range = ReadSettings::default().row_range().unwrap();
        assert_eq!(range.header_row, Some(1));
        assert_eq!(range.start_row, 2);
        assert_eq!(range.end_row, None);

        let headerless = ReadSettings {
            use_header_names: false,
            ..Default::default()
        };
        let range = headerless.row_range().unwrap();
        assert_eq!(range.header_row, None);
        assert_eq!(range.start_row, 1);
    }

    #[test]
    fn test_row_range_derives_header_from_start() {
        let settings = ReadSettings {
            start_row: Some(5),
            ..Default::default()
        };
        assert_eq!(settings.row_range().unwrap().header_row, Some(4));

        let settings = ReadSettings {
            header_row: Some(3),
            ..Default::default()
        };
        assert_eq!(settings.row_range().unwrap().start_row, 4);
    }

    #[test]
    fn test_row_range_rejects_bad_rows() {
        let zero = ReadSettings {
            start_row: Some(0),
            ..Default::default()
        };
        assert!(matches!(zero.row_range(), Err(MappingError::Configuration(_))));

        let no_header_room = ReadSettings {
            start_row: Some(1),
            ..Default::default()
        };
        assert!(no_header_room.row_range().is_err());

        let inverted = ReadSettings {
            header_row: Some(4),
            start_row: Some(2),
            ..Default::default()
        };
        assert!(inverted.row_range().is_err());

        let end_before_start = ReadSettings {
            start_row: Some(10),
            end_row: Some(5),
            ..Default::default()
        };
        assert!(end_before_start.row_range().is_err());

        let last_header = ReadSettings {
            header_row: Some(u32::MAX),
            ..Default::default()
        };
        assert!(matches!(last_header.row_range(), Err(MappingError::Configuration(_))));
    }

    #[test]
    fn test_row_range_contains() {
        let range = RowRange {
            header_row: Some(1),
            start_row: 2,
            end_row: Some(4),
        };
        assert!(!range.contains(1));
        assert!(range.contains(2));
        assert!(range.contains(4));
        assert!(!range.contains(5));
    }

    #[test]
    fn test_error_log_shared() {
        let log = ErrorLog::new();
        let handle = log.clone();
        handle.push(MappingError::configuration("x"));
        assert_eq!(log.len(), 1);
        assert_eq!(log.take().len(), 1);
        assert!(handle.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_settings_from_json() {
        let settings: ReadSettings = serde_json::from_str(
            r#"{
                "sheet": { "name": "Orders" },
                "start_row": 3,
                "blank_rows": "stop_reading",
                "exceptions": "aggregate"
            }"#,
        )
        .unwrap();
        assert_eq!(settings.sheet, SheetSelector::Name("Orders".to_string()));
        assert_eq!(settings.start_row, Some(3));
        assert_eq!(settings.blank_rows, BlankRowBehaviour::StopReading);
        assert_eq!(settings.exceptions, ExceptionStrategy::Aggregate);
        assert!(settings.use_header_names);
    }
}
