//! Ouroboros Sheet Mapper
//!
//! Maps spreadsheet rows into strongly-typed records.
//!
//! This crate turns the rows of one sheet into a `Vec` of records,
//! handling:
//! - column binding by header name (normalized), by number, by letter, or
//!   positionally when the sheet has no header
//! - default type coercion with relaxed numeric matching
//! - per-cell validators (required, bounds, one-of, custom) and
//!   whole-sheet uniqueness checks
//! - blank-row policies and three exception strategies (fail fast,
//!   aggregate, collect into a log)
//!
//! # Architecture
//!
//! ```text
//! OptionsBuilder ──► MapperOptions ──┐
//!                                    ▼
//! WorkbookSource ──► SheetCursor ──► SheetReader ──► Vec<T>
//!                                    │    ▲
//!                      DispatchCache ◄┘    └── RowMapper (coercion, validators)
//! ```
//!
//! # Features
//!
//! - **Default**: Mapping engine plus an in-memory workbook
//! - **serde**: `Serialize`/`Deserialize` for [`ReadSettings`]
//! - **calamine**: xlsx/xls/ods decoding via `calamine`
//!
//! # Example
//!
//! ```rust
//! use ouroboros_sheet_mapper::{
//!     sheet_record, CellValue, MapperOptions, MappingError, MemoryWorkbook, SheetReader,
//! };
//!
//! sheet_record! {
//!     #[derive(Debug)]
//!     pub struct Stock {
//!         pub sku: String,
//!         pub quantity: i32,
//!     }
//! }
//!
//! let mut workbook = MemoryWorkbook::new().with_sheet(
//!     "Stock",
//!     vec![
//!         vec!["SKU".into(), "Quantity".into()],
//!         vec!["A-1".into(), 4.0.into()],
//!         vec!["A-2".into(), 0.0.into()],
//!     ],
//! );
//!
//! let options = MapperOptions::<Stock>::builder()
//!     .aggregate_exceptions()
//!     .property("quantity")
//!     .should_be_greater_than(0)
//!     .build()
//!     .unwrap();
//!
//! match SheetReader::new().read(&mut workbook, &options) {
//!     Err(MappingError::Aggregate(errors)) => {
//!         assert_eq!(errors.len(), 1);
//!         assert_eq!(errors[0].as_cell().unwrap().column, "B");
//!     }
//!     other => panic!("unexpected result: {:?}", other),
//! }
//! ```

// Public modules
pub mod address;
pub mod builder;
pub mod cache;
pub mod coercion;
pub mod errors;
pub mod header;
pub mod options;
pub mod reader;
pub mod record;
pub mod row;
pub mod source;
pub mod validators;
pub mod value;

// Workbook decoding (feature-gated)
#[cfg(feature = "calamine")]
pub mod calamine;

// Re-export commonly used types
pub use builder::{OptionsBuilder, PropertyBuilder};
pub use cache::{DispatchCache, DispatchKey};
pub use errors::{
    CellError, MappingError, MappingResult, MissingColumnsError, RowError, SheetError,
    ValidationKind,
};
pub use header::{normalize, DispatchTable};
pub use options::{
    BlankRowBehaviour, ColumnBinding, ErrorLog, ExceptionStrategy, FieldBinding, MapperOptions,
    NumberFormat, ReadSettings, SheetSelector,
};
pub use reader::{read_sheet, ErrorSink, SheetReader};
pub use record::{AccessError, FieldKind, FieldSpec, ScalarKind, SheetEnum, SheetRecord};
pub use source::{MemoryWorkbook, SheetCell, SheetCursor, SheetRow, WorkbookSource};
pub use validators::{BoxedValidator, CellValidator};
pub use value::{CellValue, FieldValue, ScalarType, TargetType};

#[cfg(feature = "calamine")]
pub use crate::calamine::CalamineWorkbook;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
