//! Sheet driver
//!
//! Selects the sheet, reads the header row, resolves (or reuses) the
//! dispatch table, maps every row of the configured range, applies the
//! blank-row policy and finally the uniqueness checks.
//!
//! # Example
//!
//! ```rust
//! use ouroboros_sheet_mapper::{sheet_record, CellValue, MapperOptions, MemoryWorkbook, SheetReader};
//!
//! sheet_record! {
//!     #[derive(Debug)]
//!     pub struct Person {
//!         pub name: String,
//!         pub age: Option<i32>,
//!     }
//! }
//!
//! let mut workbook = MemoryWorkbook::new().with_sheet(
//!     "People",
//!     vec![
//!         vec!["Name".into(), "Age".into()],
//!         vec!["Ada".into(), 36.0.into()],
//!         vec!["Alan".into(), CellValue::Empty],
//!     ],
//! );
//!
//! let options = MapperOptions::<Person>::defaults().unwrap();
//! let people = SheetReader::new().read(&mut workbook, &options).unwrap();
//! assert_eq!(people.len(), 2);
//! assert_eq!(people[0].age, Some(36));
//! assert_eq!(people[1].age, None);
//! ```

use crate::cache::{DispatchCache, DispatchKey};
use crate::errors::{MappingError, MappingResult, RowError, SheetError};
use crate::header::resolve;
use crate::options::{BlankRowBehaviour, ErrorLog, ExceptionStrategy, MapperOptions};
use crate::record::SheetRecord;
use crate::row::RowMapper;
use crate::source::{SheetCursor, WorkbookSource};
use crate::value::FieldValue;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

// ============================================================================
// Error Sink
// ============================================================================

/// Consumer of validation errors, one per exception strategy
#[derive(Debug)]
pub enum ErrorSink {
    /// Return the first error
    FailFast,
    /// Keep every error; [`finish`](Self::finish) bundles them
    Aggregate(Vec<MappingError>),
    /// Append every error to a caller-owned log
    Collect(ErrorLog),
}

impl ErrorSink {
    /// Create the sink matching the configured exception strategy
    pub fn for_options<T: SheetRecord>(options: &MapperOptions<T>) -> Self {
        match options.settings().exceptions {
            ExceptionStrategy::ThrowOnFirst => Self::FailFast,
            ExceptionStrategy::Aggregate => Self::Aggregate(Vec::new()),
            ExceptionStrategy::Collect => {
                Self::Collect(options.error_log().cloned().unwrap_or_default())
            }
        }
    }

    /// Route one error; `Err` means the read must stop
    pub fn report(&mut self, error: MappingError) -> Result<(), MappingError> {
        match self {
            Self::FailFast => Err(error),
            Self::Aggregate(errors) => {
                warn!(%error, "Validation error");
                errors.push(error);
                Ok(())
            }
            Self::Collect(log) => {
                warn!(%error, "Validation error");
                log.push(error);
                Ok(())
            }
        }
    }

    /// End of read: an aggregate sink fails with every collected error
    pub fn finish(self) -> Result<(), MappingError> {
        match self {
            Self::Aggregate(errors) if !errors.is_empty() => Err(MappingError::Aggregate(errors)),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Sheet Reader
// ============================================================================

/// Reads sheets into records, sharing a dispatch table cache
#[derive(Debug, Clone, Copy)]
pub struct SheetReader<'c> {
    cache: &'c DispatchCache,
}

impl SheetReader<'static> {
    /// Reader backed by the process-wide cache
    pub fn new() -> Self {
        Self {
            cache: DispatchCache::global(),
        }
    }
}

impl Default for SheetReader<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'c> SheetReader<'c> {
    /// Reader backed by a caller-owned cache
    pub fn with_cache(cache: &'c DispatchCache) -> Self {
        Self { cache }
    }

    /// Cache used to store dispatch tables
    pub fn cache(&self) -> &'c DispatchCache {
        self.cache
    }

    /// Read the configured sheet of `workbook`
    pub fn read<T, W>(&self, workbook: &mut W, options: &MapperOptions<T>) -> MappingResult<Vec<T>>
    where
        T: SheetRecord,
        W: WorkbookSource + ?Sized,
    {
        let mut cursor = workbook.open_sheet(&options.settings().sheet)?;
        self.read_cursor(cursor.as_mut(), options)
    }

    /// Read from an already selected sheet
    pub fn read_cursor<T: SheetRecord>(
        &self,
        cursor: &mut dyn SheetCursor,
        options: &MapperOptions<T>,
    ) -> MappingResult<Vec<T>> {
        let settings = options.settings();
        let range = options.row_range();
        debug!(
            record = std::any::type_name::<T>(),
            sheet = %settings.sheet,
            header_row = ?range.header_row,
            start_row = range.start_row,
            end_row = ?range.end_row,
            "Reading sheet"
        );

        let mut pending = None;
        let header = match range.header_row {
            Some(header_row) => {
                let mut labels = Vec::new();
                while let Some(row) = cursor.next_row()? {
                    if row.number < header_row {
                        continue;
                    }
                    if row.number == header_row {
                        labels = row.header_labels();
                    } else {
                        pending = Some(row);
                    }
                    break;
                }
                Some(labels)
            }
            None => None,
        };

        if let (Some(labels), Some(callback)) = (&header, options.header_callback()) {
            callback(labels.as_slice());
        }

        let table = self.cache.get_or_resolve(DispatchKey::new(options, header.as_deref()), || {
            resolve(options.fields(), settings, header.as_deref())
        })?;
        let mapper = RowMapper::new(options, &table);
        let mut sink = ErrorSink::for_options(options);
        let mut records: Vec<(u32, T)> = Vec::new();
        let mut previous = range.start_row - 1;

        'rows: loop {
            let row = match pending.take() {
                Some(row) => row,
                None => match cursor.next_row()? {
                    Some(row) => row,
                    None => break,
                },
            };
            if row.number < range.start_row {
                continue;
            }

            // rows the cursor skipped are blank
            let gap_end = range
                .end_row
                .map_or(row.number, |end| row.number.min(end.saturating_add(1)));
            if settings.blank_rows != BlankRowBehaviour::Ignore {
                for blank in previous + 1..gap_end {
                    match settings.blank_rows {
                        BlankRowBehaviour::ThrowException => {
                            sink.report(blank_row_error(blank, Vec::new()))?
                        }
                        BlankRowBehaviour::StopReading => break 'rows,
                        BlankRowBehaviour::CreateEntity => records.push((blank, T::construct())),
                        BlankRowBehaviour::Ignore => {}
                    }
                }
            }

            if !range.contains(row.number) {
                break;
            }
            previous = row.number;

            if !mapper.is_populated(&row) {
                trace!(row = row.number, "Blank row");
                match settings.blank_rows {
                    BlankRowBehaviour::Ignore => {}
                    BlankRowBehaviour::ThrowException => {
                        sink.report(blank_row_error(row.number, row.snapshot()))?
                    }
                    BlankRowBehaviour::StopReading => break,
                    BlankRowBehaviour::CreateEntity => records.push((row.number, T::construct())),
                }
                continue;
            }

            let mut record = T::construct();
            if mapper.map_row(&row, &mut record, &mut sink)? {
                records.push((row.number, record));
            }
        }

        let records = remove_duplicates(options, records, &mut sink)?;
        sink.finish()?;
        debug!(
            record = std::any::type_name::<T>(),
            records = records.len(),
            "Finished reading sheet"
        );
        Ok(records)
    }
}

/// Read `workbook` with the process-wide cache
pub fn read_sheet<T, W>(workbook: &mut W, options: &MapperOptions<T>) -> MappingResult<Vec<T>>
where
    T: SheetRecord,
    W: WorkbookSource + ?Sized,
{
    SheetReader::new().read(workbook, options)
}

fn blank_row_error(row: u32, row_values: crate::errors::RowSnapshot) -> MappingError {
    RowError {
        row,
        message: "Blank row".to_string(),
        row_values,
    }
    .into()
}

/// Drop every record sharing a value of a unique field with another one
fn remove_duplicates<T: SheetRecord>(
    options: &MapperOptions<T>,
    records: Vec<(u32, T)>,
    sink: &mut ErrorSink,
) -> MappingResult<Vec<T>> {
    let mut flagged = vec![false; records.len()];

    for field in options.fields().iter().filter(|field| field.needs_accessor()) {
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        let mut values = Vec::with_capacity(records.len());
        for (index, (_, record)) in records.iter().enumerate() {
            let value = record.get_field(&field.name).unwrap_or(FieldValue::Null);
            if !value.is_null() {
                groups.entry(value.unique_key()).or_default().push(index);
            }
            values.push(value);
        }

        let mut duplicates: Vec<usize> = groups
            .into_values()
            .filter(|members| members.len() > 1)
            .flatten()
            .collect();
        if duplicates.is_empty() {
            continue;
        }
        duplicates.sort_unstable();
        for &index in &duplicates {
            flagged[index] = true;
        }
        sink.report(
            SheetError::duplicates(
                field.name.clone(),
                duplicates.iter().map(|&i| values[i].clone()).collect(),
                duplicates.iter().map(|&i| records[i].0).collect(),
            )
            .into(),
        )?;
    }

    Ok(records
        .into_iter()
        .zip(flagged)
        .filter(|(_, flagged)| !flagged)
        .map(|((_, record), _)| record)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::BufferedCursor;
    use crate::value::CellValue;

    crate::sheet_record! {
        #[derive(Debug, Clone, PartialEq)]
        struct Entry {
            code: String,
            amount: Option<f64>,
        }
    }

    fn cursor(rows: Vec<Vec<CellValue>>) -> BufferedCursor {
        BufferedCursor::from_grid(1, 0, rows)
    }

    fn sheet() -> Vec<Vec<CellValue>> {
        vec![
            vec!["Code".into(), "Amount".into()],
            vec!["a".into(), 1.0.into()],
            vec![],
            vec!["b".into(), 2.0.into()],
        ]
    }

    #[test]
    fn test_sink_strategies() {
        let err = MappingError::from(RowError {
            row: 1,
            message: "x".to_string(),
            row_values: Vec::new(),
        });
        assert!(ErrorSink::FailFast.report(err.clone()).is_err());

        let mut sink = ErrorSink::Aggregate(Vec::new());
        sink.report(err.clone()).unwrap();
        assert!(matches!(sink.finish(), Err(MappingError::Aggregate(errors)) if errors.len() == 1));

        let log = ErrorLog::new();
        let mut sink = ErrorSink::Collect(log.clone());
        sink.report(err).unwrap();
        assert!(sink.finish().is_ok());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_gap_rows_ignored_by_default() {
        let cache = DispatchCache::new();
        let options = MapperOptions::<Entry>::defaults().unwrap();
        let entries = SheetReader::with_cache(&cache)
            .read_cursor(&mut cursor(sheet()), &options)
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].code, "b");
    }

    #[test]
    fn test_gap_rows_stop_reading() {
        let cache = DispatchCache::new();
        let options = MapperOptions::<Entry>::builder()
            .blank_row_behaviour(BlankRowBehaviour::StopReading)
            .build()
            .unwrap();
        let entries = SheetReader::with_cache(&cache)
            .read_cursor(&mut cursor(sheet()), &options)
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_unmapped_only_row_stops_reading() {
        let cache = DispatchCache::new();
        let options = MapperOptions::<Entry>::builder()
            .ignore_columns_without_matching_properties(true)
            .blank_row_behaviour(BlankRowBehaviour::StopReading)
            .build()
            .unwrap();
        let rows = vec![
            vec!["Code".into(), "Amount".into(), "Comment".into()],
            vec!["a".into(), 1.0.into(), "first".into()],
            vec!["b".into(), CellValue::Empty, CellValue::Empty],
            vec![CellValue::Empty, CellValue::Empty, "no data".into()],
            vec!["c".into(), 3.0.into()],
        ];
        let entries = SheetReader::with_cache(&cache)
            .read_cursor(&mut cursor(rows), &options)
            .unwrap();
        let codes: Vec<&str> = entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["a", "b"]);
    }

    #[test]
    fn test_last_possible_end_row() {
        let cache = DispatchCache::new();
        let options = MapperOptions::<Entry>::builder()
            .ending_with_row(u32::MAX)
            .blank_row_behaviour(BlankRowBehaviour::CreateEntity)
            .build()
            .unwrap();
        let entries = SheetReader::with_cache(&cache)
            .read_cursor(&mut cursor(sheet()), &options)
            .unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_gap_rows_create_entity() {
        let cache = DispatchCache::new();
        let options = MapperOptions::<Entry>::builder()
            .blank_row_behaviour(BlankRowBehaviour::CreateEntity)
            .build()
            .unwrap();
        let entries = SheetReader::with_cache(&cache)
            .read_cursor(&mut cursor(sheet()), &options)
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1], Entry::default());
    }

    #[test]
    fn test_gap_rows_throw() {
        let cache = DispatchCache::new();
        let options = MapperOptions::<Entry>::builder()
            .blank_row_behaviour(BlankRowBehaviour::ThrowException)
            .build()
            .unwrap();
        let err = SheetReader::with_cache(&cache)
            .read_cursor(&mut cursor(sheet()), &options)
            .unwrap_err();
        assert_eq!(err.as_row().unwrap().row, 3);
        assert_eq!(err.to_string(), "Row 3: Blank row");
    }

    #[test]
    fn test_end_row_stops_reading() {
        let cache = DispatchCache::new();
        let options = MapperOptions::<Entry>::builder()
            .ending_with_row(3)
            .blank_row_behaviour(BlankRowBehaviour::CreateEntity)
            .build()
            .unwrap();
        let entries = SheetReader::with_cache(&cache)
            .read_cursor(&mut cursor(sheet()), &options)
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].code, "a");
    }

    #[test]
    fn test_header_after_skipped_rows() {
        let cache = DispatchCache::new();
        let options = MapperOptions::<Entry>::builder()
            .header_on_row(3)
            .build()
            .unwrap();
        let rows = vec![
            vec!["Report".into()],
            vec![],
            vec!["Code".into(), "Amount".into()],
            vec!["z".into(), "4".into()],
        ];
        let entries = SheetReader::with_cache(&cache)
            .read_cursor(&mut cursor(rows), &options)
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, Some(4.0));
    }
}
