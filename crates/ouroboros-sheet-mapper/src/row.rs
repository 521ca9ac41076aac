//! Row mapping
//!
//! Builds one record from one row: coercion (or the custom mapping),
//! validators, collection assembly, missing-required detection and
//! row-number injection. Errors go to the [`ErrorSink`]; under the
//! fail-fast strategy the first one aborts the row.

use crate::address::column_letter;
use crate::coercion::coerce;
use crate::errors::{CellError, MappingError, ValidationKind};
use crate::header::DispatchTable;
use crate::options::{ColumnBinding, FieldBinding, MapperOptions};
use crate::reader::ErrorSink;
use crate::record::SheetRecord;
use crate::source::{SheetCell, SheetRow};
use crate::validators::first_failure;
use crate::value::{CellValue, FieldValue, TargetType};
use std::collections::BTreeMap;
use tracing::trace;

/// Collected items of one list or dictionary field: (position, key, value)
type Collected = Vec<(usize, Option<String>, FieldValue)>;

/// Maps rows of one sheet into records of `T`
pub struct RowMapper<'a, T: SheetRecord> {
    options: &'a MapperOptions<T>,
    table: &'a DispatchTable,
}

impl<'a, T: SheetRecord> RowMapper<'a, T> {
    /// Create a mapper over a resolved dispatch table
    pub fn new(options: &'a MapperOptions<T>, table: &'a DispatchTable) -> Self {
        Self { options, table }
    }

    /// Whether any mapped column of the row holds a non-blank value
    pub fn is_populated(&self, row: &SheetRow) -> bool {
        row.cells
            .iter()
            .any(|cell| self.table.entry(cell.column).is_some() && !cell.value.is_blank())
    }

    /// Populate `record` from `row`; returns whether the row was valid
    pub fn map_row(
        &self,
        row: &SheetRow,
        record: &mut T,
        sink: &mut ErrorSink,
    ) -> Result<bool, MappingError> {
        let fields = self.options.fields();
        let settings = self.options.settings();
        let mut valid = true;
        let mut observed = vec![false; fields.len()];
        let mut required_reported = vec![false; fields.len()];
        let mut collected: BTreeMap<usize, Collected> = BTreeMap::new();

        trace!(row = row.number, cells = row.cells.len(), "Mapping row");

        for cell in &row.cells {
            let Some(entry) = self.table.entry(cell.column) else {
                continue;
            };
            let field = &fields[entry.field];
            observed[entry.field] = true;

            let converted = match &field.transform {
                Some(transform) => transform(&cell.value),
                None => coerce(&cell.value, field.target.element(), &field.coercion(settings))
                    .map_err(|e| e.to_string()),
            };
            let value = match converted {
                Ok(value) => value,
                Err(reason) => {
                    trace!(row = row.number, property = %field.name, %reason, "Cell conversion failed");
                    valid = false;
                    sink.report(cell_error(row, cell, field, "Value is invalid", ValidationKind::InvalidValue))?;
                    continue;
                }
            };

            if let Some(validator) = first_failure(&field.validators, &value) {
                valid = false;
                if validator.kind() == ValidationKind::Required {
                    required_reported[entry.field] = true;
                }
                sink.report(cell_error(row, cell, field, validator.message(), validator.kind()))?;
                continue;
            }

            if field.target.is_collection() {
                collected
                    .entry(entry.field)
                    .or_default()
                    .push((entry.position, entry.key.clone(), value));
            } else if let Err(e) = record.set_field(&field.name, value) {
                valid = false;
                sink.report(cell_error(row, cell, field, &e.message, ValidationKind::InvalidValue))?;
            }
        }

        for (index, mut items) in collected {
            let field = &fields[index];
            items.sort_by_key(|(position, _, _)| *position);
            let value = match field.target {
                TargetType::Map(_) => FieldValue::Map(
                    items
                        .into_iter()
                        .map(|(_, key, value)| (key.unwrap_or_default(), value))
                        .collect(),
                ),
                _ => FieldValue::List(items.into_iter().map(|(_, _, value)| value).collect()),
            };
            if let Err(e) = record.set_field(&field.name, value) {
                valid = false;
                sink.report(self.field_error(row, index, e.message, ValidationKind::InvalidValue))?;
            }
        }

        for (index, field) in fields.iter().enumerate() {
            if field.required && field.is_column_bound() && !observed[index] && !required_reported[index] {
                valid = false;
                sink.report(self.field_error(
                    row,
                    index,
                    "Value is required".to_string(),
                    ValidationKind::Required,
                ))?;
            }
        }

        for field in fields.iter().filter(|f| f.column == ColumnBinding::RowNumber) {
            record
                .set_field(&field.name, FieldValue::Int(i64::from(row.number)))
                .map_err(|e| MappingError::Access {
                    property: field.name.clone(),
                    message: e.message,
                })?;
        }

        Ok(valid)
    }

    /// Error located at a field's mapped column rather than at a cell
    fn field_error(
        &self,
        row: &SheetRow,
        index: usize,
        message: String,
        kind: ValidationKind,
    ) -> MappingError {
        let column = self.table.column_of(index);
        CellError {
            row: row.number,
            column: column.map(column_letter).unwrap_or_default(),
            property: self.options.fields()[index].name.clone(),
            value: column
                .and_then(|c| row.cell(c).cloned())
                .unwrap_or(CellValue::Empty),
            message,
            kind,
            row_values: row.snapshot(),
        }
        .into()
    }
}

fn cell_error(
    row: &SheetRow,
    cell: &SheetCell,
    field: &FieldBinding,
    message: &str,
    kind: ValidationKind,
) -> MappingError {
    CellError {
        row: row.number,
        column: column_letter(cell.column),
        property: field.name.clone(),
        value: cell.value.clone(),
        message: message.to_string(),
        kind,
        row_values: row.snapshot(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::resolve;
    use crate::options::ErrorLog;

    crate::sheet_record! {
        #[derive(Debug, Clone, PartialEq)]
        struct Line {
            sku: String,
            qty: i32,
            price: Option<f64>,
            extras: Vec<String>,
            row: i64,
        }
    }

    fn options() -> MapperOptions<Line> {
        MapperOptions::<Line>::builder()
            .using_header_names(false)
            .property("sku")
            .is_required()
            .property("qty")
            .should_be_greater_than(0)
            .property("extras")
            .map_from_columns(["E", "D"])
            .property("row")
            .maps_to_row_number()
            .build()
            .unwrap()
    }

    fn map(row: SheetRow) -> (Line, bool, Vec<MappingError>) {
        let options = options();
        let table = resolve(options.fields(), options.settings(), None).unwrap();
        let mapper = RowMapper::new(&options, &table);
        let log = ErrorLog::new();
        let mut sink = ErrorSink::Collect(log.clone());
        let mut line = Line::construct();
        let valid = mapper.map_row(&row, &mut line, &mut sink).unwrap();
        (line, valid, log.take())
    }

    #[test]
    fn test_maps_valid_row() {
        let row = SheetRow::new(
            7,
            vec![
                SheetCell::new(0, "A-1"),
                SheetCell::new(1, 3.0),
                SheetCell::new(2, "12.5"),
                SheetCell::new(3, "second"),
                SheetCell::new(4, "first"),
            ],
        );
        let (line, valid, errors) = map(row);
        assert!(valid);
        assert!(errors.is_empty());
        assert_eq!(line.sku, "A-1");
        assert_eq!(line.qty, 3);
        assert_eq!(line.price, Some(12.5));
        assert_eq!(line.extras, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(line.row, 7);
    }

    #[test]
    fn test_invalid_cast_reported() {
        let row = SheetRow::new(3, vec![SheetCell::new(0, "A-1"), SheetCell::new(1, "lots")]);
        let (line, valid, errors) = map(row);
        assert!(!valid);
        assert_eq!(line.qty, 0);
        let err = errors[0].as_cell().unwrap();
        assert_eq!(err.message, "Value is invalid");
        assert_eq!(err.kind, ValidationKind::InvalidValue);
        assert_eq!(err.column, "B");
        assert_eq!(err.row_values.len(), 2);
    }

    #[test]
    fn test_first_failing_validator_reported() {
        let row = SheetRow::new(2, vec![SheetCell::new(0, "A-1"), SheetCell::new(1, 0.0)]);
        let (_, valid, errors) = map(row);
        assert!(!valid);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].as_cell().unwrap().kind, ValidationKind::GreaterThan);
    }

    #[test]
    fn test_missing_required_reported_once() {
        let row = SheetRow::new(5, vec![SheetCell::new(1, 2.0)]);
        let (_, valid, errors) = map(row);
        assert!(!valid);
        assert_eq!(errors.len(), 1);
        let err = errors[0].as_cell().unwrap();
        assert_eq!(err.message, "Value is required");
        assert_eq!(err.column, "A");
        assert_eq!(err.row, 5);

        let row = SheetRow::new(5, vec![SheetCell::new(0, ""), SheetCell::new(1, 2.0)]);
        let (_, _, errors) = map(row);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].as_cell().unwrap().kind, ValidationKind::Required);
    }

    #[test]
    fn test_populated() {
        let options = options();
        let table = resolve(options.fields(), options.settings(), None).unwrap();
        let mapper = RowMapper::new(&options, &table);
        assert!(!mapper.is_populated(&SheetRow::new(1, vec![SheetCell::new(9, "x")])));
        assert!(!mapper.is_populated(&SheetRow::new(1, vec![SheetCell::new(0, "")])));
        assert!(mapper.is_populated(&SheetRow::new(1, vec![SheetCell::new(2, 1.0)])));
    }

    #[test]
    fn test_fail_fast_stops_at_first_error() {
        let options = options();
        let table = resolve(options.fields(), options.settings(), None).unwrap();
        let mapper = RowMapper::new(&options, &table);
        let row = SheetRow::new(4, vec![SheetCell::new(1, "x")]);
        let mut line = Line::construct();
        let err = mapper
            .map_row(&row, &mut line, &mut ErrorSink::FailFast)
            .unwrap_err();
        assert_eq!(err.as_cell().unwrap().property, "qty");
    }
}
