//! Workbook decoding via `calamine` (xlsx, xlsm, xlsb, xls, ods)

use crate::errors::MappingError;
use crate::options::SheetSelector;
use crate::source::{select_sheet, BufferedCursor, SheetCursor, WorkbookSource};
use crate::value::CellValue;
use ::calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader, Sheets};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use tracing::debug;

/// Workbook opened with calamine's format auto-detection
pub struct CalamineWorkbook<RS> {
    sheets: Sheets<RS>,
}

impl CalamineWorkbook<BufReader<File>> {
    /// Open a workbook file; the format is taken from the extension
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MappingError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening workbook");
        let sheets = open_workbook_auto(path)
            .map_err(|e| MappingError::Source(format!("{}: {}", path.display(), e)))?;
        Ok(Self { sheets })
    }
}

impl CalamineWorkbook<Cursor<Vec<u8>>> {
    /// Open a workbook held in memory; the format is sniffed from the content
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, MappingError> {
        let sheets = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| MappingError::Source(e.to_string()))?;
        Ok(Self { sheets })
    }
}

impl<RS: Read + Seek> WorkbookSource for CalamineWorkbook<RS> {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    fn open_sheet(
        &mut self,
        selector: &SheetSelector,
    ) -> Result<Box<dyn SheetCursor + '_>, MappingError> {
        let names = self.sheets.sheet_names();
        let name = &names[select_sheet(&names, selector)?];
        let range = self
            .sheets
            .worksheet_range(name)
            .map_err(|e| MappingError::Source(format!("sheet '{}': {}", name, e)))?;

        // ranges start at the first used cell, not at A1
        let (first_row, first_column) = range.start().unwrap_or((0, 0));
        let grid: Vec<Vec<CellValue>> = range
            .rows()
            .map(|row| row.iter().map(cell_value).collect())
            .collect();
        debug!(sheet = %name, rows = grid.len(), "Loaded worksheet");
        Ok(Box::new(BufferedCursor::from_grid(first_row + 1, first_column, grid)))
    }
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_conversion() {
        assert_eq!(cell_value(&Data::Empty), CellValue::Empty);
        assert_eq!(cell_value(&Data::Int(3)), CellValue::Number(3.0));
        assert_eq!(cell_value(&Data::String("x".into())), CellValue::from("x"));
        assert_eq!(cell_value(&Data::Bool(true)), CellValue::Bool(true));
        assert_eq!(
            cell_value(&Data::DateTimeIso("2024-01-02T03:04:05".into())),
            CellValue::from("2024-01-02T03:04:05")
        );
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let result = CalamineWorkbook::from_bytes(b"not a workbook".to_vec());
        assert!(matches!(result, Err(MappingError::Source(_))));
    }

    #[test]
    fn test_open_missing_file() {
        let result = CalamineWorkbook::open("/nonexistent/book.xlsx");
        assert!(matches!(result, Err(MappingError::Source(_))));
    }
}
