//! Sheet decoder contract
//!
//! The mapper reads rows through [`SheetCursor`], a forward-only cursor
//! over non-empty cells grouped by row. Rows without any cell are never
//! yielded; the reader detects them from gaps in the row numbers.
//! [`MemoryWorkbook`] is an in-memory implementation; the `calamine`
//! feature adds one for xlsx/xls/ods files.

use crate::address::{cell_address, column_letter};
use crate::errors::{MappingError, RowSnapshot};
use crate::options::SheetSelector;
use crate::value::CellValue;

// ============================================================================
// Rows and Cells
// ============================================================================

/// One non-empty cell
#[derive(Debug, Clone, PartialEq)]
pub struct SheetCell {
    /// Zero-based column index
    pub column: u32,
    pub value: CellValue,
}

impl SheetCell {
    /// Create a cell at a zero-based column
    pub fn new(column: u32, value: impl Into<CellValue>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }
}

/// Non-empty cells of one row, in column order
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    /// 1-based spreadsheet row number
    pub number: u32,
    pub cells: Vec<SheetCell>,
}

impl SheetRow {
    /// Create a row; cells are kept sorted by column
    pub fn new(number: u32, mut cells: Vec<SheetCell>) -> Self {
        cells.sort_by_key(|cell| cell.column);
        Self { number, cells }
    }

    /// Value at a zero-based column, if the cell is present
    pub fn cell(&self, column: u32) -> Option<&CellValue> {
        self.cells
            .binary_search_by_key(&column, |cell| cell.column)
            .ok()
            .map(|index| &self.cells[index].value)
    }

    /// Spreadsheet address of a column in this row ("C14")
    pub fn address(&self, column: u32) -> String {
        cell_address(self.number, column)
    }

    /// Every cell keyed by column letter
    pub fn snapshot(&self) -> RowSnapshot {
        self.cells
            .iter()
            .map(|cell| (column_letter(cell.column), cell.value.clone()))
            .collect()
    }

    /// Cell texts from column A to the last non-empty cell, gaps as ""
    pub fn header_labels(&self) -> Vec<String> {
        let width = self.cells.last().map_or(0, |cell| cell.column as usize + 1);
        let mut labels = vec![String::new(); width];
        for cell in &self.cells {
            labels[cell.column as usize] = cell.value.to_text();
        }
        labels
    }
}

// ============================================================================
// Decoder Traits
// ============================================================================

/// Forward-only row cursor over one sheet
pub trait SheetCursor {
    /// Next row holding at least one non-empty cell
    fn next_row(&mut self) -> Result<Option<SheetRow>, MappingError>;
}

/// A workbook the reader can select sheets from
pub trait WorkbookSource {
    /// Sheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Cursor over the selected sheet; [`MappingError::SheetNotFound`] if
    /// the selector resolves to nothing
    fn open_sheet(
        &mut self,
        selector: &SheetSelector,
    ) -> Result<Box<dyn SheetCursor + '_>, MappingError>;
}

/// Zero-based position of the selected sheet among `names`
pub fn select_sheet(names: &[String], selector: &SheetSelector) -> Result<usize, MappingError> {
    let found = match selector {
        SheetSelector::Index(index) => (*index < names.len()).then_some(*index),
        SheetSelector::Name(name) => names.iter().position(|candidate| candidate == name),
    };
    found.ok_or_else(|| MappingError::SheetNotFound(selector.to_string()))
}

// ============================================================================
// Buffered Cursor
// ============================================================================

/// Cursor over rows already decoded into memory
#[derive(Debug)]
pub struct BufferedCursor {
    rows: std::vec::IntoIter<SheetRow>,
}

impl BufferedCursor {
    /// Create a cursor over already-decoded rows
    pub fn new(rows: Vec<SheetRow>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }

    /// Build from a dense grid whose top-left cell sits at (`first_row`,
    /// `first_column`); empty cells and empty rows are dropped
    pub fn from_grid<R>(first_row: u32, first_column: u32, grid: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = CellValue>,
    {
        let rows = grid
            .into_iter()
            .enumerate()
            .filter_map(|(offset, cells)| {
                let cells: Vec<SheetCell> = cells
                    .into_iter()
                    .enumerate()
                    .filter(|(_, value)| !value.is_empty())
                    .map(|(column, value)| SheetCell::new(first_column + column as u32, value))
                    .collect();
                (!cells.is_empty()).then(|| SheetRow::new(first_row + offset as u32, cells))
            })
            .collect();
        Self::new(rows)
    }
}

impl SheetCursor for BufferedCursor {
    fn next_row(&mut self) -> Result<Option<SheetRow>, MappingError> {
        Ok(self.rows.next())
    }
}

// ============================================================================
// In-memory Workbook
// ============================================================================

/// Workbook held as grids of cell values, starting at cell A1
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<(String, Vec<Vec<CellValue>>)>,
}

impl MemoryWorkbook {
    /// Create an empty workbook
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet; `rows[0]` is spreadsheet row 1
    pub fn with_sheet(mut self, name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        self.add_sheet(name, rows);
        self
    }

    /// Append a sheet given as a grid starting at A1
    pub fn add_sheet(&mut self, name: impl Into<String>, rows: Vec<Vec<CellValue>>) {
        self.sheets.push((name.into(), rows));
    }
}

impl WorkbookSource for MemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn open_sheet(
        &mut self,
        selector: &SheetSelector,
    ) -> Result<Box<dyn SheetCursor + '_>, MappingError> {
        let index = select_sheet(&self.sheet_names(), selector)?;
        let rows = self.sheets[index].1.clone();
        Ok(Box::new(BufferedCursor::from_grid(1, 0, rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workbook() -> MemoryWorkbook {
        MemoryWorkbook::new()
            .with_sheet(
                "First",
                vec![
                    vec!["Name".into(), CellValue::Empty, "Size".into()],
                    vec![CellValue::Empty, CellValue::Empty],
                    vec!["a".into(), 1.0.into()],
                ],
            )
            .with_sheet("Second", vec![])
    }

    #[test]
    fn test_cursor_skips_empty_rows() {
        let mut workbook = workbook();
        let mut cursor = workbook.open_sheet(&SheetSelector::default()).unwrap();
        let header = cursor.next_row().unwrap().unwrap();
        assert_eq!(header.number, 1);
        assert_eq!(header.header_labels(), vec!["Name", "", "Size"]);

        let row = cursor.next_row().unwrap().unwrap();
        assert_eq!(row.number, 3);
        assert_eq!(row.cell(1), Some(&CellValue::Number(1.0)));
        assert_eq!(row.address(1), "B3");
        assert!(cursor.next_row().unwrap().is_none());
    }

    #[test]
    fn test_snapshot_by_letter() {
        let row = SheetRow::new(
            4,
            vec![SheetCell::new(2, "z"), SheetCell::new(0, "x")],
        );
        assert_eq!(
            row.snapshot(),
            vec![
                ("A".to_string(), CellValue::from("x")),
                ("C".to_string(), CellValue::from("z")),
            ]
        );
        assert_eq!(row.cell(1), None);
    }

    #[test]
    fn test_select_sheet() {
        let names = workbook().sheet_names();
        assert_eq!(select_sheet(&names, &SheetSelector::Name("Second".into())).unwrap(), 1);
        assert_eq!(select_sheet(&names, &SheetSelector::Index(0)).unwrap(), 0);
        assert!(matches!(
            select_sheet(&names, &SheetSelector::Index(2)),
            Err(MappingError::SheetNotFound(_))
        ));
        assert!(matches!(
            select_sheet(&names, &SheetSelector::Name("Third".into())),
            Err(MappingError::SheetNotFound(name)) if name == "Third"
        ));
    }
}
