//! Header resolution
//!
//! Reconciles the declared field bindings with the discovered header row
//! (or with column positions when header names are not used) and produces
//! the [`DispatchTable`] the row mapper consults for every cell.

use crate::address::{column_index, column_letter};
use crate::errors::{MappingError, MissingColumnsError};
use crate::options::{ColumnBinding, FieldBinding, ReadSettings};
use std::collections::BTreeMap;
use tracing::trace;

/// Canonical comparison form: lower-case, alphanumerics and `@` only
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == '@')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Label standing in for an empty header cell
pub fn blank_column_label(column: u32) -> String {
    format!("**blank column** ({})", column_letter(column).to_lowercase())
}

// ============================================================================
// Dispatch Table
// ============================================================================

/// Field responsible for one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnEntry {
    /// Index into the configured field bindings
    pub field: usize,
    /// Position within a multi-column binding, 0 otherwise
    pub position: usize,
    /// Dictionary key for multi-column bindings
    pub key: Option<String>,
}

/// Resolved column index -> field map for one read
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchTable {
    columns: BTreeMap<u32, ColumnEntry>,
    first_columns: BTreeMap<usize, u32>,
}

impl DispatchTable {
    fn insert(&mut self, column: u32, entry: ColumnEntry, fields: &[FieldBinding]) -> Result<(), MappingError> {
        if let Some(existing) = self.columns.get(&column) {
            return Err(MappingError::configuration(format!(
                "Properties '{}' and '{}' both map to column {}",
                fields[existing.field].name,
                fields[entry.field].name,
                column_letter(column)
            )));
        }
        trace!(
            column = %column_letter(column),
            property = %fields[entry.field].name,
            "Bound column"
        );
        let first = self.first_columns.entry(entry.field).or_insert(column);
        if column < *first {
            *first = column;
        }
        self.columns.insert(column, entry);
        Ok(())
    }

    /// Entry for a zero-based column, if the column is mapped
    pub fn entry(&self, column: u32) -> Option<&ColumnEntry> {
        self.columns.get(&column)
    }

    /// Leftmost column bound to a field
    pub fn column_of(&self, field: usize) -> Option<u32> {
        self.first_columns.get(&field).copied()
    }

    /// Number of mapped columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Build the dispatch table; `header` is `None` for positional binding
pub fn resolve(
    fields: &[FieldBinding],
    settings: &ReadSettings,
    header: Option<&[String]>,
) -> Result<DispatchTable, MappingError> {
    match header {
        Some(labels) => resolve_by_name(fields, settings, labels),
        None => resolve_by_position(fields),
    }
}

fn resolve_by_position(fields: &[FieldBinding]) -> Result<DispatchTable, MappingError> {
    let mut table = DispatchTable::default();
    let mut position = 0u32;

    for (index, field) in fields.iter().enumerate() {
        if !field.is_column_bound() {
            continue;
        }
        match &field.column {
            ColumnBinding::Name(_) => table.insert(position, scalar_entry(index), fields)?,
            ColumnBinding::Number(number) => {
                table.insert(number - 1, scalar_entry(index), fields)?
            }
            ColumnBinding::Columns(columns) => {
                for (slot, name) in columns.iter().enumerate() {
                    let column = column_index(name).ok_or_else(|| {
                        MappingError::configuration(format!(
                            "Column '{}' of property '{}' must be a column letter when header names are not used",
                            name, field.name
                        ))
                    })?;
                    table.insert(column, collection_entry(index, slot, name), fields)?;
                }
            }
            ColumnBinding::RowNumber | ColumnBinding::Ignored => {}
        }
        position += 1;
    }

    Ok(table)
}

struct Identity<'a> {
    key: String,
    name: &'a str,
    field: usize,
    slot: usize,
    collection: bool,
    matched: bool,
}

fn resolve_by_name(
    fields: &[FieldBinding],
    settings: &ReadSettings,
    labels: &[String],
) -> Result<DispatchTable, MappingError> {
    let mut table = DispatchTable::default();
    let mut identities = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        match &field.column {
            ColumnBinding::Number(number) => {
                table.insert(number - 1, scalar_entry(index), fields)?
            }
            ColumnBinding::Name(name) => identities.push(Identity {
                key: normalize(name),
                name,
                field: index,
                slot: 0,
                collection: false,
                matched: false,
            }),
            ColumnBinding::Columns(columns) => {
                identities.extend(columns.iter().enumerate().map(|(slot, name)| Identity {
                    key: normalize(name),
                    name,
                    field: index,
                    slot,
                    collection: true,
                    matched: false,
                }))
            }
            ColumnBinding::RowNumber | ColumnBinding::Ignored => {}
        }
    }

    let mut missing = MissingColumnsError::default();

    for (column, label) in labels.iter().enumerate() {
        let column = column as u32;
        if table.entry(column).is_some() {
            continue;
        }
        let key = normalize(label);
        let found = if key.is_empty() {
            None
        } else {
            identities
                .iter_mut()
                .find(|identity| !identity.matched && identity.key == key)
        };
        match found {
            Some(identity) => {
                identity.matched = true;
                let entry = if identity.collection {
                    collection_entry(identity.field, identity.slot, identity.name)
                } else {
                    scalar_entry(identity.field)
                };
                table.insert(column, entry, fields)?;
            }
            None if settings.ignore_unmapped_columns => {}
            None if label.trim().is_empty() => {
                missing.missing_properties.push(blank_column_label(column))
            }
            None => missing.missing_properties.push(label.clone()),
        }
    }

    for identity in identities.iter().filter(|identity| !identity.matched) {
        if !fields[identity.field].is_optional(settings) {
            missing.missing_headers.push(identity.name.to_string());
        }
    }

    if missing.missing_headers.is_empty() && missing.missing_properties.is_empty() {
        Ok(table)
    } else {
        Err(missing.into())
    }
}

fn scalar_entry(field: usize) -> ColumnEntry {
    ColumnEntry {
        field,
        position: 0,
        key: None,
    }
}

fn collection_entry(field: usize, position: usize, key: &str) -> ColumnEntry {
    ColumnEntry {
        field,
        position,
        key: Some(key.to_string()),
    }
}
