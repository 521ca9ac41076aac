//! Dispatch table cache
//!
//! Resolving a header is cheap but happens on every read; reads repeating
//! the same configuration against the same header reuse one table. The
//! key is the full structural description of the inputs, so equal keys
//! always resolve to equal tables.

use crate::errors::MappingError;
use crate::header::DispatchTable;
use crate::options::{ColumnBinding, MapperOptions};
use crate::record::SheetRecord;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

static GLOBAL: Lazy<DispatchCache> = Lazy::new(DispatchCache::new);

/// Everything header resolution depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    record: &'static str,
    /// (name, binding, optional) per field, in declaration order
    fields: Vec<(String, ColumnBinding, bool)>,
    ignore_unmapped: bool,
    header: Option<Vec<String>>,
}

impl DispatchKey {
    /// Create the structural key for `options` read against `header`
    pub fn new<T: SheetRecord>(options: &MapperOptions<T>, header: Option<&[String]>) -> Self {
        let settings = options.settings();
        Self {
            record: std::any::type_name::<T>(),
            fields: options
                .fields()
                .iter()
                .map(|field| {
                    (
                        field.name.clone(),
                        field.column.clone(),
                        field.is_optional(settings),
                    )
                })
                .collect(),
            ignore_unmapped: settings.ignore_unmapped_columns,
            header: header.map(<[String]>::to_vec),
        }
    }
}

/// Concurrent store of resolved dispatch tables
pub struct DispatchCache {
    tables: DashMap<DispatchKey, Arc<DispatchTable>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl DispatchCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Process-wide cache used by [`SheetReader::new`](crate::reader::SheetReader::new)
    pub fn global() -> &'static DispatchCache {
        &GLOBAL
    }

    /// Cached table for `key`, resolving and storing it on a miss.
    ///
    /// Concurrent misses may both resolve; only the first stored table is
    /// kept and returned to every caller. Errors are never cached.
    pub fn get_or_resolve<F>(
        &self,
        key: DispatchKey,
        resolve: F,
    ) -> Result<Arc<DispatchTable>, MappingError>
    where
        F: FnOnce() -> Result<DispatchTable, MappingError>,
    {
        if let Some(table) = self.tables.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(record = key.record, "Dispatch table cache hit");
            return Ok(Arc::clone(table.value()));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(record = key.record, "Dispatch table cache miss");
        let table = Arc::new(resolve()?);
        Ok(Arc::clone(self.tables.entry(key).or_insert(table).value()))
    }

    /// Number of cached tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if no tables are cached
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Drop every cached table
    pub fn clear(&self) {
        self.tables.clear();
    }

    /// Number of lookups served from the cache
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of lookups that had to resolve
    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}

impl Default for DispatchCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DispatchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchCache")
            .field("tables", &self.len())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}
