//! Sorting policy passed to the large-span sort entry points.

use std::path::{Path, PathBuf};

use tessera_common::{Result, result::invalid_arg};

/// Record count from which `sort_large_span` switches to the external merge sort.
pub const DEFAULT_MEMORY_SORT_LIMIT: u64 = 1 << 20;

/// Configuration for sorting spans that may not fit comfortably in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortingContext {
    /// Directory receiving the scratch files of external sorts.
    temp_dir: PathBuf,
    /// Spans of at least this many records are sorted externally; it also caps
    /// the chunk size quicksorted in memory before merging.
    memory_sort_limit: u64,
}

impl Default for SortingContext {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            memory_sort_limit: DEFAULT_MEMORY_SORT_LIMIT,
        }
    }
}

impl SortingContext {
    pub fn new(temp_dir: impl Into<PathBuf>, memory_sort_limit: u64) -> SortingContext {
        SortingContext {
            temp_dir: temp_dir.into(),
            memory_sort_limit,
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn memory_sort_limit(&self) -> u64 {
        self.memory_sort_limit
    }

    pub fn with_memory_sort_limit(mut self, limit: u64) -> SortingContext {
        self.memory_sort_limit = limit;
        self
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.memory_sort_limit == 0 {
            invalid_arg("memory_sort_limit", "memory_sort_limit > 0")?;
        }
        if !self.temp_dir.is_dir() {
            invalid_arg("temp_dir", "temp_dir is an existing directory")?;
        }
        Ok(())
    }
}
