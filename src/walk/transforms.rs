//! Built-in projections from a [`RawEntry`] to what an enumeration yields.
//!
//! Any `fn(&RawEntry<'_>) -> T` can be used, these cover the common shapes.
use crate::walk::{FindResult, RawEntry};
use std::path::PathBuf;

/// The full owned entry.
#[must_use]
pub fn to_find_result(entry: &RawEntry<'_>) -> FindResult {
    FindResult::from_raw(entry)
}

/// Just the name, lossily converted to UTF-8.
#[must_use]
pub fn to_file_name(entry: &RawEntry<'_>) -> String {
    entry.file_name()
}

#[must_use]
pub fn to_full_path(entry: &RawEntry<'_>) -> PathBuf {
    entry.full_path()
}
