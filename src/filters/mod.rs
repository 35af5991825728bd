//! Predicates deciding which entries an enumeration yields.
//!
//! Filters never decide what is traversed: a directory rejected by the name pattern or a
//! filter is still descended into when the enumeration is recursive.
mod entry_type;
mod name_pattern;

pub use entry_type::{EntryTypeFilter, EntryTypeFilterParser};
pub use name_pattern::{NamePattern, glob_to_regex};

use crate::walk::RawEntry;

/// A caller supplied predicate over raw entries.
pub type FindFilter = fn(&RawEntry<'_>) -> bool;

/// Accepts every entry.
#[inline]
#[must_use]
pub const fn all(_entry: &RawEntry<'_>) -> bool {
    true
}

/// Accepts anything that is not a directory.
#[inline]
#[must_use]
pub const fn files_only(entry: &RawEntry<'_>) -> bool {
    !entry.is_directory()
}

#[inline]
#[must_use]
pub const fn directories_only(entry: &RawEntry<'_>) -> bool {
    entry.is_directory()
}

#[inline]
#[must_use]
pub const fn reparse_points_only(entry: &RawEntry<'_>) -> bool {
    entry.attributes().is_reparse_point()
}

#[inline]
#[must_use]
pub const fn hidden_only(entry: &RawEntry<'_>) -> bool {
    entry.attributes().is_hidden()
}

/// Zero length files, directories never count as empty.
#[inline]
#[must_use]
pub const fn empty_files_only(entry: &RawEntry<'_>) -> bool {
    !entry.is_directory() && entry.size() == 0
}
