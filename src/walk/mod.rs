//! Lazy directory tree enumeration.
mod enumerator;
mod find_operation;
mod listing;
mod result;
pub mod transforms;

pub use enumerator::{EnumerationState, FindIter};
pub use find_operation::{FindOperation, enumerate};
pub use listing::{read_directory_entries, read_directory_names, read_directory_with};
pub use result::{FindResult, RawEntry};

/// Projects a raw entry into the item an enumeration yields.
pub type FindTransform<T> = fn(&RawEntry<'_>) -> T;
