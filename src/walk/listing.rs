use crate::fs::{
    DEFAULT_BUFFER_SIZE, DirectoryHandle, DirectorySource, GrowableBuffer, NativeSource,
    QueryStatus, Result, decode_entry,
};
use crate::walk::{FindResult, FindTransform, RawEntry, transforms};
use std::path::Path;

/**
 Lists one directory through `source`, projecting every record with `transform`.

 Unlike [`FindIter`](crate::FindIter) nothing is skipped: "." and ".." are part of the result
 whenever the source reports them. The handle is closed before returning, error or not.

 # Errors
 Anything the source reports while opening or reading, and
 [`crate::FindError::CorruptData`] for malformed records.
*/
pub fn read_directory_with<S, T>(
    source: &S,
    path: &Path,
    transform: FindTransform<T>,
) -> Result<Vec<T>>
where
    S: DirectorySource,
{
    let mut handle = DirectoryHandle::new(source.open_directory(path, true)?);
    let mut buffer = GrowableBuffer::with_capacity(DEFAULT_BUFFER_SIZE)?;
    let mut entries = Vec::new();

    loop {
        let filled = match handle.query(buffer.as_bytes_mut()) {
            QueryStatus::Records { filled } if filled > 0 => filled,
            QueryStatus::Records { .. } | QueryStatus::NoMoreEntries => break,
            QueryStatus::InsufficientBuffer { required } => {
                buffer.grow_for(required)?;
                continue;
            }
            QueryStatus::Error(error) => return Err(error),
        };

        let mut cursor = Some(0);
        while let Some(offset) = cursor {
            let (record, next) = decode_entry(buffer.as_bytes(), filled, offset)?;
            entries.push(transform(&RawEntry::new(path, record)));
            cursor = next;
        }
    }

    handle.close();
    tracing::trace!(directory = %path.display(), entries = entries.len(), "directory listed");
    Ok(entries)
}

/// Every entry of `path`, "." and ".." included.
///
/// # Errors
/// As [`read_directory_with`].
pub fn read_directory_entries<P: AsRef<Path>>(path: P) -> Result<Vec<FindResult>> {
    read_directory_with(
        &NativeSource::default(),
        path.as_ref(),
        transforms::to_find_result,
    )
}

/// Every name in `path`, "." and ".." included.
///
/// # Errors
/// As [`read_directory_with`].
pub fn read_directory_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    read_directory_with(
        &NativeSource::default(),
        path.as_ref(),
        transforms::to_file_name,
    )
}
