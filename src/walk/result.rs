use crate::fs::{DirectoryRecord, EntryMetadata, FileAttributes, FileTime};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/**
 A decoded record together with the directory it was read from.

 This is what filters and projections see. It borrows the enumeration's buffer, so it only
 lives for the duration of one call; a projection copies out whatever it needs.
*/
#[derive(Clone, Copy, Debug)]
pub struct RawEntry<'a> {
    directory: &'a Path,
    record: DirectoryRecord<'a>,
}

impl<'a> RawEntry<'a> {
    #[inline]
    #[must_use]
    pub const fn new(directory: &'a Path, record: DirectoryRecord<'a>) -> Self {
        Self { directory, record }
    }

    /// The directory being listed, as the enumeration spelled it.
    #[inline]
    #[must_use]
    pub const fn directory(&self) -> &'a Path {
        self.directory
    }

    #[inline]
    #[must_use]
    pub const fn record(&self) -> &DirectoryRecord<'a> {
        &self.record
    }

    #[inline]
    #[must_use]
    pub const fn metadata(&self) -> &EntryMetadata {
        self.record.metadata()
    }

    #[inline]
    #[must_use]
    pub const fn attributes(&self) -> FileAttributes {
        self.record.attributes()
    }

    #[inline]
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        self.record.attributes().is_directory()
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.record.size()
    }

    /// Lossy UTF-8 name
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> String {
        self.record.file_name()
    }

    #[inline]
    #[must_use]
    pub fn file_name_os(&self) -> OsString {
        self.record.file_name_os()
    }

    /// The directory joined with the entry name.
    #[inline]
    #[must_use]
    pub fn full_path(&self) -> PathBuf {
        self.directory.join(self.record.file_name_os())
    }
}

/// The owned, fully decoded form of an entry, the default projection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FindResult {
    pub directory: PathBuf,
    pub file_name: OsString,
    pub attributes: FileAttributes,
    /// Logical size in bytes
    pub size: u64,
    pub allocation_size: u64,
    pub creation_time: FileTime,
    pub last_access_time: FileTime,
    pub last_write_time: FileTime,
    pub change_time: FileTime,
}

impl FindResult {
    #[must_use]
    pub fn from_raw(entry: &RawEntry<'_>) -> Self {
        let metadata = entry.metadata();
        Self {
            directory: entry.directory().to_path_buf(),
            file_name: entry.file_name_os(),
            attributes: metadata.attributes,
            size: metadata.end_of_file,
            allocation_size: metadata.allocation_size,
            creation_time: metadata.creation_time,
            last_access_time: metadata.last_access_time,
            last_write_time: metadata.last_write_time,
            change_time: metadata.change_time,
        }
    }

    #[inline]
    #[must_use]
    pub fn full_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    #[inline]
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        self.attributes.is_directory()
    }

    #[inline]
    #[must_use]
    pub fn modified(&self) -> Option<SystemTime> {
        self.last_write_time.to_system_time()
    }
}
