//! Fallback backend for targets without a dedicated one (macOS and the BSDs among them).
//!
//! Built on `std::fs::read_dir`, which hides "." and "..", so those two are synthesised first.
use crate::FindError;
use crate::fs::record::{EntryMetadata, RecordWriter, encode_name};
use crate::fs::source::{DirectoryQuery, DirectorySource, QueryStatus};
use crate::fs::{FileAttributes, FileTime, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
const SYMLINK_LOOP: i32 = libc::ELOOP;
#[cfg(not(unix))]
const SYMLINK_LOOP: i32 = 0;

/// Opens directories through `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableSource;

type Pending = (EntryMetadata, Vec<u16>);

#[derive(Debug)]
pub struct PortableDirectory {
    path: PathBuf,
    entries: Option<fs::ReadDir>,
    dots_emitted: u8,
    pending: Option<Pending>,
}

fn describe(path: &Path, name: &OsStr) -> Option<Pending> {
    let metadata = fs::symlink_metadata(path).ok()?;
    let file_type = metadata.file_type();

    let mut attributes = FileAttributes::default();
    if file_type.is_dir() {
        attributes |= FileAttributes::DIRECTORY;
    } else if file_type.is_symlink() {
        attributes |= FileAttributes::REPARSE_POINT;
        if fs::metadata(path).is_ok_and(|target| target.is_dir()) {
            attributes |= FileAttributes::DIRECTORY;
        }
    }
    if metadata.permissions().readonly() {
        attributes |= FileAttributes::READONLY;
    }
    if name.as_encoded_bytes().first() == Some(&b'.') && name != "." && name != ".." {
        attributes |= FileAttributes::HIDDEN;
    }
    if attributes.is_empty() {
        attributes |= FileAttributes::NORMAL;
    }

    let time = |value: std::io::Result<std::time::SystemTime>| {
        value.map(FileTime::from_system_time).unwrap_or_default()
    };
    let modified = time(metadata.modified());
    let entry = EntryMetadata {
        creation_time: time(metadata.created()),
        last_access_time: time(metadata.accessed()),
        last_write_time: modified,
        change_time: modified,
        end_of_file: metadata.len(),
        allocation_size: metadata.len(),
        attributes,
        ..EntryMetadata::default()
    };
    Some((entry, encode_name(name)))
}

impl PortableDirectory {
    fn next_entry(&mut self) -> Option<Result<Pending>> {
        while self.dots_emitted < 2 {
            self.dots_emitted += 1;
            let (name, path) = if self.dots_emitted == 1 {
                (".", self.path.clone())
            } else {
                ("..", self.path.join(".."))
            };
            if let Some(entry) = describe(&path, OsStr::new(name)) {
                return Some(Ok(entry));
            }
        }

        loop {
            let entry = match self.entries.as_mut()?.next()? {
                Ok(entry) => entry,
                Err(error) => return Some(Err(FindError::from(error))),
            };
            // entries that vanish between listing and stat are skipped
            if let Some(described) = describe(&entry.path(), &entry.file_name()) {
                return Some(Ok(described));
            }
        }
    }
}

impl DirectoryQuery for PortableDirectory {
    fn query(&mut self, buffer: &mut [u8]) -> QueryStatus {
        let mut writer = RecordWriter::new(buffer);
        loop {
            let (metadata, name) = match self.pending.take() {
                Some(pending) => pending,
                None => match self.next_entry() {
                    Some(Ok(entry)) => entry,
                    Some(Err(error)) => return QueryStatus::Error(error),
                    None => break,
                },
            };

            if !writer.push(&metadata, &name) {
                let required = RecordWriter::record_size(name.len());
                self.pending = Some((metadata, name));
                return if writer.is_empty() {
                    QueryStatus::InsufficientBuffer {
                        required: Some(required),
                    }
                } else {
                    QueryStatus::Records {
                        filled: writer.filled(),
                    }
                };
            }
        }

        if writer.is_empty() {
            QueryStatus::NoMoreEntries
        } else {
            QueryStatus::Records {
                filled: writer.filled(),
            }
        }
    }

    fn close(&mut self) {
        self.entries = None;
        self.pending = None;
        self.dots_emitted = 2;
    }
}

impl DirectorySource for PortableSource {
    type Handle = PortableDirectory;

    fn open_directory(&self, path: &Path, follow_reparse_points: bool) -> Result<PortableDirectory> {
        if !follow_reparse_points && fs::symlink_metadata(path)?.file_type().is_symlink() {
            return Err(FindError::from_raw_os_error(SYMLINK_LOOP));
        }
        let entries = fs::read_dir(path)?;
        Ok(PortableDirectory {
            path: path.to_path_buf(),
            entries: Some(entries),
            dots_emitted: 0,
            pending: None,
        })
    }
}
