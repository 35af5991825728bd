/*!
 The Linux/Android backend: `getdents64` plus `fstatat`, re-encoded into the native record layout.

 `getdents64` only gives names, inodes and a type byte, so every entry is stat'ed relative to
 the open directory to fill in size, times and attributes. The attribute bits follow the usual
 mapping (directories, symlinks as reparse points, read-only when no write bit is set,
 dot-files hidden).
*/
use crate::FindError;
use crate::fs::record::{EntryMetadata, RecordWriter, encode_name};
use crate::fs::source::{DirectoryQuery, DirectorySource, QueryStatus};
use crate::fs::{FileAttributes, FileTime, GrowableBuffer, Result};
use core::ffi::{CStr, c_int};
use core::mem::MaybeUninit;
use std::ffi::{CString, OsStr};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Size of the kernel-facing buffer each open directory reads into.
const SCRATCH_SIZE: usize = 8192;

// linux_dirent64: d_ino u64 @0, d_off i64 @8, d_reclen u16 @16, d_type u8 @18, d_name @19
const D_RECLEN: usize = 16;
const D_TYPE: usize = 18;
const D_NAME: usize = 19;
/// The smallest valid record: the fixed fields, a one byte name and its NUL, rounded to 8.
const MINIMUM_DIRENT_SIZE: usize = (D_NAME + 2).next_multiple_of(8);
// ZFS allows 1023 byte names, everything else stops at 255
const MAX_SIZED_DIRENT: usize = 1023 + 1 + MINIMUM_DIRENT_SIZE;

const_assert!(MINIMUM_DIRENT_SIZE == 24);
const_assert!(SCRATCH_SIZE > MAX_SIZED_DIRENT);

/// Opens directories with `open`/`openat`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixSource;

/// An open directory file descriptor and the `getdents64` state for it.
#[derive(Debug)]
pub struct UnixDirectory {
    fd: c_int,
    scratch: GrowableBuffer,
    offset: usize,
    remaining: usize,
    end_of_stream: bool,
}

struct Dirent<'a> {
    ino: u64,
    d_type: u8,
    name: &'a CStr,
    reclen: usize,
}

#[inline]
fn last_error() -> FindError {
    FindError::from(io::Error::last_os_error())
}

#[inline]
fn to_cstring(bytes: &[u8]) -> Result<CString> {
    // an interior NUL can never name an existing file
    CString::new(bytes).map_err(|_| FindError::NotFound)
}

impl UnixDirectory {
    fn open_at(dirfd: c_int, path: &CStr, follow_reparse_points: bool) -> Result<Self> {
        let mut flags = libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC;
        if !follow_reparse_points {
            flags |= libc::O_NOFOLLOW;
        }
        // SAFETY: `path` is a valid NUL terminated string and `dirfd` is either AT_FDCWD or open
        let fd = unsafe { libc::openat(dirfd, path.as_ptr(), flags) };
        if fd < 0 {
            return Err(last_error());
        }
        tracing::trace!(fd, path = ?path, "opened directory");

        Ok(Self {
            fd,
            scratch: GrowableBuffer::with_capacity(SCRATCH_SIZE)?,
            offset: 0,
            remaining: 0,
            end_of_stream: false,
        })
    }

    /// Refills the scratch buffer, false once the directory is drained.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation, reason = "checked for negative first")]
    fn fill_scratch(&mut self) -> Result<bool> {
        if self.end_of_stream {
            return Ok(false);
        }
        let scratch = self.scratch.as_bytes_mut();
        // SAFETY: the pointer and length describe a live, writable allocation owned by `self`
        let read = unsafe {
            libc::syscall(
                libc::SYS_getdents64,
                self.fd,
                scratch.as_mut_ptr(),
                scratch.len(),
            )
        };
        if read < 0 {
            return Err(last_error());
        }

        self.offset = 0;
        self.remaining = read as usize;
        /*
         The kernel stops filling as soon as the next entry does not fit. If there is still room
         for the largest possible entry, the next call would return 0, so skip it.
        */
        self.end_of_stream = self.remaining == 0
            || self.scratch.capacity() - MAX_SIZED_DIRENT >= self.remaining;
        Ok(self.remaining > 0)
    }

    fn next_dirent(&self) -> Result<Dirent<'_>> {
        let corrupt = |reason| FindError::corrupt(self.offset, reason);
        let region = self
            .scratch
            .as_bytes()
            .get(self.offset..self.remaining)
            .filter(|region| region.len() > D_NAME)
            .ok_or_else(|| corrupt("truncated dirent"))?;

        let reclen = usize::from(u16::from_ne_bytes([region[D_RECLEN], region[D_RECLEN + 1]]));
        if reclen <= D_NAME || reclen > region.len() {
            return Err(corrupt("dirent length out of bounds"));
        }
        let name = CStr::from_bytes_until_nul(&region[D_NAME..reclen])
            .map_err(|_| corrupt("dirent name is not terminated"))?;

        let mut ino = [0u8; 8];
        ino.copy_from_slice(&region[..8]);
        Ok(Dirent {
            ino: u64::from_ne_bytes(ino),
            d_type: region[D_TYPE],
            name,
            reclen,
        })
    }

    fn stat_at(&self, name: &CStr, flags: c_int) -> io::Result<libc::stat> {
        let mut stat = MaybeUninit::<libc::stat>::uninit();
        // SAFETY: `name` is NUL terminated and `stat` is a valid out pointer
        if unsafe { libc::fstatat(self.fd, name.as_ptr(), stat.as_mut_ptr(), flags) } == 0 {
            // SAFETY: fstatat succeeded so the struct is initialised
            Ok(unsafe { stat.assume_init() })
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Builds the record for one dirent, `None` when the entry vanished since it was listed.
    fn describe(&self, dirent: &Dirent<'_>) -> Option<EntryMetadata> {
        let name = dirent.name.to_bytes();
        let is_dot = matches!(name, b"." | b"..");

        let mut attributes = FileAttributes::default();
        if name.first() == Some(&b'.') && !is_dot {
            attributes |= FileAttributes::HIDDEN;
        }

        #[allow(clippy::cast_possible_truncation, reason = "the file index only keeps the low bits")]
        let mut metadata = EntryMetadata {
            file_index: dirent.ino as u32,
            ..EntryMetadata::default()
        };

        match self.stat_at(dirent.name, libc::AT_SYMLINK_NOFOLLOW) {
            Ok(stat) => {
                attributes |= self.attributes_from_mode(stat.st_mode, dirent.name);
                fill_from_stat(&mut metadata, &stat);
            }
            Err(error) if error.raw_os_error() == Some(libc::ENOENT) => {
                tracing::debug!(name = ?dirent.name, "entry vanished before it could be stat'ed");
                return None;
            }
            Err(error) => {
                // listable but not searchable, only the type byte is known
                tracing::debug!(name = ?dirent.name, %error, "stat failed, using dirent type");
                attributes |= attributes_from_dtype(dirent.d_type);
                if is_dot {
                    attributes |= FileAttributes::DIRECTORY;
                }
            }
        }

        if attributes.is_empty() {
            attributes |= FileAttributes::NORMAL;
        }
        metadata.attributes = attributes;
        Some(metadata)
    }

    fn attributes_from_mode(&self, mode: libc::mode_t, name: &CStr) -> FileAttributes {
        let mut attributes = match mode & libc::S_IFMT {
            libc::S_IFDIR => FileAttributes::DIRECTORY,
            libc::S_IFLNK => {
                let target_is_dir = self
                    .stat_at(name, 0)
                    .is_ok_and(|target| target.st_mode & libc::S_IFMT == libc::S_IFDIR);
                if target_is_dir {
                    FileAttributes::REPARSE_POINT | FileAttributes::DIRECTORY
                } else {
                    FileAttributes::REPARSE_POINT
                }
            }
            libc::S_IFCHR | libc::S_IFBLK => FileAttributes::DEVICE,
            _ => FileAttributes::default(),
        };
        if mode & 0o222 == 0 {
            attributes |= FileAttributes::READONLY;
        }
        attributes
    }
}

fn attributes_from_dtype(d_type: u8) -> FileAttributes {
    match d_type {
        libc::DT_DIR => FileAttributes::DIRECTORY,
        libc::DT_LNK => FileAttributes::REPARSE_POINT,
        libc::DT_CHR | libc::DT_BLK => FileAttributes::DEVICE,
        _ => FileAttributes::default(),
    }
}

#[allow(clippy::cast_sign_loss, clippy::cast_lossless, clippy::useless_conversion)]
fn fill_from_stat(metadata: &mut EntryMetadata, stat: &libc::stat) {
    // Linux has no birth time in `struct stat`, the inode change time stands in for it
    metadata.creation_time = FileTime::from_unix(stat.st_ctime as i64, stat.st_ctime_nsec as i64);
    metadata.change_time = metadata.creation_time;
    metadata.last_access_time = FileTime::from_unix(stat.st_atime as i64, stat.st_atime_nsec as i64);
    metadata.last_write_time = FileTime::from_unix(stat.st_mtime as i64, stat.st_mtime_nsec as i64);
    metadata.end_of_file = (stat.st_size as i64).max(0) as u64;
    metadata.allocation_size = (stat.st_blocks as i64).max(0) as u64 * 512;
}

impl DirectoryQuery for UnixDirectory {
    fn query(&mut self, buffer: &mut [u8]) -> QueryStatus {
        let mut writer = RecordWriter::new(buffer);
        loop {
            if self.offset >= self.remaining {
                if !writer.is_empty() {
                    return QueryStatus::Records {
                        filled: writer.filled(),
                    };
                }
                match self.fill_scratch() {
                    Ok(true) => continue,
                    Ok(false) => return QueryStatus::NoMoreEntries,
                    Err(error) => return QueryStatus::Error(error),
                }
            }

            let (metadata, name, reclen) = match self.next_dirent() {
                Ok(dirent) => (
                    self.describe(&dirent),
                    encode_name(OsStr::from_bytes(dirent.name.to_bytes())),
                    dirent.reclen,
                ),
                Err(error) => return QueryStatus::Error(error),
            };

            let Some(metadata) = metadata else {
                self.offset += reclen;
                continue;
            };

            if writer.push(&metadata, &name) {
                self.offset += reclen;
            } else if writer.is_empty() {
                // nothing consumed, the same dirent is retried against the larger buffer
                return QueryStatus::InsufficientBuffer {
                    required: Some(RecordWriter::record_size(name.len())),
                };
            } else {
                return QueryStatus::Records {
                    filled: writer.filled(),
                };
            }
        }
    }

    fn close(&mut self) {
        if self.fd >= 0 {
            tracing::trace!(fd = self.fd, "closing directory");
            // SAFETY: the descriptor is open and owned by us, it is forgotten straight after
            unsafe { libc::close(self.fd) };
            self.fd = -1;
        }
    }
}

impl Drop for UnixDirectory {
    #[inline]
    fn drop(&mut self) {
        self.close();
    }
}

impl DirectorySource for UnixSource {
    type Handle = UnixDirectory;

    fn open_directory(&self, path: &Path, follow_reparse_points: bool) -> Result<UnixDirectory> {
        let path = to_cstring(path.as_os_str().as_bytes())?;
        UnixDirectory::open_at(libc::AT_FDCWD, &path, follow_reparse_points)
    }

    fn open_child(
        &self,
        parent: &UnixDirectory,
        name: &OsStr,
        path: &Path,
        follow_reparse_points: bool,
    ) -> Result<UnixDirectory> {
        if parent.fd < 0 {
            return self.open_directory(path, follow_reparse_points);
        }
        let name = to_cstring(name.as_bytes())?;
        UnixDirectory::open_at(parent.fd, &name, follow_reparse_points)
    }
}
