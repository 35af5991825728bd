//this is the one error type for the whole crate, the enumerator clones it when it faults
//so every later advance can hand back the same error.
use std::{fmt, io};

/// A coarse classification of a [`FindError`], for callers that only care
/// about which bucket a failure falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AccessDenied,
    CorruptData,
    Io,
    OutOfMemory,
    InvalidPattern,
}

#[derive(Debug, Clone)]
/// An error type for directory enumeration.
///
/// The variants map the native error space (errno values on Unix, Win32 codes on Windows)
/// onto the handful of outcomes a caller can reasonably act on.
pub enum FindError {
    /// The directory (initial or recursive target) does not exist or is not a directory.
    NotFound,
    /// Permission failure opening or reading a directory.
    AccessDenied,
    /// A record in the buffer is inconsistent with the buffer's bounds.
    CorruptData {
        /// Byte offset of the offending record within the filled buffer
        offset: usize,
        reason: &'static str,
    },
    /// Any other failure reported by the platform, carrying the native code.
    Io(i32),
    /// The record buffer could not be grown.
    OutOfMemory,
    /// The name pattern could not be compiled.
    RegexError(regex::Error),
}

impl FindError {
    /// Builds a [`FindError::CorruptData`] for the record at `offset`.
    #[inline]
    pub(crate) const fn corrupt(offset: usize, reason: &'static str) -> Self {
        Self::CorruptData { offset, reason }
    }

    /// Maps a native error code onto the error taxonomy.
    #[must_use]
    #[cfg(unix)]
    pub fn from_raw_os_error(code: i32) -> Self {
        use libc::{EACCES, ENAMETOOLONG, ENOENT, ENOMEM, ENOTDIR, EPERM};
        match code {
            ENOENT | ENOTDIR | ENAMETOOLONG => Self::NotFound,
            EACCES | EPERM => Self::AccessDenied,
            ENOMEM => Self::OutOfMemory,
            other => Self::Io(other),
        }
    }

    /// Maps a native error code onto the error taxonomy.
    #[must_use]
    #[cfg(windows)]
    #[allow(clippy::cast_sign_loss)]
    pub fn from_raw_os_error(code: i32) -> Self {
        use windows::Win32::Foundation::{
            ERROR_ACCESS_DENIED, ERROR_BAD_NETPATH, ERROR_DIRECTORY, ERROR_FILE_NOT_FOUND,
            ERROR_INVALID_NAME, ERROR_NOT_ENOUGH_MEMORY, ERROR_OUTOFMEMORY, ERROR_PATH_NOT_FOUND,
        };
        let code_u32 = code as u32;
        if [
            ERROR_FILE_NOT_FOUND,
            ERROR_PATH_NOT_FOUND,
            ERROR_DIRECTORY,
            ERROR_INVALID_NAME,
            ERROR_BAD_NETPATH,
        ]
        .iter()
        .any(|known| known.0 == code_u32)
        {
            Self::NotFound
        } else if ERROR_ACCESS_DENIED.0 == code_u32 {
            Self::AccessDenied
        } else if ERROR_NOT_ENOUGH_MEMORY.0 == code_u32 || ERROR_OUTOFMEMORY.0 == code_u32 {
            Self::OutOfMemory
        } else {
            Self::Io(code)
        }
    }

    /// Maps a native error code onto the error taxonomy.
    #[must_use]
    #[cfg(not(any(unix, windows)))]
    pub fn from_raw_os_error(code: i32) -> Self {
        match io::Error::from_raw_os_error(code).kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::AccessDenied,
            io::ErrorKind::OutOfMemory => Self::OutOfMemory,
            _ => Self::Io(code),
        }
    }

    /// Returns the coarse kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::AccessDenied => ErrorKind::AccessDenied,
            Self::CorruptData { .. } => ErrorKind::CorruptData,
            Self::Io(_) => ErrorKind::Io,
            Self::OutOfMemory => ErrorKind::OutOfMemory,
            Self::RegexError(_) => ErrorKind::InvalidPattern,
        }
    }

    /// Returns the native error code for [`FindError::Io`], if any.
    #[must_use]
    pub const fn raw_os_error(&self) -> Option<i32> {
        match *self {
            Self::Io(code) => Some(code),
            _ => None,
        }
    }
}

impl From<io::Error> for FindError {
    fn from(error: io::Error) -> Self {
        // map OS error codes to variants first, they carry the most information
        if let Some(code) = error.raw_os_error() {
            return Self::from_raw_os_error(code);
        }

        // handle non-OS errors by kind
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::AccessDenied,
            io::ErrorKind::OutOfMemory => Self::OutOfMemory,
            io::ErrorKind::InvalidData => Self::corrupt(0, "invalid data"),
            _ => Self::Io(0),
        }
    }
}

impl From<regex::Error> for FindError {
    fn from(e: regex::Error) -> Self {
        Self::RegexError(e)
    }
}

#[allow(clippy::pattern_type_mismatch)]
impl fmt::Display for FindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Directory not found"),
            Self::AccessDenied => write!(f, "Access denied"),
            Self::CorruptData { offset, reason } => {
                write!(f, "Corrupt directory record at offset {offset}: {reason}")
            }
            Self::Io(0) => write!(f, "I/O error"),
            Self::Io(code) => write!(f, "OS error: {}", io::Error::from_raw_os_error(*code)),
            Self::OutOfMemory => write!(f, "Out of memory growing the directory buffer"),
            Self::RegexError(e) => write!(f, "Invalid name pattern: {e}"),
        }
    }
}

#[allow(clippy::pattern_type_mismatch)]
impl std::error::Error for FindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RegexError(e) => Some(e),
            _ => None,
        }
    }
}
