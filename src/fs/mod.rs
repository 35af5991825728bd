mod buffer;
mod memory;
mod pool;
mod record;
mod source;
mod types;

#[cfg(not(any(target_os = "linux", target_os = "android", windows)))]
mod portable;
#[cfg(any(target_os = "linux", target_os = "android"))]
mod unix;
#[cfg(windows)]
mod windows;

pub use buffer::{GrowableBuffer, MAX_BUFFER_SIZE};
pub use memory::{MemoryHandle, MemorySource};
pub use pool::BufferPool;
pub use record::{
    DirectoryRecord, EntryMetadata, HEADER_SIZE, MAX_FILE_NAME_UNITS, MAX_RECORD_SIZE,
    RECORD_ALIGN, RecordWriter, decode_entry, decode_name, encode_name,
};
pub use source::{DirectoryHandle, DirectoryQuery, DirectorySource, QueryStatus};
pub use types::{FileAttributes, FileTime, Result};

#[cfg(not(any(target_os = "linux", target_os = "android", windows)))]
pub use portable::{PortableDirectory, PortableSource};
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use unix::{UnixDirectory, UnixSource};
#[cfg(windows)]
pub use self::windows::{WindowsDirectory, WindowsSource};

/// The directory source for the current target.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub type NativeSource = UnixSource;
/// The directory source for the current target.
#[cfg(windows)]
pub type NativeSource = WindowsSource;
/// The directory source for the current target.
#[cfg(not(any(target_os = "linux", target_os = "android", windows)))]
pub type NativeSource = PortableSource;

/// Initial size of an enumeration's record buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// The smallest buffer an enumeration will use, it always holds two maximal records.
pub const MIN_BUFFER_SIZE: usize = 2 * MAX_RECORD_SIZE;

const_assert!(DEFAULT_BUFFER_SIZE >= MIN_BUFFER_SIZE, "default buffer too small!");
const_assert!(DEFAULT_BUFFER_SIZE <= MAX_BUFFER_SIZE);
