//! The Windows backend, `GetFileInformationByHandleEx(FileFullDirectoryInfo)` already
//! produces records in the layout the decoder reads, so the buffer is handed straight through.
use crate::FindError;
use crate::fs::Result;
use crate::fs::source::{DirectoryQuery, DirectorySource, QueryStatus};
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use windows::Win32::Foundation::{
    CloseHandle, ERROR_BAD_LENGTH, ERROR_INSUFFICIENT_BUFFER, ERROR_MORE_DATA,
    ERROR_NO_MORE_FILES, HANDLE,
};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FILE_FLAG_BACKUP_SEMANTICS, FILE_FLAG_OPEN_REPARSE_POINT, FILE_LIST_DIRECTORY,
    FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE, FileFullDirectoryInfo,
    GetFileInformationByHandleEx, OPEN_EXISTING,
};
use windows::core::PCWSTR;

/// Opens directories with `CreateFileW`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsSource;

/// An open directory handle.
#[derive(Debug)]
pub struct WindowsDirectory {
    handle: Option<HANDLE>,
}

/// Pulls the Win32 error code back out of an `HRESULT_FROM_WIN32` value.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn win32_code(error: &windows::core::Error) -> i32 {
    let hresult = error.code().0 as u32;
    if hresult & 0xFFFF_0000 == 0x8007_0000 {
        (hresult & 0xFFFF) as i32
    } else {
        hresult as i32
    }
}

impl DirectoryQuery for WindowsDirectory {
    fn query(&mut self, buffer: &mut [u8]) -> QueryStatus {
        let Some(handle) = self.handle else {
            return QueryStatus::NoMoreEntries;
        };
        let length = u32::try_from(buffer.len()).unwrap_or(u32::MAX);

        // SAFETY: the buffer is writable for `length` bytes and 8-byte aligned, the handle is open
        let outcome = unsafe {
            GetFileInformationByHandleEx(
                handle,
                FileFullDirectoryInfo,
                buffer.as_mut_ptr().cast(),
                length,
            )
        };

        match outcome {
            Ok(()) => QueryStatus::Records {
                filled: length as usize,
            },
            Err(error) => {
                #[allow(clippy::cast_sign_loss)]
                let code = win32_code(&error) as u32;
                if code == ERROR_NO_MORE_FILES.0 {
                    QueryStatus::NoMoreEntries
                } else if [ERROR_MORE_DATA, ERROR_BAD_LENGTH, ERROR_INSUFFICIENT_BUFFER]
                    .iter()
                    .any(|known| known.0 == code)
                {
                    QueryStatus::InsufficientBuffer { required: None }
                } else {
                    QueryStatus::Error(FindError::from_raw_os_error(win32_code(&error)))
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::trace!(?handle, "closing directory");
            // SAFETY: the handle came from CreateFileW and is closed exactly once
            let _ = unsafe { CloseHandle(handle) };
        }
    }
}

impl Drop for WindowsDirectory {
    #[inline]
    fn drop(&mut self) {
        self.close();
    }
}

impl DirectorySource for WindowsSource {
    type Handle = WindowsDirectory;

    fn open_directory(&self, path: &Path, follow_reparse_points: bool) -> Result<WindowsDirectory> {
        let wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(core::iter::once(0))
            .collect();

        let mut flags = FILE_FLAG_BACKUP_SEMANTICS;
        if !follow_reparse_points {
            flags |= FILE_FLAG_OPEN_REPARSE_POINT;
        }

        // SAFETY: `wide` is NUL terminated and outlives the call, the remaining arguments are plain flags
        let handle = unsafe {
            CreateFileW(
                PCWSTR::from_raw(wide.as_ptr()),
                FILE_LIST_DIRECTORY.0,
                FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                None,
                OPEN_EXISTING,
                flags,
                None,
            )
        }
        .map_err(|error| FindError::from_raw_os_error(win32_code(&error)))?;

        tracing::trace!(?handle, path = %path.display(), "opened directory");
        Ok(WindowsDirectory {
            handle: Some(handle),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{GrowableBuffer, decode_entry};

    #[test]
    fn lists_temp_dir() {
        let dir = std::env::temp_dir().join(format!("findop_win_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("file.txt"), b"abc").unwrap();

        let mut handle = WindowsSource.open_directory(&dir, true).unwrap();
        let mut buffer = GrowableBuffer::with_capacity(4096).unwrap();
        let mut names = Vec::new();
        while let QueryStatus::Records { filled } = handle.query(buffer.as_bytes_mut()) {
            let mut offset = Some(0);
            while let Some(at) = offset {
                let (record, next) = decode_entry(buffer.as_bytes(), filled, at).unwrap();
                names.push(record.file_name());
                offset = next;
            }
        }
        names.sort();
        assert_eq!(names, [".", "..", "file.txt"]);
        drop(handle);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory_is_not_found() {
        let err = WindowsSource
            .open_directory(Path::new(r"C:\definitely\not\here\findop"), true)
            .unwrap_err();
        assert!(matches!(err, FindError::NotFound));
    }
}
